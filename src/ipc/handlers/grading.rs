use crate::engine::{self, BandInput, EngineError, PassStatus};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{BandStore, SqliteBandStore};
use serde_json::json;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn parse_status(
    req: &Request,
    raw: Option<&serde_json::Value>,
    what: &str,
) -> Result<Option<PassStatus>, serde_json::Value> {
    match raw {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(err(
                    &req.id,
                    "bad_params",
                    format!("{} must be PASS or FAIL", what),
                    None,
                ));
            };
            match PassStatus::parse(s) {
                Some(p) => Ok(Some(p)),
                None => Err(err(
                    &req.id,
                    "bad_params",
                    format!("{} must be PASS or FAIL", what),
                    None,
                )),
            }
        }
    }
}

fn band_input(fields: &serde_json::Value, status: Option<PassStatus>) -> BandInput {
    BandInput {
        label: fields
            .get("label")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        min_marks: fields.get("minMarks").and_then(|v| v.as_f64()),
        max_marks: fields.get("maxMarks").and_then(|v| v.as_f64()),
        status,
    }
}

fn engine_err(id: &str, e: EngineError) -> serde_json::Value {
    let message = e.to_string();
    match e {
        EngineError::Validation(_) => err(id, "bad_params", message, None),
        EngineError::BulkValidation { messages } => err(
            id,
            "bad_params",
            "invalid grading system entries",
            Some(json!({ "entries": messages })),
        ),
        EngineError::Overlap { band, .. } => err(
            id,
            "overlap_conflict",
            message,
            Some(json!({
                "label": band.label,
                "minMarks": band.min_marks,
                "maxMarks": band.max_marks
            })),
        ),
        EngineError::NotFound => err(id, "not_found", message, None),
        EngineError::MarksOutOfRange(_) => err(id, "marks_out_of_range", message, None),
        EngineError::Store(_) => err(id, "db_query_failed", message, None),
    }
}

fn handle_grading_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = SqliteBandStore::new(conn);
    // First list for an owner with no bands seeds the default system.
    if let Err(e) = engine::ensure_default(&store, &owner) {
        return engine_err(&req.id, e);
    }
    match store.list(&owner) {
        Ok(bands) => ok(&req.id, json!({ "bands": bands })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_grading_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let status = match parse_status(req, req.params.get("status"), "status") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = SqliteBandStore::new(conn);
    match engine::create_band(&store, &owner, &band_input(&req.params, status)) {
        Ok(band) => ok(&req.id, json!({ "band": band })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grading_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let band_id = match required_str(req, "bandId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let status = match parse_status(req, req.params.get("status"), "status") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = SqliteBandStore::new(conn);
    match engine::update_band(&store, &owner, &band_id, &band_input(&req.params, status)) {
        Ok(band) => ok(&req.id, json!({ "band": band })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grading_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let band_id = match required_str(req, "bandId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = SqliteBandStore::new(conn);
    match engine::delete_band(&store, &owner, &band_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grading_replace_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(raw_bands) = req.params.get("bands").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "bands must be an array", None);
    };

    let mut entries: Vec<BandInput> = Vec::with_capacity(raw_bands.len());
    for (i, raw) in raw_bands.iter().enumerate() {
        if !raw.is_object() {
            return err(
                &req.id,
                "bad_params",
                format!("entry {} must be an object", i + 1),
                None,
            );
        }
        let status = match parse_status(
            req,
            raw.get("status"),
            &format!("entry {} status", i + 1),
        ) {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        entries.push(band_input(raw, status));
    }

    let store = SqliteBandStore::new(conn);
    match engine::replace_all(&store, &owner, &entries) {
        Ok(bands) => ok(&req.id, json!({ "bands": bands })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grading_validate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = SqliteBandStore::new(conn);
    match engine::validate_system(&store, &owner) {
        Ok(report) => ok(
            &req.id,
            json!({ "valid": report.valid, "errors": report.errors }),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grading_grade_for_marks(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(marks) = req.params.get("marks").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing marks", None);
    };

    let store = SqliteBandStore::new(conn);
    match engine::grade_for_marks(&store, &owner, marks) {
        Ok(Some(band)) => ok(&req.id, json!({ "band": band })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "no grade band matches the given marks",
            None,
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grading_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = SqliteBandStore::new(conn);
    match engine::reset_to_default(&store, &owner) {
        Ok(bands) => ok(&req.id, json!({ "bands": bands })),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grading.list" => Some(handle_grading_list(state, req)),
        "grading.create" => Some(handle_grading_create(state, req)),
        "grading.update" => Some(handle_grading_update(state, req)),
        "grading.delete" => Some(handle_grading_delete(state, req)),
        "grading.replaceAll" => Some(handle_grading_replace_all(state, req)),
        "grading.validate" => Some(handle_grading_validate(state, req)),
        "grading.gradeForMarks" => Some(handle_grading_grade_for_marks(state, req)),
        "grading.reset" => Some(handle_grading_reset(state, req)),
        _ => None,
    }
}
