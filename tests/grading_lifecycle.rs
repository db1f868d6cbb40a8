mod test_support;

use serde_json::json;
use test_support::{band_id_by_label, error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn create_update_delete_with_overlap_rejection() {
    let workspace = temp_dir("classora-lifecycle");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Single creates do not seed; this owner starts from nothing.
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grading.create",
        json!({
            "ownerId": "t-life",
            "label": "pass",
            "minMarks": 50,
            "maxMarks": 100
        }),
    );
    let band = created.get("band").expect("band");
    assert_eq!(band.get("label").and_then(|v| v.as_str()), Some("PASS"));
    assert_eq!(band.get("status").and_then(|v| v.as_str()), Some("PASS"));
    assert_eq!(band.get("order").and_then(|v| v.as_i64()), Some(1));
    assert!(band.get("updatedAt").and_then(|v| v.as_str()).is_some());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grading.create",
        json!({
            "ownerId": "t-life",
            "label": "fail",
            "minMarks": 0,
            "maxMarks": 49,
            "status": "FAIL"
        }),
    );

    // Overlapping insert is refused and names the colliding band.
    let conflict = request(
        &mut stdin,
        &mut reader,
        "4",
        "grading.create",
        json!({
            "ownerId": "t-life",
            "label": "X",
            "minMarks": 45,
            "maxMarks": 55
        }),
    );
    assert_eq!(error_code(&conflict), "overlap_conflict");
    let details = conflict
        .get("error")
        .and_then(|e| e.get("details"))
        .expect("conflict details");
    assert_eq!(details.get("label").and_then(|v| v.as_str()), Some("PASS"));
    assert_eq!(details.get("minMarks").and_then(|v| v.as_f64()), Some(50.0));

    // Missing fields are flagged before any overlap scan.
    let missing = request(
        &mut stdin,
        &mut reader,
        "5",
        "grading.create",
        json!({ "ownerId": "t-life", "label": "Y", "minMarks": 0 }),
    );
    assert_eq!(error_code(&missing), "bad_params");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "grading.list",
        json!({ "ownerId": "t-life" }),
    );
    let bands = listed.get("bands").expect("bands");
    assert_eq!(bands.as_array().map(|v| v.len()), Some(2));
    let fail_id = band_id_by_label(bands, "FAIL");

    // An update may move within its own old range; status sticks unless sent.
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "grading.update",
        json!({
            "ownerId": "t-life",
            "bandId": fail_id,
            "label": "FAIL",
            "minMarks": 0,
            "maxMarks": 40
        }),
    );
    let band = updated.get("band").expect("band");
    assert_eq!(band.get("maxMarks").and_then(|v| v.as_f64()), Some(40.0));
    assert_eq!(band.get("status").and_then(|v| v.as_str()), Some("FAIL"));

    // But it may not move onto a neighbour.
    let clash = request(
        &mut stdin,
        &mut reader,
        "8",
        "grading.update",
        json!({
            "ownerId": "t-life",
            "bandId": fail_id,
            "label": "FAIL",
            "minMarks": 0,
            "maxMarks": 60
        }),
    );
    assert_eq!(error_code(&clash), "overlap_conflict");

    let gone = request(
        &mut stdin,
        &mut reader,
        "9",
        "grading.update",
        json!({
            "ownerId": "t-life",
            "bandId": "no-such-band",
            "label": "Z",
            "minMarks": 41,
            "maxMarks": 49
        }),
    );
    assert_eq!(error_code(&gone), "not_found");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "grading.delete",
        json!({ "ownerId": "t-life", "bandId": fail_id }),
    );
    let again = request(
        &mut stdin,
        &mut reader,
        "11",
        "grading.delete",
        json!({ "ownerId": "t-life", "bandId": fail_id }),
    );
    assert_eq!(error_code(&again), "not_found");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn requests_without_a_workspace_are_refused() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "grading.list",
        json!({ "ownerId": "t" }),
    );
    assert_eq!(error_code(&resp), "no_workspace");
}
