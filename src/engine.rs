use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

use crate::store::BandStore;

pub const MARKS_FLOOR: f64 = 0.0;
pub const MARKS_CEILING: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PassStatus {
    Pass,
    Fail,
}

impl PassStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" => Some(Self::Pass),
            "FAIL" => Some(Self::Fail),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub id: String,
    #[serde(skip_serializing)]
    pub owner: String,
    pub label: String,
    pub min_marks: f64,
    pub max_marks: f64,
    pub status: PassStatus,
    #[serde(rename = "order")]
    pub sort_order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Fields ready for the store: label already trimmed/upper-cased, marks
/// present, status resolved.
#[derive(Debug, Clone)]
pub struct BandDraft {
    pub label: String,
    pub min_marks: f64,
    pub max_marks: f64,
    pub status: PassStatus,
    pub sort_order: i64,
}

/// Raw caller-supplied fields. Absent values are reported as validation
/// errors by the operation that consumes the input.
#[derive(Debug, Clone, Default)]
pub struct BandInput {
    pub label: Option<String>,
    pub min_marks: Option<f64>,
    pub max_marks: Option<f64>,
    pub status: Option<PassStatus>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),
    #[error("{}", .messages.join("; "))]
    BulkValidation { messages: Vec<String> },
    #[error(
        "range {min_marks}-{max_marks} overlaps band {} ({}-{})",
        .band.label, .band.min_marks, .band.max_marks
    )]
    Overlap {
        min_marks: f64,
        max_marks: f64,
        band: GradeBand,
    },
    #[error("grade band not found")]
    NotFound,
    #[error("marks must be within 0-100, got {0}")]
    MarksOutOfRange(f64),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

pub const DEFAULT_BANDS: [(&str, f64, f64, PassStatus); 7] = [
    ("A+", 80.0, 100.0, PassStatus::Pass),
    ("A", 70.0, 79.0, PassStatus::Pass),
    ("B+", 60.0, 69.0, PassStatus::Pass),
    ("B", 50.0, 59.0, PassStatus::Pass),
    ("C", 40.0, 49.0, PassStatus::Pass),
    ("D", 33.0, 39.0, PassStatus::Pass),
    ("F", 0.0, 32.0, PassStatus::Fail),
];

fn default_drafts() -> Vec<BandDraft> {
    DEFAULT_BANDS
        .iter()
        .enumerate()
        .map(|(i, (label, min, max, status))| BandDraft {
            label: (*label).to_string(),
            min_marks: *min,
            max_marks: *max,
            status: *status,
            sort_order: i as i64 + 1,
        })
        .collect()
}

fn sort_by_min(bands: &mut [GradeBand]) {
    bands.sort_by(|a, b| {
        a.min_marks
            .partial_cmp(&b.min_marks)
            .unwrap_or(Ordering::Equal)
    });
}

/// First band whose closed interval intersects [min, max], skipping
/// `exclude_id` (the band being edited, when updating in place).
/// Exactly adjacent ranges (max 49 next to min 50) do not intersect.
pub fn find_overlap<'a>(
    bands: &'a [GradeBand],
    min: f64,
    max: f64,
    exclude_id: Option<&str>,
) -> Option<&'a GradeBand> {
    bands.iter().find(|b| {
        if exclude_id == Some(b.id.as_str()) {
            return false;
        }
        let starts_inside = min >= b.min_marks && min <= b.max_marks;
        let ends_inside = max >= b.min_marks && max <= b.max_marks;
        let contains = min <= b.min_marks && max >= b.max_marks;
        starts_inside || ends_inside || contains
    })
}

/// Structural verdict over a full band set: must start at 0, end at 100,
/// and be gapless between neighbours sorted by minMarks. The adjacency
/// message does not distinguish a positive gap from an overlap that got
/// past per-entry checks.
pub fn validate_bands(mut bands: Vec<GradeBand>) -> SystemReport {
    if bands.is_empty() {
        return SystemReport {
            valid: false,
            errors: vec!["No grading system defined".to_string()],
        };
    }

    sort_by_min(&mut bands);
    let mut errors = Vec::new();

    if bands[0].min_marks != MARKS_FLOOR {
        errors.push("Grading system should start from 0".to_string());
    }
    if bands[bands.len() - 1].max_marks != MARKS_CEILING {
        errors.push("Grading system should end at 100".to_string());
    }
    for pair in bands.windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        if lower.max_marks + 1.0 != upper.min_marks {
            errors.push(format!(
                "Gap between {} (ends at {}) and {} (starts at {})",
                lower.label, lower.max_marks, upper.label, upper.min_marks
            ));
        }
    }

    SystemReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Band containing `marks`, if any. Callers must range-check first; this
/// scan itself does not require the set to be structurally valid.
pub fn band_for_marks(bands: &[GradeBand], marks: f64) -> Option<&GradeBand> {
    bands
        .iter()
        .find(|b| marks >= b.min_marks && marks <= b.max_marks)
}

fn normalized_label(raw: Option<&str>) -> Result<String, String> {
    let Some(label) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Err("label is required".to_string());
    };
    if label.chars().count() > 10 {
        return Err("label must be at most 10 characters".to_string());
    }
    Ok(label.to_uppercase())
}

pub fn check_overlap(
    store: &dyn BandStore,
    owner: &str,
    min: f64,
    max: f64,
    exclude_id: Option<&str>,
) -> Result<Option<GradeBand>, EngineError> {
    let bands = store.list(owner)?;
    Ok(find_overlap(&bands, min, max, exclude_id).cloned())
}

pub fn validate_system(store: &dyn BandStore, owner: &str) -> Result<SystemReport, EngineError> {
    Ok(validate_bands(store.list(owner)?))
}

pub fn grade_for_marks(
    store: &dyn BandStore,
    owner: &str,
    marks: f64,
) -> Result<Option<GradeBand>, EngineError> {
    if !(MARKS_FLOOR..=MARKS_CEILING).contains(&marks) {
        return Err(EngineError::MarksOutOfRange(marks));
    }
    let bands = store.list(owner)?;
    Ok(band_for_marks(&bands, marks).cloned())
}

/// Seeds the 7-band default system for owners with no bands. A no-op for
/// owners that already have at least one band.
pub fn ensure_default(store: &dyn BandStore, owner: &str) -> Result<(), EngineError> {
    if store.count(owner)? > 0 {
        return Ok(());
    }
    store.insert_many(owner, default_drafts())?;
    tracing::info!(owner, "seeded default grading system");
    Ok(())
}

pub fn reset_to_default(
    store: &dyn BandStore,
    owner: &str,
) -> Result<Vec<GradeBand>, EngineError> {
    let removed = store.delete_all(owner)?;
    let bands = store.insert_many(owner, default_drafts())?;
    tracing::info!(owner, removed, "reset grading system to defaults");
    Ok(bands)
}

pub fn create_band(
    store: &dyn BandStore,
    owner: &str,
    input: &BandInput,
) -> Result<GradeBand, EngineError> {
    let label = normalized_label(input.label.as_deref()).map_err(EngineError::Validation)?;
    let min = input
        .min_marks
        .ok_or_else(|| EngineError::Validation("minMarks is required".to_string()))?;
    let max = input
        .max_marks
        .ok_or_else(|| EngineError::Validation("maxMarks is required".to_string()))?;
    if min > max {
        return Err(EngineError::Validation(
            "minMarks must not exceed maxMarks".to_string(),
        ));
    }

    let bands = store.list(owner)?;
    if let Some(hit) = find_overlap(&bands, min, max, None) {
        return Err(EngineError::Overlap {
            min_marks: min,
            max_marks: max,
            band: hit.clone(),
        });
    }

    let next_order = bands.iter().map(|b| b.sort_order).max().unwrap_or(0) + 1;
    let band = store.insert(
        owner,
        BandDraft {
            label,
            min_marks: min,
            max_marks: max,
            status: input.status.unwrap_or(PassStatus::Pass),
            sort_order: next_order,
        },
    )?;
    Ok(band)
}

pub fn update_band(
    store: &dyn BandStore,
    owner: &str,
    id: &str,
    input: &BandInput,
) -> Result<GradeBand, EngineError> {
    let existing = store.get(owner, id)?.ok_or(EngineError::NotFound)?;

    let label = normalized_label(input.label.as_deref()).map_err(EngineError::Validation)?;
    let min = input
        .min_marks
        .ok_or_else(|| EngineError::Validation("minMarks is required".to_string()))?;
    let max = input
        .max_marks
        .ok_or_else(|| EngineError::Validation("maxMarks is required".to_string()))?;
    if min > max {
        return Err(EngineError::Validation(
            "minMarks must not exceed maxMarks".to_string(),
        ));
    }

    if let Some(hit) = check_overlap(store, owner, min, max, Some(id))? {
        return Err(EngineError::Overlap {
            min_marks: min,
            max_marks: max,
            band: hit,
        });
    }

    let draft = BandDraft {
        label,
        min_marks: min,
        max_marks: max,
        // Omitted status keeps the stored value rather than resetting it.
        status: input.status.unwrap_or(existing.status),
        sort_order: existing.sort_order,
    };
    store.update(owner, id, draft)?.ok_or(EngineError::NotFound)
}

pub fn delete_band(store: &dyn BandStore, owner: &str, id: &str) -> Result<(), EngineError> {
    if !store.delete(owner, id)? {
        return Err(EngineError::NotFound);
    }
    Ok(())
}

/// Replaces an owner's whole system with an ordered batch. Every entry is
/// checked before anything is written; one bad entry rejects the batch with
/// all entry errors reported by 1-based position. The new set is NOT run
/// through the structural validator here; callers wanting a completeness
/// verdict ask for one separately.
pub fn replace_all(
    store: &dyn BandStore,
    owner: &str,
    entries: &[BandInput],
) -> Result<Vec<GradeBand>, EngineError> {
    let mut messages: Vec<String> = Vec::new();
    let mut drafts: Vec<BandDraft> = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let pos = i + 1;
        let label = match normalized_label(entry.label.as_deref()) {
            Ok(v) => Some(v),
            Err(msg) => {
                messages.push(format!("entry {}: {}", pos, msg));
                None
            }
        };
        if entry.min_marks.is_none() {
            messages.push(format!("entry {}: minMarks is required", pos));
        }
        if entry.max_marks.is_none() {
            messages.push(format!("entry {}: maxMarks is required", pos));
        }
        if let (Some(min), Some(max)) = (entry.min_marks, entry.max_marks) {
            if min > max {
                messages.push(format!("entry {}: minMarks must not exceed maxMarks", pos));
            }
        }

        if let (Some(label), Some(min), Some(max)) = (label, entry.min_marks, entry.max_marks) {
            if min <= max {
                drafts.push(BandDraft {
                    label,
                    min_marks: min,
                    max_marks: max,
                    status: entry.status.unwrap_or(PassStatus::Pass),
                    sort_order: pos as i64,
                });
            }
        }
    }

    if !messages.is_empty() {
        return Err(EngineError::BulkValidation { messages });
    }

    store.delete_all(owner)?;
    Ok(store.insert_many(owner, drafts)?)
}
