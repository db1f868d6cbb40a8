mod test_support;

use serde_json::json;
use test_support::{band_id_by_label, error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn lookup_is_inclusive_on_both_band_edges() {
    let workspace = temp_dir("classora-lookup");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grading.list",
        json!({ "ownerId": "t-lookup" }),
    );

    for (i, (marks, want)) in [(32, "F"), (33, "D"), (100, "A+"), (0, "F"), (79, "A")]
        .iter()
        .enumerate()
    {
        let found = request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            "grading.gradeForMarks",
            json!({ "ownerId": "t-lookup", "marks": marks }),
        );
        assert_eq!(
            found
                .get("band")
                .and_then(|b| b.get("label"))
                .and_then(|v| v.as_str()),
            Some(*want),
            "marks {}",
            marks
        );
    }

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn out_of_domain_marks_are_a_hard_failure_not_a_miss() {
    let workspace = temp_dir("classora-lookup-range");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grading.list",
        json!({ "ownerId": "t-range" }),
    );

    for (i, marks) in [-1, 101].iter().enumerate() {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("r{}", i),
            "grading.gradeForMarks",
            json!({ "ownerId": "t-range", "marks": marks }),
        );
        assert_eq!(error_code(&resp), "marks_out_of_range", "marks {}", marks);
    }

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn a_gap_in_an_invalid_system_is_a_plain_miss() {
    let workspace = temp_dir("classora-lookup-gap");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grading.list",
        json!({ "ownerId": "t-gap" }),
    );
    let d_id = band_id_by_label(listed.get("bands").expect("bands"), "D");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grading.update",
        json!({
            "ownerId": "t-gap",
            "bandId": d_id,
            "label": "D",
            "minMarks": 34,
            "maxMarks": 39
        }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "grading.gradeForMarks",
        json!({ "ownerId": "t-gap", "marks": 33 }),
    );
    assert_eq!(error_code(&resp), "not_found");

    let _ = std::fs::remove_dir_all(workspace);
}
