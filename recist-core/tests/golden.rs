use std::fs;

use recist_core::{derive_study_str, BatchOutput, EngineConfig, NadirBaseline};
use serde_json::{json, Value};

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn study_matches_golden_projection() {
    let input = fs::read_to_string(fixture_path("study_input.json"))
        .expect("cannot read study input fixture");

    let output = derive_study_str(&input, &EngineConfig::new(NadirBaseline::Include))
        .expect("derivation failed");
    let actual = project(&output);

    let expected = fs::read_to_string(fixture_path("expected_responses.json"))
        .expect("cannot read golden projection");
    let expected: Value = serde_json::from_str(&expected).expect("golden projection is not JSON");

    assert_eq!(actual, expected);
}

#[test]
fn malformed_input_is_an_error() {
    let err = derive_study_str("{\"subjects\": 3}", &EngineConfig::new(NadirBaseline::Include))
        .unwrap_err();
    assert!(err.to_string().contains("invalid study input JSON"));
}

/// Keep the stable, reviewable part of the output.
fn project(output: &BatchOutput) -> Value {
    let subjects: Vec<Value> = output
        .subjects
        .iter()
        .map(|subject| {
            json!({
                "subject_id": subject.subject_id,
                "responses": subject
                    .assessments
                    .iter()
                    .map(|assessment| assessment.response.code())
                    .collect::<Vec<_>>(),
                "bor": subject.best_overall.response.code(),
                "confirmed": subject.best_overall.confirmed,
                "flagged_for_review": subject.flagged_for_review,
            })
        })
        .collect();

    json!({
        "subjects": subjects,
        "summary": serde_json::to_value(&output.summary).expect("summary serializes"),
    })
}
