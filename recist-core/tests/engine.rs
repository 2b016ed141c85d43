mod common;

use common::{assert_close, lesion, scan_day, sod_timeline, TimelineBuilder};
use recist_core::{
    derive_batch, derive_subject, BaselineMethod, ConfigError, DiagnosticKind, EngineConfig,
    NadirBaseline, NonTargetStatus, ProgressionRuleKind, ResponseCategory, LESION_DIAMETER,
    SUM_OF_DIAMETERS,
};

fn config() -> EngineConfig {
    EngineConfig::new(NadirBaseline::Exclude)
}

fn has_diagnostic(result: &recist_core::SubjectResponse, kind: DiagnosticKind) -> bool {
    result.diagnostics.iter().any(|diagnostic| diagnostic.kind == kind)
}

#[test]
fn subject_without_baseline_degrades_to_not_evaluable() {
    // Only post-treatment scans: PRETREAT finds no BASE.
    let timeline = TimelineBuilder::scenario("NB-001")
        .lesion(lesion("T01", "LIVER", 30.0))
        .visit("WEEK 6", scan_day(42), &[("T01", 20.0)])
        .visit("WEEK 12", scan_day(84), &[("T01", 18.0)])
        .build();

    let result = derive_subject(&timeline, &config());

    assert_eq!(result.assessments.len(), 2);
    assert!(result
        .assessments
        .iter()
        .all(|a| a.response == ResponseCategory::NotEvaluable && a.rule == "NO_BASELINE"));
    assert_eq!(result.best_overall.response, ResponseCategory::NotEvaluable);
    assert!(result.baseline.is_none());
    assert!(result.flagged_for_review);
    assert!(has_diagnostic(&result, DiagnosticKind::MissingData));
}

#[test]
fn first_method_uses_earliest_scan_and_marks_it_baseline() {
    let timeline = TimelineBuilder::scenario("FM-001")
        .lesion(lesion("T01", "LIVER", 30.0))
        .visit("WEEK 1", scan_day(5), &[("T01", 30.0)])
        .visit("WEEK 6", scan_day(42), &[("T01", 20.0)])
        .build();
    let config = config().with_baseline_method(BaselineMethod::First);

    let result = derive_subject(&timeline, &config);

    assert_eq!(result.assessments[0].response, ResponseCategory::Baseline);
    assert_eq!(result.assessments[1].response, ResponseCategory::PartialResponse);
    assert_eq!(result.baseline.as_ref().unwrap().visit, "WEEK 1");
}

#[test]
fn missing_target_reading_makes_visit_not_evaluable() {
    let timeline = TimelineBuilder::scenario("MV-001")
        .lesion(lesion("T01", "LIVER", 30.0))
        .lesion(lesion("T02", "LUNG", 25.0))
        .visit("SCREENING", scan_day(0), &[("T01", 30.0), ("T02", 25.0)])
        .visit("WEEK 6", scan_day(42), &[("T01", 20.0)])
        .reading("WEEK 12", scan_day(84), "T01", Some(21.0), "mm")
        .reading("WEEK 12", scan_day(84), "T02", None, "mm")
        .build();

    let result = derive_subject(&timeline, &config());

    for assessment in &result.assessments[1..] {
        assert_eq!(assessment.sod, None);
        assert_eq!(assessment.response, ResponseCategory::NotEvaluable);
        assert_eq!(assessment.pchg, None);
    }
    assert_eq!(result.best_overall.response, ResponseCategory::NotEvaluable);
}

#[test]
fn mixed_units_are_reported_and_not_summed() {
    let timeline = TimelineBuilder::scenario("MU-001")
        .lesion(lesion("T01", "LIVER", 30.0))
        .lesion(lesion("T02", "LUNG", 25.0))
        .visit("SCREENING", scan_day(0), &[("T01", 30.0), ("T02", 25.0)])
        .reading("WEEK 6", scan_day(42), "T01", Some(20.0), "mm")
        .reading("WEEK 6", scan_day(42), "T02", Some(1.5), "cm")
        .build();

    let result = derive_subject(&timeline, &config());

    let week_6 = &result.assessments[1];
    assert_eq!(week_6.sod, None);
    assert_eq!(week_6.response, ResponseCategory::NotEvaluable);
    assert!(has_diagnostic(&result, DiagnosticKind::UnitMismatch));
    assert!(result.flagged_for_review);
}

#[test]
fn out_of_order_visit_dates_are_flagged_but_processed_sorted() {
    let timeline = TimelineBuilder::scenario("OO-001")
        .lesion(lesion("T01", "LIVER", 40.0))
        .visit("SCREENING", scan_day(0), &[("T01", 40.0)])
        .visit("WEEK 12", scan_day(84), &[("T01", 25.0)])
        .visit("WEEK 6", scan_day(42), &[("T01", 30.0)])
        .build();

    let result = derive_subject(&timeline, &config());

    let visits: Vec<&str> = result.assessments.iter().map(|a| a.visit.as_str()).collect();
    assert_eq!(visits, vec!["SCREENING", "WEEK 6", "WEEK 12"]);
    assert!(has_diagnostic(&result, DiagnosticKind::InvalidOrdering));
    assert!(result.flagged_for_review);
    assert_close(result.assessments[2].nadir, 25.0);
}

#[test]
fn unequivocal_non_target_progression_forces_pd() {
    let timeline = TimelineBuilder::scenario("NT-001")
        .lesion(lesion("T01", "LIVER", 40.0))
        .lesion(lesion("NT01", "BONE", 12.0))
        .visit("SCREENING", scan_day(0), &[("T01", 40.0)])
        .non_target("SCREENING", scan_day(0), NonTargetStatus::Present)
        .visit("WEEK 6", scan_day(42), &[("T01", 20.0)])
        .non_target("WEEK 6", scan_day(42), NonTargetStatus::UnequivocalPd)
        .build();

    let result = derive_subject(&timeline, &config());

    let week_6 = &result.assessments[1];
    assert!(week_6.criteria.non_target);
    assert_eq!(week_6.response, ResponseCategory::ProgressiveDisease);
    assert_eq!(week_6.pd_pattern.as_deref(), Some("NONTARGET ONLY"));
    // Non-target lesions seen at baseline are never new.
    assert!(!week_6.new_lesion);
}

#[test]
fn lesion_level_records_follow_each_target() {
    let timeline = TimelineBuilder::scenario("LD-001")
        .lesion(lesion("T01", "LIVER", 30.0))
        .lesion(lesion("T02", "LUNG", 20.0))
        .visit("SCREENING", scan_day(0), &[("T01", 30.0), ("T02", 20.0)])
        .visit("WEEK 6", scan_day(42), &[("T01", 15.0), ("T02", 22.0)])
        .visit("WEEK 12", scan_day(84), &[("T01", 18.0), ("T02", 10.0)])
        .build();

    let result = derive_subject(&timeline, &config());

    let sums: Vec<_> = result
        .parameters
        .iter()
        .filter(|record| record.paramcd == SUM_OF_DIAMETERS)
        .collect();
    assert_eq!(sums.len(), 3);
    assert!(sums[0].baseline_flag);
    assert_close(sums[1].aval, 37.0);
    assert_close(sums[1].chg, -13.0);
    assert_close(sums[2].aval, 28.0);
    assert_close(sums[2].nadir, 28.0);
    assert!(sums[2].nadir_flag);

    let t02: Vec<_> = result
        .parameters
        .iter()
        .filter(|record| {
            record.paramcd == LESION_DIAMETER && record.lesion_id.as_deref() == Some("T02")
        })
        .collect();
    assert_eq!(t02.len(), 3);
    assert_close(t02[1].pchg, 10.0);
    assert_close(t02[2].nadir, 10.0);
    assert_close(t02[2].chg_nadir, 0.0);
    assert_close(t02[2].base, 20.0);
}

#[test]
fn nadir_reported_at_each_visit_is_running_minimum() {
    let timeline = sod_timeline("NR-001", &[0, 42, 84, 126, 168], &[50.0, 40.0, 44.0, 32.0, 36.0]);

    let result = derive_subject(&timeline, &config());

    let nadirs: Vec<Option<f64>> = result.assessments.iter().map(|a| a.nadir).collect();
    assert_eq!(
        nadirs,
        vec![None, Some(40.0), Some(40.0), Some(32.0), Some(32.0)]
    );
    let flags: Vec<bool> = result.assessments.iter().map(|a| a.is_nadir).collect();
    assert_eq!(flags, vec![false, true, false, true, false]);
}

#[test]
fn batch_validates_configuration_first() {
    let mut bad = config();
    bad.confirmation.window_lo = 0;

    let err = derive_batch(&[], &bad).unwrap_err();

    assert!(matches!(err, ConfigError::NonPositiveWindow { .. }));
}

#[test]
fn batch_keeps_input_order_and_summarises() {
    let timelines = vec![
        sod_timeline("S-003", &[0, 28, 56, 84], &[45.0, 25.0, 0.0, 0.0]),
        sod_timeline("S-001", &[0, 28, 56, 84], &[38.0, 22.0, 20.0, 55.0]),
        sod_timeline("S-002", &[0, 42, 84], &[40.0, 30.0, 33.0]),
    ];
    let config = EngineConfig::new(NadirBaseline::Include)
        .with_rule(ProgressionRuleKind::NadirMagnitude);

    let output = derive_batch(&timelines, &config).unwrap();

    let order: Vec<&str> = output.subjects.iter().map(|s| s.subject_id.as_str()).collect();
    assert_eq!(order, vec!["S-003", "S-001", "S-002"]);
    assert_eq!(output.summary.subjects, 3);
    assert_eq!(output.summary.complete, 1);
    assert_eq!(output.summary.progressive, 1);
    assert_eq!(output.summary.stable, 1);
    assert_close(output.summary.objective_response_rate, 1.0 / 3.0);
    assert_close(output.summary.disease_control_rate, 2.0 / 3.0);
    assert_eq!(output.discordance.discordant, 0);
    assert_eq!(output.discordance.evaluated, 8);
}

#[test]
fn discordance_report_collects_rule_disagreements() {
    // nadir 30 then +5mm: PD only when the absolute-only regime applies.
    let timelines = vec![sod_timeline("DS-001", &[0, 42, 84], &[60.0, 30.0, 35.0])];
    let mut config = config();
    config.thresholds.nadir_cutoff = 40.0;

    let output = derive_batch(&timelines, &config).unwrap();

    let report = &output.discordance;
    assert_eq!(report.evaluated, 2);
    assert_eq!(report.discordant, 1);
    assert_eq!(report.nadir_magnitude_only, 1);
    assert_eq!(report.standard_only, 0);
    assert_eq!(report.records[0].visit, "WEEK 12");
    assert_close(report.agreement_rate(), 0.5);
    // Classification still follows the configured standard rule.
    assert_eq!(
        output.subjects[0].assessments[2].response,
        ResponseCategory::PartialResponse
    );
}
