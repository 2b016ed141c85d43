use recist_core::classify::{classify_with, ResponseRule, PARTIAL_RESPONSE_PCHG};
use recist_core::{
    classify, CriterionFlags, NonTargetStatus, ResponseCategory, TimepointEvidence, RESPONSE_RULES,
};

fn evidence(sod: Option<f64>, pchg: Option<f64>) -> TimepointEvidence {
    TimepointEvidence {
        baseline: false,
        sod,
        pchg,
        criteria: CriterionFlags::default(),
        non_target: None,
    }
}

fn target_pd() -> CriterionFlags {
    CriterionFlags {
        target: true,
        ..CriterionFlags::default()
    }
}

#[test]
fn precedence_follows_rule_order() {
    let names: Vec<&str> = RESPONSE_RULES.iter().map(|rule| rule.name).collect();
    assert_eq!(
        names,
        vec![
            "BASELINE",
            "PROGRESSION",
            "SOD_MISSING",
            "TARGETS_GONE",
            "TARGETS_GONE_NON_TARGET_REMAINS",
            "SHRINKAGE",
            "STABLE",
        ]
    );
}

#[test]
fn ordinary_categories() {
    assert_eq!(
        classify(&evidence(Some(0.0), Some(-100.0))).response,
        ResponseCategory::CompleteResponse
    );
    assert_eq!(
        classify(&evidence(Some(28.0), Some(-30.0))).response,
        ResponseCategory::PartialResponse
    );
    assert_eq!(
        classify(&evidence(Some(29.0), Some(-29.9))).response,
        ResponseCategory::StableDisease
    );
    assert_eq!(
        classify(&evidence(Some(50.0), Some(10.0))).response,
        ResponseCategory::StableDisease
    );
    assert_eq!(PARTIAL_RESPONSE_PCHG, -30.0);
}

#[test]
fn progression_wins_over_shrinkage_and_disappearance() {
    for base in [
        evidence(Some(0.0), Some(-100.0)),
        evidence(Some(10.0), Some(-80.0)),
        evidence(None, None),
    ] {
        let with_pd = TimepointEvidence {
            criteria: target_pd(),
            ..base
        };
        let classification = classify(&with_pd);
        assert_eq!(classification.response, ResponseCategory::ProgressiveDisease);
        assert_eq!(classification.rule, "PROGRESSION");
    }
}

#[test]
fn missing_sod_is_not_evaluable() {
    let classification = classify(&evidence(None, None));
    assert_eq!(classification.response, ResponseCategory::NotEvaluable);
    assert_eq!(classification.rule, "SOD_MISSING");
}

#[test]
fn baseline_visits_are_baseline_even_with_flags() {
    let at_baseline = TimepointEvidence {
        baseline: true,
        criteria: target_pd(),
        ..evidence(Some(40.0), None)
    };
    assert_eq!(classify(&at_baseline).response, ResponseCategory::Baseline);
}

#[test]
fn residual_non_target_disease_caps_response_at_partial() {
    for status in [NonTargetStatus::Present, NonTargetStatus::NotEvaluated] {
        let residual = TimepointEvidence {
            non_target: Some(status),
            ..evidence(Some(0.0), Some(-100.0))
        };
        assert_eq!(
            classify(&residual).response,
            ResponseCategory::PartialResponse,
            "{status:?}"
        );
    }
    let cleared = TimepointEvidence {
        non_target: Some(NonTargetStatus::Absent),
        ..evidence(Some(0.0), Some(-100.0))
    };
    assert_eq!(classify(&cleared).response, ResponseCategory::CompleteResponse);
}

#[test]
fn custom_rule_lists_are_supported() {
    fn always(_: &TimepointEvidence) -> bool {
        true
    }
    let rules = [ResponseRule {
        name: "ALWAYS_NE",
        applies: always,
        response: ResponseCategory::NotEvaluable,
    }];

    let classification = classify_with(&rules, &evidence(Some(10.0), Some(-50.0)));
    assert_eq!(classification.rule, "ALWAYS_NE");

    let fallback = classify_with(&[], &evidence(Some(10.0), Some(-50.0)));
    assert_eq!(fallback.response, ResponseCategory::StableDisease);
    assert_eq!(fallback.rule, "DEFAULT");
}

#[test]
fn pd_pattern_tags() {
    let all = CriterionFlags {
        target: true,
        new_lesion: true,
        non_target: true,
    };
    assert_eq!(all.pattern().as_deref(), Some("TARGET+NEW+NONTARGET"));
    let non_target_only = CriterionFlags {
        non_target: true,
        ..CriterionFlags::default()
    };
    assert_eq!(non_target_only.pattern().as_deref(), Some("NONTARGET ONLY"));
    assert_eq!(CriterionFlags::default().pattern(), None);
}
