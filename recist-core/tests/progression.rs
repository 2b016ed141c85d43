use recist_core::progression::{absolute_increase_met, percent_increase_met};
use recist_core::{
    compare_rules, NadirMagnitudeRule, ProgressionRule, ProgressionRuleKind, Regime, StandardRule,
    Thresholds,
};

fn standard() -> StandardRule {
    StandardRule::from_thresholds(&Thresholds::default())
}

fn nadir_magnitude() -> NadirMagnitudeRule {
    NadirMagnitudeRule::from_thresholds(&Thresholds::default())
}

#[test]
fn standard_rule_requires_both_criteria() {
    let rule = standard();
    // +35mm, +175%
    assert!(rule.evaluate(55.0, 20.0));
    // +4mm, +20%: absolute fails
    assert!(!rule.evaluate(24.0, 20.0));
    // +8mm, +16%: percent fails
    assert!(!rule.evaluate(58.0, 50.0));
}

#[test]
fn boundaries_count_as_met() {
    let rule = standard();
    // exactly +20% and exactly +5mm
    assert!(rule.evaluate(30.0, 25.0));
    assert!(percent_increase_met(12.0, 10.0, 20.0));
    assert!(absolute_increase_met(15.0, 10.0, 5.0));
    assert!(!absolute_increase_met(14.9, 10.0, 5.0));
}

#[test]
fn zero_nadir_percent_criterion_needs_any_growth() {
    assert!(percent_increase_met(3.0, 0.0, 20.0));
    assert!(!percent_increase_met(0.0, 0.0, 20.0));
    // Reappearance after complete disappearance still needs +5mm.
    assert!(!standard().evaluate(3.0, 0.0));
    assert!(standard().evaluate(6.0, 0.0));
}

#[test]
fn nadir_magnitude_regimes() {
    let rule = nadir_magnitude();
    assert_eq!(rule.regime(18.0), Regime::AbsoluteOnly);
    assert_eq!(rule.regime(25.0), Regime::PercentOnly);
    assert_eq!(rule.regime(30.0), Regime::PercentOnly);

    // Below cutoff: absolute only.
    assert!(rule.evaluate(24.0, 18.0));
    assert!(!rule.evaluate(22.0, 18.0));
    // At or above cutoff: percent only.
    assert!(!rule.evaluate(33.0, 30.0));
    assert!(rule.evaluate(36.0, 30.0));
}

#[test]
fn missing_inputs_make_rules_inapplicable() {
    let rule = standard();
    assert_eq!(rule.evaluate_optional(None, Some(20.0)), None);
    assert_eq!(rule.evaluate_optional(Some(30.0), None), None);
    assert_eq!(rule.evaluate_optional(Some(30.0), Some(20.0)), Some(true));
    assert_eq!(compare_rules(None, Some(20.0), &Thresholds::default()), None);
}

#[test]
fn built_rules_follow_configured_kind() {
    let thresholds = Thresholds::default();
    assert_eq!(ProgressionRuleKind::Standard.build(&thresholds).name(), "STANDARD");
    assert_eq!(
        ProgressionRuleKind::NadirMagnitude.build(&thresholds).name(),
        "NADIR_MAGNITUDE"
    );
}

#[test]
fn comparison_flags_disagreement_under_custom_cutoff() {
    let thresholds = Thresholds {
        nadir_cutoff: 40.0,
        ..Thresholds::default()
    };

    // nadir 30 < 40: absolute-only says PD on +5mm; standard needs +20% too.
    let comparison = compare_rules(Some(35.0), Some(30.0), &thresholds).unwrap();

    assert!(!comparison.standard);
    assert!(comparison.nadir_magnitude);
    assert_eq!(comparison.regime, Regime::AbsoluteOnly);
    assert!(comparison.discordant());
}

#[test]
fn default_thresholds_agree_on_scenario_values() {
    let thresholds = Thresholds::default();
    for (sod, nadir) in [(24.0, 18.0), (33.0, 30.0), (55.0, 20.0), (26.0, 22.0)] {
        let comparison = compare_rules(Some(sod), Some(nadir), &thresholds).unwrap();
        assert!(!comparison.discordant(), "sod {sod} nadir {nadir}");
    }
}
