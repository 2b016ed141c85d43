//! Priority-ordered timepoint response classification.
//!
//! Rules are plain data evaluated top to bottom; the first match wins.

use crate::model::{CriterionFlags, NonTargetStatus, ResponseCategory};

/// PCHG from BASE at or below which target disease is a partial response.
pub const PARTIAL_RESPONSE_PCHG: f64 = -30.0;

const TOLERANCE: f64 = 1e-9;

/// Inputs to classification for one subject visit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimepointEvidence {
    /// Pre-treatment visit or the visit that supplied BASE.
    pub baseline: bool,
    pub sod: Option<f64>,
    /// Percent change of SOD from BASE.
    pub pchg: Option<f64>,
    pub criteria: CriterionFlags,
    pub non_target: Option<NonTargetStatus>,
}

/// One entry of the ordered rule list.
#[derive(Debug, Clone, Copy)]
pub struct ResponseRule {
    pub name: &'static str,
    pub applies: fn(&TimepointEvidence) -> bool,
    pub response: ResponseCategory,
}

fn is_baseline(evidence: &TimepointEvidence) -> bool {
    evidence.baseline
}

fn any_progression(evidence: &TimepointEvidence) -> bool {
    evidence.criteria.any()
}

fn sod_missing(evidence: &TimepointEvidence) -> bool {
    evidence.sod.is_none()
}

fn residual_non_target(evidence: &TimepointEvidence) -> bool {
    matches!(
        evidence.non_target,
        Some(NonTargetStatus::Present | NonTargetStatus::NotEvaluated)
    )
}

fn targets_gone(evidence: &TimepointEvidence) -> bool {
    evidence.sod == Some(0.0) && !residual_non_target(evidence)
}

/// Target disease gone but non-target disease remains or was not assessed.
fn targets_gone_with_residual(evidence: &TimepointEvidence) -> bool {
    evidence.sod == Some(0.0) && residual_non_target(evidence)
}

fn shrunk(evidence: &TimepointEvidence) -> bool {
    evidence
        .pchg
        .is_some_and(|pchg| pchg <= PARTIAL_RESPONSE_PCHG + TOLERANCE)
}

fn fallback(_: &TimepointEvidence) -> bool {
    true
}

/// Classification rules, highest priority first.
pub const RESPONSE_RULES: [ResponseRule; 7] = [
    ResponseRule {
        name: "BASELINE",
        applies: is_baseline,
        response: ResponseCategory::Baseline,
    },
    ResponseRule {
        name: "PROGRESSION",
        applies: any_progression,
        response: ResponseCategory::ProgressiveDisease,
    },
    ResponseRule {
        name: "SOD_MISSING",
        applies: sod_missing,
        response: ResponseCategory::NotEvaluable,
    },
    ResponseRule {
        name: "TARGETS_GONE",
        applies: targets_gone,
        response: ResponseCategory::CompleteResponse,
    },
    ResponseRule {
        name: "TARGETS_GONE_NON_TARGET_REMAINS",
        applies: targets_gone_with_residual,
        response: ResponseCategory::PartialResponse,
    },
    ResponseRule {
        name: "SHRINKAGE",
        applies: shrunk,
        response: ResponseCategory::PartialResponse,
    },
    ResponseRule {
        name: "STABLE",
        applies: fallback,
        response: ResponseCategory::StableDisease,
    },
];

/// Outcome of classification with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub response: ResponseCategory,
    pub rule: &'static str,
}

/// Classify against [`RESPONSE_RULES`].
pub fn classify(evidence: &TimepointEvidence) -> Classification {
    classify_with(&RESPONSE_RULES, evidence)
}

/// Classify against a caller-supplied rule list; SD when nothing matches.
pub fn classify_with(rules: &[ResponseRule], evidence: &TimepointEvidence) -> Classification {
    rules
        .iter()
        .find(|rule| (rule.applies)(evidence))
        .map(|rule| Classification {
            response: rule.response,
            rule: rule.name,
        })
        .unwrap_or(Classification {
            response: ResponseCategory::StableDisease,
            rule: "DEFAULT",
        })
}
