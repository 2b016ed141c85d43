//! Fatal configuration errors and non-fatal per-subject diagnostics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Invalid engine configuration. Raised before any subject is processed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown progression rule `{0}` (expected STANDARD or NADIR_MAGNITUDE)")]
    UnknownRule(String),
    #[error("unknown baseline method `{0}` (expected PRETREAT or FIRST)")]
    UnknownBaselineMethod(String),
    #[error("unknown nadir baseline setting `{0}` (expected INCLUDE or EXCLUDE)")]
    UnknownNadirBaseline(String),
    #[error("unknown BOR policy `{0}` (expected PD_TERMINAL or BEST_CONFIRMED)")]
    UnknownBorPolicy(String),
    #[error("nadir baseline inclusion must be set explicitly (INCLUDE or EXCLUDE)")]
    MissingNadirBaseline,
    #[error("confirmation window must be positive, got [{lo}, {hi}] days")]
    NonPositiveWindow { lo: i64, hi: i64 },
    #[error("confirmation window upper bound {hi} is below lower bound {lo}")]
    InvertedWindow { lo: i64, hi: i64 },
    #[error("`{name}` must be a positive number, got {value}")]
    NonPositiveThreshold { name: &'static str, value: f64 },
    #[error("target lesion cap `{name}` must be at least 1")]
    ZeroCap { name: &'static str },
    #[error("per-organ target cap {per_organ} exceeds total target cap {total}")]
    PerOrganAboveTotal { per_organ: usize, total: usize },
}

/// Misuse of a running tracker, e.g. feeding visits out of date order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("parameter {parameter}: visit dated {date} arrived after {previous}")]
    OutOfOrder {
        parameter: String,
        previous: NaiveDate,
        date: NaiveDate,
    },
}

/// Category of a degraded or suspicious condition found in subject data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    MissingData,
    CapViolation,
    InvalidOrdering,
    UnitMismatch,
    DuplicateLesion,
}

impl DiagnosticKind {
    /// Whether the subject must be flagged for manual review.
    ///
    /// Cap violations are resolved by demotion and stay informational.
    pub fn requires_review(self) -> bool {
        !matches!(self, DiagnosticKind::CapViolation)
    }
}

/// A data-quality finding attached to a subject (and optionally a visit).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    pub subject_id: String,
    pub visit: Option<String>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(subject_id: &str, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            visit: None,
            kind,
            message: message.into(),
        }
    }

    pub fn at_visit(mut self, visit: &str) -> Self {
        self.visit = Some(visit.to_string());
        self
    }
}
