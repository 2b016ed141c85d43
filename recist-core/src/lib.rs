//! RECIST 1.1 response derivation: lesion selection, SOD change from BASE
//! and NADIR, progression rules, timepoint classification and confirmed
//! best overall response.

pub mod change;
pub mod classify;
pub mod config;
pub mod confirm;
pub mod engine;
pub mod error;
pub mod lesion;
pub mod model;
pub mod nadir;
pub mod new_lesion;
pub mod progression;
pub mod report;
pub mod rs;
pub mod visit;

pub use change::{change, change_from, derive_baseline, BaselineValue, Change, ParameterPoint};
pub use classify::{classify, Classification, TimepointEvidence, RESPONSE_RULES};
pub use config::{
    BaselineMethod, BorPolicy, ConfigOverrides, ConfirmationConfig, EngineConfig, Measurability,
    NadirBaseline, ProgressionRuleKind, TargetCaps, Thresholds,
};
pub use confirm::{resolve_bor, ResponsePoint};
pub use engine::{
    derive_batch, derive_subject, BatchOutput, ParameterRecord, SubjectResponse,
    LESION_DIAMETER, SUM_OF_DIAMETERS,
};
pub use error::{ConfigError, Diagnostic, DiagnosticKind, TrackerError};
pub use lesion::{select_baseline_lesions, BaselineSelection, ClassifiedLesion};
pub use model::{
    study_day, BestOverallResponse, ConfirmingPair, CriterionFlags, LesionClass,
    LesionObservation, LesionRecord, NonTargetAssessment, NonTargetStatus, ResponseCategory,
    StudyInput, Subject, SubjectTimeline, TimepointAssessment,
};
pub use nadir::{NadirState, NadirTracker, NadirUpdate};
pub use new_lesion::{detect_new_lesions, NewLesionAppearance, NewLesionDetector};
pub use progression::{
    compare_rules, NadirMagnitudeRule, ProgressionRule, Regime, RuleComparison, StandardRule,
};
pub use report::{DiscordanceRecord, DiscordanceReport, ResponseSummary};
pub use rs::{rs_records, RsRecord};
pub use visit::{assemble_visits, SumOfDiameters, Visit, VisitPlan};

/// Parse a study input document and derive every subject.
pub fn derive_study_str(input: &str, config: &EngineConfig) -> Result<BatchOutput, InputError> {
    let study: StudyInput = serde_json::from_str(input)?;
    Ok(derive_batch(&study.subjects, config)?)
}

/// Failure to read a study input document.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("invalid study input JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
