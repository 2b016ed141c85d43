//! Input records, per-visit assessments and subject-level results.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Study day relative to a reference date, without a day 0.
///
/// Dates on or after the reference count from 1; earlier dates are negative.
pub fn study_day(date: NaiveDate, reference: NaiveDate) -> i64 {
    let delta = date.signed_duration_since(reference).num_days();
    if delta >= 0 {
        delta + 1
    } else {
        delta
    }
}

/// A trial subject anchored to treatment start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    #[serde(default)]
    pub study_id: Option<String>,
    /// Treatment start; study day 1.
    pub reference_date: NaiveDate,
}

impl Subject {
    pub fn study_day(&self, date: NaiveDate) -> i64 {
        study_day(date, self.reference_date)
    }
}

/// Role of a lesion in response assessment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LesionClass {
    #[serde(rename = "TARGET")]
    Target,
    #[serde(rename = "NON-TARGET")]
    NonTarget,
    #[serde(rename = "NEW")]
    New,
}

impl LesionClass {
    pub fn code(self) -> &'static str {
        match self {
            LesionClass::Target => "TARGET",
            LesionClass::NonTarget => "NON-TARGET",
            LesionClass::New => "NEW",
        }
    }
}

/// Baseline lesion inventory entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LesionRecord {
    pub id: String,
    /// Organ or anatomical site; the per-organ target cap groups on this.
    pub site: String,
    #[serde(default)]
    pub laterality: Option<String>,
    #[serde(default)]
    pub nodal: bool,
    /// Longest diameter (short axis for nodes) at baseline.
    #[serde(default)]
    pub baseline_diameter: Option<f64>,
    /// Designation as collected. `None` leaves the lesion eligible for TARGET.
    #[serde(default)]
    pub designation: Option<LesionClass>,
}

/// One lesion reading at one visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LesionObservation {
    pub lesion_id: String,
    pub visit: String,
    pub date: NaiveDate,
    /// Diameter; `None` records presence without a usable measurement.
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Overall state of non-target disease at a visit, ordered by severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NonTargetStatus {
    Absent,
    Present,
    NotEvaluated,
    UnequivocalPd,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NonTargetAssessment {
    pub visit: String,
    pub date: NaiveDate,
    pub status: NonTargetStatus,
}

/// Everything the engine needs for one subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectTimeline {
    pub subject: Subject,
    #[serde(default)]
    pub lesions: Vec<LesionRecord>,
    #[serde(default)]
    pub observations: Vec<LesionObservation>,
    #[serde(default)]
    pub non_target: Vec<NonTargetAssessment>,
}

/// A batch of subject timelines as exchanged with collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StudyInput {
    #[serde(default)]
    pub study_id: Option<String>,
    pub subjects: Vec<SubjectTimeline>,
}

/// Timepoint and best overall response categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResponseCategory {
    #[serde(rename = "CR")]
    CompleteResponse,
    #[serde(rename = "PR")]
    PartialResponse,
    #[serde(rename = "SD")]
    StableDisease,
    #[serde(rename = "PD")]
    ProgressiveDisease,
    #[serde(rename = "NE")]
    NotEvaluable,
    #[serde(rename = "BASELINE")]
    Baseline,
}

impl ResponseCategory {
    pub fn code(self) -> &'static str {
        match self {
            ResponseCategory::CompleteResponse => "CR",
            ResponseCategory::PartialResponse => "PR",
            ResponseCategory::StableDisease => "SD",
            ResponseCategory::ProgressiveDisease => "PD",
            ResponseCategory::NotEvaluable => "NE",
            ResponseCategory::Baseline => "BASELINE",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResponseCategory::CompleteResponse => "Complete Response",
            ResponseCategory::PartialResponse => "Partial Response",
            ResponseCategory::StableDisease => "Stable Disease",
            ResponseCategory::ProgressiveDisease => "Progressive Disease",
            ResponseCategory::NotEvaluable => "Not Evaluable",
            ResponseCategory::Baseline => "Baseline",
        }
    }

    /// CR, PR, SD or PD: counts toward response-rate denominators.
    pub fn is_evaluable(self) -> bool {
        self.rank().is_some()
    }

    /// Ordinal CR > PR > SD > PD; `None` for NE and BASELINE.
    pub fn rank(self) -> Option<u8> {
        match self {
            ResponseCategory::CompleteResponse => Some(3),
            ResponseCategory::PartialResponse => Some(2),
            ResponseCategory::StableDisease => Some(1),
            ResponseCategory::ProgressiveDisease => Some(0),
            ResponseCategory::NotEvaluable | ResponseCategory::Baseline => None,
        }
    }
}

impl fmt::Display for ResponseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Independent progression criteria evaluated at a visit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CriterionFlags {
    /// Target-lesion progression from the configured rule.
    pub target: bool,
    pub new_lesion: bool,
    /// Unequivocal non-target progression.
    pub non_target: bool,
}

impl CriterionFlags {
    pub fn any(&self) -> bool {
        self.target || self.new_lesion || self.non_target
    }

    /// Descriptive tag for which criteria drove PD, e.g. `TARGET+NEW`.
    pub fn pattern(&self) -> Option<String> {
        let parts: Vec<&str> = [
            (self.target, "TARGET"),
            (self.new_lesion, "NEW"),
            (self.non_target, "NONTARGET"),
        ]
        .into_iter()
        .filter_map(|(fired, name)| fired.then_some(name))
        .collect();

        match parts.as_slice() {
            [] => None,
            [single] => Some(format!("{single} ONLY")),
            many => Some(many.join("+")),
        }
    }
}

/// Derived response record for one subject visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimepointAssessment {
    #[serde(rename = "USUBJID")]
    pub subject_id: String,
    #[serde(rename = "VISIT")]
    pub visit: String,
    #[serde(rename = "ADT")]
    pub date: NaiveDate,
    #[serde(rename = "ADY")]
    pub study_day: i64,
    #[serde(rename = "SOD")]
    pub sod: Option<f64>,
    #[serde(rename = "BASE")]
    pub base: Option<f64>,
    #[serde(rename = "NADIR")]
    pub nadir: Option<f64>,
    #[serde(rename = "NADIRDT")]
    pub nadir_date: Option<NaiveDate>,
    /// This visit holds the current nadir.
    #[serde(rename = "NADIRFL")]
    pub is_nadir: bool,
    #[serde(rename = "CHG")]
    pub chg: Option<f64>,
    #[serde(rename = "PCHG")]
    pub pchg: Option<f64>,
    #[serde(rename = "CHGNADIR")]
    pub chg_nadir: Option<f64>,
    #[serde(rename = "PCHGNADIR")]
    pub pchg_nadir: Option<f64>,
    #[serde(rename = "NEWLFL")]
    pub new_lesion: bool,
    #[serde(rename = "NEWLIDS", default)]
    pub new_lesion_ids: Vec<String>,
    #[serde(rename = "NTRGRESP")]
    pub non_target: Option<NonTargetStatus>,
    #[serde(rename = "CRITERIA")]
    pub criteria: CriterionFlags,
    #[serde(rename = "AVALC")]
    pub response: ResponseCategory,
    /// Name of the classification rule that matched.
    #[serde(rename = "RULE")]
    pub rule: String,
    #[serde(rename = "PDPATTERN")]
    pub pd_pattern: Option<String>,
}

/// The pair of visits establishing a confirmed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmingPair {
    pub response_visit: String,
    pub response_date: NaiveDate,
    pub confirming_visit: String,
    pub confirming_date: NaiveDate,
}

impl ConfirmingPair {
    pub fn days_apart(&self) -> i64 {
        self.confirming_date
            .signed_duration_since(self.response_date)
            .num_days()
    }
}

/// Subject-level best overall response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BestOverallResponse {
    pub subject_id: String,
    pub response: ResponseCategory,
    pub confirmed: bool,
    /// Visit whose timepoint response determined the BOR.
    pub determining_visit: Option<String>,
    pub determining_date: Option<NaiveDate>,
    pub confirmation: Option<ConfirmingPair>,
}

impl BestOverallResponse {
    pub fn not_evaluable(subject_id: &str) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            response: ResponseCategory::NotEvaluable,
            confirmed: false,
            determining_visit: None,
            determining_date: None,
            confirmation: None,
        }
    }
}
