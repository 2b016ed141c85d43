//! Grouping of raw lesion observations into date-ordered visits.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::error::{Diagnostic, DiagnosticKind};
use crate::model::{NonTargetStatus, Subject, SubjectTimeline};

#[derive(Debug, Clone, PartialEq)]
pub struct LesionReading {
    pub value: Option<f64>,
    pub unit: Option<String>,
}

/// All readings sharing one (date, visit label).
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub label: String,
    pub date: NaiveDate,
    pub study_day: i64,
    pub lesions: BTreeMap<String, LesionReading>,
    pub non_target: Option<NonTargetStatus>,
}

/// Outcome of summing target lesion diameters at a visit.
#[derive(Debug, Clone, PartialEq)]
pub enum SumOfDiameters {
    Measured { value: f64, unit: Option<String> },
    /// No target lesions, or at least one without a usable value.
    Incomplete,
    MixedUnits(Vec<String>),
}

impl SumOfDiameters {
    pub fn value(&self) -> Option<f64> {
        match self {
            SumOfDiameters::Measured { value, .. } => Some(*value),
            _ => None,
        }
    }
}

impl Visit {
    pub fn lesion_ids(&self) -> impl Iterator<Item = &str> {
        self.lesions.keys().map(String::as_str)
    }

    pub fn value_of(&self, lesion_id: &str) -> Option<f64> {
        self.lesions.get(lesion_id).and_then(|reading| reading.value)
    }

    pub fn sum_of_diameters(&self, targets: &[&str]) -> SumOfDiameters {
        if targets.is_empty() {
            return SumOfDiameters::Incomplete;
        }

        let mut total = 0.0;
        let mut units = BTreeSet::new();
        for target in targets {
            let Some(reading) = self.lesions.get(*target) else {
                return SumOfDiameters::Incomplete;
            };
            let Some(value) = reading.value else {
                return SumOfDiameters::Incomplete;
            };
            total += value;
            if let Some(unit) = &reading.unit {
                units.insert(unit.trim().to_ascii_lowercase());
            }
        }

        if units.len() > 1 {
            return SumOfDiameters::MixedUnits(units.into_iter().collect());
        }
        SumOfDiameters::Measured {
            value: total,
            unit: units.into_iter().next(),
        }
    }
}

/// Visits in date order plus any ordering problems found in the raw input.
#[derive(Debug, Clone, Default)]
pub struct VisitPlan {
    pub visits: Vec<Visit>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Group observations and non-target assessments by (date, visit label).
///
/// Visits come out sorted by date, then label. The input is expected to list
/// visits with strictly increasing dates; any departure is reported as
/// `InvalidOrdering` but does not stop assembly.
pub fn assemble_visits(timeline: &SubjectTimeline) -> VisitPlan {
    let subject = &timeline.subject;
    let mut diagnostics = Vec::new();
    let mut grouped: BTreeMap<(NaiveDate, String), Visit> = BTreeMap::new();

    for observation in &timeline.observations {
        let visit = open_visit(&mut grouped, subject, &observation.visit, observation.date);
        let reading = LesionReading {
            value: observation.value,
            unit: observation.unit.clone(),
        };
        if visit
            .lesions
            .insert(observation.lesion_id.clone(), reading)
            .is_some()
        {
            diagnostics.push(
                Diagnostic::new(
                    &subject.id,
                    DiagnosticKind::DuplicateLesion,
                    format!(
                        "lesion {} measured twice at one visit; last reading kept",
                        observation.lesion_id
                    ),
                )
                .at_visit(&observation.visit),
            );
        }
    }

    for assessment in &timeline.non_target {
        let visit = open_visit(&mut grouped, subject, &assessment.visit, assessment.date);
        // Most severe status wins.
        visit.non_target = Some(match visit.non_target {
            Some(existing) => existing.max(assessment.status),
            None => assessment.status,
        });
    }

    let measured = first_appearances(
        timeline
            .observations
            .iter()
            .map(|observation| (observation.visit.as_str(), observation.date)),
    );
    let assessed = first_appearances(
        timeline
            .non_target
            .iter()
            .map(|assessment| (assessment.visit.as_str(), assessment.date)),
    );
    check_ordering(&subject.id, &measured, &mut diagnostics);
    check_ordering(&subject.id, &assessed, &mut diagnostics);

    VisitPlan {
        visits: grouped.into_values().collect(),
        diagnostics,
    }
}

fn open_visit<'g>(
    grouped: &'g mut BTreeMap<(NaiveDate, String), Visit>,
    subject: &Subject,
    label: &str,
    date: NaiveDate,
) -> &'g mut Visit {
    grouped
        .entry((date, label.to_string()))
        .or_insert_with(|| Visit {
            label: label.to_string(),
            date,
            study_day: subject.study_day(date),
            lesions: BTreeMap::new(),
            non_target: None,
        })
}

/// Distinct (label, date) pairs in the order the input first mentions them.
fn first_appearances<'a>(
    records: impl Iterator<Item = (&'a str, NaiveDate)>,
) -> Vec<(&'a str, NaiveDate)> {
    let mut seen = BTreeSet::new();
    records.filter(|record| seen.insert(*record)).collect()
}

fn check_ordering(
    subject_id: &str,
    appearance: &[(&str, NaiveDate)],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut dates_by_label: HashMap<&str, NaiveDate> = HashMap::new();
    for (label, date) in appearance {
        if let Some(first) = dates_by_label.insert(*label, *date) {
            diagnostics.push(
                Diagnostic::new(
                    subject_id,
                    DiagnosticKind::InvalidOrdering,
                    format!("visit {label} recorded on both {first} and {date}"),
                )
                .at_visit(label),
            );
        }
    }

    for pair in appearance.windows(2) {
        let (previous_label, previous) = &pair[0];
        let (label, date) = &pair[1];
        if date <= previous {
            diagnostics.push(
                Diagnostic::new(
                    subject_id,
                    DiagnosticKind::InvalidOrdering,
                    format!(
                        "visit {label} ({date}) does not follow {previous_label} ({previous}) in date order"
                    ),
                )
                .at_visit(label),
            );
        }
    }
}
