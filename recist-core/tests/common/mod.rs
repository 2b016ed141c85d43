#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use recist_core::{
    LesionClass, LesionObservation, LesionRecord, NonTargetAssessment, NonTargetStatus, Subject,
    SubjectTimeline,
};

pub fn date(text: &str) -> NaiveDate {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").expect("valid fixture date")
}

/// Baseline scan date used by scenario timelines; treatment starts the next day.
pub fn scan_day(offset: i64) -> NaiveDate {
    date("2024-01-10") + Duration::days(offset)
}

pub fn lesion(id: &str, site: &str, diameter: f64) -> LesionRecord {
    LesionRecord {
        id: id.to_string(),
        site: site.to_string(),
        laterality: None,
        nodal: false,
        baseline_diameter: Some(diameter),
        designation: None,
    }
}

pub fn node(id: &str, site: &str, diameter: f64) -> LesionRecord {
    LesionRecord {
        nodal: true,
        ..lesion(id, site, diameter)
    }
}

pub fn designated(record: LesionRecord, class: LesionClass) -> LesionRecord {
    LesionRecord {
        designation: Some(class),
        ..record
    }
}

/// Builds one subject timeline visit by visit.
pub struct TimelineBuilder {
    timeline: SubjectTimeline,
}

impl TimelineBuilder {
    pub fn new(subject_id: &str, reference_date: NaiveDate) -> Self {
        Self {
            timeline: SubjectTimeline {
                subject: Subject {
                    id: subject_id.to_string(),
                    study_id: Some("STUDY01".to_string()),
                    reference_date,
                },
                lesions: Vec::new(),
                observations: Vec::new(),
                non_target: Vec::new(),
            },
        }
    }

    /// Reference date one day after `scan_day(0)`, so offset 0 is pre-treatment.
    pub fn scenario(subject_id: &str) -> Self {
        Self::new(subject_id, scan_day(1))
    }

    pub fn lesion(mut self, record: LesionRecord) -> Self {
        self.timeline.lesions.push(record);
        self
    }

    pub fn visit(mut self, label: &str, date: NaiveDate, readings: &[(&str, f64)]) -> Self {
        for (lesion_id, value) in readings {
            self.timeline.observations.push(LesionObservation {
                lesion_id: lesion_id.to_string(),
                visit: label.to_string(),
                date,
                value: Some(*value),
                unit: Some("mm".to_string()),
            });
        }
        self
    }

    pub fn reading(
        mut self,
        label: &str,
        date: NaiveDate,
        lesion_id: &str,
        value: Option<f64>,
        unit: &str,
    ) -> Self {
        self.timeline.observations.push(LesionObservation {
            lesion_id: lesion_id.to_string(),
            visit: label.to_string(),
            date,
            value,
            unit: Some(unit.to_string()),
        });
        self
    }

    pub fn non_target(mut self, label: &str, date: NaiveDate, status: NonTargetStatus) -> Self {
        self.timeline.non_target.push(NonTargetAssessment {
            visit: label.to_string(),
            date,
            status,
        });
        self
    }

    pub fn build(self) -> SubjectTimeline {
        self.timeline
    }
}

/// Single-target-lesion timeline whose SOD follows `sods` at the given scan offsets.
pub fn sod_timeline(subject_id: &str, offsets: &[i64], sods: &[f64]) -> SubjectTimeline {
    let mut builder = TimelineBuilder::scenario(subject_id).lesion(lesion("T01", "LIVER", sods[0]));
    for (index, (offset, sod)) in offsets.iter().zip(sods).enumerate() {
        let label = if index == 0 {
            "SCREENING".to_string()
        } else {
            format!("WEEK {}", offset / 7)
        };
        builder = builder.visit(&label, scan_day(*offset), &[("T01", *sod)]);
    }
    builder.build()
}

pub fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("value present");
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
