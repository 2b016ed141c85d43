//! Study-level aggregates over derived subjects.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::SubjectResponse;
use crate::model::ResponseCategory;
use crate::progression::Regime;

/// A visit where the standard and nadir-magnitude rules disagree on PD.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscordanceRecord {
    pub subject_id: String,
    pub visit: String,
    pub date: NaiveDate,
    pub sod: f64,
    pub nadir: f64,
    /// Criterion the nadir-magnitude rule applied at this nadir.
    pub regime: Regime,
    pub standard: bool,
    pub nadir_magnitude: bool,
}

/// Side-by-side comparison of both progression rules across a study.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiscordanceReport {
    /// Visits with both SOD and nadir present.
    pub evaluated: usize,
    pub discordant: usize,
    /// PD under the standard rule only.
    pub standard_only: usize,
    /// PD under the nadir-magnitude rule only.
    pub nadir_magnitude_only: usize,
    pub records: Vec<DiscordanceRecord>,
}

impl DiscordanceReport {
    pub fn from_subjects(subjects: &[SubjectResponse]) -> Self {
        let mut report = Self::default();
        for subject in subjects {
            report.evaluated += subject.rule_comparisons;
            for record in &subject.discordance {
                report.push(record.clone());
            }
        }
        report
    }

    fn push(&mut self, record: DiscordanceRecord) {
        self.discordant += 1;
        if record.standard {
            self.standard_only += 1;
        } else {
            self.nadir_magnitude_only += 1;
        }
        self.records.push(record);
    }

    /// Share of evaluated visits on which the rules agree.
    pub fn agreement_rate(&self) -> Option<f64> {
        (self.evaluated > 0)
            .then(|| (self.evaluated - self.discordant) as f64 / self.evaluated as f64)
    }
}

/// BOR counts with objective response and disease control rates.
///
/// Rates use subjects with an evaluable BOR as the denominator; NE subjects
/// are counted but excluded from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseSummary {
    pub subjects: usize,
    pub complete: usize,
    pub partial: usize,
    pub stable: usize,
    pub progressive: usize,
    pub not_evaluable: usize,
    pub flagged_for_review: usize,
    /// (CR + PR) / evaluable.
    pub objective_response_rate: Option<f64>,
    /// (CR + PR + SD) / evaluable.
    pub disease_control_rate: Option<f64>,
}

impl ResponseSummary {
    pub fn from_subjects(subjects: &[SubjectResponse]) -> Self {
        let mut summary = Self {
            subjects: subjects.len(),
            ..Self::default()
        };
        for subject in subjects {
            match subject.best_overall.response {
                ResponseCategory::CompleteResponse => summary.complete += 1,
                ResponseCategory::PartialResponse => summary.partial += 1,
                ResponseCategory::StableDisease => summary.stable += 1,
                ResponseCategory::ProgressiveDisease => summary.progressive += 1,
                ResponseCategory::NotEvaluable | ResponseCategory::Baseline => {
                    summary.not_evaluable += 1
                }
            }
            if subject.flagged_for_review {
                summary.flagged_for_review += 1;
            }
        }

        let evaluable = summary.evaluable();
        if evaluable > 0 {
            let denominator = evaluable as f64;
            summary.objective_response_rate =
                Some((summary.complete + summary.partial) as f64 / denominator);
            summary.disease_control_rate =
                Some((summary.complete + summary.partial + summary.stable) as f64 / denominator);
        }
        summary
    }

    pub fn evaluable(&self) -> usize {
        self.complete + self.partial + self.stable + self.progressive
    }
}
