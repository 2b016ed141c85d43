//! Per-subject derivation fold and the batch driver.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::change::{change_from, derive_baseline, BaselineValue, ParameterPoint};
use crate::classify::{classify, TimepointEvidence};
use crate::config::EngineConfig;
use crate::confirm::{resolve_bor, ResponsePoint};
use crate::error::{ConfigError, Diagnostic, DiagnosticKind};
use crate::lesion::{select_baseline_lesions, BaselineSelection, ClassifiedLesion};
use crate::model::{
    BestOverallResponse, CriterionFlags, NonTargetStatus, ResponseCategory, Subject,
    SubjectTimeline, TimepointAssessment,
};
use crate::nadir::NadirTracker;
use crate::new_lesion::{NewLesionAppearance, NewLesionDetector};
use crate::progression::{compare_rules, ProgressionRule};
use crate::report::{DiscordanceRecord, DiscordanceReport, ResponseSummary};
use crate::visit::{assemble_visits, SumOfDiameters, Visit};

/// Parameter code of the target-lesion sum of diameters.
pub const SUM_OF_DIAMETERS: &str = "SUMDIAM";
/// Parameter code of a single target lesion diameter.
pub const LESION_DIAMETER: &str = "LDIAM";

fn lesion_parameter(lesion_id: &str) -> String {
    format!("{LESION_DIAMETER}.{lesion_id}")
}

/// Change-from-baseline record for one parameter at one visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterRecord {
    #[serde(rename = "USUBJID")]
    pub subject_id: String,
    #[serde(rename = "PARAMCD")]
    pub paramcd: String,
    #[serde(rename = "LESIONID")]
    pub lesion_id: Option<String>,
    #[serde(rename = "VISIT")]
    pub visit: String,
    #[serde(rename = "ADT")]
    pub date: NaiveDate,
    #[serde(rename = "ADY")]
    pub study_day: i64,
    #[serde(rename = "AVAL")]
    pub aval: Option<f64>,
    #[serde(rename = "BASE")]
    pub base: Option<f64>,
    #[serde(rename = "CHG")]
    pub chg: Option<f64>,
    #[serde(rename = "PCHG")]
    pub pchg: Option<f64>,
    #[serde(rename = "NADIR")]
    pub nadir: Option<f64>,
    #[serde(rename = "CHGNADIR")]
    pub chg_nadir: Option<f64>,
    #[serde(rename = "PCHGNADIR")]
    pub pchg_nadir: Option<f64>,
    #[serde(rename = "ABLFL")]
    pub baseline_flag: bool,
    #[serde(rename = "NADIRFL")]
    pub nadir_flag: bool,
}

/// Everything derived for one subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectResponse {
    pub subject_id: String,
    pub study_id: Option<String>,
    pub lesions: Vec<ClassifiedLesion>,
    pub baseline: Option<BaselineValue>,
    pub assessments: Vec<TimepointAssessment>,
    pub parameters: Vec<ParameterRecord>,
    pub new_lesions: Vec<NewLesionAppearance>,
    pub best_overall: BestOverallResponse,
    /// Visits where both progression rules could be evaluated.
    pub rule_comparisons: usize,
    pub discordance: Vec<DiscordanceRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub flagged_for_review: bool,
}

/// Output of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchOutput {
    pub config: EngineConfig,
    pub subjects: Vec<SubjectResponse>,
    pub discordance: DiscordanceReport,
    pub summary: ResponseSummary,
}

/// Validate the configuration, then derive every subject independently.
///
/// Subjects run in parallel when the `parallel` feature is on; output order
/// always matches input order.
pub fn derive_batch(
    timelines: &[SubjectTimeline],
    config: &EngineConfig,
) -> Result<BatchOutput, ConfigError> {
    config.validate()?;
    info!(
        subjects = timelines.len(),
        rule = ?config.progression_rule,
        baseline_method = ?config.baseline_method,
        nadir_baseline = ?config.nadir_baseline,
        "response derivation started"
    );

    #[cfg(feature = "parallel")]
    let subjects: Vec<SubjectResponse> = timelines
        .par_iter()
        .map(|timeline| derive_subject(timeline, config))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let subjects: Vec<SubjectResponse> = timelines
        .iter()
        .map(|timeline| derive_subject(timeline, config))
        .collect();

    let discordance = DiscordanceReport::from_subjects(&subjects);
    let summary = ResponseSummary::from_subjects(&subjects);
    info!(
        subjects = subjects.len(),
        flagged = subjects.iter().filter(|s| s.flagged_for_review).count(),
        discordant_visits = discordance.discordant,
        "response derivation finished"
    );

    Ok(BatchOutput {
        config: config.clone(),
        subjects,
        discordance,
        summary,
    })
}

/// Derive assessments and BOR for one subject. `config` must already be valid.
pub fn derive_subject(timeline: &SubjectTimeline, config: &EngineConfig) -> SubjectResponse {
    let subject = &timeline.subject;
    let selection = select_baseline_lesions(
        &subject.id,
        &timeline.lesions,
        &config.caps,
        &config.measurability,
    );
    let plan = assemble_visits(timeline);
    debug!(
        subject = %subject.id,
        visits = plan.visits.len(),
        targets = selection.target_ids().len(),
        "deriving subject"
    );

    let mut diagnostics = selection.diagnostics.clone();
    diagnostics.extend(plan.diagnostics);

    let targets = selection.target_ids();
    let sods: Vec<SumOfDiameters> = plan
        .visits
        .iter()
        .map(|visit| visit.sum_of_diameters(&targets))
        .collect();
    for (visit, sod) in plan.visits.iter().zip(&sods) {
        if let SumOfDiameters::MixedUnits(units) = sod {
            diagnostics.push(
                Diagnostic::new(
                    &subject.id,
                    DiagnosticKind::UnitMismatch,
                    format!("target lesions measured in {}", units.join(", ")),
                )
                .at_visit(&visit.label),
            );
        }
    }

    let series: Vec<ParameterPoint> = plan
        .visits
        .iter()
        .zip(&sods)
        .map(|(visit, sod)| ParameterPoint {
            visit: visit.label.clone(),
            date: visit.date,
            value: sod.value(),
        })
        .collect();

    let Some(base) = derive_baseline(&series, config.baseline_method, subject.reference_date)
    else {
        diagnostics.push(Diagnostic::new(
            &subject.id,
            DiagnosticKind::MissingData,
            format!(
                "no baseline sum of diameters under {:?}; all visits not evaluable",
                config.baseline_method
            ),
        ));
        return degraded(timeline, &selection, &plan.visits, &sods, diagnostics);
    };

    let mut fold = SubjectFold::new(subject, config, &selection, &plan.visits, base);
    for (visit, sod) in plan.visits.iter().zip(&sods) {
        fold.handle_visit(visit, sod.value());
    }
    fold.finalize(timeline, selection.lesions.clone(), diagnostics)
}

/// Running state threaded through one subject's date-ordered visits.
struct SubjectFold<'a> {
    subject: &'a Subject,
    config: &'a EngineConfig,
    rule: Box<dyn ProgressionRule>,
    targets: Vec<String>,
    base: BaselineValue,
    lesion_bases: BTreeMap<String, BaselineValue>,
    nadirs: NadirTracker,
    detector: NewLesionDetector,
    assessments: Vec<TimepointAssessment>,
    parameters: Vec<ParameterRecord>,
    discordance: Vec<DiscordanceRecord>,
    rule_comparisons: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SubjectFold<'a> {
    fn new(
        subject: &'a Subject,
        config: &'a EngineConfig,
        selection: &BaselineSelection,
        visits: &[Visit],
        base: BaselineValue,
    ) -> Self {
        let targets: Vec<String> = selection
            .target_ids()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut nadirs = NadirTracker::new(config.nadir_baseline.includes_baseline());
        nadirs.set_reference(&subject.id, SUM_OF_DIAMETERS, &base);

        let mut lesion_bases = BTreeMap::new();
        for target in &targets {
            let series: Vec<ParameterPoint> = visits
                .iter()
                .map(|visit| ParameterPoint {
                    visit: visit.label.clone(),
                    date: visit.date,
                    value: visit.value_of(target),
                })
                .collect();
            if let Some(lesion_base) =
                derive_baseline(&series, config.baseline_method, subject.reference_date)
            {
                nadirs.set_reference(&subject.id, &lesion_parameter(target), &lesion_base);
                lesion_bases.insert(target.clone(), lesion_base);
            }
        }

        let mut baseline_ids: BTreeSet<String> = selection
            .lesions
            .iter()
            .map(|lesion| lesion.id.clone())
            .collect();
        for visit in visits.iter().filter(|visit| in_baseline_phase(visit, &base)) {
            baseline_ids.extend(visit.lesion_ids().map(str::to_string));
        }

        Self {
            subject,
            config,
            rule: config.progression_rule.build(&config.thresholds),
            targets,
            base,
            lesion_bases,
            nadirs,
            detector: NewLesionDetector::new(baseline_ids),
            assessments: Vec::new(),
            parameters: Vec::new(),
            discordance: Vec::new(),
            rule_comparisons: 0,
            diagnostics: Vec::new(),
        }
    }

    fn handle_visit(&mut self, visit: &Visit, sod: Option<f64>) {
        if in_baseline_phase(visit, &self.base) {
            self.handle_baseline_visit(visit, sod);
        } else {
            self.handle_followup_visit(visit, sod);
        }
    }

    fn handle_baseline_visit(&mut self, visit: &Visit, sod: Option<f64>) {
        let is_base = self.is_base_visit(visit);
        let seeded = is_base && self.config.nadir_baseline.includes_baseline();
        let evidence = TimepointEvidence {
            baseline: true,
            sod,
            pchg: None,
            criteria: CriterionFlags::default(),
            non_target: visit.non_target,
        };
        let classification = classify(&evidence);

        self.assessments.push(TimepointAssessment {
            subject_id: self.subject.id.clone(),
            visit: visit.label.clone(),
            date: visit.date,
            study_day: visit.study_day,
            sod,
            base: Some(self.base.value),
            nadir: seeded.then_some(self.base.value),
            nadir_date: seeded.then_some(self.base.date),
            is_nadir: seeded,
            chg: None,
            pchg: None,
            chg_nadir: None,
            pchg_nadir: None,
            new_lesion: false,
            new_lesion_ids: Vec::new(),
            non_target: visit.non_target,
            criteria: CriterionFlags::default(),
            response: classification.response,
            rule: classification.rule.to_string(),
            pd_pattern: None,
        });

        let record = ParameterRecord {
            baseline_flag: is_base,
            nadir_flag: seeded,
            nadir: seeded.then_some(self.base.value),
            ..self.parameter_record(visit, SUM_OF_DIAMETERS, None, sod, Some(self.base.value))
        };
        self.parameters.push(record);
        for target in self.targets.clone() {
            let lesion_base = self.lesion_bases.get(&target).cloned();
            let lesion_is_base = lesion_base
                .as_ref()
                .is_some_and(|b| b.date == visit.date && b.visit == visit.label);
            let lesion_seeded = lesion_is_base && self.config.nadir_baseline.includes_baseline();
            let base_value = lesion_base.as_ref().map(|b| b.value);
            let record = ParameterRecord {
                baseline_flag: lesion_is_base,
                nadir_flag: lesion_seeded,
                nadir: if lesion_seeded { base_value } else { None },
                ..self.parameter_record(
                    visit,
                    LESION_DIAMETER,
                    Some(&target),
                    visit.value_of(&target),
                    base_value,
                )
            };
            self.parameters.push(record);
        }
    }

    fn handle_followup_visit(&mut self, visit: &Visit, sod: Option<f64>) {
        let subject_id = self.subject.id.clone();

        let is_nadir = match sod {
            Some(value) => self.track(SUM_OF_DIAMETERS, visit, value),
            None => false,
        };
        let nadir_state = self
            .nadirs
            .current(&subject_id, SUM_OF_DIAMETERS)
            .cloned();
        let nadir = nadir_state.as_ref().map(|state| state.value);

        let from_base = change_from(sod, Some(self.base.value));
        let from_nadir = change_from(sod, nadir);

        let new_ids = self.detector.observe(
            &visit.label,
            visit.date,
            visit.study_day,
            visit.lesion_ids(),
        );
        let criteria = CriterionFlags {
            target: self.rule.evaluate_optional(sod, nadir).unwrap_or(false),
            new_lesion: !new_ids.is_empty(),
            non_target: visit.non_target == Some(NonTargetStatus::UnequivocalPd),
        };
        let evidence = TimepointEvidence {
            baseline: false,
            sod,
            pchg: from_base.and_then(|change| change.pchg),
            criteria,
            non_target: visit.non_target,
        };
        let classification = classify(&evidence);

        let comparison = compare_rules(sod, nadir, &self.config.thresholds);
        if let Some(((sod, nadir), comparison)) = sod.zip(nadir).zip(comparison) {
            self.rule_comparisons += 1;
            if comparison.discordant() {
                debug!(
                    subject = %subject_id,
                    visit = %visit.label,
                    standard = comparison.standard,
                    nadir_magnitude = comparison.nadir_magnitude,
                    "progression rules disagree"
                );
                self.discordance.push(DiscordanceRecord {
                    subject_id: subject_id.clone(),
                    visit: visit.label.clone(),
                    date: visit.date,
                    sod,
                    nadir,
                    regime: comparison.regime,
                    standard: comparison.standard,
                    nadir_magnitude: comparison.nadir_magnitude,
                });
            }
        }

        self.assessments.push(TimepointAssessment {
            subject_id: subject_id.clone(),
            visit: visit.label.clone(),
            date: visit.date,
            study_day: visit.study_day,
            sod,
            base: Some(self.base.value),
            nadir,
            nadir_date: nadir_state.as_ref().map(|state| state.date),
            is_nadir,
            chg: from_base.map(|change| change.chg),
            pchg: from_base.and_then(|change| change.pchg),
            chg_nadir: from_nadir.map(|change| change.chg),
            pchg_nadir: from_nadir.and_then(|change| change.pchg),
            new_lesion: criteria.new_lesion,
            new_lesion_ids: new_ids.into_iter().collect(),
            non_target: visit.non_target,
            criteria,
            response: classification.response,
            rule: classification.rule.to_string(),
            pd_pattern: if classification.response == ResponseCategory::ProgressiveDisease {
                criteria.pattern()
            } else {
                None
            },
        });

        let record = ParameterRecord {
            nadir,
            chg_nadir: from_nadir.map(|change| change.chg),
            pchg_nadir: from_nadir.and_then(|change| change.pchg),
            nadir_flag: is_nadir,
            ..self.parameter_record(visit, SUM_OF_DIAMETERS, None, sod, Some(self.base.value))
        };
        self.parameters.push(record);

        for target in self.targets.clone() {
            let value = visit.value_of(&target);
            let parameter = lesion_parameter(&target);
            let is_nadir = match value {
                Some(value) => self.track(&parameter, visit, value),
                None => false,
            };
            let nadir = self
                .nadirs
                .current(&subject_id, &parameter)
                .map(|state| state.value);
            let from_nadir = change_from(value, nadir);
            let base_value = self.lesion_bases.get(&target).map(|b| b.value);
            let record = ParameterRecord {
                nadir,
                chg_nadir: from_nadir.map(|change| change.chg),
                pchg_nadir: from_nadir.and_then(|change| change.pchg),
                nadir_flag: is_nadir,
                ..self.parameter_record(visit, LESION_DIAMETER, Some(&target), value, base_value)
            };
            self.parameters.push(record);
        }
    }

    /// Feed a value to the nadir tracker; returns whether it is the new nadir.
    fn track(&mut self, parameter: &str, visit: &Visit, value: f64) -> bool {
        match self.nadirs.update_nadir(
            &self.subject.id,
            parameter,
            &visit.label,
            visit.date,
            value,
        ) {
            Ok(update) => update.is_nadir,
            Err(err) => {
                self.diagnostics.push(
                    Diagnostic::new(&self.subject.id, DiagnosticKind::InvalidOrdering, err.to_string())
                        .at_visit(&visit.label),
                );
                false
            }
        }
    }

    fn is_base_visit(&self, visit: &Visit) -> bool {
        visit.date == self.base.date && visit.label == self.base.visit
    }

    fn parameter_record(
        &self,
        visit: &Visit,
        paramcd: &str,
        lesion_id: Option<&str>,
        aval: Option<f64>,
        base: Option<f64>,
    ) -> ParameterRecord {
        let baseline_phase = in_baseline_phase(visit, &self.base);
        let from_base = if baseline_phase {
            None
        } else {
            change_from(aval, base)
        };
        ParameterRecord {
            subject_id: self.subject.id.clone(),
            paramcd: paramcd.to_string(),
            lesion_id: lesion_id.map(str::to_string),
            visit: visit.label.clone(),
            date: visit.date,
            study_day: visit.study_day,
            aval,
            base,
            chg: from_base.map(|change| change.chg),
            pchg: from_base.and_then(|change| change.pchg),
            nadir: None,
            chg_nadir: None,
            pchg_nadir: None,
            baseline_flag: false,
            nadir_flag: false,
        }
    }

    fn finalize(
        mut self,
        timeline: &SubjectTimeline,
        lesions: Vec<ClassifiedLesion>,
        mut diagnostics: Vec<Diagnostic>,
    ) -> SubjectResponse {
        let points: Vec<ResponsePoint> = self.assessments.iter().map(ResponsePoint::from).collect();
        let best_overall = resolve_bor(&self.subject.id, &points, &self.config.confirmation);

        diagnostics.append(&mut self.diagnostics);
        log_diagnostics(&diagnostics);
        let flagged_for_review = diagnostics
            .iter()
            .any(|diagnostic| diagnostic.kind.requires_review());

        debug!(
            subject = %self.subject.id,
            bor = %best_overall.response,
            confirmed = best_overall.confirmed,
            "subject derived"
        );

        SubjectResponse {
            subject_id: self.subject.id.clone(),
            study_id: timeline.subject.study_id.clone(),
            lesions,
            baseline: Some(self.base),
            assessments: self.assessments,
            parameters: self.parameters,
            new_lesions: self.detector.appearances(),
            best_overall,
            rule_comparisons: self.rule_comparisons,
            discordance: self.discordance,
            diagnostics,
            flagged_for_review,
        }
    }
}

/// Pre-treatment visits and anything up to and including the BASE visit.
fn in_baseline_phase(visit: &Visit, base: &BaselineValue) -> bool {
    visit.study_day < 1 || visit.date <= base.date
}

/// Output for a subject without BASE: every post-treatment visit is NE.
fn degraded(
    timeline: &SubjectTimeline,
    selection: &BaselineSelection,
    visits: &[Visit],
    sods: &[SumOfDiameters],
    diagnostics: Vec<Diagnostic>,
) -> SubjectResponse {
    let subject = &timeline.subject;
    let assessments = visits
        .iter()
        .zip(sods)
        .map(|(visit, sod)| {
            let response = if visit.study_day < 1 {
                ResponseCategory::Baseline
            } else {
                ResponseCategory::NotEvaluable
            };
            TimepointAssessment {
                subject_id: subject.id.clone(),
                visit: visit.label.clone(),
                date: visit.date,
                study_day: visit.study_day,
                sod: sod.value(),
                base: None,
                nadir: None,
                nadir_date: None,
                is_nadir: false,
                chg: None,
                pchg: None,
                chg_nadir: None,
                pchg_nadir: None,
                new_lesion: false,
                new_lesion_ids: Vec::new(),
                non_target: visit.non_target,
                criteria: CriterionFlags::default(),
                response,
                rule: "NO_BASELINE".to_string(),
                pd_pattern: None,
            }
        })
        .collect();

    log_diagnostics(&diagnostics);

    SubjectResponse {
        subject_id: subject.id.clone(),
        study_id: subject.study_id.clone(),
        lesions: selection.lesions.clone(),
        baseline: None,
        assessments,
        parameters: Vec::new(),
        new_lesions: Vec::new(),
        best_overall: BestOverallResponse::not_evaluable(&subject.id),
        rule_comparisons: 0,
        discordance: Vec::new(),
        diagnostics,
        flagged_for_review: true,
    }
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        warn!(
            subject = %diagnostic.subject_id,
            visit = diagnostic.visit.as_deref().unwrap_or("-"),
            kind = ?diagnostic.kind,
            "{}",
            diagnostic.message
        );
    }
}
