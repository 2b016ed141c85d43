//! Disease response records in the SDTM RS layout.

use serde::{Deserialize, Serialize};

use crate::engine::SubjectResponse;
use crate::model::ResponseCategory;

pub const DOMAIN: &str = "RS";
pub const CATEGORY: &str = "RECIST 1.1";
pub const OVERALL_RESPONSE: &str = "OVRLRESP";
pub const BEST_RESPONSE: &str = "BESTRESP";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub struct RsRecord {
    pub studyid: String,
    pub domain: String,
    pub usubjid: String,
    pub rsseq: u32,
    pub rstestcd: String,
    pub rstest: String,
    pub rscat: String,
    pub rsorres: String,
    pub rsstresc: String,
    pub visit: Option<String>,
    /// ISO 8601 date.
    pub rsdtc: Option<String>,
    pub rsdy: Option<i64>,
}

/// One OVRLRESP row per post-baseline assessment, then one BESTRESP row.
///
/// `RSSEQ` restarts at 1 for every subject. Subjects without their own
/// study identifier take `default_study_id`.
pub fn rs_records(default_study_id: &str, subjects: &[SubjectResponse]) -> Vec<RsRecord> {
    subjects
        .iter()
        .flat_map(|subject| subject_records(default_study_id, subject))
        .collect()
}

fn subject_records(default_study_id: &str, subject: &SubjectResponse) -> Vec<RsRecord> {
    let study_id = subject.study_id.as_deref().unwrap_or(default_study_id);
    let record = |seq: u32, testcd: &str, test: &str, response: ResponseCategory| RsRecord {
        studyid: study_id.to_string(),
        domain: DOMAIN.to_string(),
        usubjid: subject.subject_id.clone(),
        rsseq: seq,
        rstestcd: testcd.to_string(),
        rstest: test.to_string(),
        rscat: CATEGORY.to_string(),
        rsorres: response.code().to_string(),
        rsstresc: response.code().to_string(),
        visit: None,
        rsdtc: None,
        rsdy: None,
    };

    let mut records: Vec<RsRecord> = subject
        .assessments
        .iter()
        .filter(|assessment| assessment.response != ResponseCategory::Baseline)
        .zip(1..)
        .map(|(assessment, seq)| RsRecord {
            visit: Some(assessment.visit.clone()),
            rsdtc: Some(assessment.date.format("%Y-%m-%d").to_string()),
            rsdy: Some(assessment.study_day),
            ..record(seq, OVERALL_RESPONSE, "Overall Response", assessment.response)
        })
        .collect();

    let best = &subject.best_overall;
    let determining_day = best.determining_date.and_then(|date| {
        subject
            .assessments
            .iter()
            .find(|assessment| assessment.date == date)
            .map(|assessment| assessment.study_day)
    });
    let seq = records.len() as u32 + 1;
    records.push(RsRecord {
        rsdtc: best
            .determining_date
            .map(|date| date.format("%Y-%m-%d").to_string()),
        rsdy: determining_day,
        ..record(seq, BEST_RESPONSE, "Best Overall Response", best.response)
    });
    records
}
