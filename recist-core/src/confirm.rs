//! Confirmation of CR/PR within a day window and subject-level BOR.

use chrono::NaiveDate;

use crate::config::{BorPolicy, ConfirmationConfig};
use crate::model::{BestOverallResponse, ConfirmingPair, ResponseCategory, TimepointAssessment};

/// The part of a timepoint assessment that BOR derivation reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePoint {
    pub visit: String,
    pub date: NaiveDate,
    pub study_day: i64,
    pub response: ResponseCategory,
}

impl ResponsePoint {
    pub fn new(visit: &str, date: NaiveDate, study_day: i64, response: ResponseCategory) -> Self {
        Self {
            visit: visit.to_string(),
            date,
            study_day,
            response,
        }
    }
}

impl From<&TimepointAssessment> for ResponsePoint {
    fn from(assessment: &TimepointAssessment) -> Self {
        Self {
            visit: assessment.visit.clone(),
            date: assessment.date,
            study_day: assessment.study_day,
            response: assessment.response,
        }
    }
}

/// Best candidate found so far while scanning the timeline.
struct Candidate<'a> {
    response: ResponseCategory,
    point: &'a ResponsePoint,
    confirmation: Option<ConfirmingPair>,
}

/// Category a CR/PR at `index` is confirmed as, with its confirming visit.
///
/// Looks ahead through later evaluable points whose date lies inside the
/// window. A CR needs a later CR to stay CR; a later PR confirms it as PR.
/// A PR is confirmed by a later CR or PR. Callers pass a slice that already
/// stops before the first PD, so no PD can intervene.
fn confirm_at<'a>(
    points: &'a [&'a ResponsePoint],
    index: usize,
    window: &ConfirmationConfig,
) -> Option<(ResponseCategory, &'a ResponsePoint)> {
    let candidate = points[index];
    let mut best: Option<(ResponseCategory, &ResponsePoint)> = None;

    for later in &points[index + 1..] {
        let days_apart = later.date.signed_duration_since(candidate.date).num_days();
        if days_apart > window.window_hi {
            break;
        }
        if !window.contains(days_apart) {
            continue;
        }
        let confirmed_as = match (candidate.response, later.response) {
            (ResponseCategory::CompleteResponse, ResponseCategory::CompleteResponse) => {
                ResponseCategory::CompleteResponse
            }
            (
                ResponseCategory::CompleteResponse | ResponseCategory::PartialResponse,
                ResponseCategory::CompleteResponse | ResponseCategory::PartialResponse,
            ) => ResponseCategory::PartialResponse,
            _ => continue,
        };
        let improves = best.map_or(true, |(current, _)| {
            confirmed_as.rank() > current.rank()
        });
        if improves {
            best = Some((confirmed_as, *later));
        }
    }

    best
}

/// Derive the best overall response from timepoint responses.
///
/// Points are scanned chronologically (re-sorted by date if needed). NE and
/// BASELINE points never confirm or count. Unconfirmed CR/PR and SD points
/// count as SD once their study day reaches `sd_min_days`. How PD combines
/// with earlier responses follows `window.bor_policy`.
pub fn resolve_bor(
    subject_id: &str,
    points: &[ResponsePoint],
    window: &ConfirmationConfig,
) -> BestOverallResponse {
    let mut ordered: Vec<&ResponsePoint> = points
        .iter()
        .filter(|point| point.response.is_evaluable())
        .collect();
    ordered.sort_by_key(|point| point.date);

    if ordered.is_empty() {
        return BestOverallResponse::not_evaluable(subject_id);
    }

    let first_pd = ordered
        .iter()
        .position(|point| point.response == ResponseCategory::ProgressiveDisease);

    if let (Some(pd_index), BorPolicy::PdTerminal) = (first_pd, window.bor_policy) {
        return progression(subject_id, ordered[pd_index]);
    }

    let scope = &ordered[..first_pd.unwrap_or(ordered.len())];
    let mut best: Option<Candidate<'_>> = None;

    for (index, &point) in scope.iter().enumerate() {
        let candidate = match point.response {
            ResponseCategory::CompleteResponse | ResponseCategory::PartialResponse => {
                match confirm_at(scope, index, window) {
                    Some((response, confirming)) => Some(Candidate {
                        response,
                        point,
                        confirmation: Some(ConfirmingPair {
                            response_visit: point.visit.clone(),
                            response_date: point.date,
                            confirming_visit: confirming.visit.clone(),
                            confirming_date: confirming.date,
                        }),
                    }),
                    None => stable_candidate(point, window),
                }
            }
            ResponseCategory::StableDisease => stable_candidate(point, window),
            _ => None,
        };

        if let Some(candidate) = candidate {
            let improves = best
                .as_ref()
                .map_or(true, |current| candidate.response.rank() > current.response.rank());
            if improves {
                best = Some(candidate);
            }
        }
    }

    match (best, first_pd) {
        (Some(candidate), _) => BestOverallResponse {
            subject_id: subject_id.to_string(),
            response: candidate.response,
            confirmed: candidate.confirmation.is_some(),
            determining_visit: Some(candidate.point.visit.clone()),
            determining_date: Some(candidate.point.date),
            confirmation: candidate.confirmation,
        },
        (None, Some(pd_index)) => progression(subject_id, ordered[pd_index]),
        (None, None) => BestOverallResponse::not_evaluable(subject_id),
    }
}

fn stable_candidate<'a>(
    point: &'a ResponsePoint,
    window: &ConfirmationConfig,
) -> Option<Candidate<'a>> {
    (point.study_day >= window.sd_min_days).then_some(Candidate {
        response: ResponseCategory::StableDisease,
        point,
        confirmation: None,
    })
}

fn progression(subject_id: &str, point: &ResponsePoint) -> BestOverallResponse {
    BestOverallResponse {
        subject_id: subject_id.to_string(),
        response: ResponseCategory::ProgressiveDisease,
        confirmed: false,
        determining_visit: Some(point.visit.clone()),
        determining_date: Some(point.date),
        confirmation: None,
    }
}
