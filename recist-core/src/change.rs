//! Change from a reference value, and BASE derivation from a value series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::BaselineMethod;
use crate::model::study_day;

/// Absolute and percent change from a reference (BASE or NADIR).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Change {
    pub chg: f64,
    /// `None` when the reference is zero.
    pub pchg: Option<f64>,
}

/// `CHG = value - reference`, `PCHG = CHG / reference * 100`.
pub fn change(value: f64, reference: f64) -> Change {
    let chg = value - reference;
    let pchg = if reference == 0.0 {
        None
    } else {
        Some(chg / reference * 100.0)
    };
    Change { chg, pchg }
}

/// [`change`] over optional inputs; missing either side yields no change.
pub fn change_from(value: Option<f64>, reference: Option<f64>) -> Option<Change> {
    Some(change(value?, reference?))
}

/// One dated value of a tracked parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterPoint {
    pub visit: String,
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// The value selected as BASE and where it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaselineValue {
    pub value: f64,
    pub visit: String,
    pub date: NaiveDate,
}

/// Pick exactly one BASE from a series under the given method.
///
/// Only points carrying a value are candidates. With `Pretreat` the
/// candidates are further limited to study day < 1. The earliest candidate
/// wins; same-date candidates keep series order.
pub fn derive_baseline(
    points: &[ParameterPoint],
    method: BaselineMethod,
    reference_date: NaiveDate,
) -> Option<BaselineValue> {
    points
        .iter()
        .filter(|point| match method {
            BaselineMethod::Pretreat => study_day(point.date, reference_date) < 1,
            BaselineMethod::First => true,
        })
        .filter_map(|point| point.value.map(|value| (point, value)))
        .min_by_key(|(point, _)| point.date)
        .map(|(point, value)| BaselineValue {
            value,
            visit: point.visit.clone(),
            date: point.date,
        })
}
