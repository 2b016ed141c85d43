//! Running minimum of a parameter after its baseline reference.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::change::BaselineValue;
use crate::error::TrackerError;

/// Current nadir of one (subject, parameter) series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NadirState {
    pub value: f64,
    pub visit: String,
    pub date: NaiveDate,
}

/// Result of feeding one value to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct NadirUpdate {
    /// Nadir after this value was considered; `None` while nothing qualifies.
    pub state: Option<NadirState>,
    /// The value just fed is the current nadir.
    pub is_nadir: bool,
}

#[derive(Debug, Clone, Default)]
struct NadirSlot {
    reference_date: Option<NaiveDate>,
    state: Option<NadirState>,
    last_date: Option<NaiveDate>,
}

/// Nadir accumulator keyed by (subject, parameter).
///
/// Values must arrive in non-decreasing date order per key. A new nadir is
/// recorded only on a strictly lower value, so ties keep the earliest visit.
#[derive(Debug, Clone)]
pub struct NadirTracker {
    include_baseline: bool,
    slots: HashMap<(String, String), NadirSlot>,
}

impl NadirTracker {
    pub fn new(include_baseline: bool) -> Self {
        Self {
            include_baseline,
            slots: HashMap::new(),
        }
    }

    /// Anchor a series on its BASE. Values dated before BASE are ignored,
    /// and the BASE date itself only counts when baseline inclusion is on.
    pub fn set_reference(&mut self, subject: &str, parameter: &str, baseline: &BaselineValue) {
        let seeded = self.include_baseline.then(|| NadirState {
            value: baseline.value,
            visit: baseline.visit.clone(),
            date: baseline.date,
        });
        let slot = self.slot_mut(subject, parameter);
        slot.reference_date = Some(baseline.date);
        slot.last_date = Some(baseline.date);
        slot.state = seeded;
    }

    /// Feed the value observed at `visit` and return the updated nadir.
    pub fn update_nadir(
        &mut self,
        subject: &str,
        parameter: &str,
        visit: &str,
        date: NaiveDate,
        value: f64,
    ) -> Result<NadirUpdate, TrackerError> {
        let include_baseline = self.include_baseline;
        let slot = self.slot_mut(subject, parameter);

        if let Some(previous) = slot.last_date {
            if date < previous {
                return Err(TrackerError::OutOfOrder {
                    parameter: parameter.to_string(),
                    previous,
                    date,
                });
            }
        }
        slot.last_date = Some(date);

        let qualifies = match slot.reference_date {
            Some(reference) if include_baseline => date >= reference,
            Some(reference) => date > reference,
            None => true,
        };
        if !qualifies {
            return Ok(NadirUpdate {
                state: slot.state.clone(),
                is_nadir: false,
            });
        }

        let lower = slot
            .state
            .as_ref()
            .map_or(true, |current| value < current.value);
        if lower {
            slot.state = Some(NadirState {
                value,
                visit: visit.to_string(),
                date,
            });
        }

        Ok(NadirUpdate {
            state: slot.state.clone(),
            is_nadir: lower,
        })
    }

    pub fn current(&self, subject: &str, parameter: &str) -> Option<&NadirState> {
        self.slots
            .get(&(subject.to_string(), parameter.to_string()))
            .and_then(|slot| slot.state.as_ref())
    }

    fn slot_mut(&mut self, subject: &str, parameter: &str) -> &mut NadirSlot {
        self.slots
            .entry((subject.to_string(), parameter.to_string()))
            .or_default()
    }
}
