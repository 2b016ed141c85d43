//! Detection of lesion identities absent from the baseline set.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// First visit at which a new lesion was seen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewLesionAppearance {
    pub lesion_id: String,
    pub visit: String,
    pub date: NaiveDate,
    pub study_day: i64,
}

/// Ids seen at a post-treatment visit (study day >= 1) that are not in the baseline set.
pub fn detect_new_lesions<'a, I>(
    baseline_ids: &BTreeSet<String>,
    visit_ids: I,
    study_day: i64,
) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if study_day < 1 {
        return BTreeSet::new();
    }
    visit_ids
        .into_iter()
        .filter(|id| !baseline_ids.contains(*id))
        .map(str::to_string)
        .collect()
}

/// Stateful detector for one subject that remembers first appearances.
#[derive(Debug, Clone, Default)]
pub struct NewLesionDetector {
    baseline: BTreeSet<String>,
    first_seen: BTreeMap<String, NewLesionAppearance>,
}

impl NewLesionDetector {
    pub fn new<I, S>(baseline_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            baseline: baseline_ids.into_iter().map(Into::into).collect(),
            first_seen: BTreeMap::new(),
        }
    }

    pub fn baseline(&self) -> &BTreeSet<String> {
        &self.baseline
    }

    /// New lesion ids present at this visit. Visits must be fed in date order
    /// for first appearances to be correct.
    pub fn observe<'a, I>(
        &mut self,
        visit: &str,
        date: NaiveDate,
        study_day: i64,
        visit_ids: I,
    ) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let found = detect_new_lesions(&self.baseline, visit_ids, study_day);
        for id in &found {
            self.first_seen
                .entry(id.clone())
                .or_insert_with(|| NewLesionAppearance {
                    lesion_id: id.clone(),
                    visit: visit.to_string(),
                    date,
                    study_day,
                });
        }
        found
    }

    /// First appearances ordered by date, then lesion id.
    pub fn appearances(&self) -> Vec<NewLesionAppearance> {
        let mut appearances: Vec<NewLesionAppearance> = self.first_seen.values().cloned().collect();
        appearances.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.lesion_id.cmp(&b.lesion_id)));
        appearances
    }
}
