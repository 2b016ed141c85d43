//! Baseline TARGET / NON-TARGET selection under RECIST caps.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::{Measurability, TargetCaps};
use crate::error::{Diagnostic, DiagnosticKind};
use crate::model::{LesionClass, LesionRecord};

/// A baseline lesion after selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedLesion {
    pub id: String,
    pub site: String,
    pub laterality: Option<String>,
    pub nodal: bool,
    pub baseline_diameter: Option<f64>,
    pub measurable: bool,
    pub class: LesionClass,
}

/// Outcome of baseline selection for one subject, in inventory order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BaselineSelection {
    pub lesions: Vec<ClassifiedLesion>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BaselineSelection {
    pub fn target_set(&self) -> BTreeSet<&str> {
        self.ids_with(LesionClass::Target)
    }

    pub fn non_target_set(&self) -> BTreeSet<&str> {
        self.ids_with(LesionClass::NonTarget)
    }

    pub fn is_target(&self, lesion_id: &str) -> bool {
        self.lesions
            .iter()
            .any(|lesion| lesion.id == lesion_id && lesion.class == LesionClass::Target)
    }

    /// Target lesion ids in inventory order.
    pub fn target_ids(&self) -> Vec<&str> {
        self.lesions
            .iter()
            .filter(|lesion| lesion.class == LesionClass::Target)
            .map(|lesion| lesion.id.as_str())
            .collect()
    }

    fn ids_with(&self, class: LesionClass) -> BTreeSet<&str> {
        self.lesions
            .iter()
            .filter(|lesion| lesion.class == class)
            .map(|lesion| lesion.id.as_str())
            .collect()
    }
}

/// Organ key used for the per-organ cap.
fn organ_key(site: &str) -> String {
    site.trim().to_ascii_uppercase()
}

/// Split a baseline inventory into TARGET and NON-TARGET lesions.
///
/// Measurable, target-eligible lesions are ranked by descending baseline
/// diameter (ties keep inventory order) and assigned to TARGET greedily while
/// both caps allow; each eligible lesion a cap demotes is reported as a
/// CapViolation. Everything else becomes NON-TARGET. Inventory entries
/// designated NEW are not baseline disease and are left out entirely.
pub fn select_baseline_lesions(
    subject_id: &str,
    inventory: &[LesionRecord],
    caps: &TargetCaps,
    measurability: &Measurability,
) -> BaselineSelection {
    let mut diagnostics = Vec::new();

    let mut seen = HashSet::new();
    let baseline: Vec<&LesionRecord> = inventory
        .iter()
        .filter(|lesion| lesion.designation != Some(LesionClass::New))
        .filter(|lesion| {
            if seen.insert(lesion.id.as_str()) {
                true
            } else {
                diagnostics.push(Diagnostic::new(
                    subject_id,
                    DiagnosticKind::DuplicateLesion,
                    format!("lesion {} listed more than once; first entry kept", lesion.id),
                ));
                false
            }
        })
        .collect();

    report_requested_caps(subject_id, &baseline, caps, &mut diagnostics);

    let measurable: Vec<bool> = baseline
        .iter()
        .map(|lesion| {
            lesion
                .baseline_diameter
                .is_some_and(|diameter| measurability.is_measurable(lesion.nodal, diameter))
        })
        .collect();

    let mut ranked: Vec<(usize, f64)> = baseline
        .iter()
        .enumerate()
        .filter(|(idx, lesion)| {
            measurable[*idx] && lesion.designation != Some(LesionClass::NonTarget)
        })
        .filter_map(|(idx, lesion)| lesion.baseline_diameter.map(|diameter| (idx, diameter)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut per_organ: BTreeMap<String, usize> = BTreeMap::new();
    let mut chosen = HashSet::new();
    for (idx, diameter) in ranked {
        let lesion = baseline[idx];
        let organ = organ_key(&lesion.site);
        let count = per_organ.entry(organ.clone()).or_default();
        let cap = if chosen.len() >= caps.max_total {
            format!("total cap of {}", caps.max_total)
        } else if *count >= caps.max_per_organ {
            format!("cap of {} per organ ({organ})", caps.max_per_organ)
        } else {
            *count += 1;
            chosen.insert(idx);
            continue;
        };
        diagnostics.push(Diagnostic::new(
            subject_id,
            DiagnosticKind::CapViolation,
            format!(
                "lesion {} ({diameter}) demoted to non-target by the {cap}",
                lesion.id
            ),
        ));
    }

    let lesions = baseline
        .iter()
        .enumerate()
        .map(|(idx, lesion)| {
            let class = if chosen.contains(&idx) {
                LesionClass::Target
            } else {
                if lesion.designation == Some(LesionClass::Target) {
                    tracing::debug!(
                        subject = subject_id,
                        lesion = %lesion.id,
                        measurable = measurable[idx],
                        "requested target lesion demoted to non-target"
                    );
                }
                LesionClass::NonTarget
            };
            ClassifiedLesion {
                id: lesion.id.clone(),
                site: lesion.site.clone(),
                laterality: lesion.laterality.clone(),
                nodal: lesion.nodal,
                baseline_diameter: lesion.baseline_diameter,
                measurable: measurable[idx],
                class,
            }
        })
        .collect();

    BaselineSelection {
        lesions,
        diagnostics,
    }
}

/// Record, without acting on, explicit TARGET designations that exceed the caps.
fn report_requested_caps(
    subject_id: &str,
    baseline: &[&LesionRecord],
    caps: &TargetCaps,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let requested: Vec<&&LesionRecord> = baseline
        .iter()
        .filter(|lesion| lesion.designation == Some(LesionClass::Target))
        .collect();

    if requested.len() > caps.max_total {
        diagnostics.push(Diagnostic::new(
            subject_id,
            DiagnosticKind::CapViolation,
            format!(
                "{} target lesions requested, at most {} allowed",
                requested.len(),
                caps.max_total
            ),
        ));
    }

    let mut per_organ: BTreeMap<String, usize> = BTreeMap::new();
    for lesion in &requested {
        *per_organ.entry(organ_key(&lesion.site)).or_default() += 1;
    }
    for (organ, count) in per_organ {
        if count > caps.max_per_organ {
            diagnostics.push(Diagnostic::new(
                subject_id,
                DiagnosticKind::CapViolation,
                format!(
                    "{count} target lesions requested in {organ}, at most {} allowed",
                    caps.max_per_organ
                ),
            ));
        }
    }
}
