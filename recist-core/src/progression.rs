//! Interchangeable target-lesion progression rules.

use serde::{Deserialize, Serialize};

use crate::config::{ProgressionRuleKind, Thresholds};

/// Slack for threshold comparisons so exact boundaries count as met.
const TOLERANCE: f64 = 1e-9;

/// A target-lesion progression criterion over SOD and its nadir.
pub trait ProgressionRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// PD verdict for a present SOD and nadir.
    fn evaluate(&self, sod: f64, nadir: f64) -> bool;

    /// Verdict when inputs may be missing; `None` means the rule does not apply.
    fn evaluate_optional(&self, sod: Option<f64>, nadir: Option<f64>) -> Option<bool> {
        Some(self.evaluate(sod?, nadir?))
    }
}

/// Percent increase over nadir reaches `percent`.
///
/// A zero nadir has no finite percent increase; any positive SOD meets it.
pub fn percent_increase_met(sod: f64, nadir: f64, percent: f64) -> bool {
    if nadir == 0.0 {
        return sod > 0.0;
    }
    let increase = (sod - nadir) / nadir * 100.0;
    increase + TOLERANCE >= percent
}

/// Absolute increase over nadir reaches `absolute`.
pub fn absolute_increase_met(sod: f64, nadir: f64, absolute: f64) -> bool {
    sod - nadir + TOLERANCE >= absolute
}

/// RECIST 1.1: both the percent and the absolute increase are required.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardRule {
    pub percent: f64,
    pub absolute: f64,
}

impl StandardRule {
    pub fn from_thresholds(thresholds: &Thresholds) -> Self {
        Self {
            percent: thresholds.percent,
            absolute: thresholds.absolute,
        }
    }
}

impl ProgressionRule for StandardRule {
    fn name(&self) -> &'static str {
        "STANDARD"
    }

    fn evaluate(&self, sod: f64, nadir: f64) -> bool {
        percent_increase_met(sod, nadir, self.percent)
            && absolute_increase_met(sod, nadir, self.absolute)
    }
}

/// Which single criterion the nadir-magnitude rule applies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    AbsoluteOnly,
    PercentOnly,
}

/// Nadir below `cutoff`: absolute increase only. At or above: percent only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NadirMagnitudeRule {
    pub cutoff: f64,
    pub percent: f64,
    pub absolute: f64,
}

impl NadirMagnitudeRule {
    pub fn from_thresholds(thresholds: &Thresholds) -> Self {
        Self {
            cutoff: thresholds.nadir_cutoff,
            percent: thresholds.percent,
            absolute: thresholds.absolute,
        }
    }

    pub fn regime(&self, nadir: f64) -> Regime {
        if nadir < self.cutoff {
            Regime::AbsoluteOnly
        } else {
            Regime::PercentOnly
        }
    }
}

impl ProgressionRule for NadirMagnitudeRule {
    fn name(&self) -> &'static str {
        "NADIR_MAGNITUDE"
    }

    fn evaluate(&self, sod: f64, nadir: f64) -> bool {
        match self.regime(nadir) {
            Regime::AbsoluteOnly => absolute_increase_met(sod, nadir, self.absolute),
            Regime::PercentOnly => percent_increase_met(sod, nadir, self.percent),
        }
    }
}

impl ProgressionRuleKind {
    /// Instantiate the configured rule.
    pub fn build(self, thresholds: &Thresholds) -> Box<dyn ProgressionRule> {
        match self {
            ProgressionRuleKind::Standard => Box::new(StandardRule::from_thresholds(thresholds)),
            ProgressionRuleKind::NadirMagnitude => {
                Box::new(NadirMagnitudeRule::from_thresholds(thresholds))
            }
        }
    }
}

/// Verdicts of both rules on the same input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleComparison {
    pub standard: bool,
    pub nadir_magnitude: bool,
    pub regime: Regime,
}

impl RuleComparison {
    pub fn discordant(&self) -> bool {
        self.standard != self.nadir_magnitude
    }
}

/// Run both rules side by side; `None` when SOD or nadir is missing.
pub fn compare_rules(
    sod: Option<f64>,
    nadir: Option<f64>,
    thresholds: &Thresholds,
) -> Option<RuleComparison> {
    let (sod, nadir) = (sod?, nadir?);
    let standard = StandardRule::from_thresholds(thresholds);
    let alternate = NadirMagnitudeRule::from_thresholds(thresholds);
    Some(RuleComparison {
        standard: standard.evaluate(sod, nadir),
        nadir_magnitude: alternate.evaluate(sod, nadir),
        regime: alternate.regime(nadir),
    })
}
