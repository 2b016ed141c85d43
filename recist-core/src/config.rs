//! Run configuration: baseline policy, rule selection, thresholds, windows and caps.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How BASE is chosen from a subject's value series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaselineMethod {
    /// Earliest value recorded before treatment start (study day < 1).
    #[default]
    Pretreat,
    /// Earliest recorded value regardless of date.
    First,
}

/// Whether the baseline value itself seeds the running nadir.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NadirBaseline {
    Include,
    Exclude,
}

impl NadirBaseline {
    pub fn includes_baseline(self) -> bool {
        matches!(self, NadirBaseline::Include)
    }
}

/// Which progression rule drives classification for a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressionRuleKind {
    /// RECIST 1.1: +20% and +5mm over nadir, both required.
    #[default]
    Standard,
    /// Absolute-only below the nadir cutoff, percent-only at or above it.
    NadirMagnitude,
}

/// How a progression timepoint interacts with earlier responses in the BOR.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorPolicy {
    /// Any PD timepoint makes the subject's BOR PD.
    #[default]
    PdTerminal,
    /// Best response confirmed before the first PD; PD only when nothing better holds.
    BestConfirmed,
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase().replace(['-', ' '], "_")
}

impl FromStr for BaselineMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "PRETREAT" => Ok(Self::Pretreat),
            "FIRST" => Ok(Self::First),
            _ => Err(ConfigError::UnknownBaselineMethod(s.to_string())),
        }
    }
}

impl FromStr for NadirBaseline {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "INCLUDE" | "TRUE" | "YES" => Ok(Self::Include),
            "EXCLUDE" | "FALSE" | "NO" => Ok(Self::Exclude),
            _ => Err(ConfigError::UnknownNadirBaseline(s.to_string())),
        }
    }
}

impl FromStr for ProgressionRuleKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "STANDARD" | "RECIST" | "RECIST_1_1" => Ok(Self::Standard),
            "NADIR_MAGNITUDE" | "25MM" | "25MM_RULE" => Ok(Self::NadirMagnitude),
            _ => Err(ConfigError::UnknownRule(s.to_string())),
        }
    }
}

impl FromStr for BorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "PD_TERMINAL" => Ok(Self::PdTerminal),
            "BEST_CONFIRMED" => Ok(Self::BestConfirmed),
            _ => Err(ConfigError::UnknownBorPolicy(s.to_string())),
        }
    }
}

/// Progression thresholds, each independently overridable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum percent increase over nadir.
    pub percent: f64,
    /// Minimum absolute increase over nadir, in measurement units.
    pub absolute: f64,
    /// Nadir value separating the absolute-only and percent-only regimes.
    pub nadir_cutoff: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            percent: 20.0,
            absolute: 5.0,
            nadir_cutoff: 25.0,
        }
    }
}

/// Confirmation window and BOR derivation policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Minimum days between a CR/PR and its confirming assessment.
    pub window_lo: i64,
    /// Maximum days between a CR/PR and its confirming assessment.
    pub window_hi: i64,
    pub bor_policy: BorPolicy,
    /// Earliest study day at which an SD timepoint counts toward BOR.
    pub sd_min_days: i64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            window_lo: 28,
            window_hi: 84,
            bor_policy: BorPolicy::PdTerminal,
            sd_min_days: 1,
        }
    }
}

impl ConfirmationConfig {
    pub fn contains(&self, days_apart: i64) -> bool {
        days_apart >= self.window_lo && days_apart <= self.window_hi
    }
}

/// RECIST caps on baseline target lesions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TargetCaps {
    pub max_total: usize,
    pub max_per_organ: usize,
}

impl Default for TargetCaps {
    fn default() -> Self {
        Self {
            max_total: 5,
            max_per_organ: 2,
        }
    }
}

/// Minimum baseline diameters for a lesion to be measurable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Measurability {
    pub nodal_min: f64,
    pub non_nodal_min: f64,
}

impl Default for Measurability {
    fn default() -> Self {
        Self {
            nodal_min: 10.0,
            non_nodal_min: 20.0,
        }
    }
}

impl Measurability {
    pub fn is_measurable(&self, nodal: bool, diameter: f64) -> bool {
        let minimum = if nodal {
            self.nodal_min
        } else {
            self.non_nodal_min
        };
        diameter >= minimum
    }
}

/// Complete, explicit configuration for one derivation run.
///
/// Has no `Default`; nadir baseline inclusion must be supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub baseline_method: BaselineMethod,
    pub nadir_baseline: NadirBaseline,
    #[serde(default)]
    pub progression_rule: ProgressionRuleKind,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub caps: TargetCaps,
    #[serde(default)]
    pub measurability: Measurability,
}

impl EngineConfig {
    /// Standard RECIST 1.1 settings with the given nadir baseline policy.
    pub fn new(nadir_baseline: NadirBaseline) -> Self {
        Self {
            baseline_method: BaselineMethod::default(),
            nadir_baseline,
            progression_rule: ProgressionRuleKind::default(),
            thresholds: Thresholds::default(),
            confirmation: ConfirmationConfig::default(),
            caps: TargetCaps::default(),
            measurability: Measurability::default(),
        }
    }

    pub fn with_rule(mut self, rule: ProgressionRuleKind) -> Self {
        self.progression_rule = rule;
        self
    }

    pub fn with_baseline_method(mut self, method: BaselineMethod) -> Self {
        self.baseline_method = method;
        self
    }

    pub fn with_bor_policy(mut self, policy: BorPolicy) -> Self {
        self.confirmation.bor_policy = policy;
        self
    }

    /// Reject parameter combinations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = &self.confirmation;
        if window.window_lo <= 0 || window.window_hi <= 0 {
            return Err(ConfigError::NonPositiveWindow {
                lo: window.window_lo,
                hi: window.window_hi,
            });
        }
        if window.window_hi < window.window_lo {
            return Err(ConfigError::InvertedWindow {
                lo: window.window_lo,
                hi: window.window_hi,
            });
        }

        for (name, value) in [
            ("thresholds.percent", self.thresholds.percent),
            ("thresholds.absolute", self.thresholds.absolute),
            ("thresholds.nadir_cutoff", self.thresholds.nadir_cutoff),
            ("measurability.nodal_min", self.measurability.nodal_min),
            ("measurability.non_nodal_min", self.measurability.non_nodal_min),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveThreshold { name, value });
            }
        }

        if self.caps.max_total == 0 {
            return Err(ConfigError::ZeroCap {
                name: "caps.max_total",
            });
        }
        if self.caps.max_per_organ == 0 {
            return Err(ConfigError::ZeroCap {
                name: "caps.max_per_organ",
            });
        }
        if self.caps.max_per_organ > self.caps.max_total {
            return Err(ConfigError::PerOrganAboveTotal {
                per_organ: self.caps.max_per_organ,
                total: self.caps.max_total,
            });
        }

        Ok(())
    }
}

/// Partial configuration layered over a base, e.g. from a config file or CLI flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub baseline_method: Option<BaselineMethod>,
    pub nadir_baseline: Option<NadirBaseline>,
    pub progression_rule: Option<ProgressionRuleKind>,
    pub percent: Option<f64>,
    pub absolute: Option<f64>,
    pub nadir_cutoff: Option<f64>,
    pub window_lo: Option<i64>,
    pub window_hi: Option<i64>,
    pub bor_policy: Option<BorPolicy>,
    pub sd_min_days: Option<i64>,
    pub max_total: Option<usize>,
    pub max_per_organ: Option<usize>,
    pub nodal_min: Option<f64>,
    pub non_nodal_min: Option<f64>,
}

impl ConfigOverrides {
    /// Fields set in `other` win over fields set in `self`.
    pub fn merge(self, other: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            baseline_method: other.baseline_method.or(self.baseline_method),
            nadir_baseline: other.nadir_baseline.or(self.nadir_baseline),
            progression_rule: other.progression_rule.or(self.progression_rule),
            percent: other.percent.or(self.percent),
            absolute: other.absolute.or(self.absolute),
            nadir_cutoff: other.nadir_cutoff.or(self.nadir_cutoff),
            window_lo: other.window_lo.or(self.window_lo),
            window_hi: other.window_hi.or(self.window_hi),
            bor_policy: other.bor_policy.or(self.bor_policy),
            sd_min_days: other.sd_min_days.or(self.sd_min_days),
            max_total: other.max_total.or(self.max_total),
            max_per_organ: other.max_per_organ.or(self.max_per_organ),
            nodal_min: other.nodal_min.or(self.nodal_min),
            non_nodal_min: other.non_nodal_min.or(self.non_nodal_min),
        }
    }

    /// Overlay onto an existing configuration.
    pub fn apply(self, mut base: EngineConfig) -> EngineConfig {
        if let Some(method) = self.baseline_method {
            base.baseline_method = method;
        }
        if let Some(nadir) = self.nadir_baseline {
            base.nadir_baseline = nadir;
        }
        if let Some(rule) = self.progression_rule {
            base.progression_rule = rule;
        }
        if let Some(percent) = self.percent {
            base.thresholds.percent = percent;
        }
        if let Some(absolute) = self.absolute {
            base.thresholds.absolute = absolute;
        }
        if let Some(cutoff) = self.nadir_cutoff {
            base.thresholds.nadir_cutoff = cutoff;
        }
        if let Some(lo) = self.window_lo {
            base.confirmation.window_lo = lo;
        }
        if let Some(hi) = self.window_hi {
            base.confirmation.window_hi = hi;
        }
        if let Some(policy) = self.bor_policy {
            base.confirmation.bor_policy = policy;
        }
        if let Some(days) = self.sd_min_days {
            base.confirmation.sd_min_days = days;
        }
        if let Some(total) = self.max_total {
            base.caps.max_total = total;
        }
        if let Some(per_organ) = self.max_per_organ {
            base.caps.max_per_organ = per_organ;
        }
        if let Some(nodal) = self.nodal_min {
            base.measurability.nodal_min = nodal;
        }
        if let Some(non_nodal) = self.non_nodal_min {
            base.measurability.non_nodal_min = non_nodal;
        }
        base
    }

    /// Build a full configuration from defaults; nadir baseline inclusion is required.
    pub fn into_config(self) -> Result<EngineConfig, ConfigError> {
        let nadir = self
            .nadir_baseline
            .ok_or(ConfigError::MissingNadirBaseline)?;
        Ok(self.apply(EngineConfig::new(nadir)))
    }
}
