//! WASM <-> JavaScript bridge for the response derivation engine.

use recist_core::{derive_batch, ConfigError, ConfigOverrides, EngineConfig, StudyInput};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Config object as passed from JavaScript; every field is optional except
/// that nadir baseline inclusion must be present somewhere.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JsEngineConfig {
    #[serde(default)]
    nadir_baseline: Option<String>,
    #[serde(default)]
    baseline_method: Option<String>,
    #[serde(default)]
    progression_rule: Option<String>,
    #[serde(default)]
    bor_policy: Option<String>,
    #[serde(default)]
    percent_threshold: Option<f64>,
    #[serde(default)]
    absolute_threshold: Option<f64>,
    #[serde(default)]
    nadir_cutoff: Option<f64>,
    #[serde(default)]
    window_lo: Option<i64>,
    #[serde(default)]
    window_hi: Option<i64>,
    #[serde(default)]
    sd_min_days: Option<i64>,
    #[serde(default)]
    max_targets: Option<usize>,
    #[serde(default)]
    max_targets_per_organ: Option<usize>,
    #[serde(default)]
    nodal_min: Option<f64>,
    #[serde(default)]
    non_nodal_min: Option<f64>,
}

impl TryFrom<JsEngineConfig> for ConfigOverrides {
    type Error = ConfigError;

    fn try_from(cfg: JsEngineConfig) -> Result<Self, Self::Error> {
        Ok(ConfigOverrides {
            nadir_baseline: cfg.nadir_baseline.as_deref().map(str::parse).transpose()?,
            baseline_method: cfg.baseline_method.as_deref().map(str::parse).transpose()?,
            progression_rule: cfg.progression_rule.as_deref().map(str::parse).transpose()?,
            bor_policy: cfg.bor_policy.as_deref().map(str::parse).transpose()?,
            percent: cfg.percent_threshold,
            absolute: cfg.absolute_threshold,
            nadir_cutoff: cfg.nadir_cutoff,
            window_lo: cfg.window_lo,
            window_hi: cfg.window_hi,
            sd_min_days: cfg.sd_min_days,
            max_total: cfg.max_targets,
            max_per_organ: cfg.max_targets_per_organ,
            nodal_min: cfg.nodal_min,
            non_nodal_min: cfg.non_nodal_min,
        })
    }
}

fn engine_config(cfg: JsEngineConfig) -> Result<EngineConfig, ConfigError> {
    ConfigOverrides::try_from(cfg)?.into_config()
}

/// Derive timepoint responses and BOR for a study input object.
#[wasm_bindgen]
pub fn derive_responses(input: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let study: StudyInput = from_value(input)
        .map_err(|err| JsValue::from_str(&format!("Cannot read study input: {err}")))?;

    let js_cfg = match config {
        Some(js_cfg) => from_value::<JsEngineConfig>(js_cfg)
            .map_err(|err| JsValue::from_str(&format!("Cannot read config: {err}")))?,
        None => JsEngineConfig::default(),
    };
    let cfg = engine_config(js_cfg).map_err(|err| JsValue::from_str(&format_config_error(err)))?;

    let output = derive_batch(&study.subjects, &cfg)
        .map_err(|err| JsValue::from_str(&format_config_error(err)))?;

    to_value(&output).map_err(|err| JsValue::from_str(&format!("Cannot serialize output: {err}")))
}

/// Echo the effective configuration, e.g. for display next to results.
#[wasm_bindgen]
pub fn resolve_config(config: JsValue) -> Result<JsValue, JsValue> {
    let js_cfg: JsEngineConfig = from_value(config)
        .map_err(|err| JsValue::from_str(&format!("Cannot read config: {err}")))?;
    let cfg = engine_config(js_cfg).map_err(|err| JsValue::from_str(&format_config_error(err)))?;
    cfg.validate()
        .map_err(|err| JsValue::from_str(&format_config_error(err)))?;
    to_value(&cfg).map_err(|err| JsValue::from_str(&format!("Cannot serialize config: {err}")))
}

fn format_config_error(err: ConfigError) -> String {
    format!("Configuration error: {err}")
}
