use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use recist_core::{
    derive_batch, rs_records, BatchOutput, ConfigOverrides, DiscordanceReport, EngineConfig,
    ResponseSummary, StudyInput,
};
use serde::Serialize;
use tracing::info;

use crate::cli::{ConfigArgs, DeriveArgs, ReportArgs};

/// Merge the config file (if any) with command-line flags.
pub fn resolve_config(args: &ConfigArgs) -> Result<EngineConfig> {
    let from_file = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("cannot read config file {}", path.display()))?;
            serde_json::from_str::<ConfigOverrides>(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?
        }
        None => ConfigOverrides::default(),
    };
    let config = from_file
        .merge(args.overrides())
        .into_config()
        .context("pass --nadir-baseline include|exclude or set nadir_baseline in --config")?;
    config.validate()?;
    Ok(config)
}

pub fn load_study(path: &Path) -> Result<StudyInput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read input file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid study input {}", path.display()))
}

fn run(input: &Path, config: &ConfigArgs) -> Result<BatchOutput> {
    let config = resolve_config(config)?;
    let study = load_study(input)?;
    Ok(derive_batch(&study.subjects, &config)?)
}

pub fn derive(args: &DeriveArgs) -> Result<()> {
    let output = run(&args.input, &args.config)?;
    emit(args.out.as_deref(), &to_json(&output, args.pretty)?)?;

    if let Some(path) = &args.rs {
        let records = rs_records(&args.study_id, &output.subjects);
        info!(records = records.len(), path = %path.display(), "writing RS records");
        emit(Some(path), &to_json(&records, args.pretty)?)?;
    }
    Ok(())
}

pub fn discordance(args: &ReportArgs) -> Result<()> {
    let output = run(&args.input, &args.config)?;
    let text = if args.json {
        to_json(&output.discordance, true)?
    } else {
        render_discordance(&output.discordance)
    };
    emit(args.out.as_deref(), &text)
}

pub fn summary(args: &ReportArgs) -> Result<()> {
    let output = run(&args.input, &args.config)?;
    let text = if args.json {
        to_json(&output.summary, true)?
    } else {
        render_summary(&output.summary)
    };
    emit(args.out.as_deref(), &text)
}

pub fn render_summary(summary: &ResponseSummary) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Subjects:            {}", summary.subjects);
    let _ = writeln!(text, "  CR:                {}", summary.complete);
    let _ = writeln!(text, "  PR:                {}", summary.partial);
    let _ = writeln!(text, "  SD:                {}", summary.stable);
    let _ = writeln!(text, "  PD:                {}", summary.progressive);
    let _ = writeln!(text, "  NE:                {}", summary.not_evaluable);
    let _ = writeln!(text, "Flagged for review:  {}", summary.flagged_for_review);
    let _ = writeln!(text, "ORR:                 {}", percent(summary.objective_response_rate));
    let _ = writeln!(text, "DCR:                 {}", percent(summary.disease_control_rate));
    text
}

pub fn render_discordance(report: &DiscordanceReport) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Visits evaluated:      {}", report.evaluated);
    let _ = writeln!(text, "Discordant visits:     {}", report.discordant);
    let _ = writeln!(text, "  PD standard only:    {}", report.standard_only);
    let _ = writeln!(text, "  PD nadir-magnitude:  {}", report.nadir_magnitude_only);
    let agreement = report.agreement_rate().map(|rate| rate * 100.0);
    let _ = writeln!(text, "Agreement:             {}", percent_value(agreement));
    for record in &report.records {
        let _ = writeln!(
            text,
            "{}\t{}\t{}\tSOD={}\tNADIR={}\tstandard={}\tnadir_magnitude={}",
            record.subject_id,
            record.visit,
            record.date,
            record.sod,
            record.nadir,
            record.standard,
            record.nadir_magnitude
        );
    }
    text
}

fn percent(rate: Option<f64>) -> String {
    percent_value(rate.map(|rate| rate * 100.0))
}

fn percent_value(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |value| format!("{value:.1}%"))
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    text.context("cannot serialize output")
}

fn emit(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("cannot write output file {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}
