use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use recist_core::{BaselineMethod, BorPolicy, ConfigOverrides, NadirBaseline, ProgressionRuleKind};

#[derive(Debug, Parser)]
#[command(
    name = "recist",
    version,
    about = "Derive RECIST 1.1 timepoint responses and best overall response from lesion measurements."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Derive assessments, BOR and diagnostics for every subject.
    Derive(DeriveArgs),
    /// Compare the standard and nadir-magnitude progression rules.
    Discordance(ReportArgs),
    /// Tabulate BOR counts with ORR and DCR.
    Summary(ReportArgs),
}

#[derive(Debug, Args)]
pub struct DeriveArgs {
    /// Study input JSON (`{"subjects": [...]}`).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file; stdout when omitted.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Also write RS-domain OVRLRESP/BESTRESP records to this file.
    #[arg(long)]
    pub rs: Option<PathBuf>,

    /// STUDYID for subjects that carry none.
    #[arg(long, default_value = "UNKNOWN")]
    pub study_id: String,

    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[arg(short, long)]
    pub input: PathBuf,

    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Emit JSON instead of a text table.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Engine settings; flags win over values from `--config`.
#[derive(Debug, Args, Default)]
pub struct ConfigArgs {
    /// JSON file with partial engine settings.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub nadir_baseline: Option<NadirBaselineArg>,

    #[arg(long, value_enum)]
    pub rule: Option<RuleArg>,

    #[arg(long, value_enum)]
    pub baseline_method: Option<BaselineMethodArg>,

    #[arg(long, value_enum)]
    pub bor_policy: Option<BorPolicyArg>,

    #[arg(long, help = "Minimum percent increase over nadir for PD")]
    pub percent: Option<f64>,

    #[arg(long, help = "Minimum absolute increase over nadir for PD")]
    pub absolute: Option<f64>,

    #[arg(long, help = "Nadir cutoff of the nadir-magnitude rule")]
    pub nadir_cutoff: Option<f64>,

    #[arg(long, help = "Confirmation window lower bound (days)")]
    pub window_lo: Option<i64>,

    #[arg(long, help = "Confirmation window upper bound (days)")]
    pub window_hi: Option<i64>,

    #[arg(long, help = "Earliest study day for SD to count toward BOR")]
    pub sd_min_days: Option<i64>,

    #[arg(long)]
    pub max_targets: Option<usize>,

    #[arg(long)]
    pub max_targets_per_organ: Option<usize>,

    #[arg(long, help = "Minimum short axis for a measurable lymph node")]
    pub nodal_min: Option<f64>,

    #[arg(long, help = "Minimum longest diameter for a measurable non-nodal lesion")]
    pub non_nodal_min: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NadirBaselineArg {
    Include,
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuleArg {
    Standard,
    NadirMagnitude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BaselineMethodArg {
    Pretreat,
    First,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BorPolicyArg {
    PdTerminal,
    BestConfirmed,
}

impl From<NadirBaselineArg> for NadirBaseline {
    fn from(arg: NadirBaselineArg) -> Self {
        match arg {
            NadirBaselineArg::Include => NadirBaseline::Include,
            NadirBaselineArg::Exclude => NadirBaseline::Exclude,
        }
    }
}

impl From<RuleArg> for ProgressionRuleKind {
    fn from(arg: RuleArg) -> Self {
        match arg {
            RuleArg::Standard => ProgressionRuleKind::Standard,
            RuleArg::NadirMagnitude => ProgressionRuleKind::NadirMagnitude,
        }
    }
}

impl From<BaselineMethodArg> for BaselineMethod {
    fn from(arg: BaselineMethodArg) -> Self {
        match arg {
            BaselineMethodArg::Pretreat => BaselineMethod::Pretreat,
            BaselineMethodArg::First => BaselineMethod::First,
        }
    }
}

impl From<BorPolicyArg> for BorPolicy {
    fn from(arg: BorPolicyArg) -> Self {
        match arg {
            BorPolicyArg::PdTerminal => BorPolicy::PdTerminal,
            BorPolicyArg::BestConfirmed => BorPolicy::BestConfirmed,
        }
    }
}

impl ConfigArgs {
    /// Settings given directly on the command line.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            baseline_method: self.baseline_method.map(Into::into),
            nadir_baseline: self.nadir_baseline.map(Into::into),
            progression_rule: self.rule.map(Into::into),
            percent: self.percent,
            absolute: self.absolute,
            nadir_cutoff: self.nadir_cutoff,
            window_lo: self.window_lo,
            window_hi: self.window_hi,
            bor_policy: self.bor_policy.map(Into::into),
            sd_min_days: self.sd_min_days,
            max_total: self.max_targets,
            max_per_organ: self.max_targets_per_organ,
            nodal_min: self.nodal_min,
            non_nodal_min: self.non_nodal_min,
        }
    }
}
