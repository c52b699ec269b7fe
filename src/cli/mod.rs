//! Command-line parsing for the dose-response pipeline.
//!
//! Argument parsing and command dispatch stay separate from the statistics
//! code. Every flag falls back to a `DOSE_*` environment variable (a `.env`
//! file is loaded at start-up).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_MODEL_NAME, DEFAULT_STD_CUTOFF};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dose", version, about = "Luciferase reporter-assay QC, normalization and dose-response fitting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Flag and remove negative-control outliers per plate, writing a QC report.
    Qc(QcArgs),
    /// Normalize a cleaned table and fit dose-response curves per compound group.
    Fit(FitArgs),
    /// Run QC then fitting, writing every output into one directory.
    Run(RunArgs),
}

/// Outlier filter options shared by `qc` and `run`.
#[derive(Debug, Args, Clone)]
pub struct CutoffArgs {
    /// Controls outside mean +/- cutoff * std (population) are outliers.
    #[arg(long, env = "DOSE_CUTOFF", default_value_t = DEFAULT_STD_CUTOFF)]
    pub cutoff: f64,
}

/// Curve-fit options shared by `fit` and `run`.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Curve-fit algorithm (case-insensitive).
    #[arg(long, env = "DOSE_MODEL", default_value = DEFAULT_MODEL_NAME)]
    pub model: String,
}

#[derive(Debug, Args, Clone)]
pub struct QcArgs {
    /// Joined measurement table (CSV).
    #[arg(long, env = "DOSE_JOINED", value_name = "CSV")]
    pub joined: PathBuf,

    /// QC report output (delimited text); an `.html` twin is written alongside.
    #[arg(long, env = "DOSE_REPORT", value_name = "CSV")]
    pub report: PathBuf,

    /// Cleaned table output (CSV).
    #[arg(long, env = "DOSE_CLEANED", value_name = "CSV")]
    pub cleaned: PathBuf,

    #[command(flatten)]
    pub cutoff: CutoffArgs,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Cleaned measurement table (CSV), e.g. the output of `dose qc`.
    #[arg(long, env = "DOSE_DATA", value_name = "CSV")]
    pub data: PathBuf,

    /// Output directory for `dataNorm.csv` and per-group artifacts.
    #[arg(long, env = "DOSE_OPATH", value_name = "DIR")]
    pub opath: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Joined measurement table (CSV).
    #[arg(long, env = "DOSE_JOINED", value_name = "CSV")]
    pub joined: PathBuf,

    /// Output directory for all reports, tables and artifacts.
    #[arg(long, env = "DOSE_OPATH", value_name = "DIR")]
    pub opath: PathBuf,

    #[command(flatten)]
    pub cutoff: CutoffArgs,

    #[command(flatten)]
    pub model: ModelArgs,
}
