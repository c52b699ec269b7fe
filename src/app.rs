//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - initialises logging
//! - validates the run configuration before touching any file
//! - runs the pipeline stages and writes their outputs

use std::path::Path;

use chrono::Local;
use clap::Parser;
use log::info;

use crate::cli::{Cli, Command, FitArgs, QcArgs, RunArgs};
use crate::domain::{DEFAULT_MODEL_NAME, DEFAULT_STD_CUTOFF, PipelineConfig};
use crate::error::AppError;
use crate::io::{ensure_dir, read_measurements, write_all_artifacts, write_normalized_csv, write_qc_report, write_table_csv};
use crate::report::format_run_summary;

pub mod pipeline;

use pipeline::{CLEANED_FILE, FitStage, NORMALIZED_FILE, QC_REPORT_FILE, run_fit_stage, run_qc_stage};

/// Entry point for the `dose` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging();
    execute(cli)
}

/// Run one parsed command.
pub fn execute(cli: Cli) -> Result<(), AppError> {
    let started = Local::now();
    info!("dose started at {}", started.format("%Y-%m-%d %H:%M:%S"));

    let result = match cli.command {
        Command::Qc(args) => handle_qc(args),
        Command::Fit(args) => handle_fit(args),
        Command::Run(args) => handle_run(args),
    };

    let finished = Local::now();
    info!(
        "dose finished at {} ({} ms)",
        finished.format("%Y-%m-%d %H:%M:%S"),
        (finished - started).num_milliseconds()
    );
    result
}

fn init_logging() {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    // A logger may already be installed when embedded; keep the existing one.
    let _ = pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .try_init();
}

fn handle_qc(args: QcArgs) -> Result<(), AppError> {
    let config = PipelineConfig::new(args.cutoff.cutoff, DEFAULT_MODEL_NAME)?;

    let table = read_measurements(&args.joined)?;
    let stage = run_qc_stage(&table, &config)?;

    write_table_csv(&args.cleaned, &stage.qc.cleaned)?;
    write_qc_report(&args.report, &stage.report)?;

    println!("{}", format_run_summary(&stage.qc.records, &[], &config));
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = PipelineConfig::new(DEFAULT_STD_CUTOFF, &args.model.model)?;

    let table = read_measurements(&args.data)?;
    let stage = run_fit_stage(&table, &config)?;
    write_fit_outputs(&args.opath, &stage)?;

    println!("{}", format_run_summary(&[], &stage.reports, &config));
    Ok(())
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = PipelineConfig::new(args.cutoff.cutoff, &args.model.model)?;

    let table = read_measurements(&args.joined)?;
    ensure_dir(&args.opath)?;

    let qc = run_qc_stage(&table, &config)?;
    write_table_csv(&args.opath.join(CLEANED_FILE), &qc.qc.cleaned)?;
    write_qc_report(&args.opath.join(QC_REPORT_FILE), &qc.report)?;

    let fit = run_fit_stage(&qc.qc.cleaned, &config)?;
    write_fit_outputs(&args.opath, &fit)?;

    println!("{}", format_run_summary(&qc.qc.records, &fit.reports, &config));
    Ok(())
}

fn write_fit_outputs(opath: &Path, stage: &FitStage) -> Result<(), AppError> {
    ensure_dir(opath)?;
    write_normalized_csv(&opath.join(NORMALIZED_FILE), &stage.normalized)?;
    let written = write_all_artifacts(opath, &stage.reports)?;
    info!("Wrote {} group artifact pair(s) to '{}'", written.len(), opath.display());
    Ok(())
}

