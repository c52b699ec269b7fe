//! End-to-end runs of the `dose` commands against files in a temp directory.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

use dose_curves::app::execute;
use dose_curves::cli::Cli;
use dose_curves::domain::{Measurement, MeasurementTable};
use dose_curves::error::ErrorKind;
use dose_curves::io::read_fit_json;
use dose_curves::qc::run_qc;
use dose_curves::report::assemble_qc_report;

const HEADER: &str = "Plate_ID,row,col,well,chem_ID,chem_M,value";
const CONCENTRATIONS: [f64; 3] = [1e-8, 1e-7, 1e-6];

/// Two plates, one compound each in row 2, three concentrations in duplicate,
/// eight negative controls per plate. Signals carry seeded Gaussian noise.
fn two_plate_csv(seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.5).unwrap();

    let mut lines = vec![HEADER.to_string()];
    for (plate, chem, baseline) in [("P1", "O-44", 1000.0), ("P2", "O-44", 800.0)] {
        for col in 1..=8 {
            let v: f64 = baseline + rng.sample(noise);
            lines.push(format!("{plate},2,{col},B{col},,NA,{v}"));
        }
        for (i, conc) in CONCENTRATIONS.iter().enumerate() {
            for rep in 0..2 {
                let col = 9 + 2 * i + rep;
                let v: f64 = baseline * (1.0 - 0.3 * i as f64) + rng.sample(noise);
                lines.push(format!("{plate},2,{col},B{col},{chem},{conc},{v}"));
            }
        }
    }
    lines.join("\n") + "\n"
}

fn write_input(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["dose"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn run_writes_every_output_for_two_plates() {
    let dir = tempfile::tempdir().unwrap();
    let joined = write_input(dir.path(), "joined.csv", &two_plate_csv(7));
    let out = dir.path().join("out");

    execute(cli(&[
        "run",
        "--joined",
        joined.to_str().unwrap(),
        "--opath",
        out.to_str().unwrap(),
    ]))
    .unwrap();

    let report = fs::read_to_string(out.join("qc_report.csv")).unwrap();
    assert_eq!(report.matches("Percentage of outliers in the negative controls").count(), 2);
    assert!(report.find("P1").unwrap() < report.find("P2").unwrap());
    let html = fs::read_to_string(out.join("qc_report.html")).unwrap();
    assert_eq!(html.matches("<hr>").count(), 1);

    // Eight controls can never sit 3 population SDs from their mean.
    let cleaned = fs::read_to_string(out.join("cleaned.csv")).unwrap();
    assert_eq!(cleaned.lines().count(), 1 + 2 * (8 + 6));
    assert!(cleaned.starts_with(HEADER));

    let norm = fs::read_to_string(out.join("dataNorm.csv")).unwrap();
    let mut lines = norm.lines();
    assert_eq!(lines.next(), Some("Plate_ID,row,chem_ID,chem_M,value,valueNorm"));
    assert_eq!(lines.count(), 6);

    for plate in ["P1", "P2"] {
        let stem = format!("O-44_{plate}_2_LOWESS");
        assert!(out.join(format!("{stem}.svg")).exists());
        let artifact = read_fit_json(&out.join(format!("{stem}.json"))).unwrap();
        assert_eq!(artifact.production.len(), 3);
        assert_eq!(artifact.reference.len(), 3);
        assert_eq!(artifact.production.x, CONCENTRATIONS.to_vec());
        // Roughly 0, -0.3, -0.6 of the plate baseline.
        assert!(artifact.scatter.y[0].abs() < 0.05);
        assert!((artifact.scatter.y[2] + 0.6).abs() < 0.05);
    }
}

#[test]
fn qc_then_fit_matches_run() {
    let dir = tempfile::tempdir().unwrap();
    let joined = write_input(dir.path(), "joined.csv", &two_plate_csv(11));
    let report = dir.path().join("qc.csv");
    let cleaned = dir.path().join("clean.csv");
    let out = dir.path().join("fits");

    execute(cli(&[
        "qc",
        "--joined",
        joined.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
        "--cleaned",
        cleaned.to_str().unwrap(),
    ]))
    .unwrap();
    assert!(dir.path().join("qc.html").exists());

    execute(cli(&[
        "fit",
        "--data",
        cleaned.to_str().unwrap(),
        "--opath",
        out.to_str().unwrap(),
        "--model",
        "lowess",
    ]))
    .unwrap();

    let run_out = dir.path().join("run");
    execute(cli(&[
        "run",
        "--joined",
        joined.to_str().unwrap(),
        "--opath",
        run_out.to_str().unwrap(),
    ]))
    .unwrap();

    assert_eq!(
        fs::read_to_string(out.join("dataNorm.csv")).unwrap(),
        fs::read_to_string(run_out.join("dataNorm.csv")).unwrap()
    );
}

#[test]
fn single_extreme_control_is_not_an_outlier_with_four_wells() {
    let table = MeasurementTable::new(vec![
        Measurement::control("P1", "1", 10.0),
        Measurement::control("P1", "1", 10.0),
        Measurement::control("P1", "1", 10.0),
        Measurement::control("P1", "1", 100.0),
        Measurement::drug("P1", "1", "O-1", 1e-6, 5.0),
    ]);

    let out = run_qc(&table, 3.0).unwrap();
    let record = &out.records[0];
    assert!((record.bounds.upper - 149.4134295108992).abs() < 1e-9);
    assert!((record.bounds.lower + 84.4134295108992).abs() < 1e-9);
    assert_eq!(record.n_outliers, 0);
    assert_eq!(out.cleaned.len(), 5);

    let report = assemble_qc_report(&out.records, table.columns()).unwrap();
    assert!(report.text.contains("negative controls: 0.00%"));
}

#[test]
fn flagged_control_is_reported_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let mut lines = vec![HEADER.to_string()];
    for (col, v) in [10.0, 11.0, 9.0, 10.5, 9.5, 10.0, 10.2, 9.8, 10.1, 9.9, 10.0, 60.0].iter().enumerate() {
        lines.push(format!("P1,1,{},A{},NA,NA,{v}", col + 1, col + 1));
    }
    lines.push("P1,1,13,A13,O-1,1e-6,5".to_string());
    let joined = write_input(dir.path(), "joined.csv", &(lines.join("\n") + "\n"));
    let report = dir.path().join("qc.csv");
    let cleaned = dir.path().join("clean.csv");

    execute(cli(&[
        "qc",
        "--joined",
        joined.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
        "--cleaned",
        cleaned.to_str().unwrap(),
        "--cutoff",
        "3",
    ]))
    .unwrap();

    let text = fs::read_to_string(&report).unwrap();
    assert!(text.contains("negative controls: 8.33%"));
    assert!(text.contains("P1,1,12,A12,NA,NA,60"));

    let kept = fs::read_to_string(&cleaned).unwrap();
    assert!(!kept.contains("A12,"));
    assert_eq!(kept.lines().count(), 1 + 12);
}

#[test]
fn unsupported_model_fails_before_any_io() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    let err = execute(cli(&[
        "run",
        "--joined",
        "/nonexistent/joined.csv",
        "--opath",
        out.to_str().unwrap(),
        "--model",
        "spline",
    ]))
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedModel);
    assert!(err.message().contains("spline"));
    assert!(!out.exists());
}

#[test]
fn invalid_cutoff_is_a_configuration_error() {
    let err = execute(cli(&[
        "qc",
        "--joined",
        "/nonexistent/joined.csv",
        "--report",
        "/nonexistent/qc.csv",
        "--cleaned",
        "/nonexistent/clean.csv",
        "--cutoff",
        "0",
    ]))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn drug_row_without_controls_aborts_the_fit() {
    let dir = tempfile::tempdir().unwrap();
    let csv = format!(
        "{HEADER}\nP1,1,1,A1,,,100\nP1,1,2,A2,,,102\nP1,1,3,A3,O-1,1e-7,90\nP1,1,4,A4,O-1,1e-6,80\n\
         P1,3,1,C1,O-3,1e-7,50\nP1,3,2,C2,O-3,1e-6,40\n"
    );
    let data = write_input(dir.path(), "clean.csv", &csv);

    let err = execute(cli(&[
        "fit",
        "--data",
        data.to_str().unwrap(),
        "--opath",
        dir.path().join("out").to_str().unwrap(),
    ]))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyGroup);
    assert!(err.message().contains("row '3'"));
    assert_eq!(err.exit_code(), 3);
}
