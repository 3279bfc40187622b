use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use tempfile::TempDir;

use pulsed_extraction::data::model::AnalysisResult;
use pulsed_extraction::extraction::ExtractionParams;
use pulsed_extraction::{
    Collaborators, DispatchError, Extraction, ExtractionDispatcher, SaveMetadata, SaveOptions,
};

/// Three header lines, then `rows` lines of `time counts`.
fn write_trace(dir: &Path, rows: usize) -> PathBuf {
    let mut text = String::new();
    writeln!(text, "# synthetic trace").unwrap();
    writeln!(text, "# bin width 1 ns").unwrap();
    writeln!(text, "time counts").unwrap();
    for i in 0..rows {
        writeln!(text, "{i} {}", 10 + i % 7).unwrap();
    }
    let path = dir.join("trace.dat");
    std::fs::write(&path, text).unwrap();
    path
}

fn dispatcher(root: &Path) -> ExtractionDispatcher {
    ExtractionDispatcher::activate(Collaborators::standard(root))
}

#[test]
fn reload_yields_identical_matrix() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(dir.path(), 100);
    let d = dispatcher(dir.path());
    let columns = BTreeSet::from([0, 1]);

    let first = d.load(3, &columns, &path).unwrap();
    let second = d.load(3, &columns, &path).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.n_rows(), 100);
    assert_eq!(first.n_columns(), 2);
}

#[test]
fn missing_file_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let d = dispatcher(dir.path());
    let err = d
        .load(3, &BTreeSet::from([0]), &dir.path().join("absent.dat"))
        .unwrap_err();
    assert!(matches!(err, DispatchError::Load(_)));
}

fn legacy_pipeline(drop_first: bool) -> (usize, AnalysisResult) {
    let dir = TempDir::new().unwrap();
    let path = write_trace(dir.path(), 100);
    let d = dispatcher(dir.path());

    let trace = d.load(3, &BTreeSet::from([0, 1]), &path).unwrap();
    let params = ExtractionParams::legacy(0, 0, 10, 5);
    let pulses = d
        .extract(&trace, "legacy", drop_first, &params)
        .unwrap()
        .into_pulses()
        .unwrap();

    let lengths: Vec<usize> = pulses.pulses.iter().map(Vec::len).collect();
    let expected: Vec<usize> = if drop_first {
        vec![15, 20, 25, 30]
    } else {
        vec![10, 15, 20, 25, 30]
    };
    assert_eq!(lengths, expected);
    for pair in lengths.windows(2) {
        assert_eq!(pair[1] - pair[0], 5);
    }

    let results = d.analyze(&pulses, 0, 5, 5, 10).unwrap();
    (d.pulse_count(&pulses), results)
}

#[test]
fn legacy_end_to_end() {
    let (count, results) = legacy_pipeline(false);
    assert_eq!(count, 5);
    assert_eq!(results.signal().len(), 5);
    assert_eq!(results.measuring_error().len(), 5);
    assert!(results.signal().iter().all(|s| s.is_finite() && *s > 0.0));
}

#[test]
fn legacy_end_to_end_dropping_first_pulse() {
    let (count, results) = legacy_pipeline(true);
    assert_eq!(count, 4);
    assert_eq!(results.len(), 4);
}

#[test]
fn bogus_method_returns_no_pulses() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(dir.path(), 20);
    let d = dispatcher(dir.path());
    let trace = d.load(3, &BTreeSet::from([1]), &path).unwrap();
    let out = d
        .extract(&trace, "bogus", false, &ExtractionParams::default())
        .unwrap();
    assert!(matches!(out, Extraction::Unsupported { .. }));
}

#[test]
fn analysis_window_outside_pulse_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(dir.path(), 40);
    let d = dispatcher(dir.path());
    let trace = d.load(3, &BTreeSet::from([1]), &path).unwrap();
    let pulses = d
        .extract(&trace, "niko", false, &ExtractionParams::niko(4, 1.0))
        .unwrap()
        .into_pulses()
        .unwrap();
    assert_eq!(d.sum_pulses(&pulses).unwrap().len(), 10);

    let err = d.analyze(&pulses, 0, 5, 5, 11).unwrap_err();
    assert!(matches!(err, DispatchError::Analysis(_)));
}

#[test]
fn results_are_saved_with_parameters_and_figure() {
    let dir = TempDir::new().unwrap();
    let (_, results) = legacy_pipeline(false);
    let d = dispatcher(dir.path());
    let x = d.compute_x_axis(results.signal(), 0.0, 2.5, false);
    assert_eq!(x, vec![0.0, 2.5, 5.0, 7.5, 10.0]);

    let metadata = SaveMetadata {
        start: Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        stop: Local.with_ymd_and_hms(2024, 1, 2, 3, 14, 5).unwrap(),
        count_frequency: 100.0,
        oversampling: 2,
        smooth_window_length: 10,
    };
    let options = SaveOptions {
        directory: Some(dir.path().join("out")),
        ..SaveOptions::default()
    };
    let files = d.save_results(&results, &x, &metadata, &options).unwrap();

    let text = std::fs::read_to_string(&files.data).unwrap();
    assert!(text.contains("# Start counting time (s): 02.01.2024 03h:04min:05s"));
    assert!(text.contains("# Stop counting time (s): 02.01.2024 03h:14min:05s"));
    assert!(text.contains("# Smooth Window Length (# of events): 10"));
    assert!(text.contains("# Time (s)\tSignal (a.u.)\tMeasuring error (a.u.)"));
    let data_rows = text.lines().filter(|l| !l.starts_with('#')).count();
    assert_eq!(data_rows, 5);
    assert!(files.figure.unwrap().exists());
}

#[test]
fn x_axis_mismatch_is_rejected_on_save() {
    let dir = TempDir::new().unwrap();
    let (_, results) = legacy_pipeline(false);
    let d = dispatcher(dir.path());
    let metadata = SaveMetadata {
        start: Local::now(),
        stop: Local::now(),
        count_frequency: 1.0,
        oversampling: 1,
        smooth_window_length: 1,
    };
    let options = SaveOptions {
        directory: Some(dir.path().to_path_buf()),
        with_figure: false,
        ..SaveOptions::default()
    };
    let err = d
        .save_results(&results, &[0.0, 1.0], &metadata, &options)
        .unwrap_err();
    assert!(matches!(err, DispatchError::Save(_)));
}
