//! The extraction dispatcher: load → extract → analyze → x-axis → save.
//!
//! The dispatcher holds no measurement state. Every operation takes its
//! inputs explicitly and returns its result; the caller threads the trace,
//! pulses and analysis result from one call to the next.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use log::{debug, info, warn};

use crate::analysis::{PulseAnalyzer, StandardPulseAnalysis};
use crate::data::loader::{self, LoadOptions};
use crate::data::model::{AnalysisResult, LaserPulseSet, Parameters, RawTrace};
use crate::error::{DimensionError, DispatchError};
use crate::extraction::{ExtractionParams, PulseExtractor, StandardPulseExtraction};
use crate::save::plot::draw_figure;
use crate::save::{FileSaveLogic, SaveLogic, SavedFiles, Series};

/// Folder name used below the save root.
pub const MODULE_NAME: &str = "PulsedExtraction";

/// Canonical tags of the supported extraction methods.
pub const SUPPORTED_METHODS: [&str; 3] = ["niko", "threshold", "legacy"];

// ---------------------------------------------------------------------------
// Method tags
// ---------------------------------------------------------------------------

/// A recognized extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Ungated extraction: equal segments.
    Niko,
    /// Threshold crossing.
    Threshold,
    /// Fixed windows of increasing length.
    Legacy,
}

impl ExtractionMethod {
    /// Parse a method tag. Besides the canonical tags, `treshold` and `old`
    /// are understood; matching ignores case.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "niko" => Some(ExtractionMethod::Niko),
            "threshold" | "treshold" => Some(ExtractionMethod::Threshold),
            "legacy" | "old" => Some(ExtractionMethod::Legacy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Niko => "niko",
            ExtractionMethod::Threshold => "threshold",
            ExtractionMethod::Legacy => "legacy",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`ExtractionDispatcher::extract`].
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Pulses(LaserPulseSet),
    /// The tag named no known method; nothing was extracted.
    Unsupported { method: String },
}

impl Extraction {
    pub fn pulses(&self) -> Option<&LaserPulseSet> {
        match self {
            Extraction::Pulses(p) => Some(p),
            Extraction::Unsupported { .. } => None,
        }
    }

    pub fn into_pulses(self) -> Option<LaserPulseSet> {
        match self {
            Extraction::Pulses(p) => Some(p),
            Extraction::Unsupported { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The three components the dispatcher delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn PulseExtractor>,
    pub analyzer: Arc<dyn PulseAnalyzer>,
    pub saver: Arc<dyn SaveLogic>,
}

impl Collaborators {
    /// The implementations shipped with the crate, saving below `save_root`.
    pub fn standard(save_root: impl Into<PathBuf>) -> Self {
        Self {
            extractor: Arc::new(StandardPulseExtraction),
            analyzer: Arc::new(StandardPulseAnalysis),
            saver: Arc::new(FileSaveLogic::new(save_root)),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Save inputs
// ---------------------------------------------------------------------------

/// Acquisition metadata written into the parameter block.
#[derive(Debug, Clone)]
pub struct SaveMetadata {
    pub start: DateTime<Local>,
    pub stop: DateTime<Local>,
    pub count_frequency: f64,
    pub oversampling: usize,
    pub smooth_window_length: usize,
}

/// Where and how to save.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Target directory; the dated module folder when `None`.
    pub directory: Option<PathBuf>,
    pub file_label: String,
    pub as_text: bool,
    /// Results come from an alternating sequence.
    pub alternating: bool,
    pub with_figure: bool,
    pub x_label: String,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            directory: None,
            file_label: "result".to_string(),
            as_text: true,
            alternating: false,
            with_figure: true,
            x_label: "Time (s)".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExtractionDispatcher
// ---------------------------------------------------------------------------

/// Selects an extraction strategy, forwards pulses to analysis and saves
/// the outcome.
#[derive(Debug)]
pub struct ExtractionDispatcher {
    collaborators: Collaborators,
    threadlock: Mutex<()>,
}

impl ExtractionDispatcher {
    /// Bind the collaborators; the dispatcher is active from here on.
    pub fn activate(collaborators: Collaborators) -> Self {
        info!("extraction dispatcher activated");
        Self {
            collaborators,
            threadlock: Mutex::new(()),
        }
    }

    /// Release the collaborators.
    pub fn deactivate(self) -> Collaborators {
        info!("extraction dispatcher deactivated");
        self.collaborators
    }

    /// Capability listing for UI population.
    pub fn get_supported_methods() -> [&'static str; 3] {
        SUPPORTED_METHODS
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.threadlock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a whitespace-separated trace file.
    pub fn load(
        &self,
        header_lines: usize,
        columns: &BTreeSet<usize>,
        path: &Path,
    ) -> Result<RawTrace, DispatchError> {
        let _guard = self.lock();
        Ok(loader::load(header_lines, columns, path)?)
    }

    /// Load with explicit options (e.g. a non-whitespace delimiter).
    pub fn load_with(&self, path: &Path, options: &LoadOptions) -> Result<RawTrace, DispatchError> {
        let _guard = self.lock();
        Ok(loader::load_trace(path, options)?)
    }

    /// Run the extraction strategy named by `method` on the counts of
    /// `trace`.
    ///
    /// An unknown tag is not an error: it logs a warning and yields
    /// [`Extraction::Unsupported`].
    pub fn extract(
        &self,
        trace: &RawTrace,
        method: &str,
        drop_first: bool,
        params: &ExtractionParams,
    ) -> Result<Extraction, DispatchError> {
        let Some(kind) = ExtractionMethod::from_tag(method) else {
            warn!("extraction method '{method}' is not implemented");
            return Ok(Extraction::Unsupported {
                method: method.to_string(),
            });
        };

        let counts = trace.counts();
        let extractor = &self.collaborators.extractor;
        let _guard = self.lock();

        let pulses = match kind {
            ExtractionMethod::Niko => {
                let number_of_lasers = require(params.number_of_lasers, kind, "number_of_lasers")?;
                let conversion_factor = require(params.conversion_factor, kind, "conversion_factor")?;
                extractor.ungated_extraction(&counts, conversion_factor, number_of_lasers)?
            }
            ExtractionMethod::Threshold => {
                let count_threshold = require(params.count_threshold, kind, "count_threshold")?;
                let min_laser_length = require(params.min_laser_length, kind, "min_laser_length")?;
                let exception_policy = require(params.exception_policy, kind, "exception_policy")?;
                extractor.extract_laser_pulses(&counts, count_threshold, min_laser_length, exception_policy)?
            }
            ExtractionMethod::Legacy => {
                let aom_delay = require(params.aom_delay, kind, "aom_delay")?;
                let initial_offset = require(params.initial_offset, kind, "initial_offset")?;
                let initial_length = require(params.initial_length, kind, "initial_length")?;
                let increment_length = require(params.increment_length, kind, "increment_length")?;
                extractor.excise_laser_pulses(
                    &counts,
                    aom_delay,
                    initial_offset,
                    initial_length,
                    increment_length,
                )?
            }
        };

        let pulses = if drop_first {
            pulses.drop_first()?
        } else {
            pulses
        };
        debug!("{kind} extraction returned {} pulses", pulses.len());
        Ok(Extraction::Pulses(pulses))
    }

    pub fn pulse_count(&self, pulses: &LaserPulseSet) -> usize {
        pulses.len()
    }

    pub fn sum_pulses(&self, pulses: &LaserPulseSet) -> Result<Vec<f64>, DimensionError> {
        sum_pulses(pulses)
    }

    /// Delegate to the analysis collaborator. Window validation is the
    /// analyzer's job.
    pub fn analyze(
        &self,
        pulses: &LaserPulseSet,
        norm_start: usize,
        norm_end: usize,
        signal_start: usize,
        signal_end: usize,
    ) -> Result<AnalysisResult, DispatchError> {
        let _guard = self.lock();
        let result = self.collaborators.analyzer.analyze_data(
            pulses,
            norm_start,
            norm_end,
            signal_start,
            signal_end,
        )?;
        Ok(result)
    }

    pub fn compute_x_axis(&self, signal: &[f64], start: f64, increment: f64, alternating: bool) -> Vec<f64> {
        compute_x_axis(signal, start, increment, alternating)
    }

    /// Write x-axis, signal and error with the acquisition parameter block
    /// and, optionally, a rendered figure.
    ///
    /// In alternating mode the two interleaved sub-sequences are written as
    /// separate signal/error columns next to the shared x-axis.
    pub fn save_results(
        &self,
        results: &AnalysisResult,
        x_axis: &[f64],
        metadata: &SaveMetadata,
        options: &SaveOptions,
    ) -> Result<SavedFiles, DispatchError> {
        let mut parameters = Parameters::new();
        parameters.insert("Start counting time (s)", metadata.start);
        parameters.insert("Stop counting time (s)", metadata.stop);
        parameters.insert("Count frequency (Hz)", metadata.count_frequency);
        parameters.insert("Oversampling (Samples)", metadata.oversampling);
        parameters.insert(
            "Smooth Window Length (# of events)",
            metadata.smooth_window_length,
        );

        let data = result_columns(results, x_axis, options);
        let figure = options.with_figure.then(|| {
            draw_figure(
                x_axis,
                results.signal(),
                results.measuring_error(),
                options.alternating,
            )
        });

        let saver = &self.collaborators.saver;
        let _guard = self.lock();
        let directory = match &options.directory {
            Some(dir) => dir.clone(),
            None => saver.get_path_for_module(MODULE_NAME)?,
        };
        let files = saver.save_data(
            &data,
            &directory,
            &parameters,
            &options.file_label,
            options.as_text,
            figure.as_ref(),
        )?;
        Ok(files)
    }
}

fn require<T>(value: Option<T>, method: ExtractionMethod, parameter: &'static str) -> Result<T, DispatchError> {
    value.ok_or(DispatchError::MissingParameter {
        method: method.as_str(),
        parameter,
    })
}

fn result_columns(results: &AnalysisResult, x_axis: &[f64], options: &SaveOptions) -> Vec<Series> {
    let mut data: Vec<Series> = vec![(options.x_label.clone(), x_axis.to_vec())];
    if options.alternating {
        let half = results.len() / 2;
        if results.len() % 2 == 1 {
            warn!(
                "alternating result has an odd number of values ({}); the last one is not saved",
                results.len()
            );
        }
        let pick = |values: &[f64], parity: usize| -> Vec<f64> {
            (0..half).map(|k| values[2 * k + parity]).collect()
        };
        for parity in 0..2 {
            let n = parity + 1;
            data.push((format!("Signal {n} (a.u.)"), pick(results.signal(), parity)));
            data.push((
                format!("Measuring error {n} (a.u.)"),
                pick(results.measuring_error(), parity),
            ));
        }
    } else {
        data.push(("Signal (a.u.)".to_string(), results.signal().to_vec()));
        data.push((
            "Measuring error (a.u.)".to_string(),
            results.measuring_error().to_vec(),
        ));
    }
    data
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Column-wise sum across all pulses. Pulses shorter than the longest one
/// contribute nothing to the bins they lack.
pub fn sum_pulses(pulses: &LaserPulseSet) -> Result<Vec<f64>, DimensionError> {
    if pulses.is_empty() {
        return Err(DimensionError::NoPulses);
    }
    let mut sum = vec![0.0; pulses.max_bins()];
    for pulse in &pulses.pulses {
        for (acc, v) in sum.iter_mut().zip(pulse) {
            *acc += v;
        }
    }
    Ok(sum)
}

/// `start + i * increment` for every signal value, or for every pair of
/// values when `alternating`.
pub fn compute_x_axis(signal: &[f64], start: f64, increment: f64, alternating: bool) -> Vec<f64> {
    let n = if alternating {
        signal.len() / 2
    } else {
        signal.len()
    };
    (0..n).map(|i| start + i as f64 * increment).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExceptionPolicy;
    use tempfile::TempDir;

    fn dispatcher(root: &TempDir) -> ExtractionDispatcher {
        ExtractionDispatcher::activate(Collaborators::standard(root.path()))
    }

    fn trace(counts: &[f64]) -> RawTrace {
        RawTrace {
            columns: vec![0, 1],
            rows: counts
                .iter()
                .enumerate()
                .map(|(i, &c)| vec![i as f64, c])
                .collect(),
        }
    }

    #[test]
    fn method_tags_and_aliases() {
        assert_eq!(ExtractionMethod::from_tag("niko"), Some(ExtractionMethod::Niko));
        assert_eq!(ExtractionMethod::from_tag("Niko"), Some(ExtractionMethod::Niko));
        assert_eq!(
            ExtractionMethod::from_tag("treshold"),
            Some(ExtractionMethod::Threshold)
        );
        assert_eq!(ExtractionMethod::from_tag("old"), Some(ExtractionMethod::Legacy));
        assert_eq!(ExtractionMethod::from_tag("bogus"), None);
        assert_eq!(
            ExtractionDispatcher::get_supported_methods(),
            ["niko", "threshold", "legacy"]
        );
        for tag in SUPPORTED_METHODS {
            assert_eq!(ExtractionMethod::from_tag(tag).map(|m| m.as_str()), Some(tag));
        }
    }

    #[test]
    fn unknown_method_is_unsupported_not_an_error() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root);
        let out = d
            .extract(&trace(&[1.0; 10]), "bogus", true, &ExtractionParams::default())
            .unwrap();
        assert_eq!(
            out,
            Extraction::Unsupported {
                method: "bogus".to_string()
            }
        );
        assert!(out.pulses().is_none());
    }

    #[test]
    fn niko_uses_counts_column() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root);
        let counts: Vec<f64> = (0..8).map(f64::from).collect();
        let pulses = d
            .extract(&trace(&counts), "niko", false, &ExtractionParams::niko(2, 1.0))
            .unwrap()
            .into_pulses()
            .unwrap();
        assert_eq!(pulses.pulses, vec![vec![0.0, 1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0, 7.0]]);
    }

    #[test]
    fn threshold_with_drop_first() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root);
        let counts = [0.0, 5.0, 5.0, 0.0, 6.0, 6.0, 0.0];
        let params = ExtractionParams::threshold(1.0, 2, ExceptionPolicy::Discard);
        let pulses = d
            .extract(&trace(&counts), "threshold", true, &params)
            .unwrap()
            .into_pulses()
            .unwrap();
        assert_eq!(d.pulse_count(&pulses), 1);
        assert_eq!(pulses.pulses[0], vec![6.0, 6.0]);
    }

    #[test]
    fn drop_first_on_empty_extraction_fails() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root);
        let params = ExtractionParams::threshold(10.0, 1, ExceptionPolicy::Discard);
        let err = d
            .extract(&trace(&[0.0; 5]), "threshold", true, &params)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Dimension(DimensionError::NoPulses)));
    }

    #[test]
    fn missing_parameter_is_reported() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root);
        let params = ExtractionParams {
            initial_length: Some(3),
            ..ExtractionParams::default()
        };
        let err = d.extract(&trace(&[1.0; 10]), "legacy", false, &params).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::MissingParameter {
                method: "legacy",
                parameter: "aom_delay"
            }
        ));
    }

    #[test]
    fn sum_pulses_is_column_wise() {
        let set = LaserPulseSet::new(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(sum_pulses(&set).unwrap(), vec![5.0, 7.0, 9.0]);

        let ragged = LaserPulseSet::new(vec![vec![1.0], vec![1.0, 2.0]]);
        assert_eq!(sum_pulses(&ragged).unwrap(), vec![2.0, 2.0]);

        assert_eq!(
            sum_pulses(&LaserPulseSet::default()),
            Err(DimensionError::NoPulses)
        );
    }

    #[test]
    fn x_axis_is_linear_in_index() {
        let signal = [0.0; 5];
        assert_eq!(compute_x_axis(&signal, 1.0, 0.5, false), vec![1.0, 1.5, 2.0, 2.5, 3.0]);
        assert_eq!(compute_x_axis(&signal, 1.0, 0.5, true), vec![1.0, 1.5]);
        assert!(compute_x_axis(&[], 1.0, 0.5, false).is_empty());
        assert!(compute_x_axis(&[], 1.0, 0.5, true).is_empty());
        assert!(compute_x_axis(&[3.0], 0.0, 1.0, true).is_empty());
    }

    #[test]
    fn alternating_columns_split_by_parity() {
        let results = AnalysisResult::new(vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![0.1; 5]).unwrap();
        let x = compute_x_axis(results.signal(), 0.0, 1.0, true);
        let options = SaveOptions {
            alternating: true,
            ..SaveOptions::default()
        };
        let cols = result_columns(&results, &x, &options);
        assert_eq!(cols.len(), 5);
        assert_eq!(cols[1], ("Signal 1 (a.u.)".to_string(), vec![1.0, 3.0]));
        assert_eq!(cols[3], ("Signal 2 (a.u.)".to_string(), vec![2.0, 4.0]));
        // the unpaired fifth value has no partner and is left out
        assert!(cols.iter().all(|(_, values)| values.len() == 2));
        assert!(cols.iter().skip(1).all(|(_, values)| !values.contains(&5.0)));
    }

    #[test]
    fn deactivate_releases_collaborators() {
        let root = TempDir::new().unwrap();
        let d = dispatcher(&root);
        let collaborators = d.deactivate();
        let again = ExtractionDispatcher::activate(collaborators);
        assert!(again.sum_pulses(&LaserPulseSet::default()).is_err());
    }
}
