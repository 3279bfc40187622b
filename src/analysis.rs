//! Signal analysis of extracted pulses.

use log::warn;

use crate::data::model::{AnalysisResult, LaserPulseSet};
use crate::error::AnalysisError;

/// Turns a pulse set into one signal value (and its error) per pulse.
pub trait PulseAnalyzer: Send + Sync {
    /// `norm_start..norm_end` is the baseline window and
    /// `signal_start..signal_end` the measured window, both in bins of each
    /// pulse row.
    fn analyze_data(
        &self,
        pulses: &LaserPulseSet,
        norm_start: usize,
        norm_end: usize,
        signal_start: usize,
        signal_end: usize,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// Ratio of the signal-window mean to the normalization-window mean, with a
/// Poissonian error estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPulseAnalysis;

impl PulseAnalyzer for StandardPulseAnalysis {
    fn analyze_data(
        &self,
        pulses: &LaserPulseSet,
        norm_start: usize,
        norm_end: usize,
        signal_start: usize,
        signal_end: usize,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut signal = Vec::with_capacity(pulses.len());
        let mut measuring_error = Vec::with_capacity(pulses.len());

        for (idx, pulse) in pulses.pulses.iter().enumerate() {
            let windows_fit = norm_start < norm_end
                && norm_end <= signal_start
                && signal_start < signal_end
                && signal_end <= pulse.len();
            if !windows_fit {
                return Err(AnalysisError::Window {
                    pulse: idx,
                    bins: pulse.len(),
                    norm_start,
                    norm_end,
                    signal_start,
                    signal_end,
                });
            }

            let norm_area: f64 = pulse[norm_start..norm_end].iter().sum();
            let signal_area: f64 = pulse[signal_start..signal_end].iter().sum();
            if norm_area == 0.0 || signal_area == 0.0 {
                warn!("pulse {idx}: empty normalization or signal window, result is NaN");
                signal.push(f64::NAN);
                measuring_error.push(f64::NAN);
                continue;
            }

            let norm_mean = norm_area / (norm_end - norm_start) as f64;
            let signal_mean = signal_area / (signal_end - signal_start) as f64;
            let value = signal_mean / norm_mean;
            signal.push(value);
            measuring_error.push(value.abs() * (1.0 / signal_area.abs() + 1.0 / norm_area.abs()).sqrt());
        }

        Ok(AnalysisResult::new(signal, measuring_error)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_and_poisson_error() {
        let pulses = LaserPulseSet::new(vec![vec![2.0, 2.0, 4.0, 4.0]]);
        let r = StandardPulseAnalysis
            .analyze_data(&pulses, 0, 2, 2, 4)
            .unwrap();
        assert_eq!(r.signal(), &[2.0]);
        let expected = 2.0 * (1.0_f64 / 8.0 + 1.0 / 4.0).sqrt();
        assert!((r.measuring_error()[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn windows_must_fit_every_pulse() {
        let pulses = LaserPulseSet::new(vec![vec![1.0; 10], vec![1.0; 6]]);
        let err = StandardPulseAnalysis
            .analyze_data(&pulses, 0, 2, 4, 8)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Window { pulse: 1, bins: 6, .. }));

        let overlapping = StandardPulseAnalysis.analyze_data(&pulses, 0, 5, 4, 6);
        assert!(overlapping.is_err());
    }

    #[test]
    fn zero_area_gives_nan() {
        let pulses = LaserPulseSet::new(vec![vec![0.0, 0.0, 3.0, 3.0]]);
        let r = StandardPulseAnalysis
            .analyze_data(&pulses, 0, 2, 2, 4)
            .unwrap();
        assert!(r.signal()[0].is_nan());
        assert!(r.measuring_error()[0].is_nan());
    }

    #[test]
    fn empty_set_gives_empty_result() {
        let r = StandardPulseAnalysis
            .analyze_data(&LaserPulseSet::default(), 0, 1, 1, 2)
            .unwrap();
        assert!(r.is_empty());
    }
}
