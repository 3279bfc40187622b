//! Pulse extraction: turning a counts trace into a [`LaserPulseSet`].
//!
//! The dispatcher only sees the [`PulseExtractor`] trait; the strategies
//! shipped with the crate live in [`strategies`].

pub mod strategies;

use serde::{Deserialize, Serialize};

use crate::data::model::LaserPulseSet;
use crate::error::ExtractionError;

pub use strategies::StandardPulseExtraction;

/// What to do with threshold candidates shorter than the minimum length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionPolicy {
    /// Drop short candidates.
    #[default]
    Discard,
    /// Allow up to `n` consecutive sub-threshold bins inside a pulse, then
    /// drop short candidates.
    Bridge(usize),
    /// Fail on the first short candidate.
    Reject,
}

/// The three extraction strategies a dispatcher can delegate to.
pub trait PulseExtractor: Send + Sync {
    /// Slice `counts` into `number_of_lasers` equal segments scaled by
    /// `conversion_factor`.
    fn ungated_extraction(
        &self,
        counts: &[f64],
        conversion_factor: f64,
        number_of_lasers: usize,
    ) -> Result<LaserPulseSet, ExtractionError>;

    /// Locate pulses wherever `counts` exceeds `count_threshold` for at least
    /// `min_laser_length` bins.
    fn extract_laser_pulses(
        &self,
        counts: &[f64],
        count_threshold: f64,
        min_laser_length: usize,
        exception_policy: ExceptionPolicy,
    ) -> Result<LaserPulseSet, ExtractionError>;

    /// Carve consecutive pulses of increasing length out of `counts`.
    fn excise_laser_pulses(
        &self,
        counts: &[f64],
        aom_delay: usize,
        initial_offset: usize,
        initial_length: usize,
        increment_length: usize,
    ) -> Result<LaserPulseSet, ExtractionError>;
}

// ---------------------------------------------------------------------------
// ExtractionParams – the recognized options of every strategy
// ---------------------------------------------------------------------------

/// Options passed alongside a method tag. Each strategy reads the fields it
/// needs; the rest are ignored.
///
/// The older dictionary keys (`number_laser`, `conv`, `count_treshold`,
/// `min_len_laser`, `exception`) are accepted when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionParams {
    #[serde(alias = "number_laser")]
    pub number_of_lasers: Option<usize>,
    #[serde(alias = "conv")]
    pub conversion_factor: Option<f64>,

    #[serde(alias = "count_treshold")]
    pub count_threshold: Option<f64>,
    #[serde(alias = "min_len_laser")]
    pub min_laser_length: Option<usize>,
    #[serde(alias = "exception")]
    pub exception_policy: Option<ExceptionPolicy>,

    pub aom_delay: Option<usize>,
    pub initial_offset: Option<usize>,
    pub initial_length: Option<usize>,
    pub increment_length: Option<usize>,
}

impl ExtractionParams {
    pub fn niko(number_of_lasers: usize, conversion_factor: f64) -> Self {
        Self {
            number_of_lasers: Some(number_of_lasers),
            conversion_factor: Some(conversion_factor),
            ..Self::default()
        }
    }

    pub fn threshold(
        count_threshold: f64,
        min_laser_length: usize,
        exception_policy: ExceptionPolicy,
    ) -> Self {
        Self {
            count_threshold: Some(count_threshold),
            min_laser_length: Some(min_laser_length),
            exception_policy: Some(exception_policy),
            ..Self::default()
        }
    }

    pub fn legacy(
        aom_delay: usize,
        initial_offset: usize,
        initial_length: usize,
        increment_length: usize,
    ) -> Self {
        Self {
            aom_delay: Some(aom_delay),
            initial_offset: Some(initial_offset),
            initial_length: Some(initial_length),
            increment_length: Some(increment_length),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_accept_old_keys() {
        let json = r#"{"number_laser": 4, "conv": 0.5, "count_treshold": 3.0,
                       "min_len_laser": 20, "exception": {"bridge": 2}}"#;
        let params: ExtractionParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.number_of_lasers, Some(4));
        assert_eq!(params.conversion_factor, Some(0.5));
        assert_eq!(params.count_threshold, Some(3.0));
        assert_eq!(params.min_laser_length, Some(20));
        assert_eq!(params.exception_policy, Some(ExceptionPolicy::Bridge(2)));
        assert_eq!(params.aom_delay, None);
    }

    #[test]
    fn exception_policy_unit_variants() {
        let p: ExceptionPolicy = serde_json::from_str(r#""reject""#).unwrap();
        assert_eq!(p, ExceptionPolicy::Reject);
    }
}
