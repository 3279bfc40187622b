use log::debug;

use super::{ExceptionPolicy, PulseExtractor};
use crate::data::model::LaserPulseSet;
use crate::error::ExtractionError;

/// The extraction strategies shipped with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPulseExtraction;

impl PulseExtractor for StandardPulseExtraction {
    fn ungated_extraction(
        &self,
        counts: &[f64],
        conversion_factor: f64,
        number_of_lasers: usize,
    ) -> Result<LaserPulseSet, ExtractionError> {
        if number_of_lasers == 0 {
            return Err(ExtractionError::NoLasers);
        }
        if !conversion_factor.is_finite() {
            return Err(ExtractionError::InvalidConversion(conversion_factor));
        }
        let bins = counts.len() / number_of_lasers;
        if bins == 0 {
            return Err(ExtractionError::TooManyLasers {
                lasers: number_of_lasers,
                bins: counts.len(),
            });
        }

        let pulses: Vec<Vec<f64>> = counts
            .chunks_exact(bins)
            .take(number_of_lasers)
            .map(|segment| segment.iter().map(|v| v * conversion_factor).collect())
            .collect();

        debug!(
            "ungated extraction: {number_of_lasers} lasers x {bins} bins, {} trailing bins dropped",
            counts.len() - bins * number_of_lasers
        );
        Ok(LaserPulseSet::new(pulses))
    }

    fn extract_laser_pulses(
        &self,
        counts: &[f64],
        count_threshold: f64,
        min_laser_length: usize,
        exception_policy: ExceptionPolicy,
    ) -> Result<LaserPulseSet, ExtractionError> {
        let tolerance = match exception_policy {
            ExceptionPolicy::Bridge(n) => n,
            ExceptionPolicy::Discard | ExceptionPolicy::Reject => 0,
        };

        let mut pulses = Vec::new();
        for (start, end) in threshold_runs(counts, count_threshold, tolerance) {
            let length = end - start;
            if length >= min_laser_length {
                pulses.push(counts[start..end].to_vec());
                continue;
            }
            if exception_policy == ExceptionPolicy::Reject {
                return Err(ExtractionError::PulseTooShort {
                    start,
                    length,
                    minimum: min_laser_length,
                });
            }
            debug!("discarding {length}-bin candidate at bin {start}");
        }

        debug!("threshold extraction found {} pulses", pulses.len());
        Ok(LaserPulseSet::new(pulses))
    }

    fn excise_laser_pulses(
        &self,
        counts: &[f64],
        aom_delay: usize,
        initial_offset: usize,
        initial_length: usize,
        increment_length: usize,
    ) -> Result<LaserPulseSet, ExtractionError> {
        if initial_length == 0 {
            return Err(ExtractionError::ZeroLength);
        }

        let mut pulses = Vec::new();
        let mut slot_start = initial_offset;
        let mut length = initial_length;
        // positions past usize::MAX lie beyond any trace
        loop {
            let Some(from) = slot_start.checked_add(aom_delay) else { break };
            let Some(to) = from.checked_add(length) else { break };
            if to > counts.len() {
                break;
            }
            pulses.push(counts[from..to].to_vec());
            let (Some(next_start), Some(next_length)) = (
                slot_start.checked_add(length),
                length.checked_add(increment_length),
            ) else {
                break;
            };
            slot_start = next_start;
            length = next_length;
        }

        debug!(
            "excised {} pulses starting at bin {initial_offset} (delay {aom_delay})",
            pulses.len()
        );
        Ok(LaserPulseSet::new(pulses))
    }
}

/// Half-open `(start, end)` ranges where `counts` is above `threshold`.
///
/// Up to `tolerance` consecutive bins at or below the threshold do not end a
/// run; a run always ends on an above-threshold bin.
fn threshold_runs(counts: &[f64], threshold: f64, tolerance: usize) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < counts.len() {
        if counts[i] <= threshold {
            i += 1;
            continue;
        }
        let start = i;
        let mut end = i + 1;
        let mut gap = 0;
        for (j, &value) in counts.iter().enumerate().skip(i + 1) {
            if value > threshold {
                end = j + 1;
                gap = 0;
            } else {
                gap += 1;
                if gap > tolerance {
                    break;
                }
            }
        }
        runs.push((start, end));
        i = end;
    }
    runs
}
