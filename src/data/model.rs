use std::fmt;

use chrono::{DateTime, Local};

use crate::error::DimensionError;

/// Format used for timestamps in saved parameter blocks.
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %Hh:%Mmin:%Ss";

// ---------------------------------------------------------------------------
// RawTrace – the loaded numeric matrix
// ---------------------------------------------------------------------------

/// A 2-D matrix loaded from a delimited text file.
///
/// Rows are stored row-major; every row has exactly `columns.len()` values.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrace {
    /// Zero-based source column indices, ascending.
    pub columns: Vec<usize>,
    /// Data rows.
    pub rows: Vec<Vec<f64>>,
}

impl RawTrace {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Values of the `idx`-th selected column (not the source index).
    pub fn column(&self, idx: usize) -> Option<Vec<f64>> {
        if idx >= self.columns.len() {
            return None;
        }
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// The counts trace the extraction strategies operate on: the last
    /// selected column.
    pub fn counts(&self) -> Vec<f64> {
        match self.columns.len() {
            0 => Vec::new(),
            n => self.rows.iter().map(|r| r[n - 1]).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// LaserPulseSet – rows = pulses, columns = time bins
// ---------------------------------------------------------------------------

/// Extracted laser pulses. Rows may differ in length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaserPulseSet {
    pub pulses: Vec<Vec<f64>>,
}

impl LaserPulseSet {
    pub fn new(pulses: Vec<Vec<f64>>) -> Self {
        Self { pulses }
    }

    /// Number of pulses.
    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    /// Length of the longest pulse.
    pub fn max_bins(&self) -> usize {
        self.pulses.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Discard the first pulse.
    pub fn drop_first(mut self) -> Result<Self, DimensionError> {
        if self.pulses.is_empty() {
            return Err(DimensionError::NoPulses);
        }
        self.pulses.remove(0);
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// AnalysisResult
// ---------------------------------------------------------------------------

/// Per-pulse signal and its measuring error, index-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    signal: Vec<f64>,
    measuring_error: Vec<f64>,
}

impl AnalysisResult {
    pub fn new(signal: Vec<f64>, measuring_error: Vec<f64>) -> Result<Self, DimensionError> {
        if signal.len() != measuring_error.len() {
            return Err(DimensionError::LengthMismatch {
                signal: signal.len(),
                error: measuring_error.len(),
            });
        }
        Ok(Self {
            signal,
            measuring_error,
        })
    }

    pub fn signal(&self) -> &[f64] {
        &self.signal
    }

    pub fn measuring_error(&self) -> &[f64] {
        &self.measuring_error
    }

    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ParamValue – a single value in a saved parameter block
// ---------------------------------------------------------------------------

/// A dynamically-typed parameter value written into result files.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Local>),
    Null,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::String(s) => write!(f, "{s}"),
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Timestamp(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
            ParamValue::Null => write!(f, "None"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Integer(i)
    }
}

impl From<usize> for ParamValue {
    fn from(i: usize) -> Self {
        ParamValue::Integer(i as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<DateTime<Local>> for ParamValue {
    fn from(t: DateTime<Local>) -> Self {
        ParamValue::Timestamp(t)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

// ---------------------------------------------------------------------------
// Parameters – insertion-ordered label → value
// ---------------------------------------------------------------------------

/// Ordered parameter block. Re-inserting a label replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<(String, ParamValue)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<ParamValue>) {
        let label = label.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
