use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Failure to turn a text file into a [`RawTrace`](crate::data::model::RawTrace).
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no columns selected")]
    NoColumns,

    #[error("line {line}: expected column {column} but the row has only {found} fields")]
    Ragged {
        line: usize,
        column: usize,
        found: usize,
    },

    #[error("line {line}, column {column}: '{value}' is not a number")]
    Malformed {
        line: usize,
        column: usize,
        value: String,
    },

    #[error("line {line}: {source}")]
    Csv {
        line: usize,
        #[source]
        source: csv::Error,
    },

    #[error("{path} contains no data rows after skipping {header_lines} header lines")]
    Empty { path: PathBuf, header_lines: usize },
}

/// Empty or mismatched arrays.
#[derive(Debug, Error, PartialEq)]
pub enum DimensionError {
    #[error("pulse set has no rows")]
    NoPulses,

    #[error("signal has {signal} values but measuring error has {error}")]
    LengthMismatch { signal: usize, error: usize },

    #[error("series '{label}' has {found} values, expected {expected}")]
    SeriesLength {
        label: String,
        expected: usize,
        found: usize,
    },
}

/// Raised by an extraction strategy.
#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    #[error("number of lasers must be at least 1")]
    NoLasers,

    #[error("cannot split {bins} bins into {lasers} lasers")]
    TooManyLasers { lasers: usize, bins: usize },

    #[error("conversion factor {0} is not finite")]
    InvalidConversion(f64),

    #[error("initial pulse length must be at least 1")]
    ZeroLength,

    #[error("pulse candidate at bin {start} is {length} bins long, minimum is {minimum}")]
    PulseTooShort {
        start: usize,
        length: usize,
        minimum: usize,
    },
}

/// Raised by the analysis collaborator.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error(
        "pulse {pulse}: windows norm {norm_start}..{norm_end}, signal {signal_start}..{signal_end} \
         do not fit a pulse of {bins} bins"
    )]
    Window {
        pulse: usize,
        bins: usize,
        norm_start: usize,
        norm_end: usize,
        signal_start: usize,
        signal_end: usize,
    },

    #[error(transparent)]
    Dimension(#[from] DimensionError),
}

/// Raised by the persistence collaborator.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error("writing parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("building record batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("writing figure: {0}")]
    Image(#[from] image::ImageError),
}

/// Everything the dispatcher can surface to its caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Load(#[from] DataLoadError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error("method '{method}' requires parameter '{parameter}'")]
    MissingParameter {
        method: &'static str,
        parameter: &'static str,
    },
}
