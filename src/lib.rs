//! Pulse extraction and analysis of pulsed fluorescence traces.
//!
//! A trace is loaded from a delimited text file, split into laser pulses by
//! one of three extraction strategies, reduced to one signal value per pulse
//! by the analysis step, and saved with its x-axis, parameters and a figure.
//! [`ExtractionDispatcher`] ties the steps together.

pub mod analysis;
pub mod color;
pub mod config;
pub mod data;
pub mod dispatcher;
pub mod error;
pub mod extraction;
pub mod save;

pub use dispatcher::{
    Collaborators, Extraction, ExtractionDispatcher, ExtractionMethod, SaveMetadata, SaveOptions,
    compute_x_axis, sum_pulses,
};
pub use error::{AnalysisError, DataLoadError, DimensionError, DispatchError, ExtractionError, SaveError};
