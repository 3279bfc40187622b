//! JSON description of a complete load → extract → analyze → save run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::data::loader::{Delimiter, LoadOptions};
use crate::dispatcher::SaveOptions;
use crate::extraction::ExtractionParams;

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub input: InputConfig,
    pub extraction: ExtractionConfig,
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub x_axis: XAxisConfig,
    /// Results are only printed when absent.
    #[serde(default)]
    pub save: Option<SaveConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub header_lines: usize,
    pub columns: Vec<usize>,
    /// `"whitespace"` (default), `"tab"` or a single character.
    #[serde(default)]
    pub delimiter: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub method: String,
    #[serde(default)]
    pub drop_first: bool,
    #[serde(default)]
    pub params: ExtractionParams,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AnalysisConfig {
    pub norm_start: usize,
    pub norm_end: usize,
    pub signal_start: usize,
    pub signal_end: usize,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct XAxisConfig {
    pub start: f64,
    pub increment: f64,
    pub alternating: bool,
}

impl Default for XAxisConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            increment: 1.0,
            alternating: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Root of the dated folder layout.
    pub root: PathBuf,
    /// Overrides the dated module folder.
    pub directory: Option<PathBuf>,
    pub file_label: String,
    pub as_text: bool,
    pub figure: bool,
    pub x_label: String,
    pub count_frequency: f64,
    pub oversampling: usize,
    pub smooth_window_length: usize,
}

impl Default for SaveConfig {
    fn default() -> Self {
        let options = SaveOptions::default();
        Self {
            root: PathBuf::from("."),
            directory: None,
            file_label: options.file_label,
            as_text: options.as_text,
            figure: options.with_figure,
            x_label: options.x_label,
            count_frequency: 0.0,
            oversampling: 1,
            smooth_window_length: 1,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

impl InputConfig {
    pub fn load_options(&self) -> Result<LoadOptions> {
        let delimiter: Delimiter = match &self.delimiter {
            Some(d) => d.parse().map_err(|e: String| anyhow!(e))?,
            None => Delimiter::Whitespace,
        };
        Ok(LoadOptions::new(self.header_lines, self.columns.iter().copied()).with_delimiter(delimiter))
    }
}

impl SaveConfig {
    pub fn save_options(&self, alternating: bool) -> SaveOptions {
        SaveOptions {
            directory: self.directory.clone(),
            file_label: self.file_label.clone(),
            as_text: self.as_text,
            alternating,
            with_figure: self.figure,
            x_label: self.x_label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let json = r#"{
            "input": { "path": "trace.dat", "columns": [0, 1] },
            "extraction": { "method": "legacy",
                            "params": { "aom_delay": 0, "initial_offset": 0,
                                        "initial_length": 10, "increment_length": 5 } },
            "analysis": { "norm_start": 0, "norm_end": 5, "signal_start": 5, "signal_end": 10 }
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.input.header_lines, 0);
        assert!(!config.extraction.drop_first);
        assert_eq!(config.extraction.params.initial_length, Some(10));
        assert_eq!(config.x_axis.increment, 1.0);
        assert!(config.save.is_none());

        let options = config.input.load_options().unwrap();
        assert_eq!(options.delimiter, Delimiter::Whitespace);
        assert_eq!(options.columns.len(), 2);
    }

    #[test]
    fn save_section_fills_missing_fields() {
        let json = r#"{ "root": "/tmp/results", "as_text": false }"#;
        let save: SaveConfig = serde_json::from_str(json).unwrap();
        assert_eq!(save.file_label, "result");
        assert!(save.figure);
        let options = save.save_options(true);
        assert!(!options.as_text);
        assert!(options.alternating);
    }

    #[test]
    fn bad_delimiter_is_reported() {
        let input = InputConfig {
            path: PathBuf::from("x"),
            header_lines: 0,
            columns: vec![0],
            delimiter: Some("::".to_string()),
        };
        assert!(input.load_options().is_err());
    }
}
