//! Persistence of analysis results: data files, parameter blocks and figures.
//!
//! ```text
//!  <root>/YYYY/MM/YYYYMMDD/<module>/
//!      YYYYMMDD-HHMM-SS_<label>.dat       (as_text = true)
//!      YYYYMMDD-HHMM-SS_<label>.parquet   (as_text = false)
//!      YYYYMMDD-HHMM-SS_<label>_fig.png   (when a figure is given)
//! ```

pub mod plot;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Local};
use image::RgbImage;
use log::info;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::data::model::Parameters;
use crate::error::{DimensionError, SaveError};

/// One labelled data column.
pub type Series = (String, Vec<f64>);

/// Files written by one [`SaveLogic::save_data`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedFiles {
    pub data: PathBuf,
    pub figure: Option<PathBuf>,
}

/// The persistence collaborator.
pub trait SaveLogic: Send + Sync {
    /// Directory for results of `module_name`, created if missing.
    fn get_path_for_module(&self, module_name: &str) -> Result<PathBuf, SaveError>;

    /// Write `data` (equal-length columns) with a parameter header into
    /// `directory`, as text or parquet, plus an optional figure.
    fn save_data(
        &self,
        data: &[Series],
        directory: &Path,
        parameters: &Parameters,
        file_label: &str,
        as_text: bool,
        plot: Option<&RgbImage>,
    ) -> Result<SavedFiles, SaveError>;
}

// ---------------------------------------------------------------------------
// FileSaveLogic
// ---------------------------------------------------------------------------

/// Saves below a root directory using a dated folder layout.
#[derive(Debug, Clone)]
pub struct FileSaveLogic {
    pub root: PathBuf,
}

impl FileSaveLogic {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SaveLogic for FileSaveLogic {
    fn get_path_for_module(&self, module_name: &str) -> Result<PathBuf, SaveError> {
        let now = Local::now();
        let dir = self
            .root
            .join(now.format("%Y").to_string())
            .join(now.format("%m").to_string())
            .join(now.format("%Y%m%d").to_string())
            .join(module_name);
        std::fs::create_dir_all(&dir).map_err(|source| SaveError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    fn save_data(
        &self,
        data: &[Series],
        directory: &Path,
        parameters: &Parameters,
        file_label: &str,
        as_text: bool,
        plot: Option<&RgbImage>,
    ) -> Result<SavedFiles, SaveError> {
        let rows = check_lengths(data)?;
        std::fs::create_dir_all(directory).map_err(|source| SaveError::Io {
            path: directory.to_path_buf(),
            source,
        })?;

        let now = Local::now();
        let stem = file_stem(&now, file_label);

        let data_path = if as_text {
            let path = directory.join(format!("{stem}.dat"));
            write_text(&path, data, rows, parameters, &now)?;
            path
        } else {
            let path = directory.join(format!("{stem}.parquet"));
            write_parquet(&path, data, parameters)?;
            path
        };

        let figure = match plot {
            Some(img) => {
                let path = directory.join(format!("{stem}_fig.png"));
                img.save(&path)?;
                Some(path)
            }
            None => None,
        };

        info!("saved {} rows to {}", rows, data_path.display());
        Ok(SavedFiles {
            data: data_path,
            figure,
        })
    }
}

fn file_stem(now: &DateTime<Local>, label: &str) -> String {
    let stamp = now.format("%Y%m%d-%H%M-%S");
    if label.is_empty() {
        stamp.to_string()
    } else {
        format!("{stamp}_{label}")
    }
}

/// Common column length; all series must agree.
fn check_lengths(data: &[Series]) -> Result<usize, DimensionError> {
    let expected = data.first().map(|(_, v)| v.len()).unwrap_or(0);
    for (label, values) in data {
        if values.len() != expected {
            return Err(DimensionError::SeriesLength {
                label: label.clone(),
                expected,
                found: values.len(),
            });
        }
    }
    Ok(expected)
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_text(
    path: &Path,
    data: &[Series],
    rows: usize,
    parameters: &Parameters,
    now: &DateTime<Local>,
) -> Result<(), SaveError> {
    let io_err = |source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    write_text_body(&mut out, data, rows, parameters, now).map_err(io_err)?;
    out.flush().map_err(io_err)
}

fn write_text_body<W: Write>(
    out: &mut W,
    data: &[Series],
    rows: usize,
    parameters: &Parameters,
    now: &DateTime<Local>,
) -> std::io::Result<()> {
    writeln!(
        out,
        "# Saved Data on {} at {}.",
        now.format("%d.%m.%Y"),
        now.format("%Hh%Mm%Ss")
    )?;
    writeln!(out, "#")?;
    writeln!(out, "# Parameters:")?;
    writeln!(out, "# ===========")?;
    writeln!(out, "#")?;
    for (label, value) in parameters.iter() {
        writeln!(out, "# {label}: {value}")?;
    }
    writeln!(out, "#")?;
    writeln!(out, "# Data:")?;
    writeln!(out, "# =====")?;

    let header: Vec<&str> = data.iter().map(|(label, _)| label.as_str()).collect();
    writeln!(out, "# {}", header.join("\t"))?;

    for row in 0..rows {
        let line: Vec<String> = data.iter().map(|(_, v)| format!("{:.6e}", v[row])).collect();
        writeln!(out, "{}", line.join("\t"))?;
    }
    Ok(())
}

fn write_parquet(path: &Path, data: &[Series], parameters: &Parameters) -> Result<(), SaveError> {
    let schema = Arc::new(Schema::new(
        data.iter()
            .map(|(label, _)| Field::new(label.as_str(), DataType::Float64, false))
            .collect::<Vec<_>>(),
    ));
    let columns: Vec<ArrayRef> = data
        .iter()
        .map(|(_, values)| Arc::new(Float64Array::from(values.clone())) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let metadata: Vec<KeyValue> = parameters
        .iter()
        .map(|(label, value)| KeyValue::new(label.to_string(), value.to_string()))
        .collect();
    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(metadata))
        .build();

    let file = File::create(path).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
