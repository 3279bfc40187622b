use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use log::debug;

use super::model::RawTrace;
use crate::error::DataLoadError;

// ---------------------------------------------------------------------------
// Load options
// ---------------------------------------------------------------------------

/// Field separator of the trace file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    /// Runs of spaces and tabs.
    #[default]
    Whitespace,
    /// A single separator byte, e.g. `b','` or `b'\t'`.
    Char(u8),
}

impl FromStr for Delimiter {
    type Err = String;

    /// `"whitespace"`, `"tab"`, or a single ASCII character.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whitespace" | "ws" | "" => Ok(Delimiter::Whitespace),
            "tab" | "\\t" | "\t" => Ok(Delimiter::Char(b'\t')),
            other if other.len() == 1 && other.is_ascii() => Ok(Delimiter::Char(other.as_bytes()[0])),
            other => Err(format!("unsupported delimiter '{other}'")),
        }
    }
}

/// How to read a trace file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Physical lines skipped before parsing.
    pub header_lines: usize,
    /// Zero-based columns to keep.
    pub columns: BTreeSet<usize>,
    pub delimiter: Delimiter,
}

impl LoadOptions {
    pub fn new(header_lines: usize, columns: impl IntoIterator<Item = usize>) -> Self {
        Self {
            header_lines,
            columns: columns.into_iter().collect(),
            delimiter: Delimiter::Whitespace,
        }
    }

    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a whitespace-separated trace, skipping `header_lines` lines and
/// keeping only `columns`.
pub fn load(
    header_lines: usize,
    columns: &BTreeSet<usize>,
    path: &Path,
) -> Result<RawTrace, DataLoadError> {
    let options = LoadOptions {
        header_lines,
        columns: columns.clone(),
        delimiter: Delimiter::Whitespace,
    };
    load_trace(path, &options)
}

/// Load a trace file according to `options`.
///
/// After the header, everything from a `#` to the end of its line is a
/// comment; blank lines are ignored.
/// Every other line must provide all selected columns as numbers.
pub fn load_trace(path: &Path, options: &LoadOptions) -> Result<RawTrace, DataLoadError> {
    if options.columns.is_empty() {
        return Err(DataLoadError::NoColumns);
    }
    let columns: Vec<usize> = options.columns.iter().copied().collect();

    let text = std::fs::read_to_string(path).map_err(|source| DataLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let rows = match options.delimiter {
        Delimiter::Whitespace => parse_whitespace(&text, options.header_lines, &columns)?,
        Delimiter::Char(sep) => parse_delimited(&text, options.header_lines, sep, &columns)?,
    };

    if rows.is_empty() {
        return Err(DataLoadError::Empty {
            path: path.to_path_buf(),
            header_lines: options.header_lines,
        });
    }

    debug!(
        "loaded {} rows x {} columns from {}",
        rows.len(),
        columns.len(),
        path.display()
    );

    Ok(RawTrace { columns, rows })
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

fn parse_whitespace(
    text: &str,
    header_lines: usize,
    columns: &[usize],
) -> Result<Vec<Vec<f64>>, DataLoadError> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate().skip(header_lines) {
        let trimmed = strip_comment(line).trim();
        if trimmed.is_empty() {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        rows.push(select_columns(&fields, columns, idx + 1)?);
    }
    Ok(rows)
}

/// Single-byte separated body, parsed with the `csv` reader.
fn parse_delimited(
    text: &str,
    header_lines: usize,
    sep: u8,
    columns: &[usize],
) -> Result<Vec<Vec<f64>>, DataLoadError> {
    // one output line per input line so record positions stay valid
    let body: Vec<&str> = skip_lines(text, header_lines).lines().map(strip_comment).collect();
    let body = body.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(sep)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();
    loop {
        let more = reader.read_record(&mut record).map_err(|source| {
            let line = source
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(0);
            DataLoadError::Csv {
                line: header_lines + line,
                source,
            }
        })?;
        if !more {
            break;
        }
        let line = header_lines + record.position().map(|p| p.line() as usize).unwrap_or(0);
        if record.iter().all(str::is_empty) {
            continue;
        }
        let fields: Vec<&str> = record.iter().collect();
        rows.push(select_columns(&fields, columns, line)?);
    }
    Ok(rows)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Remainder of `text` after its first `n` lines.
fn skip_lines(text: &str, n: usize) -> &str {
    let mut rest = text;
    for _ in 0..n {
        match rest.find('\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return "",
        }
    }
    rest
}

fn select_columns(fields: &[&str], columns: &[usize], line: usize) -> Result<Vec<f64>, DataLoadError> {
    columns
        .iter()
        .map(|&col| {
            let raw = fields.get(col).ok_or_else(|| DataLoadError::Ragged {
                line,
                column: col,
                found: fields.len(),
            })?;
            raw.parse::<f64>().map_err(|_| DataLoadError::Malformed {
                line,
                column: col,
                value: raw.to_string(),
            })
        })
        .collect()
}
