//! Survey tables from delimited text
//!
//! A survey table is three parallel columns: easting, northing and the
//! observed value (typically TMI in nT). Column names are configurable; the
//! remaining columns of the file are ignored.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoError, IoResult};

/// Column layout of a survey file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurveyColumns {
    /// Easting column
    pub x: String,
    /// Northing column
    pub y: String,
    /// Observed value column
    pub value: String,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for SurveyColumns {
    fn default() -> Self {
        Self {
            x: "x".to_string(),
            y: "y".to_string(),
            value: "value".to_string(),
            delimiter: b',',
        }
    }
}

impl SurveyColumns {
    /// Tab-delimited layout with default column names
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Default::default()
        }
    }

    /// Pick the delimiter from a file extension (`tsv` / `tab` → tab)
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab") => {
                Self::tsv()
            }
            _ => Self::default(),
        }
    }
}

/// Scattered survey observations as parallel columns
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyTable {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub values: Vec<f64>,
}

impl SurveyTable {
    /// Number of observations
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Read a survey table from a file
pub fn read_survey(path: &Path, columns: &SurveyColumns) -> IoResult<SurveyTable> {
    if !path.exists() {
        return Err(IoError::FileNotFound(path.display().to_string()));
    }
    let file = File::open(path).map_err(|e| IoError::OpenFailed(e.to_string()))?;
    let table = read_survey_from(BufReader::new(file), columns)?;

    tracing::debug!(
        "Read {} survey records from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}

/// Read a survey table from any reader
pub fn read_survey_from<R: Read>(reader: R, columns: &SurveyColumns) -> IoResult<SurveyTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(columns.delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| IoError::InvalidFormat(e.to_string()))?
        .clone();

    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| IoError::ColumnNotFound(name.to_string()))
    };
    let ix = position(&columns.x)?;
    let iy = position(&columns.y)?;
    let iv = position(&columns.value)?;

    let mut table = SurveyTable::default();
    for (record_index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| IoError::InvalidFormat(e.to_string()))?;
        let parse = |idx: usize, name: &str| -> IoResult<f64> {
            let raw = record.get(idx).unwrap_or("");
            raw.parse::<f64>().map_err(|_| IoError::InvalidValue {
                column: name.to_string(),
                record: record_index + 1,
                value: raw.to_string(),
            })
        };
        table.x.push(parse(ix, &columns.x)?);
        table.y.push(parse(iy, &columns.y)?);
        table.values.push(parse(iv, &columns.value)?);
    }

    Ok(table)
}

/// Write a survey table as CSV with `x,y,value` headers
pub fn write_survey<W: Write>(writer: W, table: &SurveyTable) -> IoResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    let to_io = |e: csv::Error| IoError::InvalidFormat(e.to_string());

    writer.write_record(["x", "y", "value"]).map_err(to_io)?;
    for ((x, y), v) in table.x.iter().zip(&table.y).zip(&table.values) {
        writer
            .write_record([x.to_string(), y.to_string(), v.to_string()])
            .map_err(to_io)?;
    }
    writer.flush()?;
    Ok(())
}
