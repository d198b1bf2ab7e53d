//! Re-publishing one row of the response sheet.
//!
//! The sheet is read from a CSV export. Row numbers are the sheet's own, 1-based,
//! with the header in row 1. A selected row becomes a [`SubmissionRecord`] with one
//! value per header, in column order, and goes through the normal [`Pipeline`].

use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;
use tracing::{error, info};

use crate::error::{PublishError, Result};
use crate::pipeline::{Pipeline, PublishReport};
use crate::submission::SubmissionRecord;

/// Header row plus data rows of a response sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = reader.records();
        let headers = match records.next() {
            Some(first) => first
                .map_err(|e| PublishError::Tabular(format!("row 1: {e}")))?
                .iter()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        for (i, record) in records.enumerate() {
            let record = record.map_err(|e| PublishError::Tabular(format!("row {}: {e}", i + 2)))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to open sheet export");
            PublishError::io(path, e)
        })?;
        let sheet = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            columns = sheet.headers.len(),
            rows = sheet.rows.len(),
            "Loaded sheet export"
        );
        Ok(sheet)
    }

    /// Record for sheet row `row` (1-based, header is row 1).
    pub fn record_at(&self, row: usize) -> Result<SubmissionRecord> {
        if row <= 1 {
            return Err(PublishError::InvalidSelection(
                "select a data row, not the header".into(),
            ));
        }
        let values = self.rows.get(row - 2).ok_or_else(|| {
            PublishError::InvalidSelection(format!(
                "row {row} is past the last data row ({})",
                self.rows.len() + 1
            ))
        })?;

        let mut record = SubmissionRecord::new();
        for (i, header) in self.headers.iter().enumerate() {
            let value = values.get(i).cloned().unwrap_or_default();
            record.insert(header.clone(), vec![value]);
        }
        Ok(record)
    }
}

/// Publish sheet row `row` again. The selection is checked before anything else runs.
pub async fn replay_row(
    pipeline: &Pipeline<'_>,
    sheet: &Sheet,
    row: usize,
) -> Result<PublishReport> {
    let record = sheet.record_at(row).map_err(|e| {
        error!(row, error = %e, "Rejected replay selection");
        e
    })?;
    info!(row, fields = record.len(), "Replaying sheet row");
    pipeline.run(&record).await
}
