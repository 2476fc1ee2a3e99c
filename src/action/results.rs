//! Result tables produced by measurement actions.
//!
//! A [`ResultTable`] always collects its rows in memory. When a destination path was
//! assigned (by a [`ResultNamer`]), `finalise()` also writes it to disk as CSV with the
//! attributes as `# key: value` comment lines ahead of the header row.

use super::Attributes;
use crate::error::{SequencerError, SequencerResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strfmt::strfmt;

/// Decides where a result table is persisted: `(attributes, label) -> path`.
/// `None` keeps the results in memory.
pub type ResultNamer = Arc<dyn Fn(&Attributes, &str) -> Option<PathBuf> + Send + Sync>;

/// Build a [`ResultNamer`] from a `strfmt` template.
///
/// The template may reference any attribute by key, plus `{label}` and
/// `{attributes}` (the attribute path string, e.g. `T=300K-B=1T`). A template that
/// cannot be formatted, for instance because it references a missing attribute,
/// yields `None`.
///
/// ```rust,ignore
/// let namer = pattern_namer("data/{label}-{attributes}.csv");
/// ```
pub fn pattern_namer(template: impl Into<String>) -> ResultNamer {
    let template = template.into();
    Arc::new(move |attributes: &Attributes, label: &str| {
        let mut vars: HashMap<String, String> = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        vars.insert("label".to_string(), label.to_string());
        vars.insert("attributes".to_string(), attributes.path_string());

        match strfmt(&template, &vars) {
            Ok(path) => Some(PathBuf::from(path)),
            Err(e) => {
                tracing::debug!(%template, error = %e, "Result name template not applicable; keeping results in memory");
                None
            }
        }
    })
}

/// Columnar numeric results of one measurement attempt.
#[derive(Debug)]
pub struct ResultTable {
    label: String,
    columns: Vec<String>,
    rows: Mutex<Vec<Vec<f64>>>,
    attributes: Mutex<Attributes>,
    destination: Option<PathBuf>,
}

impl ResultTable {
    /// Empty in-memory table.
    pub fn new(label: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            label: label.into(),
            columns,
            rows: Mutex::new(Vec::new()),
            attributes: Mutex::new(Attributes::new()),
            destination: None,
        }
    }

    /// Persist to `path` on `finalise()`.
    pub fn with_destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    /// Label of the measurement that produced the table.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// File the table is written to, if any.
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Append one row; its length must match the number of columns.
    pub fn add_row(&self, row: impl Into<Vec<f64>>) -> SequencerResult<()> {
        let row = row.into();
        if row.len() != self.columns.len() {
            return Err(SequencerError::ColumnMismatch {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.lock().push(row);
        Ok(())
    }

    /// Copy of all rows.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.rows.lock().clone()
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    /// All values of one column.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.lock().iter().map(|row| row[index]).collect())
    }

    /// Snapshot of the attributes.
    pub fn attributes(&self) -> Attributes {
        self.attributes.lock().clone()
    }

    /// Value of one attribute.
    pub fn attribute(&self, key: &str) -> Option<String> {
        self.attributes.lock().get(key).map(str::to_string)
    }

    pub(crate) fn set_attribute(&self, key: &str, value: &str) {
        self.attributes.lock().set(key, value);
    }

    pub(crate) fn remove_attribute(&self, key: &str) {
        self.attributes.lock().remove(key);
    }

    /// Flush the table to its destination, if it has one.
    pub fn finalise(&self) -> SequencerResult<()> {
        let Some(path) = &self.destination else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = BufWriter::new(File::create(path)?);
        for (key, value) in self.attributes.lock().iter() {
            writeln!(file, "# {key}: {value}")?;
        }

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(&self.columns)?;
        for row in self.rows.lock().iter() {
            writer.write_record(row.iter().map(f64::to_string))?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), rows = self.row_count(), "Results written");
        Ok(())
    }
}
