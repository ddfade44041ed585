// Dataset Loader
// Fetches the raw dataset text and reads it into header-keyed rows

use crate::error::{DashboardError, Result};
use crate::record::RawRow;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Where the dataset text comes from
///
/// A fetch either returns the full text or fails; there is no partial result.
pub trait DatasetSource {
    /// Name used in logs and error messages
    fn name(&self) -> String;

    fn fetch(&self) -> Result<String>;
}

/// Dataset stored on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| DashboardError::dataset_load(self.name(), e))
    }
}

/// Dataset held in memory (embedded data, tests)
#[derive(Debug, Clone)]
pub struct InMemorySource {
    name: String,
    text: String,
}

impl InMemorySource {
    pub fn new(name: &str, text: impl Into<String>) -> Self {
        InMemorySource {
            name: name.to_string(),
            text: text.into(),
        }
    }
}

impl DatasetSource for InMemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn fetch(&self) -> Result<String> {
        Ok(self.text.clone())
    }
}

/// Read CSV with a header row into rows keyed by column name
pub fn load_rows_from_reader<R: Read>(reader: R, source_name: &str) -> Result<Vec<RawRow>> {
    let mut rdr = csv::Reader::from_reader(reader);

    let mut rows = Vec::new();

    for (i, result) in rdr.deserialize::<RawRow>().enumerate() {
        let row = result.map_err(|e| {
            DashboardError::dataset_load(source_name, format!("malformed row {}: {}", i, e))
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Read a CSV file into rows
pub fn load_rows(csv_path: &Path) -> Result<Vec<RawRow>> {
    let source = FileSource::new(csv_path);
    let text = source.fetch()?;
    load_rows_from_reader(text.as_bytes(), &source.name())
}
