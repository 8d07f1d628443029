//! Persisted tables, documents and model artifacts
//!
//! Every stage writes its outputs through a [`TableStore`], which writes to a
//! temporary file and renames it into place, and records a sidecar
//! `<file>.meta.json` describing the version of the table that was written.

mod paths;
mod table;

pub use paths::{ArtifactPaths, DEFAULT_ROOT, RAW_PANEL_PRODUCER};
pub use table::Table;

use crate::error::{PipelineError, PipelineResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Version record written next to each table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableVersion {
    pub table: String,
    pub stage: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub crate_version: String,
    pub seed: u64,
}

/// Writer for stage outputs under an artifact root
#[derive(Debug, Clone)]
pub struct TableStore {
    paths: ArtifactPaths,
    seed: u64,
}

impl TableStore {
    pub fn new(paths: ArtifactPaths, seed: u64) -> Self {
        Self { paths, seed }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Read a table, naming its producing stage if it is missing
    pub fn read_table(&self, path: &Path) -> PipelineResult<Table> {
        Table::read(path, self.paths.producer_of(path))
    }

    /// Serialize typed rows (header taken from the struct's field names)
    pub fn write_records<T: Serialize>(
        &self,
        path: &Path,
        stage: &str,
        rows: &[T],
    ) -> PipelineResult<TableVersion> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in rows {
            writer.serialize(row)?;
        }
        let buffer = writer
            .into_inner()
            .map_err(|e| PipelineError::Io(e.into_error()))?;

        let columns = if buffer.is_empty() {
            Vec::new()
        } else {
            csv::Reader::from_reader(buffer.as_slice())
                .headers()?
                .iter()
                .map(str::to_string)
                .collect()
        };

        self.commit(path, stage, &buffer, rows.len(), columns)
    }

    /// Write a table whose columns are only known at runtime
    pub fn write_rows(
        &self,
        path: &Path,
        stage: &str,
        headers: &[String],
        rows: &[Vec<String>],
    ) -> PipelineResult<TableVersion> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(row)?;
        }
        let buffer = writer
            .into_inner()
            .map_err(|e| PipelineError::Io(e.into_error()))?;

        self.commit(path, stage, &buffer, rows.len(), headers.to_vec())
    }

    /// Write a human-readable document (Markdown report)
    pub fn write_text(&self, path: &Path, content: &str) -> PipelineResult<()> {
        write_atomic(path, content.as_bytes())
    }

    /// Persist a model artifact as pretty JSON
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> PipelineResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        write_atomic(path, &bytes)
    }

    /// Load a model artifact, `None` if it has never been written
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> PipelineResult<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let file = fs::File::open(path)?;
        Ok(Some(serde_json::from_reader(file)?))
    }

    fn commit(
        &self,
        path: &Path,
        stage: &str,
        buffer: &[u8],
        rows: usize,
        columns: Vec<String>,
    ) -> PipelineResult<TableVersion> {
        write_atomic(path, buffer)?;

        let version = TableVersion {
            table: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            stage: stage.to_string(),
            rows,
            columns,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            seed: self.seed,
        };
        let meta = serde_json::to_vec_pretty(&version)?;
        write_atomic(&meta_path(path), &meta)?;

        log::debug!("wrote {} ({} rows)", path.display(), rows);
        Ok(version)
    }
}

/// Sidecar manifest location for a table
pub fn meta_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
