use std::fs::{self, File, OpenOptions};
use std::sync::{Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::RankRecord;
use crate::error::RankscanError;
use crate::sort::{first_unsorted, sort_by_rank};

/// Durable sink for the result set.
pub trait Persister: Send + Sync {
    /// Replaces the artifact with `records`, in the given order.
    fn flush(&self, records: &[RankRecord]) -> Result<(), RankscanError>;

    /// Adds one record to the end of the artifact.
    fn append(&self, record: &RankRecord) -> Result<(), RankscanError>;

    /// Human-readable location of the artifact.
    fn location(&self) -> String;
}

/// Headerless `reference,rank` CSV file.
#[derive(Debug)]
pub struct CsvArtifact {
    path: Utf8PathBuf,
    appender: Mutex<Option<csv::Writer<File>>>,
}

impl CsvArtifact {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            appender: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.as_std_path().exists()
    }

    pub fn remove(&self) -> Result<(), RankscanError> {
        if self.exists() {
            fs::remove_file(self.path.as_std_path())
                .map_err(|err| RankscanError::Filesystem(format!("remove {}: {err}", self.path)))?;
        }
        Ok(())
    }

    pub fn read(&self) -> Result<Vec<RankRecord>, RankscanError> {
        read_artifact(&self.path)
    }

    fn write_error(&self, message: impl ToString) -> RankscanError {
        RankscanError::ArtifactWrite {
            path: self.path.to_string(),
            message: message.to_string(),
        }
    }

    fn parent_dir(&self) -> Result<Utf8PathBuf, RankscanError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| RankscanError::Filesystem(format!("create {parent}: {err}")))?;
        Ok(parent)
    }
}

impl Persister for CsvArtifact {
    fn flush(&self, records: &[RankRecord]) -> Result<(), RankscanError> {
        let parent = self.parent_dir()?;
        let temp = tempfile::Builder::new()
            .prefix(".rankscan-flush")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| self.write_error(err))?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(temp.as_file());
            for record in records {
                writer.serialize(record).map_err(|err| self.write_error(err))?;
            }
            writer.flush().map_err(|err| self.write_error(err))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|err| self.write_error(err))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| self.write_error(err))?;
        tracing::info!(path = %self.path, records = records.len(), "artifact flushed");
        Ok(())
    }

    fn append(&self, record: &RankRecord) -> Result<(), RankscanError> {
        let mut appender = self
            .appender
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if appender.is_none() {
            self.parent_dir()?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path.as_std_path())
                .map_err(|err| self.write_error(err))?;
            *appender = Some(
                csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(file),
            );
        }
        if let Some(writer) = appender.as_mut() {
            writer.serialize(record).map_err(|err| self.write_error(err))?;
            writer.flush().map_err(|err| self.write_error(err))?;
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.to_string()
    }
}

pub fn read_artifact(path: &Utf8Path) -> Result<Vec<RankRecord>, RankscanError> {
    let read_error = |message: String| RankscanError::ArtifactRead {
        path: path.to_string(),
        message,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path.as_std_path())
        .map_err(|err| read_error(err.to_string()))?;
    reader
        .deserialize::<RankRecord>()
        .map(|row| row.map_err(|err| read_error(err.to_string())))
        .collect()
}

/// Rewrites the artifact at `path` sorted by rank. Returns the record count.
pub fn resort_artifact(path: &Utf8Path) -> Result<usize, RankscanError> {
    let mut records = read_artifact(path)?;
    sort_by_rank(&mut records);
    CsvArtifact::new(path.to_path_buf()).flush(&records)?;
    Ok(records.len())
}

/// Checks that the artifact at `path` is sorted. Returns the record count.
pub fn check_artifact(path: &Utf8Path) -> Result<usize, RankscanError> {
    let records = read_artifact(path)?;
    match first_unsorted(&records) {
        // Line numbers are 1-based.
        Some(index) => Err(RankscanError::ArtifactUnsorted {
            path: path.to_string(),
            line: index + 1,
        }),
        None => Ok(records.len()),
    }
}
