//! Data writers for pipeline tables.
//!
//! Every artifact goes through a [`StagedFile`]: content is written to a
//! temporary file next to the destination and only renamed into place on
//! [`StagedFile::commit`]. Stages that produce several artifacts stage all of
//! them first and commit at the end, so a failure half-way leaves no new
//! output behind.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;
use thiserror::Error;

use super::records::StemCentroid;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to create the staging file.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Failed to move a staged file into place.
    #[error("failed to commit '{path}': {source}")]
    Commit {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// A file whose content becomes visible at its destination only on commit.
///
/// Dropping an uncommitted `StagedFile` removes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    target: PathBuf,
    temp: NamedTempFile,
}

impl StagedFile {
    /// Creates a staging file in the destination directory of `target`.
    pub fn create(target: &Path) -> Result<Self> {
        ensure_parent_dirs(target)?;

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let temp = NamedTempFile::new_in(&dir).map_err(|e| WriteError::CreateFile {
            path: target.display().to_string(),
            source: e,
        })?;

        Ok(Self {
            target: target.to_path_buf(),
            temp,
        })
    }

    /// Destination path.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Writes the whole content through `f` and flushes it.
    pub fn write_with<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        let path = self.target.display().to_string();
        let mut writer = BufWriter::new(self.temp.as_file_mut());
        f(&mut writer).map_err(|e| WriteError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        writer
            .flush()
            .map_err(|e| WriteError::WriteFile { path, source: e })
    }

    /// Writes a CSV document through `f`.
    pub fn write_csv<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut csv::Writer<BufWriter<&mut fs::File>>) -> csv::Result<()>,
    {
        let path = self.target.display().to_string();
        let mut csv_writer = csv::Writer::from_writer(BufWriter::new(self.temp.as_file_mut()));

        f(&mut csv_writer).map_err(|e| WriteError::CsvError {
            path: path.clone(),
            source: e,
        })?;

        csv_writer
            .flush()
            .map_err(|e| WriteError::WriteFile { path, source: e })
    }

    /// Moves the staged content to its destination.
    pub fn commit(self) -> Result<PathBuf> {
        let Self { target, temp } = self;
        temp.persist(&target).map_err(|e| WriteError::Commit {
            path: target.display().to_string(),
            source: e.error,
        })?;
        Ok(target)
    }
}

/// Commits staged files in order, returning the destination paths.
pub fn commit_all(files: Vec<StagedFile>) -> Result<Vec<PathBuf>> {
    files
        .into_iter()
        .map(|file| {
            debug!("Committing {}", file.target().display());
            file.commit()
        })
        .collect()
}

/// Write stem centroids to CSV.
///
/// Creates a CSV file with headers "filename,center_x,center_y". Coordinates
/// are written with full `f64` precision (shortest round-trip formatting).
///
/// # Example
///
/// ```no_run
/// use plot_stems::core::records::StemCentroid;
/// use plot_stems::core::writers::write_centroids_csv;
/// use std::path::Path;
///
/// let records = vec![StemCentroid::new("tree_0.las", 350001.25, 8080001.5)];
/// write_centroids_csv(Path::new("tree_locations.csv"), &records).unwrap();
/// ```
pub fn write_centroids_csv(path: &Path, records: &[StemCentroid]) -> Result<()> {
    stage_centroids_csv(path, records)?.commit()?;
    Ok(())
}

/// Stage a centroid table without making it visible yet.
pub fn stage_centroids_csv(path: &Path, records: &[StemCentroid]) -> Result<StagedFile> {
    let mut staged = StagedFile::create(path)?;

    staged.write_csv(|csv_writer| {
        csv_writer.write_record(["filename", "center_x", "center_y"])?;
        for record in records {
            csv_writer.write_record(&[
                record.filename.clone(),
                record.x.to_string(),
                record.y.to_string(),
            ])?;
        }
        Ok(())
    })?;

    Ok(staged)
}

/// Write a single-column "filename" table, preserving order.
pub fn write_filenames_csv<S: AsRef<str>>(path: &Path, filenames: &[S]) -> Result<()> {
    stage_filenames_csv(path, filenames)?.commit()?;
    Ok(())
}

/// Stage a filename list without making it visible yet.
pub fn stage_filenames_csv<S: AsRef<str>>(path: &Path, filenames: &[S]) -> Result<StagedFile> {
    let mut staged = StagedFile::create(path)?;

    staged.write_csv(|csv_writer| {
        csv_writer.write_record(["filename"])?;
        for name in filenames {
            csv_writer.write_record([name.as_ref()])?;
        }
        Ok(())
    })?;

    Ok(staged)
}
