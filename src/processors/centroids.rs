//! Stem location extraction from per-tree point clouds.
//!
//! For each point cloud the lowest elevation `z_min` is found and all points
//! in the band `[z_min, z_min + slice_thickness]` are averaged in x and y.
//! The mean is taken as the stem centre at ground level.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::ExtractionConfig;
use crate::core::loaders::{self, LoaderError, PointCloud};
use crate::core::records::{CentroidSet, StemCentroid};

/// Errors that abort a whole extraction run.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to list directory {path}: {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// A point cloud that could not be processed.
#[derive(Debug)]
pub struct ExtractionFailure {
    pub path: PathBuf,
    pub error: LoaderError,
}

/// Per-file outcome, reported to progress callbacks.
#[derive(Debug)]
pub enum FileOutcome<'a> {
    Processed(&'a StemCentroid),
    /// No point fell inside the slice band (includes empty clouds).
    Skipped(&'a str),
    Failed(&'a ExtractionFailure),
}

/// Result of a batch extraction.
#[derive(Debug)]
pub struct ExtractionReport {
    pub centroids: CentroidSet,
    /// File names that yielded no record.
    pub skipped: Vec<String>,
    pub failures: Vec<ExtractionFailure>,
}

impl ExtractionReport {
    /// Number of files examined.
    pub fn files_seen(&self) -> usize {
        self.centroids.len() + self.skipped.len() + self.failures.len()
    }
}

/// Planar centroid of the lowest horizontal slice of a cloud.
///
/// Points with a non-finite coordinate are ignored. Returns `None` when no
/// usable point remains or none lies in `[z_min, z_min + thickness]` (both
/// ends inclusive).
pub fn cross_section_centroid(cloud: &PointCloud, thickness: f64) -> Option<(f64, f64)> {
    let usable =
        |i: usize| cloud.x[i].is_finite() && cloud.y[i].is_finite() && cloud.z[i].is_finite();

    let z_min = (0..cloud.len())
        .filter(|&i| usable(i))
        .map(|i| cloud.z[i])
        .fold(f64::INFINITY, f64::min);

    if !z_min.is_finite() {
        return None;
    }

    let z_max = z_min + thickness;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut count = 0usize;

    for i in (0..cloud.len()).filter(|&i| usable(i)) {
        let z = cloud.z[i];
        if z >= z_min && z <= z_max {
            sum_x += cloud.x[i];
            sum_y += cloud.y[i];
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }

    Some((sum_x / count as f64, sum_y / count as f64))
}

/// List regular files in `directory` whose name ends with `suffix`.
///
/// The result is sorted by file name so runs are reproducible.
pub fn find_point_clouds(directory: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(ExtractionError::DirectoryNotFound(directory.to_path_buf()));
    }

    let entries = fs::read_dir(directory).map_err(|e| ExtractionError::ListDirectory {
        path: directory.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.ends_with(suffix))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Extract stem centroids from every matching point cloud in `directory`.
///
/// See [`extract_centroids_with_progress`].
pub fn extract_centroids(directory: &Path, config: &ExtractionConfig) -> Result<ExtractionReport> {
    extract_centroids_with_progress(directory, config, |_| {})
}

/// Extract stem centroids, reporting each file's outcome to `progress`.
///
/// A file that fails to load is recorded in `failures` and the batch
/// continues. Only an unreadable directory aborts the run.
pub fn extract_centroids_with_progress<F>(
    directory: &Path,
    config: &ExtractionConfig,
    progress: F,
) -> Result<ExtractionReport>
where
    F: FnMut(FileOutcome<'_>),
{
    let files = find_point_clouds(directory, &config.file_suffix)?;
    info!(
        "Extracting centroids from {} file(s) in {}",
        files.len(),
        directory.display()
    );
    Ok(extract_centroids_from_files(files, config, progress))
}

/// Extract stem centroids from an already listed set of point clouds.
///
/// Files are processed in the given order. Per-file failures never abort
/// the batch.
pub fn extract_centroids_from_files<F>(
    files: Vec<PathBuf>,
    config: &ExtractionConfig,
    mut progress: F,
) -> ExtractionReport
where
    F: FnMut(FileOutcome<'_>),
{
    let mut records = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();
    let mut failures = Vec::new();

    for path in files {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let cloud = match loaders::load_point_cloud(&path) {
            Ok(cloud) => cloud,
            Err(error) => {
                warn!("Error processing {}: {}", filename, error);
                failures.push(ExtractionFailure { path, error });
                if let Some(failure) = failures.last() {
                    progress(FileOutcome::Failed(failure));
                }
                continue;
            }
        };

        match cross_section_centroid(&cloud, config.slice_thickness) {
            Some((x, y)) => {
                debug!("Processed {} -> ({}, {})", filename, x, y);
                records.push(StemCentroid::new(filename, x, y));
                if let Some(record) = records.last() {
                    progress(FileOutcome::Processed(record));
                }
            }
            None => {
                debug!("Skipped {} (no points in cross-section)", filename);
                skipped.push(filename);
                if let Some(name) = skipped.last() {
                    progress(FileOutcome::Skipped(name));
                }
            }
        }
    }

    info!(
        "Extracted {} centroid(s), skipped {}, failed {}",
        records.len(),
        skipped.len(),
        failures.len()
    );

    ExtractionReport {
        centroids: CentroidSet::new(config.crs, records),
        skipped,
        failures,
    }
}
