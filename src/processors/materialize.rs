//! Copying listed point clouds into a subset directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

/// Errors that can occur while materialising a subset.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Failed to create destination {path}: {source}")]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {from} -> {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for materialise operations.
pub type Result<T> = std::result::Result<T, MaterializeError>;

/// Outcome of a copy run.
#[derive(Debug, Default)]
pub struct MaterializeReport {
    /// Destination paths (source paths when dry-running).
    pub copied: Vec<PathBuf>,
    /// Listed names with no matching file in the source directory.
    pub missing: Vec<String>,
}

impl MaterializeReport {
    /// True when every listed file was found.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Copy each listed file from `source_dir` into `dest_dir`.
///
/// # Arguments
///
/// * `filenames` - File names relative to `source_dir`
/// * `source_dir` - Directory holding the full point-cloud collection
/// * `dest_dir` - Directory to copy into (created if needed)
/// * `dry_run` - If true, only report what would be copied
///
/// Names without a matching file are collected in
/// [`MaterializeReport::missing`]; copying continues with the next name.
pub fn copy_listed_files<S: AsRef<str>>(
    filenames: &[S],
    source_dir: &Path,
    dest_dir: &Path,
    dry_run: bool,
) -> Result<MaterializeReport> {
    if !source_dir.is_dir() {
        return Err(MaterializeError::SourceNotFound(source_dir.to_path_buf()));
    }

    if !dry_run {
        fs::create_dir_all(dest_dir).map_err(|e| MaterializeError::CreateDestination {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;
    }

    let mut report = MaterializeReport::default();

    for name in filenames {
        let name = name.as_ref();
        let source_path = source_dir.join(name);

        if !source_path.is_file() {
            warn!("File not found: {}", name);
            report.missing.push(name.to_string());
            continue;
        }

        if dry_run {
            info!("Would copy: {}", name);
            report.copied.push(source_path);
            continue;
        }

        let dest_path = dest_dir.join(name);
        fs::copy(&source_path, &dest_path).map_err(|e| MaterializeError::Copy {
            from: source_path.clone(),
            to: dest_path.clone(),
            source: e,
        })?;
        info!("Copied: {}", name);
        report.copied.push(dest_path);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_source(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), name.as_bytes()).unwrap();
        }
    }

    #[test]
    fn test_copy_listed_files() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let dest_dir = dest.path().join("trees_within_plot");
        setup_source(source.path(), &["a.las", "b.las", "c.las"]);

        let report = copy_listed_files(&["c.las", "a.las"], source.path(), &dest_dir, false).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.copied.len(), 2);
        assert_eq!(fs::read_to_string(dest_dir.join("a.las")).unwrap(), "a.las");
        assert!(dest_dir.join("c.las").exists());
        assert!(!dest_dir.join("b.las").exists());
        // Sources stay in place.
        assert!(source.path().join("a.las").exists());
    }

    #[test]
    fn test_missing_files_reported() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        setup_source(source.path(), &["a.las"]);

        let report =
            copy_listed_files(&["a.las", "ghost.las"], source.path(), dest.path(), false).unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.missing, vec!["ghost.las".to_string()]);
        assert_eq!(report.copied.len(), 1);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let dest_dir = dest.path().join("subset");
        setup_source(source.path(), &["a.las"]);

        let report = copy_listed_files(&["a.las"], source.path(), &dest_dir, true).unwrap();

        assert_eq!(report.copied, vec![source.path().join("a.las")]);
        assert!(!dest_dir.exists());
    }

    #[test]
    fn test_missing_source_dir() {
        let dest = TempDir::new().unwrap();
        let result = copy_listed_files(&["a.las"], &dest.path().join("nope"), dest.path(), false);
        assert!(matches!(result, Err(MaterializeError::SourceNotFound(_))));
    }
}
