//! Data loaders for point-cloud files and pipeline tables.
//!
//! This module provides parsers for:
//! - LAS/LAZ point clouds (via the `las` crate)
//! - ASCII PLY point clouds (x, y, z vertex properties)
//! - Cartesian point cloud CSV files (x, y, z columns)
//! - Stem centroid tables (`filename,center_x,center_y`)
//! - Filename lists (`filename`)

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use las::{Read, Reader};
use thiserror::Error;

use super::records::StemCentroid;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error("Unsupported point cloud format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid PLY file: {0}")]
    InvalidPly(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Container for 3D point cloud data.
///
/// Only positions are kept; intensity, classification and other
/// per-point attributes are discarded on load.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    /// X coordinates of all points.
    pub x: Vec<f64>,
    /// Y coordinates of all points.
    pub y: Vec<f64>,
    /// Z coordinates of all points.
    pub z: Vec<f64>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new point cloud from coordinate vectors.
    pub fn from_xyz(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        debug_assert!(x.len() == y.len() && y.len() == z.len());
        Self { x, y, z }
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Adds a point to the cloud.
    #[inline]
    pub fn push(&mut self, x: f64, y: f64, z: f64) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
    }
}

/// Upper bound on points reserved from a header count before any are read.
const MAX_RESERVED_POINTS: usize = 1 << 20;

/// Load a point cloud, choosing the reader from the file extension.
///
/// | extension      | reader                  |
/// |----------------|-------------------------|
/// | `las`, `laz`   | [`load_las`]            |
/// | `ply`          | [`load_ply`]            |
/// | `csv`, `xyz`   | [`load_cartesian_csv`]  |
///
/// # Errors
///
/// Returns [`LoaderError::UnsupportedFormat`] for any other extension, or the
/// error of the selected reader.
pub fn load_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "las" | "laz" => load_las(path),
        "ply" => load_ply(path),
        "csv" | "xyz" => load_cartesian_csv(path),
        _ => Err(LoaderError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Load the point positions of a LAS or LAZ file.
///
/// Coordinates are returned with scale and offset from the header applied.
pub fn load_las<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let mut reader = Reader::from_path(path.as_ref())?;
    let count = reader.header().number_of_points();
    let mut cloud = PointCloud::with_capacity(count.min(MAX_RESERVED_POINTS as u64) as usize);

    for point in reader.points() {
        let point = point?;
        cloud.push(point.x, point.y, point.z);
    }

    Ok(cloud)
}

/// Load a Cartesian point cloud from a CSV file with x, y, z columns.
///
/// The CSV must have a header row with columns named 'x', 'y', 'z'
/// (case-insensitive). Every coordinate cell must parse as a float.
pub fn load_cartesian_csv<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map = column_index(&headers);
    let x_idx = require_column(&col_map, "x")?;
    let y_idx = require_column(&col_map, "y")?;
    let z_idx = require_column(&col_map, "z")?;

    let mut cloud = PointCloud::with_capacity(10_000);

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let x = parse_cell(&record, x_idx, "x", row)?;
        let y = parse_cell(&record, y_idx, "y", row)?;
        let z = parse_cell(&record, z_idx, "z", row)?;
        cloud.push(x, y, z);
    }

    Ok(cloud)
}

/// Load a point cloud from an ASCII PLY file.
///
/// Only the x, y, z vertex properties are read; any other properties are
/// skipped.
///
/// # Errors
///
/// Returns an error if the file is not an ASCII PLY, lacks the x/y/z
/// properties, or holds fewer vertices than its header announces.
pub fn load_ply<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    // Check PLY magic number
    let first_line = lines
        .next()
        .ok_or_else(|| LoaderError::InvalidPly("Empty file".to_string()))??;

    if !first_line.trim().starts_with("ply") {
        return Err(LoaderError::InvalidPly(format!(
            "{} is not a PLY file",
            path.display()
        )));
    }

    let mut num_vertices: Option<usize> = None;
    let mut prop_names: Vec<String> = Vec::new();
    let mut header_done = false;
    let mut in_vertex_element = false;

    for line in &mut lines {
        let line = line?;
        let stripped = line.trim();

        if stripped.starts_with("format") && !stripped.contains("ascii") {
            return Err(LoaderError::InvalidPly(format!(
                "only ASCII PLY is supported: '{}'",
                stripped
            )));
        } else if stripped.starts_with("element") {
            in_vertex_element = stripped.starts_with("element vertex");
            if in_vertex_element {
                num_vertices = stripped
                    .split_whitespace()
                    .last()
                    .and_then(|count| count.parse().ok());
            }
        } else if stripped.starts_with("property") && in_vertex_element {
            if let Some(name) = stripped.split_whitespace().last() {
                prop_names.push(name.to_string());
            }
        } else if stripped == "end_header" {
            header_done = true;
            break;
        }
    }

    let num_vertices = num_vertices
        .ok_or_else(|| LoaderError::InvalidPly("No vertex count in header".to_string()))?;

    if !header_done {
        return Err(LoaderError::InvalidPly("Missing end_header".to_string()));
    }

    let prop_idx: HashMap<&str, usize> = prop_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let x_idx = require_column(&prop_idx, "x")?;
    let y_idx = require_column(&prop_idx, "y")?;
    let z_idx = require_column(&prop_idx, "z")?;

    // Header counts are untrusted; the vectors grow past this as vertices arrive.
    let mut cloud = PointCloud::with_capacity(num_vertices.min(MAX_RESERVED_POINTS));

    for line in lines {
        if cloud.len() >= num_vertices {
            break;
        }

        let line = line?;
        let values: Vec<&str> = line.split_whitespace().collect();

        if values.len() < prop_names.len() {
            continue;
        }

        let parse = |idx: usize, axis: &str| -> Result<f64> {
            values[idx].parse().map_err(|_| {
                LoaderError::ParseError(format!("Invalid {} value: {}", axis, values[idx]))
            })
        };

        cloud.push(parse(x_idx, "x")?, parse(y_idx, "y")?, parse(z_idx, "z")?);
    }

    if cloud.len() < num_vertices {
        return Err(LoaderError::InvalidPly(format!(
            "Expected {} vertices, found {}",
            num_vertices,
            cloud.len()
        )));
    }

    Ok(cloud)
}

/// Load stem centroid records from a `filename,center_x,center_y` table.
///
/// Rows keep their file order.
pub fn load_centroids_csv<P: AsRef<Path>>(path: P) -> Result<Vec<StemCentroid>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map = column_index(&headers);
    let name_idx = require_column(&col_map, "filename")?;
    let x_idx = require_column(&col_map, "center_x")?;
    let y_idx = require_column(&col_map, "center_y")?;

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let filename = record
            .get(name_idx)
            .ok_or_else(|| LoaderError::ParseError(format!("row {}: missing filename", row + 1)))?;
        let x = parse_cell(&record, x_idx, "center_x", row)?;
        let y = parse_cell(&record, y_idx, "center_y", row)?;
        records.push(StemCentroid::new(filename, x, y));
    }

    Ok(records)
}

/// Load the `filename` column of a table. Other columns are ignored.
pub fn load_filename_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let name_idx = require_column(&column_index(&headers), "filename")?;

    let mut names = Vec::new();
    for result in reader.records() {
        let record = result?;
        if let Some(name) = record.get(name_idx).filter(|n| !n.is_empty()) {
            names.push(name.to_string());
        }
    }

    Ok(names)
}

/// Map lowercase header names to their column index.
fn column_index(headers: &csv::StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect()
}

fn require_column<K>(map: &HashMap<K, usize>, name: &str) -> Result<usize>
where
    K: std::borrow::Borrow<str> + std::hash::Hash + Eq,
{
    map.get(name)
        .copied()
        .ok_or_else(|| LoaderError::MissingColumns(name.to_string()))
}

fn parse_cell(record: &csv::StringRecord, idx: usize, column: &str, row: usize) -> Result<f64> {
    let cell = record.get(idx).unwrap_or("");
    cell.parse().map_err(|_| {
        LoaderError::ParseError(format!(
            "row {}: invalid {} value '{}'",
            row + 1,
            column,
            cell
        ))
    })
}
