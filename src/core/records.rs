//! Stem centroid records.

use serde::{Deserialize, Serialize};

use super::projection::Crs;

/// Planar stem location extracted from one point-cloud file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StemCentroid {
    /// File name of the originating point cloud.
    pub filename: String,
    /// Mean x of the cross-section slice.
    #[serde(rename = "center_x")]
    pub x: f64,
    /// Mean y of the cross-section slice.
    #[serde(rename = "center_y")]
    pub y: f64,
}

impl StemCentroid {
    pub fn new(filename: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            filename: filename.into(),
            x,
            y,
        }
    }
}

/// Stem centroids together with the coordinate system they are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidSet {
    pub crs: Crs,
    pub records: Vec<StemCentroid>,
}

impl CentroidSet {
    pub fn new(crs: Crs, records: Vec<StemCentroid>) -> Self {
        Self { crs, records }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
