//! Selection of stems inside a plot region.

use std::path::Path;

use geo::Contains;
use geo_types::Point;
use log::{info, warn};
use thiserror::Error;

use crate::core::geometry::{self, BoundaryRegion, GeometryError};
use crate::core::projection::Crs;
use crate::core::records::CentroidSet;
use crate::core::vector::{self, VectorError};

/// Errors that can occur while filtering stems.
#[derive(Debug, Error)]
pub enum ContainmentError {
    #[error("coordinate system mismatch: stem records are in {records}, region is in {region}")]
    CoordinateSystemMismatch { records: Crs, region: Crs },

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Result type for containment operations.
pub type Result<T> = std::result::Result<T, ContainmentError>;

/// Identifiers of the stems strictly inside `region`, in record order.
///
/// A stem lying exactly on the region boundary is not inside.
///
/// # Errors
///
/// [`ContainmentError::CoordinateSystemMismatch`] if the records and the
/// region are expressed in different coordinate systems.
pub fn filter_within(centroids: &CentroidSet, region: &BoundaryRegion) -> Result<Vec<String>> {
    if centroids.crs != region.crs {
        return Err(ContainmentError::CoordinateSystemMismatch {
            records: centroids.crs,
            region: region.crs,
        });
    }

    let within: Vec<String> = centroids
        .records
        .iter()
        .filter(|r| region.polygon.contains(&Point::new(r.x, r.y)))
        .map(|r| r.filename.clone())
        .collect();

    info!(
        "{} of {} stem(s) inside the region",
        within.len(),
        centroids.len()
    );

    Ok(within)
}

/// Load the region to filter against from a vector file.
///
/// The first feature is used. It must be a polygon; for a multi-polygon only
/// the first part is considered.
pub fn load_region(path: &Path) -> Result<BoundaryRegion> {
    let layer = vector::read_vector_file(path)?;
    if layer.geometries.len() > 1 {
        warn!(
            "{} holds {} features; using the first",
            path.display(),
            layer.geometries.len()
        );
    }
    Ok(geometry::region_from_geometry(layer.first(), layer.crs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::StemCentroid;
    use crate::core::vector::write_vector_file;
    use geo_types::{Geometry, LineString, Polygon};
    use tempfile::tempdir;

    fn square(crs: Crs) -> BoundaryRegion {
        BoundaryRegion {
            polygon: Polygon::new(
                LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]),
                vec![],
            ),
            crs,
        }
    }

    #[test]
    fn test_inside_outside_and_edge() {
        let crs = Crs::epsg(32755);
        let centroids = CentroidSet::new(
            crs,
            vec![
                StemCentroid::new("edge.las", 10.0, 5.0),
                StemCentroid::new("inside.las", 5.0, 5.0),
                StemCentroid::new("outside.las", 11.0, 5.0),
                StemCentroid::new("vertex.las", 0.0, 0.0),
                StemCentroid::new("inside_too.las", 0.5, 9.5),
            ],
        );

        let within = filter_within(&centroids, &square(crs)).unwrap();
        assert_eq!(within, vec!["inside.las".to_string(), "inside_too.las".to_string()]);
    }

    #[test]
    fn test_crs_mismatch_is_error() {
        let centroids = CentroidSet::new(
            Crs::epsg(32755),
            vec![StemCentroid::new("inside.las", 5.0, 5.0)],
        );

        match filter_within(&centroids, &square(Crs::epsg(32756))) {
            Err(ContainmentError::CoordinateSystemMismatch { records, region }) => {
                assert_eq!(records, Crs::epsg(32755));
                assert_eq!(region, Crs::epsg(32756));
            }
            other => panic!("expected CoordinateSystemMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_records() {
        let crs = Crs::epsg(32755);
        let within = filter_within(&CentroidSet::new(crs, vec![]), &square(crs)).unwrap();
        assert!(within.is_empty());
    }

    #[test]
    fn test_load_region_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shrunk_plot_polygon.geojson");
        let region = square(Crs::epsg(32755));
        write_vector_file(&path, &Geometry::Polygon(region.polygon.clone()), region.crs, "shrunk")
            .unwrap();

        let loaded = load_region(&path).unwrap();
        assert_eq!(loaded, region);
    }

    #[test]
    fn test_load_region_rejects_polyline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("original_plot_polyline.geojson");
        let line = square(Crs::epsg(32755)).polygon.exterior().clone();
        write_vector_file(&path, &Geometry::LineString(line), Crs::epsg(32755), "original")
            .unwrap();

        assert!(matches!(
            load_region(&path),
            Err(ContainmentError::Geometry(GeometryError::InvalidGeometryKind { .. }))
        ));
    }
}
