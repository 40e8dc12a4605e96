//! Conversion between boundary curves and boundary regions, and region offsetting.
//!
//! A plot boundary is digitised as a polyline ([`BoundaryCurve`]). Inclusion
//! tests and buffering need the filled polygon ([`BoundaryRegion`]). Both carry
//! the coordinate system they are expressed in.
//!
//! Offsetting is delegated to the Clipper engine through `geo-clipper`, which
//! works on fixed-point integers; `OffsetParams::scale` sets how many integer
//! steps make one length unit.

use geo::Area;
use geo_clipper::{Clipper, EndType, JoinType};
use geo_types::{Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::projection::Crs;

/// Errors raised by the geometry converter.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("invalid geometry kind: expected a single LineString, found {found}")]
    InvalidGeometryKind { found: String },

    #[error("boundary curve needs at least 3 distinct vertices, found {0}")]
    TooFewVertices(usize),

    #[error("offset by {distance} produced {parts} polygon(s); expected exactly one non-empty polygon")]
    DegenerateOffsetResult { distance: f64, parts: usize },
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

/// Outline of a plot as an ordered vertex sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCurve {
    pub line: LineString<f64>,
    pub crs: Crs,
}

/// Filled plot area.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRegion {
    pub polygon: Polygon<f64>,
    pub crs: Crs,
}

impl BoundaryRegion {
    /// Unsigned area of the region (holes subtracted).
    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }
}

/// Corner treatment for offset polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStyle {
    Round,
    Miter,
    Square,
}

/// Parameters of the offset engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetParams {
    pub join_style: JoinStyle,
    /// Maximum deviation of round joins from the true arc, in length units.
    pub arc_tolerance: f64,
    /// Miter limit as a multiple of the offset distance.
    pub miter_limit: f64,
    /// Integer steps per length unit.
    pub scale: f64,
}

impl Default for OffsetParams {
    fn default() -> Self {
        Self {
            join_style: JoinStyle::Round,
            arc_tolerance: 0.01,
            miter_limit: 2.0,
            scale: 1000.0,
        }
    }
}

impl OffsetParams {
    fn join_type(&self) -> JoinType {
        match self.join_style {
            JoinStyle::Round => JoinType::Round(self.arc_tolerance * self.scale),
            JoinStyle::Miter => JoinType::Miter(self.miter_limit),
            JoinStyle::Square => JoinType::Square,
        }
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Extracts a boundary curve from a loaded geometry.
///
/// Only a single `LineString` qualifies; polygons and multi-part geometries
/// are rejected with [`GeometryError::InvalidGeometryKind`].
pub fn curve_from_geometry(geometry: &Geometry<f64>, crs: Crs) -> Result<BoundaryCurve> {
    match geometry {
        Geometry::LineString(line) => Ok(BoundaryCurve {
            line: line.clone(),
            crs,
        }),
        other => Err(GeometryError::InvalidGeometryKind {
            found: geometry_kind(other).to_string(),
        }),
    }
}

/// Same as [`curve_from_geometry`] but for region sources: accepts a `Polygon`,
/// or the first part of a `MultiPolygon`.
pub fn region_from_geometry(geometry: &Geometry<f64>, crs: Crs) -> Result<BoundaryRegion> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(BoundaryRegion {
            polygon: polygon.clone(),
            crs,
        }),
        Geometry::MultiPolygon(multi) => {
            let first = multi.0.first().ok_or_else(|| GeometryError::InvalidGeometryKind {
                found: "empty MultiPolygon".to_string(),
            })?;
            if multi.0.len() > 1 {
                log::warn!(
                    "region has {} parts; only the first is used",
                    multi.0.len()
                );
            }
            Ok(BoundaryRegion {
                polygon: first.clone(),
                crs,
            })
        }
        other => Err(GeometryError::InvalidGeometryKind {
            found: geometry_kind(other).to_string(),
        }),
    }
}

/// Turns a boundary curve into a region.
///
/// An open curve is closed by repeating its first vertex at the end.
pub fn curve_to_region(curve: &BoundaryCurve) -> Result<BoundaryRegion> {
    let mut ring = curve.line.clone();
    ring.0.dedup();

    let distinct = if ring.is_closed() {
        ring.0.len().saturating_sub(1)
    } else {
        ring.0.len()
    };
    if distinct < 3 {
        return Err(GeometryError::TooFewVertices(distinct));
    }

    let mut coords = curve.line.0.clone();
    if !curve.line.is_closed() {
        coords.push(coords[0]);
    }

    Ok(BoundaryRegion {
        polygon: Polygon::new(LineString(coords), vec![]),
        crs: curve.crs,
    })
}

/// Returns the outer ring of a region as a curve.
///
/// Interior rings (holes) are dropped; downstream consumers expect hole-free
/// outlines.
pub fn region_to_curve(region: &BoundaryRegion) -> BoundaryCurve {
    BoundaryCurve {
        line: region.polygon.exterior().clone(),
        crs: region.crs,
    }
}

/// Buffers a region outward (positive distance) or inward (negative distance).
///
/// A zero distance returns the region unchanged. Results that collapse to
/// nothing or split into several pieces are reported as
/// [`GeometryError::DegenerateOffsetResult`].
pub fn offset_region(
    region: &BoundaryRegion,
    distance: f64,
    params: &OffsetParams,
) -> Result<BoundaryRegion> {
    if distance == 0.0 {
        return Ok(region.clone());
    }

    let result = region.polygon.offset(
        distance,
        params.join_type(),
        EndType::ClosedPolygon,
        params.scale,
    );

    let mut parts: Vec<Polygon<f64>> = result
        .0
        .into_iter()
        .filter(|p| p.unsigned_area() > 0.0)
        .collect();

    if parts.len() != 1 {
        return Err(GeometryError::DegenerateOffsetResult {
            distance,
            parts: parts.len(),
        });
    }

    Ok(BoundaryRegion {
        polygon: parts.remove(0),
        crs: region.crs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::BoundingRect;
    use geo_types::{Coord, MultiPolygon, Point};

    fn square_curve(size: f64, closed: bool) -> BoundaryCurve {
        let mut coords = vec![(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)];
        if closed {
            coords.push((0.0, 0.0));
        }
        BoundaryCurve {
            line: LineString::from(coords),
            crs: Crs::epsg(32755),
        }
    }

    fn square_region(size: f64) -> BoundaryRegion {
        curve_to_region(&square_curve(size, true)).unwrap()
    }

    #[test]
    fn test_closed_curve_to_region_keeps_vertices() {
        let curve = square_curve(10.0, true);
        let region = curve_to_region(&curve).unwrap();

        assert_eq!(region.polygon.exterior(), &curve.line);
        assert!(region.polygon.interiors().is_empty());
        assert_eq!(region.crs, curve.crs);
    }

    #[test]
    fn test_open_curve_is_closed() {
        let curve = square_curve(10.0, false);
        let region = curve_to_region(&curve).unwrap();

        let ring = &region.polygon.exterior().0;
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[4], Coord { x: 0.0, y: 0.0 });
        assert_eq!(&ring[..4], &curve.line.0[..]);
    }

    #[test]
    fn test_region_to_curve_round_trip() {
        let curve = square_curve(10.0, true);
        let back = region_to_curve(&curve_to_region(&curve).unwrap());
        assert_eq!(back, curve);
    }

    #[test]
    fn test_region_to_curve_drops_holes() {
        let outer = LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)]);
        let region = BoundaryRegion {
            polygon: Polygon::new(outer.clone(), vec![hole]),
            crs: Crs::epsg(32755),
        };

        let curve = region_to_curve(&region);
        assert_eq!(curve.line, outer);
    }

    #[test]
    fn test_too_few_vertices() {
        let curve = BoundaryCurve {
            line: LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            crs: Crs::epsg(32755),
        };
        assert!(matches!(
            curve_to_region(&curve),
            Err(GeometryError::TooFewVertices(2))
        ));
    }

    #[test]
    fn test_curve_from_polygon_is_invalid_kind() {
        let geometry = Geometry::Polygon(square_region(5.0).polygon);
        match curve_from_geometry(&geometry, Crs::epsg(32755)) {
            Err(GeometryError::InvalidGeometryKind { found }) => assert_eq!(found, "Polygon"),
            other => panic!("expected InvalidGeometryKind, got {:?}", other),
        }

        let point = Geometry::Point(Point::new(1.0, 2.0));
        assert!(curve_from_geometry(&point, Crs::epsg(32755)).is_err());
    }

    #[test]
    fn test_region_from_multipolygon_uses_first_part() {
        let first = square_region(5.0).polygon;
        let second = curve_to_region(&BoundaryCurve {
            line: LineString::from(vec![(20.0, 20.0), (30.0, 20.0), (30.0, 30.0), (20.0, 20.0)]),
            crs: Crs::epsg(32755),
        })
        .unwrap()
        .polygon;
        let geometry = Geometry::MultiPolygon(MultiPolygon(vec![first.clone(), second]));

        let region = region_from_geometry(&geometry, Crs::epsg(32755)).unwrap();
        assert_eq!(region.polygon, first);
    }

    #[test]
    fn test_offset_area_ordering() {
        let region = square_region(10.0);
        let params = OffsetParams::default();

        let shrunk = offset_region(&region, -1.5, &params).unwrap();
        let expanded = offset_region(&region, 1.5, &params).unwrap();

        assert!(shrunk.area() <= region.area());
        assert!(region.area() <= expanded.area());
        assert_eq!(shrunk.crs, region.crs);
    }

    #[test]
    fn test_shrink_square_by_two() {
        let region = square_region(10.0);
        let shrunk = offset_region(&region, -2.0, &OffsetParams::default()).unwrap();

        assert!((shrunk.area() - 36.0).abs() < 1e-6);

        let bounds = shrunk.polygon.bounding_rect().unwrap();
        assert!((bounds.min().x - 2.0).abs() < 1e-6);
        assert!((bounds.min().y - 2.0).abs() < 1e-6);
        assert!((bounds.max().x - 8.0).abs() < 1e-6);
        assert!((bounds.max().y - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_miter_expansion_keeps_square_corners() {
        let region = square_region(10.0);
        let params = OffsetParams {
            join_style: JoinStyle::Miter,
            ..OffsetParams::default()
        };
        let expanded = offset_region(&region, 1.0, &params).unwrap();
        assert!((expanded.area() - 144.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let region = square_region(10.0);
        let same = offset_region(&region, 0.0, &OffsetParams::default()).unwrap();
        assert_eq!(same, region);
    }

    #[test]
    fn test_collapsing_offset_is_degenerate() {
        let region = square_region(10.0);
        match offset_region(&region, -6.0, &OffsetParams::default()) {
            Err(GeometryError::DegenerateOffsetResult { distance, parts }) => {
                assert_eq!(distance, -6.0);
                assert_eq!(parts, 0);
            }
            other => panic!("expected DegenerateOffsetResult, got {:?}", other),
        }
    }

    #[test]
    fn test_split_offset_is_degenerate() {
        // Two 4x4 lobes joined by a 1-unit wide neck.
        let curve = BoundaryCurve {
            line: LineString::from(vec![
                (0.0, 0.0),
                (4.0, 0.0),
                (4.0, 1.5),
                (6.0, 1.5),
                (6.0, 0.0),
                (10.0, 0.0),
                (10.0, 4.0),
                (6.0, 4.0),
                (6.0, 2.5),
                (4.0, 2.5),
                (4.0, 4.0),
                (0.0, 4.0),
            ]),
            crs: Crs::epsg(32755),
        };
        let region = curve_to_region(&curve).unwrap();

        match offset_region(&region, -1.0, &OffsetParams::default()) {
            Err(GeometryError::DegenerateOffsetResult { parts, .. }) => assert_eq!(parts, 2),
            other => panic!("expected DegenerateOffsetResult, got {:?}", other),
        }
    }
}
