//! Vector artifacts stored as GeoJSON.
//!
//! Boundaries are exchanged as GeoJSON feature collections carrying the
//! legacy named-CRS member, as written by common GIS tooling:
//!
//! ```json
//! {"type": "FeatureCollection",
//!  "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32755"}},
//!  "features": [...]}
//! ```
//!
//! A document without a `crs` member is WGS84 longitude/latitude.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use geo_types::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::projection::{Crs, ProjectionError};
use super::writers::{StagedFile, WriteError};

/// Errors raised while reading or writing vector artifacts.
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("cannot open vector file '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse vector file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("vector file '{0}' contains no features with geometry")]
    EmptyGeometry(PathBuf),

    #[error("invalid coordinates in '{path}': {reason}")]
    InvalidCoordinates { path: PathBuf, reason: String },

    #[error("unsupported geometry type '{0}' for output")]
    UnsupportedOutput(&'static str),

    #[error(transparent)]
    Crs(#[from] ProjectionError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Result type for vector operations.
pub type Result<T> = std::result::Result<T, VectorError>;

/// Geometries of one vector file with their coordinate system.
#[derive(Debug, Clone)]
pub struct VectorLayer {
    pub crs: Crs,
    pub geometries: Vec<Geometry<f64>>,
}

impl VectorLayer {
    /// First geometry of the layer. Loading guarantees there is one.
    pub fn first(&self) -> &Geometry<f64> {
        &self.geometries[0]
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum GeoJson {
    FeatureCollection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crs: Option<NamedCrs>,
        features: Vec<Feature>,
    },
    Feature {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crs: Option<NamedCrs>,
        #[serde(default)]
        properties: Option<serde_json::Map<String, serde_json::Value>>,
        geometry: Option<GeometryObject>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
    geometry: Option<GeometryObject>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedCrs {
    #[serde(rename = "type")]
    kind: String,
    properties: NamedCrsProperties,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedCrsProperties {
    name: String,
}

type Position = Vec<f64>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum GeometryObject {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
    MultiLineString(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

fn to_coord(position: &[f64]) -> std::result::Result<Coord<f64>, String> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
        [_, _, ..] => Err("non-finite coordinate".to_string()),
        _ => Err(format!("position with {} element(s)", position.len())),
    }
}

fn to_line(positions: &[Position]) -> std::result::Result<LineString<f64>, String> {
    positions
        .iter()
        .map(|p| to_coord(p))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(LineString)
}

fn to_polygon(rings: &[Vec<Position>]) -> std::result::Result<Polygon<f64>, String> {
    let mut rings = rings.iter().map(|r| to_line(r));
    let exterior = rings.next().ok_or("polygon without rings")??;
    let interiors = rings.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

impl GeometryObject {
    fn to_geo(&self) -> std::result::Result<Geometry<f64>, String> {
        Ok(match self {
            GeometryObject::Point(p) => Geometry::Point(Point(to_coord(p)?)),
            GeometryObject::LineString(line) => Geometry::LineString(to_line(line)?),
            GeometryObject::Polygon(rings) => Geometry::Polygon(to_polygon(rings)?),
            GeometryObject::MultiLineString(lines) => Geometry::MultiLineString(MultiLineString(
                lines
                    .iter()
                    .map(|l| to_line(l))
                    .collect::<std::result::Result<_, _>>()?,
            )),
            GeometryObject::MultiPolygon(polygons) => Geometry::MultiPolygon(MultiPolygon(
                polygons
                    .iter()
                    .map(|p| to_polygon(p))
                    .collect::<std::result::Result<_, _>>()?,
            )),
        })
    }

    fn from_geo(geometry: &Geometry<f64>) -> Result<Self> {
        fn positions(line: &LineString<f64>) -> Vec<Position> {
            line.coords().map(|c| vec![c.x, c.y]).collect()
        }
        fn rings(polygon: &Polygon<f64>) -> Vec<Vec<Position>> {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(positions)
                .collect()
        }

        match geometry {
            Geometry::Point(p) => Ok(GeometryObject::Point(vec![p.x(), p.y()])),
            Geometry::LineString(line) => Ok(GeometryObject::LineString(positions(line))),
            Geometry::Polygon(polygon) => Ok(GeometryObject::Polygon(rings(polygon))),
            Geometry::MultiLineString(lines) => Ok(GeometryObject::MultiLineString(
                lines.iter().map(positions).collect(),
            )),
            Geometry::MultiPolygon(polygons) => Ok(GeometryObject::MultiPolygon(
                polygons.iter().map(rings).collect(),
            )),
            Geometry::Line(_) => Err(VectorError::UnsupportedOutput("Line")),
            Geometry::MultiPoint(_) => Err(VectorError::UnsupportedOutput("MultiPoint")),
            Geometry::GeometryCollection(_) => {
                Err(VectorError::UnsupportedOutput("GeometryCollection"))
            }
            Geometry::Rect(_) => Err(VectorError::UnsupportedOutput("Rect")),
            Geometry::Triangle(_) => Err(VectorError::UnsupportedOutput("Triangle")),
        }
    }
}

/// Read all feature geometries of a GeoJSON file.
///
/// # Errors
///
/// - [`VectorError::Open`] / [`VectorError::Parse`] if the file is missing or
///   not valid GeoJSON
/// - [`VectorError::EmptyGeometry`] if no feature carries a geometry
pub fn read_vector_file<P: AsRef<Path>>(path: P) -> Result<VectorLayer> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| VectorError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    let document: GeoJson =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| VectorError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

    let (crs, objects) = match document {
        GeoJson::FeatureCollection { crs, features } => (
            crs,
            features.into_iter().filter_map(|f| f.geometry).collect::<Vec<_>>(),
        ),
        GeoJson::Feature { crs, geometry, .. } => (crs, geometry.into_iter().collect()),
    };

    let crs = match crs {
        Some(named) => named.properties.name.parse::<Crs>()?,
        None => Crs::wgs84(),
    };

    if objects.is_empty() {
        return Err(VectorError::EmptyGeometry(path.to_path_buf()));
    }

    let geometries = objects
        .iter()
        .map(GeometryObject::to_geo)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|reason| VectorError::InvalidCoordinates {
            path: path.to_path_buf(),
            reason,
        })?;

    Ok(VectorLayer { crs, geometries })
}

/// Serialise one geometry as a single-feature collection into a staged file.
///
/// The file becomes visible at `path` only when the returned [`StagedFile`]
/// is committed.
pub fn stage_vector_file(
    path: &Path,
    geometry: &Geometry<f64>,
    crs: Crs,
    variant: &str,
) -> Result<StagedFile> {
    let mut properties = serde_json::Map::new();
    properties.insert("variant".to_string(), serde_json::Value::from(variant));

    let document = GeoJson::FeatureCollection {
        crs: Some(NamedCrs {
            kind: "name".to_string(),
            properties: NamedCrsProperties { name: crs.to_urn() },
        }),
        features: vec![Feature {
            kind: "Feature".to_string(),
            properties: Some(properties),
            geometry: Some(GeometryObject::from_geo(geometry)?),
        }],
    };

    let mut staged = StagedFile::create(path)?;
    staged.write_with(|w| {
        serde_json::to_writer(&mut *w, &document)?;
        writeln!(w)
    })?;

    Ok(staged)
}

/// Write one geometry to a GeoJSON file immediately.
pub fn write_vector_file(path: &Path, geometry: &Geometry<f64>, crs: Crs, variant: &str) -> Result<()> {
    stage_vector_file(path, geometry, crs, variant)?.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PLOT_LINE: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32755"}},
        "features": [
            {"type": "Feature", "properties": {"id": 1},
             "geometry": {"type": "LineString",
                          "coordinates": [[0, 0, 12.5], [10, 0, 12.5], [10, 10, 12.5], [0, 10, 12.5]]}},
            {"type": "Feature", "properties": null, "geometry": null}
        ]
    }"#;

    #[test]
    fn test_read_feature_collection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plot.geojson");
        std::fs::write(&path, PLOT_LINE).unwrap();

        let layer = read_vector_file(&path).unwrap();
        assert_eq!(layer.crs, Crs::epsg(32755));
        assert_eq!(layer.geometries.len(), 1);
        match layer.first() {
            Geometry::LineString(line) => {
                assert_eq!(line.0.len(), 4);
                assert_eq!(line.0[1], Coord { x: 10.0, y: 0.0 });
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_read_single_feature_defaults_to_wgs84() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plot.geojson");
        std::fs::write(
            &path,
            r#"{"type": "Feature", "properties": {},
                "geometry": {"type": "Point", "coordinates": [145.9, -17.3]}}"#,
        )
        .unwrap();

        let layer = read_vector_file(&path).unwrap();
        assert_eq!(layer.crs, Crs::wgs84());
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let dir = tempdir().unwrap();
        let result = read_vector_file(dir.path().join("nope.geojson"));
        assert!(matches!(result, Err(VectorError::Open { .. })));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.geojson");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_vector_file(&path), Err(VectorError::Parse { .. })));
    }

    #[test]
    fn test_no_features_is_empty_geometry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.geojson");
        std::fs::write(&path, r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert!(matches!(
            read_vector_file(&path),
            Err(VectorError::EmptyGeometry(_))
        ));
    }

    #[test]
    fn test_short_position_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.geojson");
        std::fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "LineString", "coordinates": [[1], [2, 3]]}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            read_vector_file(&path),
            Err(VectorError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn test_write_then_read_polygon_with_crs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shrunk_plot_polygon.geojson");
        let polygon = Polygon::new(
            LineString::from(vec![(2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0), (2.0, 2.0)]),
            vec![],
        );

        write_vector_file(&path, &Geometry::Polygon(polygon.clone()), Crs::epsg(32755), "shrunk")
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("urn:ogc:def:crs:EPSG::32755"));
        assert!(raw.contains("\"variant\":\"shrunk\""));

        let layer = read_vector_file(&path).unwrap();
        assert_eq!(layer.crs, Crs::epsg(32755));
        assert_eq!(layer.first(), &Geometry::Polygon(polygon));
    }
}
