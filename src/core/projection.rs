//! Coordinate reference systems and reprojection.
//!
//! A [`Crs`] is identified by its EPSG code. Reprojection supports the
//! combinations a field plot actually needs:
//! - WGS84 geographic (`EPSG:4326`, longitude/latitude order)
//! - WGS84 UTM zones (`EPSG:326zz` north, `EPSG:327zz` south)
//!
//! Transverse Mercator is evaluated with the Krüger series, which is
//! accurate to well below a millimetre inside a UTM zone.

use std::fmt;
use std::str::FromStr;

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EPSG code of WGS84 geographic coordinates.
pub const WGS84_EPSG: u32 = 4326;

// WGS84 ellipsoid
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;

// UTM parameters
const UTM_SCALE_FACTOR: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Errors raised while parsing or transforming coordinate systems.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("unrecognised coordinate reference system: '{0}'")]
    UnknownCrs(String),

    #[error("no transform available from {from} to {to}")]
    Unsupported { from: Crs, to: Crs },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Coordinate reference system, identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// Creates a CRS from an EPSG code.
    pub const fn epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// WGS84 longitude/latitude.
    pub const fn wgs84() -> Self {
        Self::epsg(WGS84_EPSG)
    }

    /// Returns the EPSG code.
    pub fn code(&self) -> u32 {
        self.epsg
    }

    /// OGC URN form used in the GeoJSON `crs` member.
    pub fn to_urn(&self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.epsg)
    }

    fn kind(&self) -> Option<CrsKind> {
        match self.epsg {
            WGS84_EPSG => Some(CrsKind::Geographic),
            32601..=32660 => Some(CrsKind::Utm {
                zone: self.epsg - 32600,
                south: false,
            }),
            32701..=32760 => Some(CrsKind::Utm {
                zone: self.epsg - 32700,
                south: true,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = ProjectionError;

    /// Accepts `EPSG:n`, `urn:ogc:def:crs:EPSG::n` (with or without a version)
    /// and the CRS84 URN.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower == "urn:ogc:def:crs:ogc:1.3:crs84" || lower == "urn:ogc:def:crs:ogc::crs84" {
            return Ok(Crs::wgs84());
        }

        let code = if let Some(rest) = lower.strip_prefix("epsg:") {
            rest
        } else if let Some(rest) = lower.strip_prefix("urn:ogc:def:crs:epsg:") {
            // Optional version segment: "urn:ogc:def:crs:EPSG:9.9:32755"
            rest.rsplit(':').next().unwrap_or(rest)
        } else {
            return Err(ProjectionError::UnknownCrs(trimmed.to_string()));
        };

        code.parse::<u32>()
            .map(Crs::epsg)
            .map_err(|_| ProjectionError::UnknownCrs(trimmed.to_string()))
    }
}

impl TryFrom<String> for Crs {
    type Error = ProjectionError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CrsKind {
    Geographic,
    Utm { zone: u32, south: bool },
}

/// A resolved transform between two coordinate systems.
///
/// Construction validates the pair, so applying the transform cannot fail.
#[derive(Debug, Clone, Copy)]
pub struct Reprojection {
    from: CrsKind,
    to: CrsKind,
    identity: bool,
}

impl Reprojection {
    /// Resolves a transform from `from` to `to`.
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        if from == to {
            return Ok(Self {
                from: CrsKind::Geographic,
                to: CrsKind::Geographic,
                identity: true,
            });
        }

        match (from.kind(), to.kind()) {
            (Some(from_kind), Some(to_kind)) => Ok(Self {
                from: from_kind,
                to: to_kind,
                identity: false,
            }),
            _ => Err(ProjectionError::Unsupported { from, to }),
        }
    }

    /// Returns true if this transform leaves coordinates unchanged.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Transforms a single coordinate.
    pub fn apply(&self, coord: Coord<f64>) -> Coord<f64> {
        if self.identity {
            return coord;
        }

        let (lon, lat) = match self.from {
            CrsKind::Geographic => (coord.x, coord.y),
            CrsKind::Utm { zone, south } => utm_to_geographic(coord.x, coord.y, zone, south),
        };

        match self.to {
            CrsKind::Geographic => Coord { x: lon, y: lat },
            CrsKind::Utm { zone, south } => {
                let (x, y) = geographic_to_utm(lon, lat, zone, south);
                Coord { x, y }
            }
        }
    }

    /// Transforms every coordinate of a geometry.
    pub fn apply_geometry(&self, geometry: &Geometry<f64>) -> Geometry<f64> {
        if self.identity {
            return geometry.clone();
        }
        geometry.map_coords(|c| self.apply(c))
    }
}

/// Krüger series coefficients for the WGS84 ellipsoid.
struct KruegerSeries {
    /// Rectifying radius.
    a_hat: f64,
    /// First eccentricity.
    e: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl KruegerSeries {
    fn wgs84() -> Self {
        let n = FLATTENING / (2.0 - FLATTENING);
        let n2 = n * n;
        let n3 = n2 * n;

        Self {
            a_hat: SEMI_MAJOR_AXIS / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
            e: 2.0 * n.sqrt() / (1.0 + n),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    }
}

fn central_meridian_deg(zone: u32) -> f64 {
    zone as f64 * 6.0 - 183.0
}

/// Forward UTM projection. Angles in degrees, result in metres.
fn geographic_to_utm(lon: f64, lat: f64, zone: u32, south: bool) -> (f64, f64) {
    let k = KruegerSeries::wgs84();
    let phi = lat.to_radians();
    let dlambda = (lon - central_meridian_deg(zone)).to_radians();

    let sin_phi = phi.sin();
    let t = (sin_phi.atanh() - k.e * (k.e * sin_phi).atanh()).sinh();
    let xi_p = t.atan2(dlambda.cos());
    let eta_p = (dlambda.sin() / (1.0 + t * t).sqrt()).atanh();

    let mut xi = xi_p;
    let mut eta = eta_p;
    for (j, alpha) in k.alpha.iter().enumerate() {
        let m = 2.0 * (j + 1) as f64;
        xi += alpha * (m * xi_p).sin() * (m * eta_p).cosh();
        eta += alpha * (m * xi_p).cos() * (m * eta_p).sinh();
    }

    let easting = UTM_FALSE_EASTING + UTM_SCALE_FACTOR * k.a_hat * eta;
    let false_northing = if south { UTM_FALSE_NORTHING_SOUTH } else { 0.0 };
    let northing = false_northing + UTM_SCALE_FACTOR * k.a_hat * xi;

    (easting, northing)
}

/// Inverse UTM projection. Metres in, degrees (lon, lat) out.
fn utm_to_geographic(easting: f64, northing: f64, zone: u32, south: bool) -> (f64, f64) {
    let k = KruegerSeries::wgs84();
    let false_northing = if south { UTM_FALSE_NORTHING_SOUTH } else { 0.0 };

    let xi = (northing - false_northing) / (UTM_SCALE_FACTOR * k.a_hat);
    let eta = (easting - UTM_FALSE_EASTING) / (UTM_SCALE_FACTOR * k.a_hat);

    let mut xi_p = xi;
    let mut eta_p = eta;
    for (j, beta) in k.beta.iter().enumerate() {
        let m = 2.0 * (j + 1) as f64;
        xi_p -= beta * (m * xi).sin() * (m * eta).cosh();
        eta_p -= beta * (m * xi).cos() * (m * eta).sinh();
    }

    let chi = (xi_p.sin() / eta_p.cosh()).asin();
    let mut phi = chi;
    for (j, delta) in k.delta.iter().enumerate() {
        phi += delta * (2.0 * (j + 1) as f64 * chi).sin();
    }

    let dlambda = eta_p.sinh().atan2(xi_p.cos());
    let lon = central_meridian_deg(zone) + dlambda.to_degrees();

    (lon, phi.to_degrees())
}
