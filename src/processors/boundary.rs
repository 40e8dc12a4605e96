//! Plot boundary construction.
//!
//! A hand-digitised plot outline is loaded, reprojected into a metric
//! coordinate system, closed into a region and buffered into expanded and
//! shrunk variants. Each variant is kept both as a region and as its outline.

use std::fmt;
use std::path::{Path, PathBuf};

use geo_types::Geometry;
use log::info;
use thiserror::Error;

use crate::config::{BoundaryConfig, RegionVariant};
use crate::core::geometry::{
    self, BoundaryCurve, BoundaryRegion, GeometryError, OffsetParams,
};
use crate::core::projection::{Crs, ProjectionError, Reprojection};
use crate::core::vector::{self, VectorError};
use crate::core::writers::{self, StagedFile, WriteError};

/// Errors that can occur while building plot variants.
#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("{variant} variant: {source}")]
    Geometry {
        variant: RegionVariant,
        #[source]
        source: GeometryError,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Result type for boundary operations.
pub type Result<T> = std::result::Result<T, BoundaryError>;

impl RegionVariant {
    /// Prefix of the output file names.
    pub fn name(&self) -> &'static str {
        match self {
            RegionVariant::Original => "original",
            RegionVariant::Expanded => "expanded",
            RegionVariant::Shrunk => "shrunk",
        }
    }
}

impl fmt::Display for RegionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One boundary variant in both representations.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryVariant {
    pub kind: RegionVariant,
    pub region: BoundaryRegion,
    pub curve: BoundaryCurve,
}

impl BoundaryVariant {
    fn from_region(kind: RegionVariant, region: BoundaryRegion) -> Self {
        let curve = geometry::region_to_curve(&region);
        Self { kind, region, curve }
    }

    /// `{variant}_plot_polygon.geojson`
    pub fn region_file_name(&self) -> String {
        format!("{}_plot_polygon.geojson", self.kind.name())
    }

    /// `{variant}_plot_polyline.geojson`
    pub fn curve_file_name(&self) -> String {
        format!("{}_plot_polyline.geojson", self.kind.name())
    }
}

/// Original plot boundary plus the offset variants that were requested.
///
/// A variant whose distance was zero is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotVariants {
    pub original: BoundaryVariant,
    pub expanded: Option<BoundaryVariant>,
    pub shrunk: Option<BoundaryVariant>,
}

impl PlotVariants {
    /// Coordinate system shared by all variants.
    pub fn crs(&self) -> Crs {
        self.original.region.crs
    }

    /// Look up a variant by kind.
    pub fn get(&self, kind: RegionVariant) -> Option<&BoundaryVariant> {
        match kind {
            RegionVariant::Original => Some(&self.original),
            RegionVariant::Expanded => self.expanded.as_ref(),
            RegionVariant::Shrunk => self.shrunk.as_ref(),
        }
    }

    /// Present variants in original, expanded, shrunk order.
    pub fn iter(&self) -> impl Iterator<Item = &BoundaryVariant> {
        std::iter::once(&self.original)
            .chain(self.expanded.as_ref())
            .chain(self.shrunk.as_ref())
    }
}

fn offset_variant(
    kind: RegionVariant,
    base: &BoundaryRegion,
    distance: f64,
    params: &OffsetParams,
) -> Result<Option<BoundaryVariant>> {
    if distance == 0.0 {
        return Ok(None);
    }

    let region = geometry::offset_region(base, distance, params)
        .map_err(|source| BoundaryError::Geometry { variant: kind, source })?;
    info!(
        "{} variant: offset {} -> area {:.3}",
        kind,
        distance,
        region.area()
    );
    Ok(Some(BoundaryVariant::from_region(kind, region)))
}

/// Build the plot variants from an outline already in the target system.
///
/// `expand_distance` and `shrink_distance` are signed offsets (positive
/// outward, negative inward) applied to the original region. A zero distance
/// leaves the variant absent.
pub fn build_variants_from_curve(
    curve: &BoundaryCurve,
    expand_distance: f64,
    shrink_distance: f64,
    params: &OffsetParams,
) -> Result<PlotVariants> {
    let region = geometry::curve_to_region(curve).map_err(|source| BoundaryError::Geometry {
        variant: RegionVariant::Original,
        source,
    })?;

    let expanded = offset_variant(RegionVariant::Expanded, &region, expand_distance, params)?;
    let shrunk = offset_variant(RegionVariant::Shrunk, &region, shrink_distance, params)?;

    Ok(PlotVariants {
        original: BoundaryVariant::from_region(RegionVariant::Original, region),
        expanded,
        shrunk,
    })
}

/// Load a plot outline from `source` and build its variants.
///
/// The first feature of the file must be a single LineString. It is
/// reprojected from the file's coordinate system to `config.target_crs`.
///
/// # Errors
///
/// - [`VectorError::Open`]/[`VectorError::Parse`] if the file cannot be read
/// - [`VectorError::EmptyGeometry`] if it has no features
/// - [`GeometryError::InvalidGeometryKind`] if the first feature is not a LineString
/// - [`GeometryError::DegenerateOffsetResult`] if an offset collapses or splits the plot
pub fn build_plot_variants(
    source: &Path,
    expand_distance: f64,
    shrink_distance: f64,
    config: &BoundaryConfig,
) -> Result<PlotVariants> {
    let layer = vector::read_vector_file(source)?;
    info!(
        "Loaded {} ({} feature(s), {})",
        source.display(),
        layer.geometries.len(),
        layer.crs
    );

    let reprojection = Reprojection::new(layer.crs, config.target_crs)?;
    let projected: Geometry<f64> = reprojection.apply_geometry(layer.first());
    if !reprojection.is_identity() {
        info!("Reprojected {} -> {}", layer.crs, config.target_crs);
    }

    let curve = geometry::curve_from_geometry(&projected, config.target_crs).map_err(|source| {
        BoundaryError::Geometry {
            variant: RegionVariant::Original,
            source,
        }
    })?;

    build_variants_from_curve(&curve, expand_distance, shrink_distance, &config.offset_params())
}

/// Stage every present variant in `output_dir`, region and outline each.
///
/// Nothing is visible until the returned files are committed.
pub fn stage_plot_variants(variants: &PlotVariants, output_dir: &Path) -> Result<Vec<StagedFile>> {
    let crs = variants.crs();
    let mut staged = Vec::with_capacity(6);

    for variant in variants.iter() {
        let name = variant.kind.name();
        staged.push(vector::stage_vector_file(
            &output_dir.join(variant.region_file_name()),
            &Geometry::Polygon(variant.region.polygon.clone()),
            crs,
            name,
        )?);
        staged.push(vector::stage_vector_file(
            &output_dir.join(variant.curve_file_name()),
            &Geometry::LineString(variant.curve.line.clone()),
            crs,
            name,
        )?);
    }

    Ok(staged)
}

/// Write every present variant to `output_dir`, region and outline each.
///
/// All files are staged first and committed together at the end.
pub fn save_plot_variants(variants: &PlotVariants, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let staged = stage_plot_variants(variants, output_dir)?;
    let written = writers::commit_all(staged)?;
    info!("Wrote {} boundary file(s) to {}", written.len(), output_dir.display());
    Ok(written)
}
