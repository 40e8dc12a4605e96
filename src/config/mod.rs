//! Configuration types for the plot pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::geometry::{JoinStyle, OffsetParams};
use crate::core::projection::Crs;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for stem centroid extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Height of the cross-section band above the lowest point
    #[serde(default = "default_slice_thickness")]
    pub slice_thickness: f64,

    /// Only files whose name ends with this suffix are processed
    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,

    /// Coordinate system of the point clouds
    #[serde(default = "default_crs")]
    pub crs: Crs,
}

fn default_slice_thickness() -> f64 {
    0.5
}

fn default_file_suffix() -> String {
    ".las".to_string()
}

fn default_crs() -> Crs {
    Crs::epsg(32755) // WGS84 / UTM zone 55S
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            slice_thickness: default_slice_thickness(),
            file_suffix: default_file_suffix(),
            crs: default_crs(),
        }
    }
}

/// Configuration for plot boundary construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Metric coordinate system the boundary is reprojected into
    #[serde(default = "default_crs")]
    pub target_crs: Crs,

    /// Outward offset; 0 disables the expanded variant
    #[serde(default)]
    pub expand_distance: f64,

    /// Signed offset of the shrunk variant (negative = inward); 0 disables it
    #[serde(default = "default_shrink_distance")]
    pub shrink_distance: f64,

    #[serde(default = "default_join_style")]
    pub join_style: JoinStyle,

    /// Maximum deviation of round corners from the true arc
    #[serde(default = "default_arc_tolerance")]
    pub arc_tolerance: f64,

    #[serde(default = "default_miter_limit")]
    pub miter_limit: f64,

    /// Fixed-point steps per length unit used by the offset engine
    #[serde(default = "default_clipper_scale")]
    pub clipper_scale: f64,
}

fn default_shrink_distance() -> f64 {
    -5.0
}

fn default_join_style() -> JoinStyle {
    JoinStyle::Round
}

fn default_arc_tolerance() -> f64 {
    0.01
}

fn default_miter_limit() -> f64 {
    2.0
}

fn default_clipper_scale() -> f64 {
    1000.0
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            target_crs: default_crs(),
            expand_distance: 0.0,
            shrink_distance: default_shrink_distance(),
            join_style: default_join_style(),
            arc_tolerance: default_arc_tolerance(),
            miter_limit: default_miter_limit(),
            clipper_scale: default_clipper_scale(),
        }
    }
}

impl BoundaryConfig {
    /// Offset engine parameters.
    pub fn offset_params(&self) -> OffsetParams {
        OffsetParams {
            join_style: self.join_style,
            arc_tolerance: self.arc_tolerance,
            miter_limit: self.miter_limit,
            scale: self.clipper_scale,
        }
    }
}

/// Which boundary variant the containment filter tests against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionVariant {
    Original,
    Expanded,
    Shrunk,
}

/// Configuration for the containment filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_region_variant")]
    pub region_variant: RegionVariant,
}

fn default_region_variant() -> RegionVariant {
    RegionVariant::Shrunk
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            region_variant: default_region_variant(),
        }
    }
}

/// Locations used by the `run` command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory of per-tree point clouds
    #[serde(default)]
    pub point_cloud_dir: Option<PathBuf>,

    /// Hand-digitised plot outline (GeoJSON LineString)
    #[serde(default)]
    pub boundary_source: Option<PathBuf>,

    /// Directory receiving tables and boundary variants
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Destination of the within-plot point cloud copies
    #[serde(default)]
    pub within_plot_dir: Option<PathBuf>,
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub boundary: BoundaryConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<()> {
        let thickness = self.extraction.slice_thickness;
        if !thickness.is_finite() || thickness <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "extraction.slice_thickness must be positive, got {}",
                thickness
            )));
        }
        if self.extraction.file_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "extraction.file_suffix must not be empty".to_string(),
            ));
        }

        let b = &self.boundary;
        for (name, value) in [
            ("expand_distance", b.expand_distance),
            ("shrink_distance", b.shrink_distance),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "boundary.{} must be finite, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("clipper_scale", b.clipper_scale),
            ("arc_tolerance", b.arc_tolerance),
            ("miter_limit", b.miter_limit),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "boundary.{} must be positive, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}
