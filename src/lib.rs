//! Stem location extraction and plot-boundary filtering for forestry point clouds.
//!
//! The pipeline has three stages:
//! - extract a ground-level stem centroid from each per-tree point cloud
//! - build a plot region from a digitised outline and buffer it inward/outward
//! - keep the stems strictly inside the (shrunk) plot region
//!
//! A final step copies the selected point clouds into a subset directory.
//!
//! # Example
//!
//! ```no_run
//! use plot_stems::config::PipelineConfig;
//! use plot_stems::processors::{build_plot_variants, extract_centroids, filter_within};
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let report = extract_centroids(Path::new("trees/"), &config.extraction).unwrap();
//! let plot = build_plot_variants(Path::new("plot.geojson"), 0.0, -5.0, &config.boundary).unwrap();
//! let shrunk = plot.shrunk.unwrap();
//! let within = filter_within(&report.centroids, &shrunk.region).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{BoundaryConfig, ExtractionConfig, FilterConfig, PipelineConfig, RegionVariant};
pub use core::{BoundaryCurve, BoundaryRegion, CentroidSet, Crs, PointCloud, StemCentroid};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
