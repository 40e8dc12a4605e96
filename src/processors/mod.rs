//! Pipeline stages.

pub mod boundary;
pub mod centroids;
pub mod containment;
pub mod materialize;

// Re-export key types for convenience
pub use boundary::{
    build_plot_variants, build_variants_from_curve, save_plot_variants, stage_plot_variants,
    BoundaryError, BoundaryVariant, PlotVariants,
};
pub use centroids::{
    cross_section_centroid, extract_centroids, extract_centroids_from_files,
    extract_centroids_with_progress, find_point_clouds, ExtractionError, ExtractionFailure,
    ExtractionReport, FileOutcome,
};
pub use containment::{filter_within, load_region, ContainmentError};
pub use materialize::{copy_listed_files, MaterializeError, MaterializeReport};
