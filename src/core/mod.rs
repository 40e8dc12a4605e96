//! Core data types and I/O operations.

pub mod geometry;
pub mod loaders;
pub mod projection;
pub mod records;
pub mod vector;
pub mod writers;

pub use geometry::{BoundaryCurve, BoundaryRegion, GeometryError};
pub use loaders::{LoaderError, PointCloud};
pub use projection::{Crs, ProjectionError, Reprojection};
pub use records::{CentroidSet, StemCentroid};
pub use vector::{VectorError, VectorLayer};
pub use writers::{StagedFile, WriteError};
