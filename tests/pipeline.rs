//! End-to-end runs of the plot pipeline over temporary directories.

use std::fs;
use std::io::Write;
use std::path::Path;

use geo_types::{Geometry, LineString};
use tempfile::TempDir;

use plot_stems::config::BoundaryConfig;
use plot_stems::core::loaders::{load_centroids_csv, load_filename_list};
use plot_stems::core::vector::write_vector_file;
use plot_stems::core::writers::{write_centroids_csv, write_filenames_csv};
use plot_stems::processors::{
    build_plot_variants, copy_listed_files, extract_centroids, filter_within, load_region,
    save_plot_variants, ContainmentError,
};
use plot_stems::{CentroidSet, Crs, ExtractionConfig, RegionVariant};

const X0: f64 = 500_000.0;
const Y0: f64 = 6_000_000.0;

fn utm() -> Crs {
    Crs::epsg(32755)
}

/// 10 x 10 m square outline, digitised as an open polyline.
fn write_outline(path: &Path) {
    let outline = LineString::from(vec![
        (X0, Y0),
        (X0 + 10.0, Y0),
        (X0 + 10.0, Y0 + 10.0),
        (X0, Y0 + 10.0),
    ]);
    write_vector_file(path, &Geometry::LineString(outline), utm(), "source").unwrap();
}

/// A small trunk: a ring of ground points around (cx, cy) and some canopy above.
fn write_tree(dir: &Path, name: &str, cx: f64, cy: f64) {
    let mut file = fs::File::create(dir.join(name)).unwrap();
    writeln!(file, "x,y,z").unwrap();
    for (dx, dy) in [(0.1, 0.0), (-0.1, 0.0), (0.0, 0.1), (0.0, -0.1)] {
        writeln!(file, "{},{},{}", cx + dx, cy + dy, 101.2).unwrap();
    }
    writeln!(file, "{},{},{}", cx + 3.0, cy + 3.0, 115.0).unwrap();
}

fn boundary_config() -> BoundaryConfig {
    BoundaryConfig {
        target_crs: utm(),
        ..BoundaryConfig::default()
    }
}

#[test]
fn test_shrunk_plot_excludes_edge_stem() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("plot_outline.geojson");
    write_outline(&source);

    let variants = build_plot_variants(&source, 0.0, -2.0, &boundary_config()).unwrap();
    assert!(variants.expanded.is_none());

    let original = &variants.original.region;
    let shrunk = &variants.get(RegionVariant::Shrunk).unwrap().region;
    assert!((original.area() - 100.0).abs() < 1e-6);
    assert!((shrunk.area() - 36.0).abs() < 1e-3);

    let centroids = CentroidSet::new(
        utm(),
        vec![
            plot_stems::StemCentroid::new("centre.las", X0 + 5.0, Y0 + 5.0),
            plot_stems::StemCentroid::new("edge.las", X0 + 9.9, Y0 + 5.0),
        ],
    );

    assert_eq!(filter_within(&centroids, shrunk).unwrap(), vec!["centre.las"]);
    assert_eq!(
        filter_within(&centroids, original).unwrap(),
        vec!["centre.las", "edge.las"]
    );
}

#[test]
fn test_pipeline_through_files() {
    let work = TempDir::new().unwrap();
    let clouds = work.path().join("clouds");
    let output = work.path().join("output");
    let subset = work.path().join("trees_within_plot");
    fs::create_dir_all(&clouds).unwrap();

    write_tree(&clouds, "tree_001.csv", X0 + 5.0, Y0 + 5.0);
    write_tree(&clouds, "tree_002.csv", X0 + 9.9, Y0 + 5.0);
    write_tree(&clouds, "tree_003.csv", X0 + 3.0, Y0 + 7.0);
    write_tree(&clouds, "tree_004.csv", X0 + 25.0, Y0 + 25.0);

    let source = work.path().join("plot_outline.geojson");
    write_outline(&source);

    // Boundary variants
    let variants = build_plot_variants(&source, 1.0, -2.0, &boundary_config()).unwrap();
    let written = save_plot_variants(&variants, &output).unwrap();
    assert_eq!(written.len(), 6);
    for name in [
        "original_plot_polygon.geojson",
        "original_plot_polyline.geojson",
        "expanded_plot_polygon.geojson",
        "expanded_plot_polyline.geojson",
        "shrunk_plot_polygon.geojson",
        "shrunk_plot_polyline.geojson",
    ] {
        assert!(output.join(name).is_file(), "missing {}", name);
    }

    // Stem centroids
    let extraction = ExtractionConfig {
        file_suffix: ".csv".to_string(),
        crs: utm(),
        ..ExtractionConfig::default()
    };
    let report = extract_centroids(&clouds, &extraction).unwrap();
    assert_eq!(report.centroids.len(), 4);
    assert!(report.failures.is_empty());

    let centroids_csv = output.join("tree_locations.csv");
    write_centroids_csv(&centroids_csv, &report.centroids.records).unwrap();

    let first = &report.centroids.records[0];
    assert_eq!(first.filename, "tree_001.csv");
    assert!((first.x - (X0 + 5.0)).abs() < 1e-6);
    assert!((first.y - (Y0 + 5.0)).abs() < 1e-6);

    // Containment, reading everything back from disk
    let reloaded = CentroidSet::new(utm(), load_centroids_csv(&centroids_csv).unwrap());
    assert_eq!(reloaded.records, report.centroids.records);

    let region = load_region(&output.join("shrunk_plot_polygon.geojson")).unwrap();
    assert_eq!(region.crs, utm());
    let within = filter_within(&reloaded, &region).unwrap();
    assert_eq!(within, vec!["tree_001.csv", "tree_003.csv"]);

    let within_csv = output.join("trees_within_plot.csv");
    write_filenames_csv(&within_csv, &within).unwrap();
    assert_eq!(load_filename_list(&within_csv).unwrap(), within);

    // Materialise the subset
    let copied = copy_listed_files(&within, &clouds, &subset, false).unwrap();
    assert!(copied.is_complete());
    assert!(subset.join("tree_001.csv").is_file());
    assert!(subset.join("tree_003.csv").is_file());
    assert!(!subset.join("tree_002.csv").exists());
    assert!(clouds.join("tree_001.csv").is_file());
}

#[test]
fn test_region_in_other_zone_is_rejected() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("plot_outline.geojson");
    write_outline(&source);

    let variants = build_plot_variants(&source, 0.0, -2.0, &boundary_config()).unwrap();
    let centroids = CentroidSet::new(
        Crs::epsg(32756),
        vec![plot_stems::StemCentroid::new("centre.las", X0 + 5.0, Y0 + 5.0)],
    );

    let shrunk = variants.shrunk.unwrap();
    assert!(matches!(
        filter_within(&centroids, &shrunk.region),
        Err(ContainmentError::CoordinateSystemMismatch { .. })
    ));
}
