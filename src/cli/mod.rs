//! Command-line interface for the plot pipeline.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders;
use crate::core::projection::Crs;
use crate::core::records::CentroidSet;
use crate::core::writers;
use crate::processors::{boundary, centroids, containment, materialize, FileOutcome};
use crate::PipelineConfig;

const CENTROIDS_FILE: &str = "tree_locations.csv";
const WITHIN_FILE: &str = "trees_within_plot.csv";

#[derive(Parser)]
#[command(name = "plot-stems")]
#[command(about = "Stem location and plot boundary pipeline for forestry point clouds", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build original/expanded/shrunk plot boundaries from a digitised outline
    Boundary {
        /// GeoJSON file whose first feature is the plot outline (LineString)
        source: PathBuf,
        /// Output directory (defaults to the source file's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Outward offset of the expanded variant; 0 skips it
        #[arg(long, allow_negative_numbers = true)]
        expand: Option<f64>,
        /// Signed offset of the shrunk variant (negative = inward); 0 skips it
        #[arg(long, allow_negative_numbers = true)]
        shrink: Option<f64>,
        /// Metric coordinate system to reproject into (e.g. EPSG:32755)
        #[arg(long)]
        target_crs: Option<Crs>,
    },

    /// Extract ground-level stem centroids from a directory of point clouds
    Extract {
        /// Directory containing one point cloud per tree
        directory: PathBuf,
        /// Output CSV (defaults to tree_locations.csv next to the directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Height of the cross-section above the lowest point
        #[arg(long)]
        slice_thickness: Option<f64>,
        /// File-name suffix of the point clouds to process
        #[arg(long)]
        suffix: Option<String>,
    },

    /// Keep the stems that fall strictly inside a plot region
    Filter {
        /// Stem centroid CSV (filename,center_x,center_y)
        centroids: PathBuf,
        /// GeoJSON region (Polygon) to test against
        region: PathBuf,
        /// Output CSV (defaults to trees_within_plot.csv next to the centroids)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Coordinate system of the centroid table
        #[arg(long)]
        crs: Option<Crs>,
    },

    /// Copy the point clouds named in a filename list
    Copy {
        /// CSV with a "filename" column
        list: PathBuf,
        /// Directory holding the point clouds
        source_dir: PathBuf,
        /// Destination directory
        dest_dir: PathBuf,
        /// Preview changes without copying files
        #[arg(long)]
        dry_run: bool,
    },

    /// Run boundary, extraction and filtering in one process using config paths
    Run {
        /// Also copy the within-plot point clouds to paths.within_plot_dir
        #[arg(long)]
        copy: bool,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a bar for per-file batch work
fn create_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Directory of `path`, or "." if it has none.
fn parent_or_cwd(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Reject NaN or infinite values given on the command line.
fn finite_override(flag: &str, value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(v) if !v.is_finite() => bail!("{} must be a finite number, got {}", flag, v),
        other => Ok(other),
    }
}

/// Parse arguments, run the selected command and return the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| dispatch(cli.command, &config));

    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_yaml(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            info!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn dispatch(command: Commands, config: &PipelineConfig) -> Result<()> {
    match command {
        Commands::Boundary { source, output_dir, expand, shrink, target_crs } => {
            cmd_boundary(&source, output_dir, expand, shrink, target_crs, config)
        }
        Commands::Extract { directory, output, slice_thickness, suffix } => {
            cmd_extract(&directory, output, slice_thickness, suffix, config)
        }
        Commands::Filter { centroids, region, output, crs } => {
            cmd_filter(&centroids, &region, output, crs, config)
        }
        Commands::Copy { list, source_dir, dest_dir, dry_run } => {
            cmd_copy(&list, &source_dir, &dest_dir, dry_run)
        }
        Commands::Run { copy } => cmd_run(copy, config),
    }
}

fn cmd_boundary(
    source: &Path,
    output_dir: Option<PathBuf>,
    expand: Option<f64>,
    shrink: Option<f64>,
    target_crs: Option<Crs>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();

    let mut boundary_config = config.boundary.clone();
    if let Some(crs) = target_crs {
        boundary_config.target_crs = crs;
    }
    let expand = finite_override("--expand", expand)?.unwrap_or(boundary_config.expand_distance);
    let shrink = finite_override("--shrink", shrink)?.unwrap_or(boundary_config.shrink_distance);
    let output_dir = output_dir.unwrap_or_else(|| parent_or_cwd(source));

    println!("Building plot boundary variants...");
    println!("Source: {}", source.display());
    println!("Target CRS: {}", boundary_config.target_crs);
    println!("Expand: {}  Shrink: {}", expand, shrink);

    let spinner = create_spinner("Buffering plot boundary...");
    let built = boundary::build_plot_variants(source, expand, shrink, &boundary_config)
        .and_then(|variants| {
            boundary::save_plot_variants(&variants, &output_dir).map(|written| (variants, written))
        });
    spinner.finish_and_clear();

    let (variants, written) =
        built.with_context(|| format!("boundary build failed for {}", source.display()))?;

    let mut items = vec![
        ("Source", source.display().to_string()),
        ("Output directory", output_dir.display().to_string()),
        ("CRS", variants.crs().to_string()),
    ];
    for variant in variants.iter() {
        let label = match variant.kind {
            crate::RegionVariant::Original => "Original area",
            crate::RegionVariant::Expanded => "Expanded area",
            crate::RegionVariant::Shrunk => "Shrunk area",
        };
        items.push((label, format!("{:.2}", variant.region.area())));
    }
    items.push(("Files written", written.len().to_string()));
    items.push(("Duration", format!("{:.2?}", start.elapsed())));

    print_summary("Plot Boundary Complete", &items);
    Ok(())
}

/// Run extraction with a progress bar and per-file messages.
fn extract_with_progress(
    directory: &Path,
    extraction: &crate::ExtractionConfig,
) -> Result<centroids::ExtractionReport> {
    let files = centroids::find_point_clouds(directory, &extraction.file_suffix)?;
    info!("Found {} point cloud(s) in {}", files.len(), directory.display());
    let pb = create_progress_bar(files.len());

    let report = centroids::extract_centroids_from_files(files, extraction, |outcome| {
        match outcome {
            FileOutcome::Processed(record) => pb.println(format!(
                "Processed {} -> Location: ({}, {})",
                record.filename, record.x, record.y
            )),
            FileOutcome::Skipped(name) => {
                pb.println(format!("Skipped {} (no valid points in cross-section).", name))
            }
            FileOutcome::Failed(failure) => pb.println(format!(
                "Error processing {}: {}",
                failure.path.display(),
                failure.error
            )),
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    Ok(report)
}

fn cmd_extract(
    directory: &Path,
    output: Option<PathBuf>,
    slice_thickness: Option<f64>,
    suffix: Option<String>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();

    let mut extraction = config.extraction.clone();
    if let Some(thickness) = slice_thickness {
        if !thickness.is_finite() || thickness <= 0.0 {
            bail!("--slice-thickness must be positive, got {}", thickness);
        }
        extraction.slice_thickness = thickness;
    }
    if let Some(suffix) = suffix {
        extraction.file_suffix = suffix;
    }
    let output = output.unwrap_or_else(|| parent_or_cwd(directory).join(CENTROIDS_FILE));

    println!("Extracting stem centroids...");
    println!("Input directory: {}", directory.display());
    println!("Slice thickness: {}", extraction.slice_thickness);
    println!("File suffix: {}", extraction.file_suffix);

    let report = extract_with_progress(directory, &extraction)
        .with_context(|| format!("extraction failed for {}", directory.display()))?;

    writers::write_centroids_csv(&output, &report.centroids.records)
        .context("failed to write centroid table")?;

    print_summary(
        "Centroid Extraction Complete",
        &[
            ("Input directory", directory.display().to_string()),
            ("Output CSV", output.display().to_string()),
            ("Files examined", report.files_seen().to_string()),
            ("Centroids", report.centroids.len().to_string()),
            ("Skipped", report.skipped.len().to_string()),
            ("Errors", report.failures.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    for failure in &report.failures {
        println!("  failed: {} ({})", failure.path.display(), failure.error);
    }

    Ok(())
}

fn cmd_filter(
    centroids_csv: &Path,
    region_path: &Path,
    output: Option<PathBuf>,
    crs: Option<Crs>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let crs = crs.unwrap_or(config.extraction.crs);
    let output = output.unwrap_or_else(|| parent_or_cwd(centroids_csv).join(WITHIN_FILE));

    println!("Filtering stems by plot region...");
    println!("Centroids: {} ({})", centroids_csv.display(), crs);
    println!("Region: {}", region_path.display());

    let records = loaders::load_centroids_csv(centroids_csv)
        .with_context(|| format!("failed to load {}", centroids_csv.display()))?;
    let centroid_set = CentroidSet::new(crs, records);

    let region = containment::load_region(region_path)
        .with_context(|| format!("failed to load region {}", region_path.display()))?;

    let within = containment::filter_within(&centroid_set, &region)?;
    writers::write_filenames_csv(&output, &within).context("failed to write filename list")?;

    print_summary(
        "Plot Filter Complete",
        &[
            ("Centroids", centroids_csv.display().to_string()),
            ("Region", region_path.display().to_string()),
            ("Output CSV", output.display().to_string()),
            ("Stems tested", centroid_set.len().to_string()),
            ("Stems within", within.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_copy(list: &Path, source_dir: &Path, dest_dir: &Path, dry_run: bool) -> Result<()> {
    let start = Instant::now();

    if dry_run {
        println!("DRY RUN: No files will be copied");
    }

    let names = loaders::load_filename_list(list)
        .with_context(|| format!("failed to read filename list {}", list.display()))?;

    let report = materialize::copy_listed_files(&names, source_dir, dest_dir, dry_run)?;

    for name in &report.missing {
        println!("File not found: {}", name);
    }

    print_summary(
        "Copy Complete",
        &[
            ("List", list.display().to_string()),
            ("Source directory", source_dir.display().to_string()),
            ("Destination", dest_dir.display().to_string()),
            ("Listed", names.len().to_string()),
            ("Copied", report.copied.len().to_string()),
            ("Not found", report.missing.len().to_string()),
            ("Dry run", dry_run.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if !report.is_complete() {
        bail!("{} listed file(s) not found in {}", report.missing.len(), source_dir.display());
    }
    Ok(())
}

fn required<'a>(value: &'a Option<PathBuf>, key: &str) -> Result<&'a Path> {
    value
        .as_deref()
        .ok_or_else(|| anyhow!("paths.{} must be set in the config for `run`", key))
}

fn cmd_run(copy: bool, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();
    let paths = &config.paths;

    let point_cloud_dir = required(&paths.point_cloud_dir, "point_cloud_dir")?;
    let boundary_source = required(&paths.boundary_source, "boundary_source")?;
    let output_dir = required(&paths.output_dir, "output_dir")?;
    let within_plot_dir = if copy {
        Some(required(&paths.within_plot_dir, "within_plot_dir")?)
    } else {
        None
    };

    // Stage 1: plot boundary
    let spinner = create_spinner("Building plot boundary variants...");
    let variants = boundary::build_plot_variants(
        boundary_source,
        config.boundary.expand_distance,
        config.boundary.shrink_distance,
        &config.boundary,
    );
    spinner.finish_and_clear();
    let variants =
        variants.with_context(|| format!("boundary build failed for {}", boundary_source.display()))?;

    let region_kind = config.filter.region_variant;
    let region = variants
        .get(region_kind)
        .map(|v| v.region.clone())
        .ok_or_else(|| anyhow!("{} variant requested but its offset distance is 0", region_kind))?;

    // Stage 2: stem centroids
    let report = extract_with_progress(point_cloud_dir, &config.extraction)
        .with_context(|| format!("extraction failed for {}", point_cloud_dir.display()))?;

    // Stage 3: containment
    let within = containment::filter_within(&report.centroids, &region)?;

    // Stage every artifact, then persist them in one batch
    let mut staged = boundary::stage_plot_variants(&variants, output_dir)?;
    let boundary_files = staged.len();
    staged.push(writers::stage_centroids_csv(
        &output_dir.join(CENTROIDS_FILE),
        &report.centroids.records,
    )?);
    staged.push(writers::stage_filenames_csv(&output_dir.join(WITHIN_FILE), &within)?);
    let written = writers::commit_all(staged).context("failed to write pipeline outputs")?;
    info!("Wrote {} file(s) to {}", written.len(), output_dir.display());

    let mut items = vec![
        ("Point clouds", point_cloud_dir.display().to_string()),
        ("Boundary source", boundary_source.display().to_string()),
        ("Output directory", output_dir.display().to_string()),
        ("Boundary files", boundary_files.to_string()),
        ("Region variant", region_kind.to_string()),
        ("Centroids", report.centroids.len().to_string()),
        ("Extraction errors", report.failures.len().to_string()),
        ("Stems within", within.len().to_string()),
    ];

    let mut missing = 0;
    if let Some(dest) = within_plot_dir {
        let copied = materialize::copy_listed_files(&within, point_cloud_dir, dest, false)?;
        missing = copied.missing.len();
        items.push(("Copied", copied.copied.len().to_string()));
    }
    items.push(("Duration", format!("{:.2?}", start.elapsed())));

    print_summary("Pipeline Complete", &items);

    if missing > 0 {
        bail!("{} within-plot file(s) could not be copied", missing);
    }
    Ok(())
}
