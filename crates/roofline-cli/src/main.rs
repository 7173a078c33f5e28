use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roofline_core::config::{CurvatureConfig, CurvatureOutput, PancakeConfig, PipelineConfig, SmoothingConfig, SmoothingMode};
use roofline_core::{Cloud, Progress};
use roofline_nn::GridIndex;
use serde::de::DeserializeOwned;

// ---------- helpers ----------

fn t0() -> std::time::Instant { std::time::Instant::now() }
fn lap(t: std::time::Instant, label: &str) {
    let ms = t.elapsed().as_secs_f64()*1000.0;
    println!("[{label}] {ms:.1} ms");
}

/// Reads a JSON config; missing fields take their defaults.
fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else { return Ok(T::default()) };
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Logs every tenth of the way through a stage.
struct LogProgress {
    label: &'static str,
    last_tenth: AtomicUsize,
}

impl LogProgress {
    fn new(label: &'static str) -> Self { Self { label, last_tenth: AtomicUsize::new(0) } }
}

impl Progress for LogProgress {
    fn update(&self, fraction: f32) -> bool {
        let tenth = (fraction.clamp(0.0, 1.0) * 10.0) as usize;
        if self.last_tenth.fetch_max(tenth, Ordering::Relaxed) < tenth {
            log::info!("{}: {}%", self.label, tenth * 10);
        }
        true
    }
}

fn print_layer_summary(cloud: &Cloud, name: &str) -> Result<()> {
    let values = cloud.layer(name)?;
    let finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        println!("{name}: no finite values");
        return Ok(());
    }
    let min = finite.iter().copied().fold(f32::INFINITY, f32::min);
    let max = finite.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mean = finite.iter().map(|&v| v as f64).sum::<f64>() / finite.len() as f64;
    println!("{name}: n={}  min={min:.6}  mean={mean:.6}  max={max:.6}", finite.len());
    Ok(())
}

// ---------- CLI ----------

#[derive(Parser)]
#[command(name="roofline", version, about="Roofline — curvature and building-roof segmentation for point clouds")]
struct Args { #[command(subcommand)] cmd: Cmd }

#[derive(Subcommand)]
enum Cmd {
    /// Print point count, bounds and scalar layers of a PLY file
    Info { input: String },

    /// Sphere-fit curvature per point, written as a scalar layer
    Curvature {
        input: String, output: String,
        #[arg(short='k', long)] neighbours: Option<usize>,
        /// write 1/r instead of r
        #[arg(long)] inverse: bool,
        /// JSON CurvatureConfig
        #[arg(long)] config: Option<PathBuf>,
    },

    /// Project every point onto its local best-fit plane
    Smooth {
        input: String, output: String,
        #[arg(short='k', long)] neighbours: Option<usize>,
        /// read neighbours from pre-pass coordinates (order independent)
        #[arg(long)] snapshot: bool,
    },

    /// Smooth, classify roof candidates and segment them into buildings
    Buildings {
        input: String, output: String,
        /// neighbours for smoothing and roof classification
        #[arg(short='k', long)] neighbours: Option<usize>,
        #[arg(long)] segmentation_k: Option<usize>,
        #[arg(long)] sweeps: Option<usize>,
        /// JSON PipelineConfig
        #[arg(long)] config: Option<PathBuf>,
    },

    /// Keep points within a horizontal radius of a centre
    Pancake {
        input: String, output: String,
        #[arg(long, default_value_t=0.0, allow_negative_numbers=true)] cx: f64,
        #[arg(long, default_value_t=0.0, allow_negative_numbers=true)] cy: f64,
        #[arg(short, long, default_value_t=50.0)] radius: f64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match args.cmd {
        Cmd::Info { input } => cmd_info(&input),
        Cmd::Curvature { input, output, neighbours, inverse, config } =>
            cmd_curvature(&input, &output, neighbours, inverse, config.as_deref()),
        Cmd::Smooth { input, output, neighbours, snapshot } =>
            cmd_smooth(&input, &output, neighbours, snapshot),
        Cmd::Buildings { input, output, neighbours, segmentation_k, sweeps, config } =>
            cmd_buildings(&input, &output, neighbours, segmentation_k, sweeps, config.as_deref()),
        Cmd::Pancake { input, output, cx, cy, radius } =>
            cmd_pancake(&input, &output, PancakeConfig { center: [cx, cy], radius }),
    }
}

// ---------- commands ----------

fn cmd_info(path: &str) -> Result<()> {
    let cloud = roofline_io::read_auto(path)?;
    println!("points: {}", cloud.len());
    if let Some(b) = cloud.bounds() {
        println!("bounds: min={:?} max={:?} (diag {:.3})", b.min, b.max, b.diagonal());
    }
    for name in cloud.layer_names() {
        print_layer_summary(&cloud, name)?;
    }
    Ok(())
}

fn cmd_curvature(input: &str, output: &str, k: Option<usize>, inverse: bool, config: Option<&Path>) -> Result<()> {
    let mut cfg: CurvatureConfig = load_config(config)?;
    if let Some(k) = k { cfg.neighbours = k; }
    if inverse { cfg.output = CurvatureOutput::InverseRadius; }
    cfg.validate()?;

    let mut cloud = roofline_io::read_auto(input)?;
    let t = t0();
    let index = GridIndex::build_auto((&cloud).into());
    roofline_features::estimate_curvature(&mut cloud, &index, &cfg, &LogProgress::new("curvature"))?;
    lap(t, "curvature");
    print_layer_summary(&cloud, &cfg.layer)?;
    roofline_io::write_ply_ascii(output, &cloud)?;
    println!("wrote {} -> {}", cfg.layer, output);
    Ok(())
}

fn cmd_smooth(input: &str, output: &str, k: Option<usize>, snapshot: bool) -> Result<()> {
    let mut cfg = SmoothingConfig::default();
    if let Some(k) = k { cfg.neighbours = k; }
    if snapshot { cfg.mode = SmoothingMode::Snapshot; }
    cfg.validate()?;

    let mut cloud = roofline_io::read_auto(input)?;
    let t = t0();
    let index = GridIndex::build_auto((&cloud).into());
    let stats = roofline_filters::smooth_cloud(&mut cloud, &index, &cfg, &LogProgress::new("smoothing"))?;
    lap(t, "smooth");
    roofline_io::write_ply_ascii(output, &cloud)?;
    println!("smooth: moved={} degenerate={} max_shift={:.6} (k={})",
             stats.moved, stats.degenerate, stats.max_shift, cfg.neighbours);
    Ok(())
}

fn cmd_buildings(
    input: &str, output: &str,
    k: Option<usize>, segmentation_k: Option<usize>, sweeps: Option<usize>, config: Option<&Path>,
) -> Result<()> {
    let mut cfg: PipelineConfig = load_config(config)?;
    if let Some(k) = k {
        cfg.smoothing.neighbours = k;
        cfg.roofs.neighbours = k;
    }
    if let Some(k) = segmentation_k { cfg.segmentation.neighbours = k; }
    if let Some(s) = sweeps { cfg.segmentation.sweeps = s; }
    cfg.validate()?;

    let mut cloud = roofline_io::read_auto(input)?;
    let t = t0();
    let report = roofline_segment::detect_buildings(&mut cloud, &cfg, &LogProgress::new("buildings"))?;
    lap(t, "buildings");

    let ids = roofline_segment::building_ids(cloud.layer(&cfg.roofs.layer)?);
    println!("roof candidates: {} of {} ({} degenerate)", report.roofs.candidates, cloud.len(), report.roofs.degenerate);
    println!("buildings: {} after {} sweeps ({} labels changed in the last)",
             ids.len(), report.segmentation.sweeps, report.segmentation.changed_last);
    roofline_io::write_ply_ascii(output, &cloud)?;
    println!("wrote {} -> {}", cfg.roofs.layer, output);
    Ok(())
}

fn cmd_pancake(input: &str, output: &str, cfg: PancakeConfig) -> Result<()> {
    let cloud = roofline_io::read_auto(input)?;
    let out = roofline_filters::pancake_cut(&cloud, &cfg)?;
    roofline_io::write_ply_ascii(output, &out)?;
    println!("pancake: {} -> {} (center={:?}, r={})", cloud.len(), out.len(), cfg.center, cfg.radius);
    Ok(())
}
