//! CLI entry point: feed a directory of stereo image pairs and a calibration YAML
//! through `World::track`, printing the recovered trajectory (§6's primary operations).
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use stereo_slam_core::slam::config::TrackerKind;
use stereo_slam_core::slam::{debug_export, load_calibration, TuningConfig, World};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stereo visual SLAM tracking + mapping core")]
struct Args {
    /// Stereo calibration YAML, as produced by the external calibration subsystem (§6).
    #[arg(long)]
    calibration: PathBuf,

    /// Directory of left images; paired by sorted filename with `right_dir`.
    #[arg(long)]
    left_dir: PathBuf,

    /// Directory of right images.
    #[arg(long)]
    right_dir: PathBuf,

    /// Tracker implementation; defaults to the tuning default (`flow`).
    #[arg(long, value_enum)]
    tracker: Option<TrackerArg>,

    /// Write the recovered trajectory here (`timestamp tx ty tz qx qy qz qw` per keyframe).
    #[arg(long)]
    trajectory_out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum TrackerArg {
    Flow,
    Features,
}

impl From<TrackerArg> for TrackerKind {
    fn from(value: TrackerArg) -> Self {
        match value {
            TrackerArg::Flow => TrackerKind::Flow,
            TrackerArg::Features => TrackerKind::Features,
        }
    }
}

fn sorted_image_paths(dir: &PathBuf) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let calibration = load_calibration(&args.calibration)
        .with_context(|| format!("failed to load calibration from {}", args.calibration.display()))?;
    let mut tuning = TuningConfig::default();
    if let Some(tracker) = args.tracker {
        tuning.tracker = tracker.into();
    }
    tuning.validate().context("invalid tuning configuration")?;

    let world = World::new(calibration, tuning)?;

    let left_paths = sorted_image_paths(&args.left_dir)?;
    let right_paths = sorted_image_paths(&args.right_dir)?;
    if left_paths.len() != right_paths.len() {
        bail!(
            "left_dir has {} images but right_dir has {}; pairs must match 1:1",
            left_paths.len(),
            right_paths.len()
        );
    }
    if left_paths.is_empty() {
        bail!("no images found in {}", args.left_dir.display());
    }

    for (i, (left_path, right_path)) in left_paths.iter().zip(right_paths.iter()).enumerate() {
        let left = image::open(left_path)
            .with_context(|| format!("failed to open {}", left_path.display()))?
            .to_luma8();
        let right = image::open(right_path)
            .with_context(|| format!("failed to open {}", right_path.display()))?
            .to_luma8();

        let outcome = world.track(left, right, i as f64);
        info!(
            "pair {i}: ok={} inliers_ratio={:.3} inserted_keyframe={}",
            outcome.ok, outcome.inliers_ratio, outcome.inserted_keyframe
        );
        if !outcome.ok {
            info!("pair {i} did not advance the pose: {:?}", outcome.reason);
        }
    }

    let frames = world.frames();
    println!(
        "tracked {} pair(s) into {} map(s), {} keyframe(s)",
        left_paths.len(),
        world.map_count(),
        frames.len()
    );
    println!("sparse cloud: {} live landmarks", world.sparse_cloud().len());

    if let Some(path) = &args.trajectory_out {
        debug_export::write_trajectory(&frames, path)
            .with_context(|| format!("failed to write trajectory to {}", path.display()))?;
        println!("trajectory written to {}", path.display());
    }

    Ok(())
}
