//! Compose a kitchen scene and launch it.
//!
//! Samples one object from a catalog, places it in the base scene, includes
//! the robot, and runs the result on the dry-run simulator for a short while.
//!
//! ```text
//! kitchen-scene --catalog objects/catalog.json --base-scene grasp_scene.xml \
//!     --robot-xml stretch.xml --group mug --group water_bottle --graspable \
//!     --position 0 -0.65 0.6 --output composed.xml
//! ```

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use nalgebra::Vector3;
use sim_scene::{
    CatalogSampler, FilterCriteria, ObjectSampler, Pose, SceneDocument, compose_object,
    extract_object, include_robot, rebase_asset_files,
};
use sim_teleop::{DryRunSimulator, STRETCH_CAMERAS, StartOptions, build_and_start};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compose a kitchen scene with a sampled object and the robot.
#[derive(Parser)]
#[command(name = "kitchen-scene")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Object catalog (JSON manifest)
    #[arg(long, value_name = "PATH")]
    catalog: PathBuf,

    /// Base environment scene
    #[arg(long, value_name = "PATH")]
    base_scene: PathBuf,

    /// Robot MJCF scene
    #[arg(long, value_name = "PATH")]
    robot_xml: PathBuf,

    /// Body of the robot scene that carries its pose
    #[arg(long, default_value = "base_link")]
    robot_base: String,

    /// Object group to sample from (repeatable; "all" for any)
    #[arg(long = "group", value_name = "GROUP")]
    groups: Vec<String>,

    /// Only sample graspable objects
    #[arg(long)]
    graspable: bool,

    /// Object position
    #[arg(
        long,
        num_args = 3,
        value_names = ["X", "Y", "Z"],
        allow_negative_numbers = true,
        default_values_t = [0.0, -0.65, 0.6]
    )]
    position: Vec<f64>,

    /// Object orientation, intrinsic XYZ Euler angles in radians
    #[arg(
        long,
        num_args = 3,
        value_names = ["RX", "RY", "RZ"],
        allow_negative_numbers = true,
        default_values_t = [0.0, 0.0, 0.0]
    )]
    euler: Vec<f64>,

    /// Object mesh scale
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Step without rendering
    #[arg(long)]
    headless: bool,

    /// Write the composed MJCF here
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Seed for reproducible sampling
    #[arg(long)]
    seed: Option<u64>,

    /// How long to run the composed scene
    #[arg(long, default_value_t = 500)]
    run_ms: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let pose = Pose::from_euler(vector(&cli.position)?, vector(&cli.euler)?)?;

    let mut sampler = CatalogSampler::from_file(&cli.catalog)
        .with_context(|| format!("failed to load catalog {}", cli.catalog.display()))?;
    if let Some(seed) = cli.seed {
        sampler = sampler.seed(seed);
    }
    let mut criteria = FilterCriteria::new().groups(&cli.groups).scale(cli.scale);
    if cli.graspable {
        criteria = criteria.graspable(true);
    }
    let (descriptor, object_scene) = sampler.sample_object(&criteria)?;
    info!(
        object = %descriptor.name,
        source = %descriptor.source.display(),
        groups = ?descriptor.groups,
        size = ?descriptor.size.as_slice(),
        "sampled object"
    );

    let base_scene = cli
        .base_scene
        .canonicalize()
        .with_context(|| format!("failed to find base scene {}", cli.base_scene.display()))?;
    let base = SceneDocument::from_file(&base_scene)
        .with_context(|| format!("failed to load base scene {}", base_scene.display()))?;
    let base = rebase_asset_files(&base, base_scene.parent().unwrap_or_else(|| Path::new("/")));
    let object = extract_object(&object_scene)?;
    let scene = compose_object(&base, &object, &pose)?;

    let robot_xml = cli
        .robot_xml
        .canonicalize()
        .with_context(|| format!("failed to find robot {}", cli.robot_xml.display()))?;
    let robot_dir = robot_xml.parent().unwrap_or_else(|| Path::new("/"));
    let composed = include_robot(&scene, &robot_xml, &cli.robot_base, &Pose::identity(), robot_dir)
        .with_context(|| format!("failed to include robot {}", robot_xml.display()))?;

    if let Some(output) = &cli.output {
        composed
            .write_to(output)
            .with_context(|| format!("failed to write {}", output.display()))?;
        info!(output = %output.display(), "wrote composed scene");
    }

    let simulator = STRETCH_CAMERAS
        .iter()
        .fold(DryRunSimulator::new(), |sim, camera| sim.camera(*camera));
    let mut handle = build_and_start(
        simulator,
        &composed,
        StartOptions::default().with_headless(cli.headless),
    )
    .context("composed scene failed to launch")?;

    thread::sleep(Duration::from_millis(cli.run_ms));
    let view = handle.view();
    if let Some(placed) = view.body_pose(&descriptor.main_body()) {
        info!(
            body = %descriptor.main_body(),
            position = ?placed.position.as_slice(),
            time = view.time(),
            "object in scene"
        );
    }
    handle.stop();
    Ok(())
}

fn vector(values: &[f64]) -> Result<Vector3<f64>> {
    ensure!(values.len() == 3, "expected 3 values, got {}", values.len());
    Ok(Vector3::new(values[0], values[1], values[2]))
}
