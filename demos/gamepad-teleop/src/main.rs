//! Gamepad teleoperation of Stretch.
//!
//! Scene selection, highest precedence first:
//!
//! 1. `--robocasa-env`: a generated kitchen, with one graspable object from
//!    `--catalog` on the counter when a catalog is given.
//! 2. `--scene-xml-path`: an MJCF file that already contains the robot.
//! 3. The built-in empty scene.
//!
//! The generated kitchen and the empty scene include the robot from
//! `--robot-xml`, or a built-in Stretch model when none is given.
//!
//! Without the `gilrs` feature the demo drives a short scripted gamepad
//! sequence instead of a physical controller.
//!
//! ```text
//! RUST_LOG=debug gamepad-teleop --robocasa-env --catalog objects/catalog.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nalgebra::Vector3;
use sim_scene::{
    CatalogSampler, FilterCriteria, ObjectSampler, Pose, SceneDocument, compose_object,
    extract_object, include_robot,
};
use sim_teleop::{
    CameraFeed, DryRunSimulator, FrameLogger, STRETCH_CAMERAS, SimulatorHandle, TeleopConfig,
    TeleopError, TeleopSession, build_and_start,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_SCENE: &str = r#"<mujoco model="stretch_scene">
  <option timestep="0.002"/>
  <worldbody>
    <light pos="0 0 3" dir="0 0 -1"/>
    <geom name="floor" type="plane" size="10 10 0.1"/>
  </worldbody>
</mujoco>
"#;

const KITCHEN_SCENE: &str = r#"<mujoco model="kitchen">
  <option timestep="0.002"/>
  <asset>
    <material name="counter_top" rgba="0.85 0.82 0.78 1"/>
    <material name="cabinet" rgba="0.55 0.42 0.3 1"/>
  </asset>
  <worldbody>
    <light pos="0 -1 3" dir="0 0 -1"/>
    <geom name="floor" type="plane" size="6 6 0.1"/>
    <body name="counter" pos="0 -0.65 0.45">
      <geom name="counter_top" type="box" pos="0 0 0.43" size="0.9 0.3 0.02" material="counter_top"/>
      <geom name="cabinet" type="box" size="0.9 0.3 0.41" material="cabinet"/>
    </body>
  </worldbody>
</mujoco>
"#;

/// Stretch with the actuators and cameras the teleop mapping drives.
const STRETCH_MODEL: &str = r#"<mujoco model="stretch">
  <worldbody>
    <body name="base_link" pos="0 0 0">
      <freejoint name="base"/>
      <geom name="base" type="box" size="0.17 0.16 0.09" pos="0 0 0.09"/>
      <camera name="nav_camera_rgb" pos="0 0 0.3"/>
      <body name="link_mast" pos="-0.07 0.13 0.18">
        <body name="link_lift" pos="0 0 0.3">
          <joint name="joint_lift" type="slide" axis="0 0 1" range="0 1.1"/>
          <body name="link_arm" pos="0 -0.1 0">
            <joint name="joint_arm" type="slide" axis="0 -1 0" range="0 0.52"/>
            <body name="link_wrist_yaw" pos="0 -0.3 0">
              <joint name="joint_wrist_yaw" axis="0 0 1" range="-1.75 4"/>
              <geom type="cylinder" size="0.02 0.03"/>
              <camera name="d405_rgb" pos="0 -0.05 -0.05"/>
              <body name="link_gripper" pos="0 0 -0.08">
                <joint name="joint_gripper" type="slide" axis="1 0 0" range="-0.02 0.04"/>
                <geom type="box" size="0.03 0.01 0.04"/>
              </body>
            </body>
          </body>
        </body>
        <body name="link_head" pos="0 0 1.1">
          <joint name="joint_head_pan" axis="0 0 1" range="-3.9 1.5"/>
          <body name="link_head_tilt" pos="0 0 0.03">
            <joint name="joint_head_tilt" axis="0 1 0" range="-1.53 0.79"/>
            <camera name="d435i_camera_rgb"/>
          </body>
        </body>
      </body>
    </body>
  </worldbody>
  <actuator>
    <velocity name="lift" joint="joint_lift" kv="100"/>
    <velocity name="arm" joint="joint_arm" kv="100"/>
    <velocity name="wrist_yaw" joint="joint_wrist_yaw" kv="10"/>
    <velocity name="head_pan" joint="joint_head_pan" kv="10"/>
    <velocity name="head_tilt" joint="joint_head_tilt" kv="10"/>
    <position name="gripper" joint="joint_gripper" kp="50"/>
  </actuator>
</mujoco>
"#;

/// Counter-top placement for a sampled object.
const COUNTER_SPOT: [f64; 3] = [0.0, -0.65, 0.9];

/// Robot base pose in the generated kitchen, facing the counter.
const KITCHEN_ROBOT_SPOT: [f64; 3] = [0.0, 0.1, 0.0];

/// Drive Stretch with a gamepad.
#[derive(Parser)]
#[command(name = "gamepad-teleop")]
#[command(version, about, long_about = None)]
struct Cli {
    /// MJCF scene to load
    #[arg(long, value_name = "PATH")]
    scene_xml_path: Option<PathBuf>,

    /// Use a generated kitchen scene
    #[arg(long)]
    robocasa_env: bool,

    /// Object catalog for the generated kitchen
    #[arg(long, value_name = "PATH", requires = "robocasa_env")]
    catalog: Option<PathBuf>,

    /// Robot MJCF included in the generated and default scenes
    #[arg(long, value_name = "PATH")]
    robot_xml: Option<PathBuf>,

    /// Body of the robot scene that carries its pose
    #[arg(long, default_value = "base_link")]
    robot_base: String,

    /// Step without rendering or camera feeds
    #[arg(long)]
    headless: bool,

    /// Teleop configuration (JSON)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let scene = select_scene(&cli)?;

    let simulator = STRETCH_CAMERAS
        .iter()
        .fold(DryRunSimulator::new(), |sim, camera| sim.camera(*camera));
    let mut handle = build_and_start(simulator, &scene, config.start_options(cli.headless))
        .context("failed to launch the simulator")?;

    let outcome = teleoperate(&handle, config, cli.headless);
    handle.stop();
    outcome
}

fn load_config(path: Option<&Path>) -> Result<TeleopConfig> {
    let Some(path) = path else {
        return Ok(TeleopConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: TeleopConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config.validate()?;
    info!(config = %path.display(), "loaded teleop config");
    Ok(config)
}

fn select_scene(cli: &Cli) -> Result<SceneDocument> {
    if cli.robocasa_env {
        if cli.scene_xml_path.is_some() {
            warn!("--robocasa-env takes precedence over --scene-xml-path");
        }
        let kitchen = kitchen_scene(cli.catalog.as_deref())?;
        let pose = Pose::from_position(Vector3::from(KITCHEN_ROBOT_SPOT));
        return with_robot(&kitchen, cli, &pose);
    }
    if let Some(path) = &cli.scene_xml_path {
        info!(scene = %path.display(), "loading scene");
        return SceneDocument::from_file(path)
            .with_context(|| format!("failed to load scene {}", path.display()));
    }
    with_robot(&SceneDocument::parse(DEFAULT_SCENE)?, cli, &Pose::identity())
}

/// Include the robot, posed, in `scene`.
fn with_robot(scene: &SceneDocument, cli: &Cli, pose: &Pose) -> Result<SceneDocument> {
    let robot_xml = match &cli.robot_xml {
        Some(path) => path
            .canonicalize()
            .with_context(|| format!("failed to find robot {}", path.display()))?,
        None => {
            let dir = std::env::temp_dir().join("gamepad-teleop");
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            let path = dir.join("stretch.xml");
            fs::write(&path, STRETCH_MODEL)
                .with_context(|| format!("failed to write {}", path.display()))?;
            path
        }
    };
    // posed copy next to the original, relative mesh paths stay valid
    let out_dir = robot_xml.parent().unwrap_or_else(|| Path::new("."));
    let scene = include_robot(scene, &robot_xml, &cli.robot_base, pose, out_dir)
        .with_context(|| format!("failed to include robot {}", robot_xml.display()))?;
    info!(robot = %robot_xml.display(), "robot included");
    Ok(scene)
}

fn kitchen_scene(catalog: Option<&Path>) -> Result<SceneDocument> {
    let kitchen = SceneDocument::parse(KITCHEN_SCENE)?;
    let Some(catalog) = catalog else {
        info!("generated kitchen without objects");
        return Ok(kitchen);
    };

    let mut sampler = CatalogSampler::from_file(catalog)
        .with_context(|| format!("failed to load catalog {}", catalog.display()))?;
    let (descriptor, object_scene) = sampler
        .sample_object(&FilterCriteria::new().graspable(true))
        .context("failed to sample an object")?;
    let object = extract_object(&object_scene)?;
    let pose = Pose::from_position(Vector3::from(COUNTER_SPOT));
    let scene = compose_object(&kitchen, &object, &pose)?;
    info!(object = %descriptor.name, source = %descriptor.source.display(), "placed object");
    Ok(scene)
}

fn teleoperate(handle: &SimulatorHandle, config: TeleopConfig, headless: bool) -> Result<()> {
    let mut session = TeleopSession::new(config)?;
    session.start(handle, gamepad()?)?;

    let mut feed = if headless {
        None
    } else {
        Some(CameraFeed::spawn(
            handle.view(),
            STRETCH_CAMERAS.iter().map(|c| c.to_string()).collect(),
            Duration::from_millis(100),
            FrameLogger,
        )?)
    };

    info!("teleop active, press Start to quit");
    let outcome = session.activate();
    if let Some(feed) = feed.as_mut() {
        feed.stop();
    }

    match outcome {
        Ok(()) => {
            info!(steps = handle.step_count(), "session ended");
            Ok(())
        }
        Err(err @ TeleopError::Device(_)) => {
            error!(%err, "gamepad failed");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(feature = "gilrs")]
fn gamepad() -> Result<sim_teleop::GilrsGamepad> {
    Ok(sim_teleop::GilrsGamepad::open()?)
}

#[cfg(not(feature = "gilrs"))]
fn gamepad() -> Result<sim_teleop::ScriptedGamepad> {
    use sim_teleop::{Axis, Button, GamepadEvent, ScriptedGamepad};

    warn!("built without the gilrs feature, replaying a scripted gamepad");
    let mut script = Vec::new();
    script.extend(std::iter::repeat(None).take(50));
    script.push(Some(GamepadEvent::AxisChanged(Axis::LeftStickY, 0.8)));
    script.extend(std::iter::repeat(None).take(100));
    script.push(Some(GamepadEvent::AxisChanged(Axis::LeftStickY, 0.0)));
    script.push(Some(GamepadEvent::AxisChanged(Axis::RightStickY, 1.0)));
    script.extend(std::iter::repeat(None).take(50));
    script.push(Some(GamepadEvent::AxisChanged(Axis::RightStickY, 0.0)));
    script.push(Some(GamepadEvent::ButtonPressed(Button::South)));
    script.push(Some(GamepadEvent::ButtonPressed(Button::Start)));
    Ok(ScriptedGamepad::new(script.into_iter().map(Ok)).named("scripted demo pad"))
}
