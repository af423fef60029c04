//! A simulator backend that does no physics.
//!
//! [`DryRunSimulator`] compiles a scene by parsing it and checking that its
//! asset references resolve, advances a clock on each step, records the
//! actuator commands it accepts, answers body pose queries from the compiled
//! document, and returns blank camera frames. It lets the launch path and the
//! teleop loop run end to end without an engine.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::{Isometry3, Translation3, Vector3};
use parking_lot::Mutex;
use sim_scene::{
    BODY, Element, Pose, SceneDocument, WORLDBODY, check_asset_references, euler_to_quaternion,
    parse_pose_attributes, parse_vector3,
};
use tracing::debug;

use crate::simulator::{ActuatorCommand, CameraFrame, ModelInfo, Simulator};

/// MuJoCo's default integration timestep.
pub const DEFAULT_TIMESTEP: f64 = 0.002;

/// Shared record of what a [`DryRunSimulator`] has done.
///
/// Cloned out with [`DryRunSimulator::log`] before the simulator is moved
/// into a launcher.
#[derive(Debug, Clone, Default)]
pub struct DryRunLog {
    inner: Arc<Mutex<LogInner>>,
}

#[derive(Debug, Default)]
struct LogInner {
    applied: Vec<ActuatorCommand>,
    compiles: usize,
    steps: u64,
    renders: u64,
}

impl DryRunLog {
    /// Commands accepted so far, in order.
    pub fn applied(&self) -> Vec<ActuatorCommand> {
        self.inner.lock().applied.clone()
    }

    /// Successful compiles.
    pub fn compiles(&self) -> usize {
        self.inner.lock().compiles
    }

    /// Steps taken.
    pub fn steps(&self) -> u64 {
        self.inner.lock().steps
    }

    /// Render calls.
    pub fn renders(&self) -> u64 {
        self.inner.lock().renders
    }
}

#[derive(Debug)]
struct CompiledScene {
    bodies: HashMap<String, Pose>,
    cameras: Vec<String>,
    timestep: f64,
}

/// Physics-free [`Simulator`].
#[derive(Debug)]
pub struct DryRunSimulator {
    scene: Option<CompiledScene>,
    extra_cameras: Vec<String>,
    frame_size: (u32, u32),
    time: f64,
    log: DryRunLog,
}

impl Default for DryRunSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunSimulator {
    /// New simulator with no model.
    pub fn new() -> Self {
        Self {
            scene: None,
            extra_cameras: Vec::new(),
            frame_size: (64, 48),
            time: 0.0,
            log: DryRunLog::default(),
        }
    }

    /// Also serve frames for `camera`, e.g. one declared in an included file.
    #[must_use]
    pub fn camera(mut self, camera: impl Into<String>) -> Self {
        self.extra_cameras.push(camera.into());
        self
    }

    /// Size of the blank frames returned.
    #[must_use]
    pub fn frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    /// Handle to the activity record.
    pub fn log(&self) -> DryRunLog {
        self.log.clone()
    }

    fn has_camera(&self, camera: &str) -> bool {
        let in_model = self
            .scene
            .as_ref()
            .is_some_and(|s| s.cameras.iter().any(|c| c == camera));
        in_model || self.extra_cameras.iter().any(|c| c == camera)
    }
}

impl Simulator for DryRunSimulator {
    fn compile_model(&mut self, xml: &str) -> Result<ModelInfo, String> {
        let doc = SceneDocument::parse(xml).map_err(|e| e.to_string())?;
        if doc.root().name != "mujoco" {
            return Err(format!("root element is <{}>, expected <mujoco>", doc.root().name));
        }
        let worldbody = doc
            .section(WORLDBODY)
            .ok_or_else(|| "model has no <worldbody>".to_string())?;
        check_asset_references(&doc).map_err(|e| e.to_string())?;

        let timestep = match doc.section("option").and_then(|o| o.attribute("timestep")) {
            Some(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|t| t.is_finite() && *t > 0.0)
                .ok_or_else(|| format!("invalid timestep '{s}'"))?,
            None => DEFAULT_TIMESTEP,
        };

        let degrees = doc
            .section("compiler")
            .and_then(|c| c.attribute("angle"))
            .map_or(true, |a| a != "radian");

        let mut bodies = HashMap::new();
        collect_bodies(worldbody, &Isometry3::identity(), degrees, &mut bodies)?;

        let cameras: Vec<String> = doc
            .root()
            .descendants()
            .filter(|e| e.name == "camera")
            .filter_map(|e| e.name_attr().map(str::to_string))
            .collect();

        let info = ModelInfo {
            name: doc.model_name().map(str::to_string),
            bodies: bodies.len(),
            cameras: cameras.clone(),
            timestep,
        };
        debug!(bodies = info.bodies, cameras = info.cameras.len(), "dry-run compile");

        self.scene = Some(CompiledScene {
            bodies,
            cameras,
            timestep,
        });
        self.time = 0.0;
        self.log.inner.lock().compiles += 1;
        Ok(info)
    }

    fn step(&mut self) {
        if let Some(scene) = &self.scene {
            self.time += scene.timestep;
            self.log.inner.lock().steps += 1;
        }
    }

    fn render(&mut self) {
        self.log.inner.lock().renders += 1;
    }

    fn apply(&mut self, command: &ActuatorCommand) -> Result<(), String> {
        if self.scene.is_none() {
            return Err("no model compiled".to_string());
        }
        if !command.is_finite() {
            return Err(format!("non-finite value in {command:?}"));
        }
        self.log.inner.lock().applied.push(*command);
        Ok(())
    }

    fn camera_frame(&self, camera: &str) -> Option<CameraFrame> {
        if !self.has_camera(camera) {
            return None;
        }
        let (width, height) = self.frame_size;
        Some(CameraFrame {
            camera: camera.to_string(),
            width,
            height,
            rgb: vec![0; width as usize * height as usize * 3],
            time: self.time,
        })
    }

    fn body_pose(&self, name: &str) -> Option<Pose> {
        self.scene.as_ref()?.bodies.get(name).copied()
    }

    fn time(&self) -> f64 {
        self.time
    }
}

fn collect_bodies(
    parent: &Element,
    parent_world: &Isometry3<f64>,
    degrees: bool,
    out: &mut HashMap<String, Pose>,
) -> Result<(), String> {
    for body in parent.elements().filter(|e| e.name == BODY) {
        let local = local_pose(body, degrees).map_err(|e| {
            format!("body '{}': {e}", body.name_attr().unwrap_or("<unnamed>"))
        })?;
        let world = parent_world
            * Isometry3::from_parts(Translation3::from(local.position), local.orientation);
        if let Some(name) = body.name_attr() {
            out.entry(name.to_string())
                .or_insert_with(|| Pose::new(world.translation.vector, world.rotation));
        }
        collect_bodies(body, &world, degrees, out)?;
    }
    Ok(())
}

fn local_pose(body: &Element, degrees: bool) -> sim_scene::Result<Pose> {
    let mut pose = parse_pose_attributes(body.attribute("pos"), body.attribute("quat"))?;
    if body.attribute("quat").is_none() {
        if let Some(euler) = body.attribute("euler") {
            let mut angles: Vector3<f64> = parse_vector3(euler)?;
            if degrees {
                angles = angles.map(f64::to_radians);
            }
            pose.orientation = euler_to_quaternion(angles)?;
        }
    }
    Ok(pose)
}
