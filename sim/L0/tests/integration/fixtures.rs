//! Scene and catalog fixtures shared by the integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Kitchen base scene: floor, counter and an overview camera.
pub const KITCHEN: &str = r#"<mujoco model="kitchen">
  <option timestep="0.002"/>
  <asset>
    <texture name="wood" type="2d" file="wood.png"/>
    <material name="counter_mat" texture="wood"/>
  </asset>
  <worldbody>
    <geom name="floor" type="plane" size="5 5 0.1"/>
    <body name="counter" pos="0 -0.65 0.45">
      <geom type="box" size="0.6 0.3 0.45" material="counter_mat"/>
    </body>
    <camera name="overview" pos="0 -2 2"/>
  </worldbody>
</mujoco>
"#;

/// Object scene as an object generator emits it: one root body wrapping the
/// object body `main`.
fn object_scene(model: &str, mesh_file: &str) -> String {
    format!(
        r#"<mujoco model="{model}">
  <asset>
    <texture name="tex" type="2d" file="{model}.png"/>
    <material name="mat" texture="tex"/>
    <mesh name="visual" file="{mesh_file}"/>
    <mesh name="collision" file="{mesh_file}" scale="0.5 0.5 0.5"/>
  </asset>
  <worldbody>
    <body name="root">
      <body name="main" euler="0 0 90">
        <geom name="visual" type="mesh" mesh="visual" material="mat" contype="0" conaffinity="0"/>
        <geom name="collision" type="mesh" mesh="collision"/>
      </body>
    </body>
  </worldbody>
</mujoco>
"#
    )
}

/// Minimal Stretch-like robot scene with a free base body.
pub const ROBOT: &str = r#"<mujoco model="stretch">
  <asset>
    <mesh name="base_link" file="base_link.stl"/>
  </asset>
  <worldbody>
    <body name="base_link" pos="0 0 0">
      <geom type="mesh" mesh="base_link"/>
      <camera name="nav_camera_rgb"/>
    </body>
  </worldbody>
</mujoco>
"#;

/// A catalog directory with a mug, a bowl and a pan.
pub struct Catalog {
    /// Keeps the directory alive.
    pub dir: TempDir,
    /// Path of `catalog.json`.
    pub manifest: PathBuf,
}

impl Catalog {
    /// Write object scenes and the manifest to a fresh temp directory.
    pub fn create() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for (model, mesh) in [("mug", "mug.obj"), ("bowl", "bowl.obj"), ("pan", "pan.obj")] {
            let sub = dir.path().join(model);
            fs::create_dir_all(&sub).unwrap();
            fs::write(sub.join("model.xml"), object_scene(model, mesh)).unwrap();
        }

        let manifest = dir.path().join("catalog.json");
        fs::write(
            &manifest,
            r#"{
  "objects": [
    { "mjcf_path": "mug/model.xml", "groups": ["mug"], "graspable": true,
      "washable": true, "microwavable": true, "size": [0.09, 0.09, 0.11] },
    { "mjcf_path": "bowl/model.xml", "groups": ["bowl"], "graspable": true,
      "washable": true, "size": [0.16, 0.16, 0.07] },
    { "mjcf_path": "pan/model.xml", "groups": ["cookware"], "cookable": true,
      "size": [0.45, 0.28, 0.06] }
  ]
}"#,
        )
        .unwrap();

        Self { dir, manifest }
    }

    /// Catalog root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
