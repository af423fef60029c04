//! MJCF scene composition for kitchen manipulation scenes.
//!
//! This crate splices independently authored MJCF (MuJoCo XML Format) scenes
//! into one loadable scene: a base environment, sampled objects, and an
//! `<include>` for the robot.
//!
//! # Pipeline
//!
//! 1. [`ObjectSampler::sample_object`] picks an object and returns its
//!    standalone scene, with every name prefixed by a unique object name
//!    ([`prefix_names`]).
//! 2. [`extract_object`] lifts the mesh/texture/material declarations and the
//!    object body (`worldbody/body/body`) out of that scene.
//! 3. [`compose_object`] merges the assets into the base scene, inserts the
//!    body, writes its pose, and checks that every asset reference resolves.
//! 4. [`insert_include_directive`] splices the robot include into the
//!    serialized scene text.
//!
//! Each step borrows its input and returns a new [`SceneDocument`].
//!
//! # Example
//!
//! ```
//! use nalgebra::Vector3;
//! use sim_scene::{Pose, SceneDocument, compose_object, extract_object, prefix_names};
//!
//! let base = SceneDocument::parse(r#"
//!     <mujoco model="kitchen">
//!         <worldbody>
//!             <geom name="floor" type="plane" size="5 5 0.1"/>
//!         </worldbody>
//!     </mujoco>
//! "#)?;
//!
//! let mug = SceneDocument::parse(r#"
//!     <mujoco model="mug">
//!         <asset>
//!             <mesh name="visual" file="mug.obj"/>
//!         </asset>
//!         <worldbody>
//!             <body name="root">
//!                 <body name="main">
//!                     <geom type="mesh" mesh="visual"/>
//!                 </body>
//!             </body>
//!         </worldbody>
//!     </mujoco>
//! "#)?;
//!
//! let object = extract_object(&prefix_names(&mug, "obj_1"))?;
//! let pose = Pose::from_position(Vector3::new(0.0, -0.65, 0.6));
//! let scene = compose_object(&base, &object, &pose)?;
//!
//! let body = scene.find_body("obj_1_main").expect("inserted");
//! assert_eq!(body.attribute("pos"), Some("0 -0.65 0.6"));
//! assert_eq!(body.attribute("quat"), Some("1 0 0 0"));
//! # Ok::<(), sim_scene::SceneError>(())
//! ```
//!
//! # Conventions
//!
//! - Euler angles are intrinsic XYZ, in radians.
//! - Quaternions are written and read as `w x y z`, the order of MJCF's
//!   `quat` attribute.
//! - Body lookup by name takes the first match in document order. Names are
//!   made unique by [`prefix_names`] before composition.
//!
//! # Layer 0
//!
//! No simulator dependency. Compiling and stepping the composed scene is the
//! job of `sim-teleop` and a simulator backend.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]

mod compose;
mod document;
mod error;
mod extract;
mod include;
mod naming;
mod orientation;
mod sampler;
mod validation;

pub use compose::{compose_object, insert_body, merge_assets, set_body_pose};
pub use document::{
    ASSET, BODY, Descendants, Element, Node, SceneDocument, WORLDBODY, parse_float_array,
    parse_vector3, parse_vector4,
};
pub use error::{Result, SceneError};
pub use extract::{
    ASSET_KINDS, AssetFragment, BodyFragment, ObjectFragment, extract_asset_fragment,
    extract_body_fragment, extract_object,
};
pub use include::{
    MUJOCO_MARKER, include_directive, include_robot, insert_include_directive, posed_robot_include,
};
pub use naming::{prefix_names, prefixed};
pub use orientation::{
    Pose, PoseAttributes, euler_to_quaternion, format_pose_attribute, parse_pose_attributes,
    quat_from_wxyz, quat_from_xyzw, quat_to_wxyz, quaternion_to_euler,
};
pub use sampler::{
    CatalogEntry, CatalogSampler, FilterCriteria, GroupSelection, ObjectDescriptor, ObjectSampler,
    ObjectTags, apply_mesh_scale, rebase_asset_files,
};
pub use validation::{check_asset_references, check_asset_references_in, declared_assets};
