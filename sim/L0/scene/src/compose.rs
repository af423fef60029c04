//! Scene composition: asset merging, body insertion, pose rewriting.
//!
//! Every operation borrows its input and returns a new [`SceneDocument`], so
//! steps chain and a failed step leaves the caller's document as it was:
//!
//! ```
//! use nalgebra::{UnitQuaternion, Vector3};
//! use sim_scene::{SceneDocument, extract_object, insert_body, merge_assets, set_body_pose};
//!
//! let base = SceneDocument::parse("<mujoco><worldbody/></mujoco>")?;
//! let object = SceneDocument::parse(
//!     r#"<mujoco><asset><mesh name="m" file="m.obj"/></asset>
//!        <worldbody><body name="root"><body name="cup"><geom type="mesh" mesh="m"/></body></body></worldbody>
//!        </mujoco>"#,
//! )?;
//! let fragment = extract_object(&object)?;
//!
//! let scene = merge_assets(&base, &fragment.assets)?;
//! let scene = insert_body(&scene, &fragment.body)?;
//! let scene = set_body_pose(&scene, "cup", &Vector3::new(0.0, -0.65, 0.6), &UnitQuaternion::identity())?;
//! assert_eq!(scene.find_body("cup").and_then(|b| b.attribute("quat")), Some("1 0 0 0"));
//! # Ok::<(), sim_scene::SceneError>(())
//! ```

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, warn};

use crate::document::{ASSET, BODY, Element, Node, SceneDocument, WORLDBODY};
use crate::error::{Result, SceneError};
use crate::extract::{AssetFragment, BodyFragment, ObjectFragment};
use crate::orientation::{Pose, format_pose_attribute};
use crate::validation::check_asset_references;

/// Orientation attributes that compete with `quat` on a body.
const ALT_ORIENTATIONS: [&str; 4] = ["euler", "axisangle", "xyaxes", "zaxis"];

/// Append the fragment's declarations to the target's `<asset>` section.
///
/// The section is created (ahead of `<worldbody>`) when missing. A
/// declaration whose kind and name already exist replaces the existing one in
/// place, so merging the same fragment twice still yields a loadable scene.
pub fn merge_assets(target: &SceneDocument, fragment: &AssetFragment) -> Result<SceneDocument> {
    let mut out = target.clone();
    let root = out.root_mut();

    if root.child(ASSET).is_none() {
        let at = root
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == WORLDBODY))
            .unwrap_or(root.children.len());
        root.children.insert(at, Node::Element(Element::new(ASSET)));
        debug!("created <asset> section");
    }

    let asset = root
        .child_mut(ASSET)
        .ok_or_else(|| SceneError::malformed(ASSET, "composed scene"))?;

    for decl in &fragment.declarations {
        let existing = match decl.name_attr() {
            Some(name) => asset
                .elements_mut()
                .find(|e| e.name == decl.name && e.name_attr() == Some(name)),
            None => None,
        };
        match existing {
            Some(slot) => {
                warn!(
                    kind = %decl.name,
                    name = decl.name_attr().unwrap_or_default(),
                    "asset already declared, replacing"
                );
                *slot = decl.clone();
            }
            None => asset.push_element(decl.clone()),
        }
    }

    Ok(out)
}

/// Append the body subtree as a child of `<worldbody>`.
///
/// # Errors
///
/// Returns [`SceneError::MalformedScene`] if the target has no `<worldbody>`.
pub fn insert_body(target: &SceneDocument, body: &BodyFragment) -> Result<SceneDocument> {
    let mut out = target.clone();
    let worldbody = out
        .section_mut(WORLDBODY)
        .ok_or_else(|| SceneError::malformed(WORLDBODY, "target scene"))?;
    worldbody.push_element(body.element().clone());
    debug!(body = body.name().unwrap_or("<unnamed>"), "inserted body");
    Ok(out)
}

/// Overwrite `pos` and `quat` of the first body named `name`.
///
/// Competing orientation attributes (`euler`, `axisangle`, `xyaxes`,
/// `zaxis`) are removed so the written quaternion is the one MuJoCo uses.
/// Lookup takes the first match in document order; names are expected to be
/// unique (see [`crate::prefix_names`]).
///
/// # Errors
///
/// Returns [`SceneError::BodyNotFound`] if no body has that name, or
/// [`SceneError::InvalidAttribute`] if the position is not finite.
pub fn set_body_pose(
    target: &SceneDocument,
    name: &str,
    position: &Vector3<f64>,
    orientation: &UnitQuaternion<f64>,
) -> Result<SceneDocument> {
    if !position.iter().all(|v| v.is_finite()) {
        return Err(SceneError::invalid_attribute(
            "pos",
            format!("body '{name}'"),
            "position must be finite",
        ));
    }

    let mut out = target.clone();
    let body = out
        .section_mut(WORLDBODY)
        .and_then(|wb| wb.find_mut(|e| e.name == BODY && e.name_attr() == Some(name)))
        .ok_or_else(|| SceneError::BodyNotFound(name.to_string()))?;

    let attrs = format_pose_attribute(position, orientation);
    body.set_attribute("pos", attrs.pos);
    body.set_attribute("quat", attrs.quat);
    for alt in ALT_ORIENTATIONS {
        body.remove_attribute(alt);
    }

    Ok(out)
}

/// Merge an object into `base` and place its body at `pose`.
///
/// Runs [`merge_assets`], [`insert_body`] and [`set_body_pose`], then checks
/// that every asset referenced by the scene is declared.
///
/// # Errors
///
/// Returns [`SceneError::ObjectBodyNotFound`] for an unnamed object body,
/// any error of the three steps, or [`SceneError::DanglingAsset`].
pub fn compose_object(
    base: &SceneDocument,
    object: &ObjectFragment,
    pose: &Pose,
) -> Result<SceneDocument> {
    let name = object
        .body
        .name()
        .ok_or_else(|| SceneError::ObjectBodyNotFound("object body has no name".into()))?
        .to_string();

    let scene = merge_assets(base, &object.assets)?;
    let scene = insert_body(&scene, &object.body)?;
    let scene = set_body_pose(&scene, &name, &pose.position, &pose.orientation)?;
    check_asset_references(&scene)?;

    debug!(body = %name, assets = object.assets.len(), "composed object");
    Ok(scene)
}
