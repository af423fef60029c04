//! Asset reference checks.
//!
//! MuJoCo refuses to compile a model where a geom names a mesh, or a material
//! names a texture, that nothing declares. Composition checks this up front so
//! the failure names the offending element instead of surfacing as a compile
//! error from the simulator.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::document::{ASSET, BODY, Element, SceneDocument};
use crate::error::{Result, SceneError};

/// Reference attributes checked, with the asset kind each one names.
const ASSET_REFS: [(&str, &str); 3] = [
    ("mesh", "mesh"),
    ("material", "material"),
    ("texture", "texture"),
];

/// Include nesting followed before giving up.
const MAX_INCLUDE_DEPTH: usize = 8;

/// Declared `(kind, name)` pairs across every `<asset>` section of `doc`.
///
/// A file-backed asset without a `name` is named after its file stem, so
/// `<mesh file="meshes/mug.obj"/>` declares the mesh `mug`.
pub fn declared_assets(doc: &SceneDocument) -> HashSet<(String, String)> {
    doc.root()
        .elements()
        .filter(|e| e.name == ASSET)
        .flat_map(|section| section.elements())
        .filter_map(|e| declared_name(e).map(|n| (e.name.clone(), n)))
        .collect()
}

fn declared_name(element: &Element) -> Option<String> {
    if let Some(name) = element.name_attr() {
        return Some(name.to_string());
    }
    let file = element.attribute("file")?;
    Path::new(file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

/// Check that every mesh, material and texture reference resolves.
///
/// Relative `<include>` files resolve against the working directory; see
/// [`check_asset_references_in`].
///
/// # Errors
///
/// Returns [`SceneError::DanglingAsset`] for the first unresolved reference
/// in document order.
pub fn check_asset_references(doc: &SceneDocument) -> Result<()> {
    check_asset_references_in(doc, Path::new("."))
}

/// Check that every mesh, material and texture reference resolves, reading
/// `<include>` files relative to `base_dir`.
///
/// Assets declared by included files count as declared. When an included
/// file cannot be read its declarations are unknown, so names not declared
/// anywhere else are logged at debug level instead of rejected. Names that
/// no readable file declares are still rejected when every include loaded.
///
/// # Errors
///
/// Returns [`SceneError::DanglingAsset`] for the first unresolved reference
/// in document order.
pub fn check_asset_references_in(doc: &SceneDocument, base_dir: &Path) -> Result<()> {
    let mut declared = declared_assets(doc);
    let mut unreadable = Vec::new();
    collect_included_assets(doc, base_dir, 0, &mut declared, &mut unreadable);

    let mut first_dangling = None;
    walk(doc.root(), None, &mut |element, body| {
        if first_dangling.is_some() {
            return;
        }
        for (attr, kind) in ASSET_REFS {
            let Some(name) = element.attribute(attr) else {
                continue;
            };
            // A declaration's own tag name is not a reference.
            if element.name == kind {
                continue;
            }
            if declared.contains(&(kind.to_string(), name.to_string())) {
                continue;
            }
            if !unreadable.is_empty() {
                debug!(kind, name, includes = ?unreadable, "reference deferred to unread include");
                continue;
            }
            first_dangling = Some(SceneError::dangling_asset(
                kind,
                name,
                describe(element, body),
            ));
            return;
        }
    });

    match first_dangling {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn collect_included_assets(
    doc: &SceneDocument,
    base_dir: &Path,
    depth: usize,
    declared: &mut HashSet<(String, String)>,
    unreadable: &mut Vec<PathBuf>,
) {
    for include in doc.root().descendants().filter(|e| e.name == "include") {
        let Some(file) = include.attribute("file") else {
            continue;
        };
        let path = base_dir.join(file);
        let loaded = if depth < MAX_INCLUDE_DEPTH {
            SceneDocument::from_file(&path).ok()
        } else {
            None
        };
        match loaded {
            Some(included) => {
                declared.extend(declared_assets(&included));
                let dir = path.parent().unwrap_or(base_dir);
                collect_included_assets(&included, dir, depth + 1, declared, unreadable);
            }
            None => {
                debug!(include = %path.display(), "included file not readable");
                unreadable.push(path);
            }
        }
    }
}

fn walk<'a>(
    element: &'a Element,
    body: Option<&'a str>,
    f: &mut impl FnMut(&'a Element, Option<&'a str>),
) {
    f(element, body);
    let body = if element.name == BODY {
        element.name_attr().or(body)
    } else {
        body
    };
    for child in element.elements() {
        walk(child, body, f);
    }
}

fn describe(element: &Element, body: Option<&str>) -> String {
    let tag = match element.name_attr() {
        Some(name) => format!("<{} name='{name}'>", element.name),
        None => format!("<{}>", element.name),
    };
    match body {
        Some(body) => format!("{tag} in body '{body}'"),
        None => tag,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_references() {
        let doc = SceneDocument::parse(
            r#"<mujoco>
                <asset>
                    <texture name="wood" file="wood.png"/>
                    <material name="counter" texture="wood"/>
                    <mesh name="bowl" file="bowl.obj"/>
                </asset>
                <worldbody>
                    <body name="b"><geom type="mesh" mesh="bowl" material="counter"/></body>
                </worldbody>
            </mujoco>"#,
        )
        .unwrap();
        check_asset_references(&doc).unwrap();
        assert_eq!(declared_assets(&doc).len(), 3);
    }

    #[test]
    fn test_dangling_mesh_names_body() {
        let doc = SceneDocument::parse(
            r#"<mujoco><worldbody>
                <body name="obj_1_main"><geom name="g" type="mesh" mesh="missing"/></body>
            </worldbody></mujoco>"#,
        )
        .unwrap();
        match check_asset_references(&doc) {
            Err(SceneError::DanglingAsset {
                kind,
                name,
                context,
            }) => {
                assert_eq!(kind, "mesh");
                assert_eq!(name, "missing");
                assert!(context.contains("obj_1_main"));
                assert!(context.contains("<geom name='g'>"));
            }
            other => panic!("expected DanglingAsset, got {other:?}"),
        }
    }

    #[test]
    fn test_dangling_texture_on_material() {
        let doc = SceneDocument::parse(
            r#"<mujoco><asset><material name="m" texture="gone"/></asset><worldbody/></mujoco>"#,
        )
        .unwrap();
        assert!(matches!(
            check_asset_references(&doc),
            Err(SceneError::DanglingAsset { kind: "texture", .. })
        ));
    }

    #[test]
    fn test_kind_mismatch_is_dangling() {
        // a texture named "m" does not satisfy material="m"
        let doc = SceneDocument::parse(
            r#"<mujoco><asset><texture name="m" file="m.png"/></asset>
               <worldbody><geom size="1" material="m"/></worldbody></mujoco>"#,
        )
        .unwrap();
        assert!(check_asset_references(&doc).is_err());
    }

    #[test]
    fn test_unreadable_include_defers_check() {
        let doc = SceneDocument::parse(
            r#"<mujoco><include file="/nonexistent/robot.xml"/>
               <worldbody><geom size="1" material="robot_mat"/></worldbody></mujoco>"#,
        )
        .unwrap();
        check_asset_references(&doc).unwrap();
    }

    #[test]
    fn test_readable_include_keeps_check() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("robot.xml"),
            r#"<mujoco><asset><material name="robot_mat"/></asset></mujoco>"#,
        )
        .unwrap();

        let ok = SceneDocument::parse(
            r#"<mujoco><include file="robot.xml"/>
               <worldbody><geom size="1" material="robot_mat"/></worldbody></mujoco>"#,
        )
        .unwrap();
        check_asset_references_in(&ok, dir.path()).unwrap();

        let broken = SceneDocument::parse(
            r#"<mujoco><include file="robot.xml"/>
               <worldbody><body name="obj_1_main"><geom size="1" material="obj_1_mat"/></body></worldbody></mujoco>"#,
        )
        .unwrap();
        assert!(matches!(
            check_asset_references_in(&broken, dir.path()),
            Err(SceneError::DanglingAsset { kind: "material", ref name, .. }) if name == "obj_1_mat"
        ));
    }

    #[test]
    fn test_unnamed_asset_named_after_file() {
        let doc = SceneDocument::parse(
            r#"<mujoco>
                <asset><mesh file="meshes/mug.obj"/><texture type="2d" file="wood.png"/></asset>
                <worldbody><geom type="mesh" mesh="mug"/></worldbody>
            </mujoco>"#,
        )
        .unwrap();
        check_asset_references(&doc).unwrap();
        let declared = declared_assets(&doc);
        assert!(declared.contains(&("mesh".to_string(), "mug".to_string())));
        assert!(declared.contains(&("texture".to_string(), "wood".to_string())));
    }
}
