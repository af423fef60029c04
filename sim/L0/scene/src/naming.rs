//! Name disambiguation for objects composed into a shared scene.
//!
//! Every object scene is authored in isolation, so two mugs both declare a
//! mesh called `visual` and a body called `main`. Before composition every
//! declared name is prefixed with the object's unique name, and every
//! reference to a declared name is rewritten to match.

use std::collections::HashSet;

use crate::document::SceneDocument;

/// Attributes that refer to another element by name.
const REFERENCE_ATTRS: [&str; 16] = [
    "mesh", "material", "texture", "hfield", "joint", "joint1", "joint2", "body", "body1",
    "body2", "geom1", "geom2", "site", "tendon", "objname", "target",
];

/// Attributes that refer to a `<default>` class.
const CLASS_ATTRS: [&str; 2] = ["class", "childclass"];

/// Return a copy of `doc` where every `name`, every `<default class>` and
/// every reference to a declared name or class is prefixed with `"{prefix}_"`.
///
/// References to names the document does not declare (builtin textures,
/// elements of other files) are left untouched.
pub fn prefix_names(doc: &SceneDocument, prefix: &str) -> SceneDocument {
    let declared: HashSet<String> = doc
        .root()
        .descendants()
        .filter_map(|e| e.name_attr().map(str::to_string))
        .collect();
    let classes: HashSet<String> = doc
        .root()
        .descendants()
        .filter(|e| e.name == "default")
        .filter_map(|e| e.attribute("class").map(str::to_string))
        .collect();

    let mut out = doc.clone();
    out.root_mut().visit_mut(&mut |element| {
        for (key, value) in &mut element.attributes {
            let is_decl = key == "name";
            let is_ref = REFERENCE_ATTRS.contains(&key.as_str()) && declared.contains(value);
            let is_class = CLASS_ATTRS.contains(&key.as_str()) && classes.contains(value);
            if is_decl || is_ref || is_class {
                *value = format!("{prefix}_{value}");
            }
        }
    });
    out
}

/// Prefixed form of `name`, as produced by [`prefix_names`].
pub fn prefixed(prefix: &str, name: &str) -> String {
    format!("{prefix}_{name}")
}
