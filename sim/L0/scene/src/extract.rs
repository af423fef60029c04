//! Fragment extraction from sampled object scenes.
//!
//! An object sampler emits a standalone MJCF scene per object. Only two slices
//! of it are reusable: the mesh/texture/material declarations in `<asset>`, and
//! the object body, which sits one level below a placeholder root body:
//!
//! ```text
//! <mujoco>
//!   <asset> mesh / texture / material ... </asset>
//!   <worldbody>
//!     <body name="obj_1_root">        <- scaffolding
//!       <body name="obj_1_main"> ...  <- extracted
//! ```
//!
//! The layout is checked structurally rather than searched for, so a change
//! in the sampler's output fails here instead of composing a broken scene.

use crate::document::{ASSET, BODY, Element, SceneDocument, WORLDBODY};
use crate::error::{Result, SceneError};

/// Asset element kinds that are carried into the target scene.
pub const ASSET_KINDS: [&str; 3] = ["mesh", "texture", "material"];

/// Asset declarations lifted from an object scene, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssetFragment {
    /// Detached `<mesh>`, `<texture>` and `<material>` elements.
    pub declarations: Vec<Element>,
}

impl AssetFragment {
    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// True when the fragment carries nothing.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Declared `(kind, name)` pairs.
    pub fn names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.declarations
            .iter()
            .filter_map(|e| e.name_attr().map(|n| (e.name.as_str(), n)))
    }
}

/// A detached body subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyFragment {
    body: Element,
}

impl BodyFragment {
    /// Wrap a `<body>` element.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ObjectBodyNotFound`] if `body` is not a
    /// `<body>` element.
    pub fn new(body: Element) -> Result<Self> {
        if body.name != BODY {
            return Err(SceneError::ObjectBodyNotFound(format!(
                "expected <body>, got <{}>",
                body.name
            )));
        }
        Ok(Self { body })
    }

    /// The body's `name` attribute.
    pub fn name(&self) -> Option<&str> {
        self.body.name_attr()
    }

    /// The body element.
    pub fn element(&self) -> &Element {
        &self.body
    }

    /// Unwrap into the body element.
    pub fn into_element(self) -> Element {
        self.body
    }
}

/// Both fragments of one sampled object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFragment {
    /// Asset declarations.
    pub assets: AssetFragment,
    /// Object body subtree.
    pub body: BodyFragment,
}

/// Extract the mesh, texture and material declarations of `doc`.
///
/// Other asset children (comments, `hfield`, `skin`, text) are skipped.
///
/// # Errors
///
/// Returns [`SceneError::MalformedScene`] if the document has no `<asset>`.
pub fn extract_asset_fragment(doc: &SceneDocument) -> Result<AssetFragment> {
    let asset = doc
        .section(ASSET)
        .ok_or_else(|| SceneError::malformed(ASSET, describe(doc)))?;

    let declarations = asset
        .elements()
        .filter(|e| ASSET_KINDS.contains(&e.name.as_str()))
        .cloned()
        .collect();

    Ok(AssetFragment { declarations })
}

/// Extract the object body at `worldbody/body/body`.
///
/// # Errors
///
/// Returns [`SceneError::ObjectBodyNotFound`] if the world root, the
/// placeholder body, or the nested object body is missing.
pub fn extract_body_fragment(doc: &SceneDocument) -> Result<BodyFragment> {
    let worldbody = doc.section(WORLDBODY).ok_or_else(|| {
        SceneError::ObjectBodyNotFound(format!("{} has no <worldbody>", describe(doc)))
    })?;
    let root_body = worldbody.child(BODY).ok_or_else(|| {
        SceneError::ObjectBodyNotFound(format!(
            "{} has no object root body under <worldbody>",
            describe(doc)
        ))
    })?;
    let object_body = root_body.child(BODY).ok_or_else(|| {
        SceneError::ObjectBodyNotFound(format!(
            "root body '{}' in {} has no nested object body",
            root_body.name_attr().unwrap_or("<unnamed>"),
            describe(doc)
        ))
    })?;

    BodyFragment::new(object_body.clone())
}

/// Extract both fragments.
pub fn extract_object(doc: &SceneDocument) -> Result<ObjectFragment> {
    Ok(ObjectFragment {
        assets: extract_asset_fragment(doc)?,
        body: extract_body_fragment(doc)?,
    })
}

fn describe(doc: &SceneDocument) -> String {
    match doc.model_name() {
        Some(name) => format!("model '{name}'"),
        None => "object scene".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    const MUG: &str = r#"
        <mujoco model="mug">
            <asset>
                <!-- visual -->
                <texture name="tex" file="mug.png" type="2d"/>
                <material name="mat" texture="tex"/>
                <mesh name="visual" file="visual/model.obj"/>
                <mesh name="collision" file="collision/model.obj"/>
                <hfield name="terrain" nrow="2" ncol="2" size="1 1 1 1"/>
            </asset>
            <worldbody>
                <body name="root">
                    <body name="main">
                        <geom type="mesh" mesh="visual" material="mat"/>
                        <geom type="mesh" mesh="collision"/>
                    </body>
                </body>
            </worldbody>
        </mujoco>"#;

    #[test]
    fn test_asset_fragment_kinds() {
        let doc = SceneDocument::parse(MUG).unwrap();
        let assets = extract_asset_fragment(&doc).unwrap();
        let kinds: Vec<&str> = assets.declarations.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(kinds, vec!["texture", "material", "mesh", "mesh"]);
        assert_eq!(assets.len(), 4);
    }

    #[test]
    fn test_asset_fragment_missing_section() {
        let doc = SceneDocument::parse("<mujoco model='bare'><worldbody/></mujoco>").unwrap();
        match extract_asset_fragment(&doc) {
            Err(SceneError::MalformedScene { section, context }) => {
                assert_eq!(section, "asset");
                assert!(context.contains("bare"));
            }
            other => panic!("expected MalformedScene, got {other:?}"),
        }
    }

    #[test]
    fn test_body_fragment_nested() {
        let doc = SceneDocument::parse(MUG).unwrap();
        let body = extract_body_fragment(&doc).unwrap();
        assert_eq!(body.name(), Some("main"));
        assert_eq!(body.element().elements().count(), 2);
    }

    #[test]
    fn test_body_fragment_single_level() {
        let doc = SceneDocument::parse(
            r#"<mujoco><asset/><worldbody><body name="main"><geom size="0.1"/></body></worldbody></mujoco>"#,
        )
        .unwrap();
        assert!(matches!(
            extract_body_fragment(&doc),
            Err(SceneError::ObjectBodyNotFound(msg)) if msg.contains("main")
        ));
    }

    #[test]
    fn test_body_fragment_no_worldbody() {
        let doc = SceneDocument::parse("<mujoco><asset/></mujoco>").unwrap();
        assert!(matches!(
            extract_body_fragment(&doc),
            Err(SceneError::ObjectBodyNotFound(_))
        ));
    }

    #[test]
    fn test_body_fragment_rejects_non_body() {
        assert!(BodyFragment::new(Element::new("geom")).is_err());
    }

    #[test]
    fn test_extract_object() {
        let doc = SceneDocument::parse(MUG).unwrap();
        let object = extract_object(&doc).unwrap();
        let names: Vec<_> = object.assets.names().collect();
        assert!(names.contains(&("mesh", "visual")));
        assert_eq!(object.body.name(), Some("main"));
    }
}
