//! Object sampling.
//!
//! An [`ObjectSampler`] turns filter criteria into one concrete object: an
//! [`ObjectDescriptor`] plus the object's standalone scene, already carrying
//! its unique name on every declaration so it can be extracted and composed
//! next to other objects.
//!
//! [`CatalogSampler`] is the bundled implementation. It reads a JSON manifest
//! listing object scenes and their semantic tags:
//!
//! ```json
//! {
//!   "objects": [
//!     {
//!       "mjcf_path": "objects/mug_0/model.xml",
//!       "groups": ["mug", "cup"],
//!       "graspable": true,
//!       "washable": true,
//!       "size": [0.09, 0.12, 0.1]
//!     }
//!   ]
//! }
//! ```
//!
//! Relative `mjcf_path`s resolve against the manifest's directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{debug, info};

use crate::document::{ASSET, SceneDocument, parse_vector3};
use crate::error::{Result, SceneError};
use crate::naming::prefix_names;

/// Which object groups may be sampled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GroupSelection {
    /// Any group.
    #[default]
    All,
    /// Objects belonging to at least one of these groups.
    Only(BTreeSet<String>),
}

impl GroupSelection {
    /// Selection from a list of group names. `"all"` selects everything.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() || names.contains("all") {
            Self::All
        } else {
            Self::Only(names)
        }
    }

    fn admits(&self, groups: &[String]) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => groups.iter().any(|g| wanted.contains(g)),
        }
    }
}

/// Semantic tags of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ObjectTags {
    /// Fits in the gripper.
    pub graspable: bool,
    /// Can go in a sink.
    pub washable: bool,
    /// Can go in a microwave.
    pub microwavable: bool,
    /// Can go on a stove.
    pub cookable: bool,
    /// Can go in a freezer.
    pub freezable: bool,
}

/// Criteria an object must satisfy to be sampled.
///
/// Tag filters left as `None` accept either value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterCriteria {
    /// Groups to draw from.
    pub groups: GroupSelection,
    /// Groups that disqualify an object.
    pub exclude_groups: BTreeSet<String>,
    /// Required `graspable` tag.
    pub graspable: Option<bool>,
    /// Required `washable` tag.
    pub washable: Option<bool>,
    /// Required `microwavable` tag.
    pub microwavable: Option<bool>,
    /// Required `cookable` tag.
    pub cookable: Option<bool>,
    /// Required `freezable` tag.
    pub freezable: Option<bool>,
    /// Per-axis upper bound on the scaled bounding size.
    pub max_size: [Option<f64>; 3],
    /// Uniform scale applied to the object's meshes. Defaults to 1.
    pub scale: Option<f64>,
    /// Use this object scene instead of sampling.
    pub mjcf_path: Option<PathBuf>,
    /// Unique object name. Defaults to `obj_<n>`.
    pub name: Option<String>,
}

impl FilterCriteria {
    /// Criteria admitting every object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given groups.
    #[must_use]
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = GroupSelection::from_names(groups);
        self
    }

    /// Exclude the given groups.
    #[must_use]
    pub fn exclude_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Require the `graspable` tag to equal `value`.
    #[must_use]
    pub fn graspable(mut self, value: bool) -> Self {
        self.graspable = Some(value);
        self
    }

    /// Require the `washable` tag to equal `value`.
    #[must_use]
    pub fn washable(mut self, value: bool) -> Self {
        self.washable = Some(value);
        self
    }

    /// Require the `microwavable` tag to equal `value`.
    #[must_use]
    pub fn microwavable(mut self, value: bool) -> Self {
        self.microwavable = Some(value);
        self
    }

    /// Require the `cookable` tag to equal `value`.
    #[must_use]
    pub fn cookable(mut self, value: bool) -> Self {
        self.cookable = Some(value);
        self
    }

    /// Require the `freezable` tag to equal `value`.
    #[must_use]
    pub fn freezable(mut self, value: bool) -> Self {
        self.freezable = Some(value);
        self
    }

    /// Bound the scaled bounding size per axis.
    #[must_use]
    pub fn max_size(mut self, max_size: [Option<f64>; 3]) -> Self {
        self.max_size = max_size;
        self
    }

    /// Scale the object's meshes uniformly.
    #[must_use]
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Load this object scene instead of sampling.
    #[must_use]
    pub fn mjcf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mjcf_path = Some(path.into());
        self
    }

    /// Name the object explicitly.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn effective_scale(&self) -> f64 {
        self.scale.unwrap_or(1.0)
    }

    fn admits(&self, entry: &CatalogEntry) -> bool {
        let tags = &entry.tags;
        let tag_ok = |want: Option<bool>, have: bool| want.map_or(true, |w| w == have);

        let scaled = entry.extent() * self.effective_scale();
        let size_ok = self
            .max_size
            .iter()
            .zip(scaled.iter())
            .all(|(bound, extent)| bound.map_or(true, |b| *extent <= b));

        self.groups.admits(&entry.groups)
            && !entry.groups.iter().any(|g| self.exclude_groups.contains(g))
            && tag_ok(self.graspable, tags.graspable)
            && tag_ok(self.washable, tags.washable)
            && tag_ok(self.microwavable, tags.microwavable)
            && tag_ok(self.cookable, tags.cookable)
            && tag_ok(self.freezable, tags.freezable)
            && size_ok
    }
}

/// Metadata of one sampled object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescriptor {
    /// Unique name; every declaration in the object scene carries it as a
    /// prefix.
    pub name: String,
    /// Object scene file.
    pub source: PathBuf,
    /// Groups the object belongs to.
    pub groups: Vec<String>,
    /// Semantic tags.
    pub tags: ObjectTags,
    /// Bounding size after scaling.
    pub size: Vector3<f64>,
    /// Applied mesh scale.
    pub scale: f64,
}

impl ObjectDescriptor {
    /// Name of the object body after prefixing, for an object whose scene
    /// names its body `main`.
    pub fn main_body(&self) -> String {
        format!("{}_main", self.name)
    }
}

/// Source of sampled objects.
pub trait ObjectSampler {
    /// Pick an object matching `criteria` and return it with its scene.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NoMatchingObject`] when nothing matches, or any
    /// error from loading the object scene.
    fn sample_object(
        &mut self,
        criteria: &FilterCriteria,
    ) -> Result<(ObjectDescriptor, SceneDocument)>;
}

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    objects: Vec<CatalogEntry>,
}

/// One object listed in a catalog manifest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogEntry {
    /// Object scene file.
    pub mjcf_path: PathBuf,
    /// Group names.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Semantic tags.
    #[serde(flatten)]
    pub tags: ObjectTags,
    /// Unscaled bounding size.
    #[serde(default)]
    pub size: [f64; 3],
}

impl CatalogEntry {
    /// Unscaled bounding size as a vector.
    pub fn extent(&self) -> Vector3<f64> {
        Vector3::from(self.size)
    }
}

/// Sampler over a JSON catalog of object scenes.
#[derive(Debug)]
pub struct CatalogSampler {
    root: PathBuf,
    entries: Vec<CatalogEntry>,
    rng: StdRng,
    sampled: usize,
}

impl CatalogSampler {
    /// Load a manifest file. Entries resolve against its directory.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Io`] if the file cannot be read and
    /// [`SceneError::Catalog`] if it is not a valid manifest.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let sampler = Self::from_json(&json, root)?;
        info!(
            catalog = %path.display(),
            objects = sampler.entries.len(),
            "loaded object catalog"
        );
        Ok(sampler)
    }

    /// Parse a manifest whose relative paths resolve against `root`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Catalog`] for invalid JSON or a non-positive or
    /// non-finite size.
    pub fn from_json(json: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let manifest: Manifest =
            serde_json::from_str(json).map_err(|e| SceneError::Catalog(e.to_string()))?;
        for entry in &manifest.objects {
            if !entry.size.iter().all(|v| v.is_finite() && *v >= 0.0) {
                return Err(SceneError::Catalog(format!(
                    "invalid size for {}",
                    entry.mjcf_path.display()
                )));
            }
        }
        Ok(Self {
            root: root.into(),
            entries: manifest.objects,
            rng: StdRng::from_entropy(),
            sampled: 0,
        })
    }

    /// Reseed the random source, making sampling reproducible.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Catalog entries.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn pick(&mut self, criteria: &FilterCriteria) -> Result<CatalogEntry> {
        if let Some(path) = &criteria.mjcf_path {
            let resolved = self.resolve(path);
            let known = self
                .entries
                .iter()
                .find(|e| self.resolve(&e.mjcf_path) == resolved)
                .cloned();
            return Ok(known.unwrap_or_else(|| CatalogEntry {
                mjcf_path: resolved,
                groups: Vec::new(),
                tags: ObjectTags::default(),
                size: [0.0; 3],
            }));
        }

        let candidates: Vec<&CatalogEntry> =
            self.entries.iter().filter(|e| criteria.admits(e)).collect();
        debug!(candidates = candidates.len(), "filtered catalog");

        candidates
            .choose(&mut self.rng)
            .map(|e| (*e).clone())
            .ok_or_else(|| SceneError::NoMatchingObject(describe_criteria(criteria)))
    }
}

impl ObjectSampler for CatalogSampler {
    fn sample_object(
        &mut self,
        criteria: &FilterCriteria,
    ) -> Result<(ObjectDescriptor, SceneDocument)> {
        let scale = criteria.effective_scale();
        if !(scale.is_finite() && scale > 0.0) {
            return Err(SceneError::invalid_attribute(
                "scale",
                "filter criteria",
                format!("scale must be positive, got {scale}"),
            ));
        }

        let entry = self.pick(criteria)?;
        let source = self.resolve(&entry.mjcf_path);
        let raw = SceneDocument::from_file(&source)?;
        let scene_dir = source
            .canonicalize()?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let rebased = rebase_asset_files(&raw, &scene_dir);
        let scaled = apply_mesh_scale(&rebased, scale)?;

        let name = match &criteria.name {
            Some(name) => name.clone(),
            None => format!("obj_{}", self.sampled + 1),
        };
        self.sampled += 1;
        let doc = prefix_names(&scaled, &name);

        info!(object = %name, source = %source.display(), "sampled object");
        let size = entry.extent() * scale;
        let descriptor = ObjectDescriptor {
            name,
            source,
            groups: entry.groups,
            tags: entry.tags,
            size,
            scale,
        };
        Ok((descriptor, doc))
    }
}

/// Asset kinds whose files live under `<compiler meshdir>`.
const MESH_FILE_KINDS: [&str; 3] = ["mesh", "hfield", "skin"];

/// File attributes of a `<texture>`, cube and skybox faces included.
const TEXTURE_FILE_ATTRS: [&str; 7] = [
    "file", "fileright", "fileleft", "fileup", "filedown", "filefront", "fileback",
];

/// Rewrite relative asset file paths as paths under `scene_dir`, the
/// directory the scene was loaded from.
///
/// Mesh, height field and skin files resolve against `<compiler meshdir>`,
/// textures against `texturedir`, both falling back to `assetdir`. Absolute
/// paths are kept. Pass an absolute `scene_dir` to get declarations that load
/// from any scene they are merged into.
pub fn rebase_asset_files(doc: &SceneDocument, scene_dir: &Path) -> SceneDocument {
    let compiler = doc.root().child("compiler");
    let dir = |key: &str| compiler.and_then(|c| c.attribute(key));
    let asset_dir = dir("assetdir");
    let under = |sub: Option<&str>| match sub {
        Some(sub) => scene_dir.join(sub),
        None => scene_dir.to_path_buf(),
    };
    let mesh_base = under(dir("meshdir").or(asset_dir));
    let texture_base = under(dir("texturedir").or(asset_dir));

    let mut out = doc.clone();
    for section in out.root_mut().elements_mut().filter(|e| e.name == ASSET) {
        for element in section.elements_mut() {
            let (base, attrs): (&Path, &[&str]) = if element.name == "texture" {
                (texture_base.as_path(), &TEXTURE_FILE_ATTRS[..])
            } else if MESH_FILE_KINDS.contains(&element.name.as_str()) {
                (mesh_base.as_path(), &TEXTURE_FILE_ATTRS[..1])
            } else {
                continue;
            };
            for attr in attrs {
                let rebased = match element.attribute(attr) {
                    Some(file) if !Path::new(file).is_absolute() => {
                        base.join(file).to_string_lossy().into_owned()
                    }
                    _ => continue,
                };
                element.set_attribute(*attr, rebased);
            }
        }
    }
    out
}

/// Multiply the `scale` of every `<mesh>` asset by `factor`.
///
/// # Errors
///
/// Returns [`SceneError::InvalidAttribute`] if an existing `scale` is not
/// three numbers.
pub fn apply_mesh_scale(doc: &SceneDocument, factor: f64) -> Result<SceneDocument> {
    let mut out = doc.clone();
    if (factor - 1.0).abs() < f64::EPSILON {
        return Ok(out);
    }
    let Some(asset) = out.section_mut(ASSET) else {
        return Ok(out);
    };
    for mesh in asset.elements_mut().filter(|e| e.name == "mesh") {
        let current = match mesh.attribute("scale") {
            Some(s) => parse_vector3(s)?,
            None => Vector3::new(1.0, 1.0, 1.0),
        };
        let scaled = current * factor;
        mesh.set_attribute("scale", format!("{} {} {}", scaled.x, scaled.y, scaled.z));
    }
    Ok(out)
}

fn describe_criteria(criteria: &FilterCriteria) -> String {
    let groups = match &criteria.groups {
        GroupSelection::All => "all".to_string(),
        GroupSelection::Only(g) => g.iter().cloned().collect::<Vec<_>>().join(","),
    };
    format!(
        "groups=[{groups}] graspable={:?} washable={:?} microwavable={:?} cookable={:?} freezable={:?} max_size={:?}",
        criteria.graspable,
        criteria.washable,
        criteria.microwavable,
        criteria.cookable,
        criteria.freezable,
        criteria.max_size
    )
}
