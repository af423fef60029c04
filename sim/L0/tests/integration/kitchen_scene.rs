//! Kitchen scene composition: catalog sampling through dry-run launch.

use std::path::PathBuf;

use approx::assert_relative_eq;
use nalgebra::{UnitQuaternion, Vector3};
use sim_scene::{
    CatalogSampler, FilterCriteria, ObjectSampler, Pose, SceneDocument, SceneError,
    check_asset_references, compose_object, extract_object,
};
use sim_teleop::{DryRunSimulator, StartOptions, TeleopError, build_and_start};

use crate::fixtures::{Catalog, KITCHEN};

fn kitchen() -> SceneDocument {
    SceneDocument::parse(KITCHEN).unwrap()
}

#[test]
fn test_mug_on_counter() {
    let catalog = Catalog::create();
    let mut sampler = CatalogSampler::from_file(&catalog.manifest).unwrap().seed(7);
    let criteria = FilterCriteria::new().groups(["mug"]).graspable(true);

    let (descriptor, object_scene) = sampler.sample_object(&criteria).unwrap();
    assert_eq!(descriptor.name, "obj_1");
    assert_eq!(descriptor.groups, vec!["mug".to_string()]);
    assert!(descriptor.tags.graspable);

    let object = extract_object(&object_scene).unwrap();
    let pose = Pose::from_position(Vector3::new(0.0, -0.65, 0.6));
    let scene = compose_object(&kitchen(), &object, &pose).unwrap();

    assert_eq!(scene.count_bodies("obj_1_main"), 1);
    let body = scene.find_body("obj_1_main").unwrap();
    assert_eq!(body.attribute("pos"), Some("0 -0.65 0.6"));
    assert_eq!(body.attribute("quat"), Some("1 0 0 0"));
    assert_eq!(body.attribute("euler"), None);

    let sim = DryRunSimulator::new();
    let log = sim.log();
    let mut handle = build_and_start(sim, &scene, StartOptions::headless()).unwrap();
    assert_eq!(log.compiles(), 1);
    assert_eq!(handle.model().name.as_deref(), Some("kitchen"));

    let placed = handle.view().body_pose("obj_1_main").unwrap();
    assert_relative_eq!(placed.position, Vector3::new(0.0, -0.65, 0.6), epsilon = 1e-12);
    assert!(placed.orientation.angle_to(&UnitQuaternion::identity()) < 1e-12);
    handle.stop();
}

#[test]
fn test_assets_carried_with_prefix() {
    let catalog = Catalog::create();
    let mut sampler = CatalogSampler::from_file(&catalog.manifest).unwrap().seed(1);
    let (_, object_scene) = sampler
        .sample_object(&FilterCriteria::new().groups(["bowl"]))
        .unwrap();
    let object = extract_object(&object_scene).unwrap();
    let scene = compose_object(&kitchen(), &object, &Pose::identity()).unwrap();

    let asset = scene.section("asset").unwrap();
    let names: Vec<&str> = asset.elements().filter_map(|e| e.name_attr()).collect();
    assert_eq!(
        names,
        vec!["wood", "counter_mat", "obj_1_tex", "obj_1_mat", "obj_1_visual", "obj_1_collision"]
    );
    let geom = scene
        .find_body("obj_1_main")
        .unwrap()
        .find(|e| e.name == "geom" && e.name_attr() == Some("obj_1_visual"))
        .unwrap();
    assert_eq!(geom.attribute("mesh"), Some("obj_1_visual"));
    assert_eq!(geom.attribute("material"), Some("obj_1_mat"));
}

#[test]
fn test_object_assets_load_from_any_scene_directory() {
    let catalog = Catalog::create();
    let mut sampler = CatalogSampler::from_file(&catalog.manifest).unwrap();
    let (_, object_scene) = sampler
        .sample_object(&FilterCriteria::new().groups(["mug"]))
        .unwrap();
    let object = extract_object(&object_scene).unwrap();
    let scene = compose_object(&kitchen(), &object, &Pose::identity()).unwrap();

    let mug_dir = catalog.path().join("mug").canonicalize().unwrap();
    let asset = scene.section("asset").unwrap();
    let files: Vec<(&str, PathBuf)> = asset
        .elements()
        .filter_map(|e| Some((e.name_attr()?, PathBuf::from(e.attribute("file")?))))
        .collect();
    assert_eq!(
        files,
        vec![
            ("wood", PathBuf::from("wood.png")),
            ("obj_1_tex", mug_dir.join("mug.png")),
            ("obj_1_visual", mug_dir.join("mug.obj")),
            ("obj_1_collision", mug_dir.join("mug.obj")),
        ]
    );

    // written elsewhere, the object's files still point into the catalog
    let out = tempfile::tempdir().unwrap();
    let written = out.path().join("composed.xml");
    scene.write_to(&written).unwrap();
    let reread = SceneDocument::from_file(&written).unwrap();
    let visual = reread
        .section("asset")
        .unwrap()
        .elements()
        .find(|e| e.name_attr() == Some("obj_1_visual"))
        .and_then(|e| e.attribute("file"))
        .map(PathBuf::from)
        .unwrap();
    assert!(visual.is_absolute());
    assert!(visual.starts_with(&mug_dir));
}

#[test]
fn test_several_objects_stay_distinct() {
    let catalog = Catalog::create();
    let mut sampler = CatalogSampler::from_file(&catalog.manifest).unwrap().seed(3);
    let placements = [
        (FilterCriteria::new().groups(["mug"]), Vector3::new(0.2, -0.65, 0.6)),
        (FilterCriteria::new().washable(true), Vector3::new(-0.2, -0.65, 0.6)),
        (FilterCriteria::new().cookable(true), Vector3::new(0.0, -0.5, 0.6)),
    ];

    let mut scene = kitchen();
    for (criteria, position) in &placements {
        let (_, object_scene) = sampler.sample_object(criteria).unwrap();
        let object = extract_object(&object_scene).unwrap();
        scene = compose_object(&scene, &object, &Pose::from_position(*position)).unwrap();
    }

    for (i, (_, position)) in placements.iter().enumerate() {
        let name = format!("obj_{}_main", i + 1);
        assert_eq!(scene.count_bodies(&name), 1, "{name}");
        let body = scene.find_body(&name).unwrap();
        let expected = format!("{} {} {}", position.x, position.y, position.z);
        assert_eq!(body.attribute("pos"), Some(expected.as_str()));
    }
    check_asset_references(&scene).unwrap();

    let handle = build_and_start(DryRunSimulator::new(), &scene, StartOptions::headless()).unwrap();
    assert_eq!(handle.model().bodies, 4);
}

#[test]
fn test_scale_applies_to_meshes_and_size() {
    let catalog = Catalog::create();
    let mut sampler = CatalogSampler::from_file(&catalog.manifest).unwrap();
    let (descriptor, object_scene) = sampler
        .sample_object(&FilterCriteria::new().groups(["mug"]).scale(2.0))
        .unwrap();

    assert_relative_eq!(descriptor.size, Vector3::new(0.18, 0.18, 0.22), epsilon = 1e-12);
    let asset = object_scene.section("asset").unwrap();
    let scale = |name: &str| {
        asset
            .elements()
            .find(|e| e.name_attr() == Some(name))
            .and_then(|e| e.attribute("scale"))
            .map(str::to_string)
    };
    assert_eq!(scale("obj_1_visual").as_deref(), Some("2 2 2"));
    assert_eq!(scale("obj_1_collision").as_deref(), Some("1 1 1"));
}

#[test]
fn test_unsatisfiable_filters() {
    let catalog = Catalog::create();
    let mut sampler = CatalogSampler::from_file(&catalog.manifest).unwrap();

    let criteria = FilterCriteria::new().groups(["mug"]).cookable(true);
    assert!(matches!(
        sampler.sample_object(&criteria),
        Err(SceneError::NoMatchingObject(_))
    ));

    let too_small = FilterCriteria::new().max_size([Some(0.05), None, None]);
    assert!(matches!(
        sampler.sample_object(&too_small),
        Err(SceneError::NoMatchingObject(_))
    ));
}

#[test]
fn test_explicit_path_and_name() {
    let catalog = Catalog::create();
    let mut sampler = CatalogSampler::from_file(&catalog.manifest).unwrap();
    let criteria = FilterCriteria::new()
        .mjcf_path(catalog.path().join("pan").join("model.xml"))
        .name("pan");

    let (descriptor, object_scene) = sampler.sample_object(&criteria).unwrap();
    assert_eq!(descriptor.name, "pan");
    assert_eq!(descriptor.main_body(), "pan_main");
    assert!(descriptor.tags.cookable);
    assert!(object_scene.find_body("pan_main").is_some());
}

#[test]
fn test_dangling_reference_never_launches() {
    let broken = SceneDocument::parse(
        r#"<mujoco model="mug">
            <asset><mesh name="obj_9_visual" file="mug.obj"/></asset>
            <worldbody>
                <body name="obj_9_root">
                    <body name="obj_9_main">
                        <geom type="mesh" mesh="obj_9_visual" material="obj_9_missing"/>
                    </body>
                </body>
            </worldbody>
        </mujoco>"#,
    )
    .unwrap();
    let object = extract_object(&broken).unwrap();
    let err = compose_object(&kitchen(), &object, &Pose::identity()).unwrap_err();
    assert!(matches!(err, SceneError::DanglingAsset { .. }), "{err}");

    // Placing the body by hand skips validation; the launcher still refuses.
    let scene = sim_scene::insert_body(&kitchen(), &object.body).unwrap();
    let sim = DryRunSimulator::new();
    let log = sim.log();
    let err = build_and_start(sim, &scene, StartOptions::headless()).unwrap_err();
    assert!(matches!(err, TeleopError::Scene(SceneError::DanglingAsset { .. })));
    assert_eq!(log.compiles(), 0);
    assert_eq!(log.steps(), 0);
}
