//! Robot placement through a posed include.

use std::fs;

use nalgebra::Vector3;
use sim_scene::{
    CatalogSampler, FilterCriteria, MUJOCO_MARKER, ObjectSampler, Pose, SceneDocument,
    SceneError, check_asset_references, compose_object, extract_object, include_robot,
    insert_include_directive, parse_pose_attributes, posed_robot_include,
};
use sim_teleop::{
    ActuatorCommand, DryRunSimulator, STRETCH_CAMERAS, StartOptions, build_and_start,
};

use crate::fixtures::{Catalog, KITCHEN, ROBOT};

const MUG: &str = r#"<mujoco model="mug">
  <asset><mesh name="obj_1_visual" file="mug.obj"/></asset>
  <worldbody>
    <body name="obj_1_root"><body name="obj_1_main"><geom type="mesh" mesh="obj_1_visual"/></body></body>
  </worldbody>
</mujoco>"#;

#[test]
fn test_robot_posed_and_included() {
    let dir = tempfile::tempdir().unwrap();
    let robot_xml = dir.path().join("stretch.xml");
    fs::write(&robot_xml, ROBOT).unwrap();

    let pose = Pose::from_euler(Vector3::new(0.5, -0.2, 0.0), Vector3::new(0.0, 0.0, 1.2)).unwrap();
    let (posed_path, directive) =
        posed_robot_include(&robot_xml, "base_link", &pose, dir.path()).unwrap();
    assert_eq!(posed_path, dir.path().join("stretch_posed.xml"));
    assert!(directive.starts_with("<include file=\""));
    assert!(directive.contains("stretch_posed.xml"));

    let posed = SceneDocument::from_file(&posed_path).unwrap();
    let base = posed.find_body("base_link").unwrap();
    let placed = parse_pose_attributes(base.attribute("pos"), base.attribute("quat")).unwrap();
    assert_eq!(placed.position, pose.position);
    assert!(placed.orientation.angle_to(&pose.orientation) < 1e-12);

    // Original file untouched.
    assert_eq!(fs::read_to_string(&robot_xml).unwrap(), ROBOT);

    let object = extract_object(&SceneDocument::parse(MUG).unwrap()).unwrap();
    let kitchen = SceneDocument::parse(KITCHEN).unwrap();
    let scene = compose_object(
        &kitchen,
        &object,
        &Pose::from_position(Vector3::new(0.0, -0.65, 0.6)),
    )
    .unwrap();
    let text = insert_include_directive(&scene.to_xml_string().unwrap(), &directive, MUJOCO_MARKER)
        .unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].contains(MUJOCO_MARKER));
    assert_eq!(lines[1], directive);

    let composed = SceneDocument::parse(&text).unwrap();
    assert!(composed.root().child("include").is_some());

    let sim = DryRunSimulator::new().camera(STRETCH_CAMERAS[0]);
    let handle = build_and_start(sim, &composed, StartOptions::headless()).unwrap();
    assert!(handle.view().camera_frame("nav_camera_rgb").is_some());
    assert!(handle.view().camera_frame("overview").is_some());
    assert!(handle.view().body_pose("obj_1_main").is_some());
}

#[test]
fn test_missing_robot_base() {
    let dir = tempfile::tempdir().unwrap();
    let robot_xml = dir.path().join("stretch.xml");
    fs::write(&robot_xml, ROBOT).unwrap();

    let err = posed_robot_include(&robot_xml, "chassis", &Pose::identity(), dir.path()).unwrap_err();
    assert!(matches!(err, SceneError::BodyNotFound(ref name) if name == "chassis"));
    assert!(!dir.path().join("stretch_posed.xml").exists());
}

#[test]
fn test_missing_marker() {
    let err = insert_include_directive("<scene/>", "<include file=\"r.xml\"/>", MUJOCO_MARKER)
        .unwrap_err();
    assert!(matches!(err, SceneError::MalformedScene { .. }));
}

#[test]
fn test_include_on_single_line_scene() {
    let dir = tempfile::tempdir().unwrap();
    let robot_xml = dir.path().join("stretch.xml");
    fs::write(&robot_xml, ROBOT).unwrap();
    let (_, directive) =
        posed_robot_include(&robot_xml, "base_link", &Pose::identity(), dir.path()).unwrap();

    let text = insert_include_directive(
        r#"<mujoco model="k"><worldbody><geom size="1"/></worldbody></mujoco>"#,
        &directive,
        MUJOCO_MARKER,
    )
    .unwrap();
    let composed = SceneDocument::parse(&text).unwrap();
    assert_eq!(composed.root().elements().next().unwrap().name, "include");
    assert!(composed.root().child("worldbody").is_some());

    let err = insert_include_directive("<mujoco/>", &directive, MUJOCO_MARKER).unwrap_err();
    assert!(matches!(err, SceneError::MalformedScene { .. }));
}

#[test]
fn test_teleop_kitchen_carries_robot() {
    let catalog = Catalog::create();
    let robot_dir = tempfile::tempdir().unwrap();
    let robot_xml = robot_dir.path().join("stretch.xml");
    fs::write(&robot_xml, ROBOT).unwrap();

    let mut sampler = CatalogSampler::from_file(&catalog.manifest).unwrap().seed(5);
    let (descriptor, object_scene) = sampler
        .sample_object(&FilterCriteria::new().graspable(true))
        .unwrap();
    let object = extract_object(&object_scene).unwrap();
    let kitchen = compose_object(
        &SceneDocument::parse(KITCHEN).unwrap(),
        &object,
        &Pose::from_position(Vector3::new(0.0, -0.65, 0.9)),
    )
    .unwrap();

    let robot_pose = Pose::from_position(Vector3::new(0.0, 0.1, 0.0));
    let scene = include_robot(&kitchen, &robot_xml, "base_link", &robot_pose, robot_dir.path())
        .unwrap();

    let include = scene.root().child("include").unwrap();
    let posed_path = robot_dir.path().join("stretch_posed.xml");
    assert_eq!(include.attribute("file"), Some(posed_path.to_str().unwrap()));
    let posed = SceneDocument::from_file(&posed_path).unwrap();
    assert_eq!(posed.find_body("base_link").unwrap().attribute("pos"), Some("0 0.1 0"));
    assert_eq!(scene.count_bodies(&descriptor.main_body()), 1);

    // robot assets come from the include, the object's stay checked
    check_asset_references(&scene).unwrap();

    let sim = DryRunSimulator::new().camera(STRETCH_CAMERAS[0]);
    let log = sim.log();
    let mut handle = build_and_start(sim, &scene, StartOptions::headless()).unwrap();
    handle.submit(ActuatorCommand::HALT).unwrap();
    handle.stop();
    assert_eq!(log.compiles(), 1);
    assert_eq!(log.applied(), vec![ActuatorCommand::HALT]);
}
