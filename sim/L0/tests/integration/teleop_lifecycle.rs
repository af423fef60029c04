//! Teleop sessions against a running dry-run simulator.

use std::thread;
use std::time::{Duration, Instant};

use sim_scene::SceneDocument;
use sim_teleop::{
    ActuatorCommand, Axis, Button, CameraFeed, DeviceError, DeviceSlot, DryRunSimulator,
    GamepadEvent, GripperCommand, Joint, LatestFrames, STRETCH_CAMERAS, ScriptEnd,
    ScriptedGamepad, SessionState, SimulatorHandle, StartOptions, TeleopConfig, TeleopError,
    TeleopSession, build_and_start,
};

use crate::fixtures::KITCHEN;

fn start(sim: DryRunSimulator) -> SimulatorHandle {
    let scene = SceneDocument::parse(KITCHEN).unwrap();
    build_and_start(sim, &scene, StartOptions::headless().step_interval(Duration::from_millis(1)))
        .unwrap()
}

fn fast_config() -> TeleopConfig {
    TeleopConfig::default()
        .poll_timeout(Duration::from_millis(1))
        .backoff(Duration::from_millis(1), Duration::from_millis(4))
}

#[test]
fn test_fatal_device_error_then_reacquire() {
    let sim = DryRunSimulator::new();
    let log = sim.log();
    let mut handle = start(sim);
    let slot = DeviceSlot::new();

    let pad = ScriptedGamepad::new([
        Ok(Some(GamepadEvent::AxisChanged(Axis::LeftStickY, 1.0))),
        Err(DeviceError::Fatal("usb disconnect".into())),
    ])
    .acquire(&slot)
    .unwrap();
    assert!(slot.is_held());

    let mut session = TeleopSession::new(fast_config()).unwrap();
    session.start(&handle, pad).unwrap();
    let err = session.activate().unwrap_err();
    assert!(matches!(err, TeleopError::Device(DeviceError::Fatal(ref m)) if m == "usb disconnect"));
    assert_eq!(session.state(), SessionState::Stopped);
    session.stop().unwrap();
    assert!(!slot.is_held());

    // Same controller, new session, same simulator.
    let pad = ScriptedGamepad::from_events([GamepadEvent::ButtonPressed(Button::South)])
        .acquire(&slot)
        .unwrap();
    let mut again = TeleopSession::new(fast_config()).unwrap();
    again.start(&handle, pad).unwrap();
    again.stop().unwrap();
    assert!(!slot.is_held());

    handle.stop();
    let applied = log.applied();
    assert_eq!(
        applied.first(),
        Some(&ActuatorCommand::Drive {
            linear: 0.3,
            angular: 0.0
        })
    );
    assert!(applied.contains(&ActuatorCommand::HALT));
}

#[test]
fn test_start_button_drives_then_halts() {
    let sim = DryRunSimulator::new();
    let log = sim.log();
    let mut handle = start(sim);

    let pad = ScriptedGamepad::from_events([
        GamepadEvent::AxisChanged(Axis::RightStickY, 1.0),
        GamepadEvent::ButtonPressed(Button::DPadLeft),
        GamepadEvent::ButtonPressed(Button::South),
        GamepadEvent::ButtonPressed(Button::Start),
        GamepadEvent::ButtonPressed(Button::East),
    ]);
    let mut session = TeleopSession::new(fast_config()).unwrap();
    session.start(&handle, pad).unwrap();
    session.activate().unwrap();
    handle.stop();

    let applied = log.applied();
    assert_eq!(
        &applied[..3],
        &[
            ActuatorCommand::JointVelocity {
                joint: Joint::Lift,
                velocity: 0.1
            },
            ActuatorCommand::JointVelocity {
                joint: Joint::WristYaw,
                velocity: 1.0
            },
            ActuatorCommand::Gripper(GripperCommand::Close),
        ]
    );
    assert!(!applied.contains(&ActuatorCommand::Gripper(GripperCommand::Open)));
    assert_eq!(applied[3], ActuatorCommand::HALT);
    assert_eq!(applied.len(), 9);
}

#[test]
fn test_transient_errors_do_not_end_session() {
    let sim = DryRunSimulator::new();
    let log = sim.log();
    let mut handle = start(sim);

    let pad = ScriptedGamepad::new([
        Err(DeviceError::Transient("resync".into())),
        Err(DeviceError::Transient("resync".into())),
        Err(DeviceError::Transient("resync".into())),
        Ok(Some(GamepadEvent::ButtonPressed(Button::LeftShoulder))),
        Ok(Some(GamepadEvent::ButtonPressed(Button::Start))),
    ]);
    let mut session = TeleopSession::new(fast_config()).unwrap();
    session.start(&handle, pad).unwrap();
    session.activate().unwrap();
    handle.stop();

    assert_eq!(
        log.applied().first(),
        Some(&ActuatorCommand::JointVelocity {
            joint: Joint::HeadPan,
            velocity: 1.0
        })
    );
}

#[test]
fn test_simulator_stop_ends_session() {
    let mut handle = start(DryRunSimulator::new());
    let slot = DeviceSlot::new();
    let pad = ScriptedGamepad::new([])
        .then(ScriptEnd::Idle)
        .acquire(&slot)
        .unwrap();
    let mut session = TeleopSession::new(fast_config()).unwrap();
    session.start(&handle, pad).unwrap();

    handle.stop();
    assert!(matches!(session.activate(), Err(TeleopError::SimulatorStopped)));
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(!slot.is_held());
}

#[test]
fn test_camera_feed_alongside_teleop() {
    let sim = DryRunSimulator::new()
        .camera("nav_camera_rgb")
        .camera("d405_rgb")
        .frame_size(8, 6);
    let mut handle = start(sim);

    let latest = LatestFrames::new();
    let mut feed = CameraFeed::spawn(
        handle.view(),
        STRETCH_CAMERAS.iter().map(|c| c.to_string()).collect(),
        Duration::from_millis(1),
        latest.clone(),
    )
    .unwrap();

    let pad = ScriptedGamepad::from_events([GamepadEvent::AxisChanged(Axis::LeftStickX, 0.5)]);
    let mut session = TeleopSession::new(fast_config()).unwrap();
    session.start(&handle, pad).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while latest.cameras().len() < 2 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(1));
    }
    session.stop().unwrap();
    assert!(feed.stop() >= 2);
    handle.stop();

    let frame = latest.get("d405_rgb").unwrap();
    assert_eq!((frame.width, frame.height), (8, 6));
    assert_eq!(frame.rgb.len(), 8 * 6 * 3);
    assert!(latest.get("d435i_camera_rgb").is_none());
}
