//! Camera feed: polls camera frames from a running simulator.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{Result, TeleopError};
use crate::launcher::SimulatorView;
use crate::simulator::CameraFrame;

/// Cameras on the Stretch model.
pub const STRETCH_CAMERAS: [&str; 3] = ["nav_camera_rgb", "d405_rgb", "d435i_camera_rgb"];

/// Consumer of camera frames, called on the feed thread.
pub trait FrameSink: Send {
    /// Handle one frame.
    fn show(&mut self, frame: &CameraFrame);
}

impl<F: FnMut(&CameraFrame) + Send> FrameSink for F {
    fn show(&mut self, frame: &CameraFrame) {
        self(frame);
    }
}

/// Keeps the most recent frame of each camera.
#[derive(Debug, Clone, Default)]
pub struct LatestFrames {
    frames: Arc<Mutex<HashMap<String, CameraFrame>>>,
}

impl LatestFrames {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest frame of `camera`.
    pub fn get(&self, camera: &str) -> Option<CameraFrame> {
        self.frames.lock().get(camera).cloned()
    }

    /// Cameras seen so far.
    pub fn cameras(&self) -> Vec<String> {
        let mut names: Vec<String> = self.frames.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl FrameSink for LatestFrames {
    fn show(&mut self, frame: &CameraFrame) {
        self.frames
            .lock()
            .insert(frame.camera.clone(), frame.clone());
    }
}

/// Logs a one-line summary per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameLogger;

impl FrameSink for FrameLogger {
    fn show(&mut self, frame: &CameraFrame) {
        let mean = if frame.rgb.is_empty() {
            0.0
        } else {
            frame.rgb.iter().map(|&b| f64::from(b)).sum::<f64>() / frame.rgb.len() as f64
        };
        debug!(
            camera = %frame.camera,
            width = frame.width,
            height = frame.height,
            time = frame.time,
            mean,
            "frame"
        );
    }
}

/// Background thread polling camera frames at a fixed interval.
///
/// Stops when asked, when the simulator stops, or on drop.
#[derive(Debug)]
pub struct CameraFeed {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<u64>>,
}

impl CameraFeed {
    /// Start polling `cameras` every `interval` and hand frames to `sink`.
    ///
    /// Cameras the simulator does not know are skipped silently.
    pub fn spawn<S>(
        view: SimulatorView,
        cameras: Vec<String>,
        interval: Duration,
        mut sink: S,
    ) -> Result<Self>
    where
        S: FrameSink + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let worker = thread::Builder::new()
            .name("camera-feed".into())
            .spawn(move || {
                let mut shown = 0u64;
                while flag.load(Ordering::Acquire) && view.is_running() {
                    let tick = Instant::now();
                    for camera in &cameras {
                        if let Some(frame) = view.camera_frame(camera) {
                            sink.show(&frame);
                            shown += 1;
                        }
                    }
                    if let Some(rest) = interval.checked_sub(tick.elapsed()) {
                        thread::sleep(rest);
                    }
                }
                shown
            })
            .map_err(|source| TeleopError::Spawn {
                name: "camera-feed",
                source,
            })?;

        info!(interval = ?interval, "camera feed started");
        Ok(Self {
            running,
            worker: Some(worker),
        })
    }

    /// Whether the feed thread is still polling.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop and join. Returns the number of frames delivered.
    pub fn stop(&mut self) -> u64 {
        self.running.store(false, Ordering::Release);
        let Some(worker) = self.worker.take() else {
            return 0;
        };
        match worker.join() {
            Ok(shown) => {
                info!(frames = shown, "camera feed stopped");
                shown
            }
            Err(_) => {
                error!("camera feed thread panicked");
                0
            }
        }
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
