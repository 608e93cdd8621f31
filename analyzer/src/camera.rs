use std::fmt;

use image::RgbaImage;
use log::{info, warn};

use crate::config::CameraPreferences;
use crate::media::{CameraError, MediaDevices, MediaStream, StreamConstraints, VideoSurface};

/// Externally visible camera lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    Off,
    Requesting,
    Live,
}

pub(crate) enum CameraState {
    Off,
    /// Carries the attempt number so a stale acquisition can tell it lost.
    Requesting(u64),
    Live(CameraSession),
}

impl CameraState {
    pub(crate) fn status(&self) -> CameraStatus {
        match self {
            CameraState::Off => CameraStatus::Off,
            CameraState::Requesting(_) => CameraStatus::Requesting,
            CameraState::Live(_) => CameraStatus::Live,
        }
    }
}

/// A stream bound to its video surface. Released exactly once, either by
/// [`CameraSession::teardown`] or on drop.
pub struct CameraSession {
    stream: Box<dyn MediaStream>,
    surface: Box<dyn VideoSurface>,
    running: bool,
}

impl fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraSession")
            .field("stream", &self.stream.id())
            .field("active_tracks", &self.stream.active_tracks())
            .field("surface_attached", &self.surface.is_attached())
            .field("running", &self.running)
            .finish()
    }
}

impl CameraSession {
    /// Attaches the stream, mutes it and starts playback. An interrupted
    /// `play` is retried by the surface once metadata has loaded.
    pub fn attach(stream: Box<dyn MediaStream>, mut surface: Box<dyn VideoSurface>) -> Self {
        surface.attach(stream.id());
        surface.set_muted(true);
        if let Err(err) = surface.play() {
            warn!("{err}; retrying once metadata is loaded");
            surface.play_when_ready();
        }

        Self {
            stream,
            surface,
            running: true,
        }
    }

    pub fn stream_id(&self) -> &str {
        self.stream.id()
    }

    pub fn grab_frame(&mut self) -> Result<RgbaImage, CameraError> {
        if !self.running {
            return Err(CameraError::NotLive);
        }
        self.stream.read_frame()
    }

    pub fn teardown(&mut self) {
        if !self.running {
            return;
        }
        self.stream.stop_tracks();
        self.surface.detach();
        self.running = false;
        info!("Camera stream {} released", self.stream.id());
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Opens a stream with the preferred constraints, falling back once to any camera.
pub fn acquire_stream(
    devices: &dyn MediaDevices,
    prefs: &CameraPreferences,
) -> Result<Box<dyn MediaStream>, CameraError> {
    let preferred = prefs.preferred_constraints();
    match devices.open(&preferred) {
        Ok(stream) => Ok(stream),
        Err(first) => {
            warn!("Preferred camera constraints failed ({first}), retrying with any camera");
            devices
                .open(&StreamConstraints::minimal(prefs.device.clone()))
                .map_err(|second| {
                    CameraError::Unavailable(format!(
                        "{second} (preferred constraints: {first})"
                    ))
                })
        }
    }
}
