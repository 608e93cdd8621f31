//! Native host services used by the command line front end.

use std::sync::Arc;

use log::{error, info};

use crate::config::AnalyzerConfig;
use crate::controller::Platform;
use crate::media::{
    CameraError, CameraView, MediaDevices, MediaStream, Notification, NotificationVariant,
    Notifier, PlaybackError, StreamConstraints, SurfaceMount, VideoSurface,
};

mod audio;
#[cfg(feature = "v4l2")]
mod v4l2;

pub use audio::CommandAudioPlayer;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Devices;

/// Builds the platform for a terminal session.
pub fn native_platform(config: &AnalyzerConfig) -> Platform {
    Platform::new(
        default_devices(),
        Arc::new(HeadlessView),
        Arc::new(CommandAudioPlayer::new(config.audio_player.clone())),
        Arc::new(LogNotifier),
    )
}

#[cfg(feature = "v4l2")]
pub fn default_devices() -> Arc<dyn MediaDevices> {
    Arc::new(V4l2Devices)
}

#[cfg(not(feature = "v4l2"))]
pub fn default_devices() -> Arc<dyn MediaDevices> {
    Arc::new(NoCamera)
}

/// Used when the binary is built without a camera backend.
pub struct NoCamera;

impl MediaDevices for NoCamera {
    fn open(&self, _constraints: &StreamConstraints) -> Result<Box<dyn MediaStream>, CameraError> {
        Err(CameraError::Unavailable(
            "built without a camera backend (enable the `v4l2` feature)".into(),
        ))
    }
}

/// A camera region with nothing to draw on: the surface exists as soon as
/// the region is shown.
pub struct HeadlessView;

impl CameraView for HeadlessView {
    fn show(&self, mount: SurfaceMount) {
        mount.resolve(Box::new(HeadlessSurface::default()));
    }

    fn hide(&self) {
        info!("Camera view hidden");
    }
}

#[derive(Debug, Default)]
pub struct HeadlessSurface {
    stream_id: Option<String>,
    muted: bool,
    playing: bool,
}

impl VideoSurface for HeadlessSurface {
    fn attach(&mut self, stream_id: &str) {
        self.stream_id = Some(stream_id.to_string());
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.stream_id.is_none() {
            return Err(PlaybackError("no stream attached".into()));
        }
        self.playing = true;
        Ok(())
    }

    fn play_when_ready(&mut self) {
        self.playing = self.stream_id.is_some();
    }

    fn detach(&mut self) {
        self.playing = false;
        self.stream_id = None;
    }

    fn is_attached(&self) -> bool {
        self.stream_id.is_some()
    }
}

/// Notifications go to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            NotificationVariant::Info => info!(
                "[notification] {}: {}",
                notification.title, notification.description
            ),
            NotificationVariant::Destructive => error!(
                "[notification] {}: {}",
                notification.title, notification.description
            ),
        }
    }
}
