//! Seams between the controller and its hosting environment.
//!
//! The controller never talks to hardware or a UI toolkit directly. A host
//! provides camera streams, the camera region with its video surface, audio
//! playback and a place to show notifications.

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug)]
pub enum CameraError {
    /// The video surface was not mounted before the timeout.
    SurfaceUnavailable(Duration),
    /// Permission denied or no usable device.
    Unavailable(String),
    /// A session is already requesting or live.
    AlreadyActive,
    /// The operation needs a live session.
    NotLive,
    /// The camera was stopped while the stream was being acquired.
    Cancelled,
    Stream(String),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::SurfaceUnavailable(timeout) => write!(
                f,
                "video surface not available after {}ms",
                timeout.as_millis()
            ),
            CameraError::Unavailable(reason) => write!(f, "could not open camera: {reason}"),
            CameraError::AlreadyActive => write!(f, "camera is already active"),
            CameraError::NotLive => write!(f, "camera is not live"),
            CameraError::Cancelled => write!(f, "camera was closed while starting"),
            CameraError::Stream(reason) => write!(f, "camera stream error: {reason}"),
        }
    }
}

impl std::error::Error for CameraError {}

impl From<std::io::Error> for CameraError {
    fn from(value: std::io::Error) -> Self {
        CameraError::Unavailable(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

/// What a stream request asks of the device. `None` fields mean "any".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamConstraints {
    pub facing: Option<FacingMode>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub device: Option<String>,
}

impl StreamConstraints {
    pub fn preferred(facing: FacingMode, width: u32, height: u32, device: Option<String>) -> Self {
        Self {
            facing: Some(facing),
            width: Some(width),
            height: Some(height),
            device,
        }
    }

    /// Any camera, no resolution preference.
    pub fn minimal(device: Option<String>) -> Self {
        Self {
            device,
            ..Self::default()
        }
    }

    pub fn is_minimal(&self) -> bool {
        self.facing.is_none() && self.width.is_none() && self.height.is_none()
    }
}

/// Source of camera streams.
pub trait MediaDevices: Send + Sync {
    fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn MediaStream>, CameraError>;
}

/// A live camera stream. Dropping it without `stop_tracks` leaks hardware
/// access on some hosts, so the controller always stops it explicitly.
pub trait MediaStream: Send {
    fn id(&self) -> &str;

    fn active_tracks(&self) -> usize;

    fn stop_tracks(&mut self);

    /// Current frame as RGBA pixels.
    fn read_frame(&mut self) -> Result<RgbaImage, CameraError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackError(pub String);

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "playback interrupted: {}", self.0)
    }
}

impl std::error::Error for PlaybackError {}

/// The element a live stream is shown on.
pub trait VideoSurface: Send {
    fn attach(&mut self, stream_id: &str);

    fn set_muted(&mut self, muted: bool);

    fn play(&mut self) -> Result<(), PlaybackError>;

    /// Starts playback once the stream metadata has loaded. Failures are the
    /// surface's to swallow.
    fn play_when_ready(&mut self);

    /// Pauses, clears the source and resets the element.
    fn detach(&mut self);

    fn is_attached(&self) -> bool;
}

/// Handed to the host when the camera region is revealed. The host resolves
/// it once the video surface exists.
pub struct SurfaceMount {
    tx: SyncSender<Box<dyn VideoSurface>>,
}

impl SurfaceMount {
    pub fn resolve(self, surface: Box<dyn VideoSurface>) {
        // The controller may already have given up waiting.
        let _ = self.tx.send(surface);
    }
}

/// Controller side of a [`SurfaceMount`].
pub struct SurfaceReady {
    rx: Receiver<Box<dyn VideoSurface>>,
}

impl SurfaceReady {
    pub fn wait(self, timeout: Duration) -> Result<Box<dyn VideoSurface>, CameraError> {
        match self.rx.recv_timeout(timeout) {
            Ok(surface) => Ok(surface),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                Err(CameraError::SurfaceUnavailable(timeout))
            }
        }
    }
}

pub fn surface_channel() -> (SurfaceMount, SurfaceReady) {
    let (tx, rx) = mpsc::sync_channel(1);
    (SurfaceMount { tx }, SurfaceReady { rx })
}

/// The camera region of the UI.
pub trait CameraView: Send + Sync {
    /// Reveals the region. The surface is delivered through `mount`.
    fn show(&self, mount: SurfaceMount);

    fn hide(&self);
}

pub trait AudioPlayer: Send + Sync {
    fn play(&self, url: &Url) -> Result<(), PlaybackError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationVariant {
    Info,
    Destructive,
}

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Info,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Destructive,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
