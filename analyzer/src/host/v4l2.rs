use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::RgbaImage;
use log::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use crate::lock;
use crate::media::{CameraError, MediaDevices, MediaStream, StreamConstraints};

const DEFAULT_DEVICE: &str = "/dev/video0";
const BUFFER_COUNT: u32 = 4;
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens V4L2 devices in MJPEG mode.
pub struct V4l2Devices;

impl MediaDevices for V4l2Devices {
    fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn MediaStream>, CameraError> {
        let path = constraints
            .device
            .clone()
            .unwrap_or_else(|| DEFAULT_DEVICE.to_string());
        let device = Device::with_path(&path)?;

        if constraints.facing.is_some() {
            debug!("{path}: facing mode cannot be selected on V4L2, ignoring");
        }

        let current = Capture::format(&device)?;
        let requested = Format::new(
            constraints.width.unwrap_or(current.width),
            constraints.height.unwrap_or(current.height),
            FourCC::new(b"MJPG"),
        );
        let format = Capture::set_format(&device, &requested)?;
        if format.fourcc != FourCC::new(b"MJPG") {
            return Err(CameraError::Unavailable(format!(
                "{path} does not support MJPEG"
            )));
        }
        if constraints.width.is_some()
            && (format.width, format.height) != (requested.width, requested.height)
        {
            return Err(CameraError::Unavailable(format!(
                "{path} cannot capture {}x{} (offered {}x{})",
                requested.width, requested.height, format.width, format.height
            )));
        }

        info!("Opened {path} at {}x{}", format.width, format.height);
        Ok(Box::new(V4l2Stream::start(path, device)))
    }
}

#[derive(Default)]
struct FrameSlot {
    latest: Option<RgbaImage>,
    failure: Option<String>,
}

struct Shared {
    slot: Mutex<FrameSlot>,
    ready: Condvar,
    stop: AtomicBool,
}

/// Background capture thread keeping the most recent decoded frame.
pub struct V4l2Stream {
    id: String,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl V4l2Stream {
    fn start(id: String, device: Device) -> Self {
        let shared = Arc::new(Shared {
            slot: Mutex::new(FrameSlot::default()),
            ready: Condvar::new(),
            stop: AtomicBool::new(false),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            if let Err(err) = capture_loop(&device, &thread_shared) {
                error!("Capture thread error: {err}");
                lock(&thread_shared.slot).failure = Some(err.to_string());
                thread_shared.ready.notify_all();
            }
        });

        Self {
            id,
            shared,
            handle: Some(handle),
        }
    }
}

fn capture_loop(device: &Device, shared: &Shared) -> Result<(), CameraError> {
    let mut stream = MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)?;

    while !shared.stop.load(Ordering::Relaxed) {
        let (data, _metadata) = CaptureStream::next(&mut stream)?;
        let frame = match image::load_from_memory_with_format(data, image::ImageFormat::Jpeg) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(err) => {
                warn!("Dropping undecodable MJPEG frame: {err}");
                continue;
            }
        };
        lock(&shared.slot).latest = Some(frame);
        shared.ready.notify_all();
    }

    Ok(())
}

impl MediaStream for V4l2Stream {
    fn id(&self) -> &str {
        &self.id
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.handle.is_some())
    }

    fn stop_tracks(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("`{}` capture thread panicked during shutdown", self.id);
            }
        }
    }

    fn read_frame(&mut self) -> Result<RgbaImage, CameraError> {
        if self.handle.is_none() {
            return Err(CameraError::NotLive);
        }
        let slot = lock(&self.shared.slot);
        let (slot, _timeout) = self
            .shared
            .ready
            .wait_timeout_while(slot, FIRST_FRAME_TIMEOUT, |s| {
                s.latest.is_none() && s.failure.is_none()
            })
            .unwrap_or_else(|e| e.into_inner());

        if let Some(frame) = &slot.latest {
            return Ok(frame.clone());
        }
        Err(CameraError::Stream(slot.failure.clone().unwrap_or_else(|| {
            format!("no frame from {} within {FIRST_FRAME_TIMEOUT:?}", self.id)
        })))
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
