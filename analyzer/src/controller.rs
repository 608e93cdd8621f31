use std::mem;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

use crate::api::{PredictClient, PredictResponse};
use crate::camera::{CameraSession, CameraState, CameraStatus, acquire_stream};
use crate::config::AnalyzerConfig;
use crate::emotion::AnalysisResult;
use crate::error::AnalyzerError;
use crate::lock;
use crate::media::{
    AudioPlayer, CameraError, CameraView, MediaDevices, Notification, Notifier, surface_channel,
};
use crate::payload::{
    Blob, ImageError, ImageFormat, ImagePayload, ImageSource, ObjectUrlStore, SelectedImage,
    encode_capture, read_upload,
};

/// Host services the controller is wired to.
#[derive(Clone)]
pub struct Platform {
    pub devices: Arc<dyn MediaDevices>,
    pub view: Arc<dyn CameraView>,
    pub audio: Arc<dyn AudioPlayer>,
    pub notifier: Arc<dyn Notifier>,
}

impl Platform {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        view: Arc<dyn CameraView>,
        audio: Arc<dyn AudioPlayer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            devices,
            view,
            audio,
            notifier,
        }
    }
}

#[derive(Default)]
struct Selection {
    image: Option<SelectedImage>,
    result: Option<AnalysisResult>,
    /// Bumped on every new image so late results can be recognized.
    generation: u64,
}

/// The capture-and-analyze controller.
///
/// Camera: `Off → Requesting → Live → Off`. Analysis: `idle → analyzing →
/// idle`, with at most one request in flight. Dropping the controller
/// releases the camera and every object URL it created.
pub struct Analyzer {
    config: AnalyzerConfig,
    client: PredictClient,
    platform: Platform,
    camera: Mutex<CameraState>,
    camera_attempts: AtomicU64,
    selection: Mutex<Selection>,
    analyzing: AtomicBool,
    blobs: ObjectUrlStore,
}

/// Clears the in-flight flag on every exit path of `analyze`.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig, platform: Platform) -> Result<Self, AnalyzerError> {
        let base = config.resolve_api_base()?;
        let client = PredictClient::new(base, config.request_timeout())?;
        info!("Analyzer targeting {}", client.base_url());

        Ok(Self {
            config,
            client,
            platform,
            camera: Mutex::new(CameraState::Off),
            camera_attempts: AtomicU64::new(0),
            selection: Mutex::new(Selection::default()),
            analyzing: AtomicBool::new(false),
            blobs: ObjectUrlStore::new(),
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn client(&self) -> &PredictClient {
        &self.client
    }

    pub fn camera_status(&self) -> CameraStatus {
        lock(&self.camera).status()
    }

    pub fn selected_image(&self) -> Option<SelectedImage> {
        lock(&self.selection).image.clone()
    }

    pub fn result(&self) -> Option<AnalysisResult> {
        lock(&self.selection).result
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::Acquire)
    }

    /// Whether the analyze action should be enabled.
    pub fn can_analyze(&self) -> bool {
        !self.is_analyzing()
            && lock(&self.selection)
                .image
                .as_ref()
                .is_some_and(|i| !i.is_empty())
    }

    /// Number of object URLs still resolvable.
    pub fn live_object_urls(&self) -> usize {
        self.blobs.live_count()
    }

    /// Reveals the camera region, waits for its video surface, then opens a
    /// stream (preferred constraints first, any camera second).
    pub fn start_camera(&self) -> Result<(), AnalyzerError> {
        let attempt = self.camera_attempts.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut camera = lock(&self.camera);
            if !matches!(*camera, CameraState::Off) {
                warn!("Camera already {:?}", camera.status());
                return Err(CameraError::AlreadyActive.into());
            }
            *camera = CameraState::Requesting(attempt);
        }
        info!("Requesting camera (attempt {attempt})");

        let (mount, ready) = surface_channel();
        self.platform.view.show(mount);

        let acquired = ready
            .wait(self.config.surface_timeout())
            .and_then(|surface| {
                let stream = acquire_stream(&*self.platform.devices, &self.config.camera)?;
                Ok((stream, surface))
            });

        let mut camera = lock(&self.camera);
        if !matches!(*camera, CameraState::Requesting(id) if id == attempt) {
            drop(camera);
            // The surface may already belong to a newer attempt; only the
            // stream opened here is released.
            match acquired {
                Ok((mut stream, _surface)) => stream.stop_tracks(),
                Err(err) => debug!("Superseded camera attempt {attempt} failed: {err}"),
            }
            info!("Camera attempt {attempt} cancelled");
            return self.report("Camera", Err(CameraError::Cancelled.into()));
        }

        match acquired {
            Ok((stream, surface)) => {
                let session = CameraSession::attach(stream, surface);
                info!("Camera live on stream {}", session.stream_id());
                *camera = CameraState::Live(session);
                Ok(())
            }
            Err(err) => {
                *camera = CameraState::Off;
                drop(camera);
                self.platform.view.hide();
                self.report("Camera", Err(err.into()))
            }
        }
    }

    /// Stops all tracks, detaches the surface and hides the camera region.
    /// Safe to call in any state.
    pub fn stop_camera(&self) {
        let previous = mem::replace(&mut *lock(&self.camera), CameraState::Off);
        if let CameraState::Live(mut session) = previous {
            session.teardown();
        }
        self.platform.view.hide();
    }

    /// Captures the current frame as a 224×224 JPEG and selects it.
    pub fn capture_photo(&self) -> Result<(), AnalyzerError> {
        let frame = match &mut *lock(&self.camera) {
            CameraState::Live(session) => session.grab_frame(),
            _ => Err(CameraError::NotLive),
        };

        let captured = frame
            .map_err(AnalyzerError::from)
            .and_then(|frame| encode_capture(&frame).map_err(AnalyzerError::from));
        let image = self.report("Capture", captured)?;

        self.replace_selection(image);
        self.platform.notifier.notify(Notification::info(
            "Photo captured",
            "The preview now shows the camera image.",
        ));
        Ok(())
    }

    /// Reads a user-chosen file and selects it.
    pub fn upload_file(&self, path: &Path) -> Result<(), AnalyzerError> {
        let image = self.report("Upload", read_upload(path).map_err(AnalyzerError::from))?;
        info!("Selected upload {}", path.display());
        self.replace_selection(image);
        Ok(())
    }

    /// Selects raw image bytes held behind a transient object URL, e.g. from
    /// a paste or drop. Returns the URL.
    pub fn select_bytes(&self, bytes: Vec<u8>) -> Result<String, AnalyzerError> {
        let format = self.report(
            "Upload",
            ImageFormat::sniff(&bytes)
                .ok_or_else(|| ImageError::NotAnImage("pasted data".into()).into()),
        )?;
        let url = self.blobs.create(Blob {
            bytes,
            mime: format.mime_type().to_string(),
        });
        self.replace_selection(SelectedImage {
            payload: ImagePayload::ObjectUrl(url.clone()),
            source: ImageSource::Object,
        });
        Ok(url)
    }

    /// Sends the selected image to the prediction endpoint. Rejected without
    /// a request while another analysis is in flight.
    pub fn analyze(&self) -> Result<AnalysisResult, AnalyzerError> {
        let (image, generation) = {
            let mut selection = lock(&self.selection);
            let Some(image) = selection.image.clone().filter(|i| !i.is_empty()) else {
                return Err(AnalyzerError::NoImage);
            };
            if self
                .analyzing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                debug!("Analyze ignored, request already in flight");
                return Err(AnalyzerError::Busy);
            }
            selection.result = None;
            (image, selection.generation)
        };
        let _in_flight = InFlight(&self.analyzing);

        let response = self.report("Analysis failed", self.request_prediction(&image))?;
        let result = response.result();

        let current = {
            let mut selection = lock(&self.selection);
            let current = selection.generation == generation;
            if current {
                selection.result = Some(result);
            }
            current
        };
        if !current {
            info!("Discarding {} result for a replaced image", result.emotion);
            return Ok(result);
        }

        info!(
            "Detected {} ({})",
            result.emotion,
            result.display().confidence
        );
        self.play_audio_cue(&response);
        self.platform.notifier.notify(Notification::info(
            "Emotion analysis complete",
            format!("Detected emotion: {}", result.emotion),
        ));
        Ok(result)
    }

    fn request_prediction(&self, image: &SelectedImage) -> Result<PredictResponse, AnalyzerError> {
        let file = image.to_file(&self.blobs)?;
        debug!("Uploading {} ({} bytes)", file.file_name, file.bytes.len());
        Ok(self.client.predict(file)?)
    }

    /// Best effort: failures are logged and otherwise ignored.
    fn play_audio_cue(&self, response: &PredictResponse) {
        if !self.config.autoplay_audio {
            return;
        }
        let Some(audio) = response.audio.as_deref() else {
            return;
        };
        match self.client.resolve_audio_url(audio) {
            Ok(url) => {
                if let Err(err) = self.platform.audio.play(&url) {
                    debug!("Ignoring audio playback failure for {url}: {err}");
                }
            }
            Err(err) => debug!("Ignoring unusable audio reference `{audio}`: {err}"),
        }
    }

    fn replace_selection(&self, image: SelectedImage) {
        let previous = {
            let mut selection = lock(&self.selection);
            selection.generation += 1;
            selection.result = None;
            selection.image.replace(image)
        };
        if let Some(SelectedImage {
            payload: ImagePayload::ObjectUrl(url),
            ..
        }) = previous
        {
            self.blobs.revoke(&url);
        }
    }

    /// Surfaces user-facing errors as a destructive notification.
    fn report<T>(&self, title: &str, outcome: Result<T, AnalyzerError>) -> Result<T, AnalyzerError> {
        if let Err(err) = &outcome {
            if is_user_facing(err) {
                error!("{title}: {err}");
                self.platform
                    .notifier
                    .notify(Notification::error(title, err.to_string()));
            } else {
                debug!("{title}: {err}");
            }
        }
        outcome
    }
}

impl Drop for Analyzer {
    fn drop(&mut self) {
        self.stop_camera();
        self.blobs.revoke_all();
    }
}

fn is_user_facing(err: &AnalyzerError) -> bool {
    !matches!(
        err,
        AnalyzerError::NoImage
            | AnalyzerError::Busy
            | AnalyzerError::Camera(
                CameraError::AlreadyActive | CameraError::NotLive | CameraError::Cancelled
            )
    )
}
