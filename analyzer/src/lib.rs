//! Capture-and-analyze client for an emotion recognition service.
//!
//! [`Analyzer`] owns an optional live camera session, the selected image and
//! one analysis request at a time against the remote `/api/predict` endpoint.
//! Everything environment specific goes through the traits in [`media`].

pub mod api;
pub mod camera;
pub mod config;
pub mod controller;
pub mod emotion;
pub mod error;
pub mod host;
pub mod logging;
pub mod media;
pub mod payload;

use std::sync::{Mutex, MutexGuard};

pub use api::{ApiError, HealthStatus, PredictClient, PredictResponse};
pub use camera::CameraStatus;
pub use config::{AnalyzerConfig, CameraPreferences, ConfigError};
pub use controller::{Analyzer, Platform};
pub use emotion::{AnalysisResult, Emotion, ResultDisplay, format_confidence};
pub use error::AnalyzerError;
pub use media::{CameraError, Notification, NotificationVariant};
pub use payload::{ImageError, ImagePayload, SelectedImage};

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
