use std::fmt;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::media::CameraError;
use crate::payload::ImageError;

#[derive(Debug)]
pub enum AnalyzerError {
    Camera(CameraError),
    Image(ImageError),
    Api(ApiError),
    Config(ConfigError),
    /// Analyze was called without a selected image.
    NoImage,
    /// An analysis is already in flight.
    Busy,
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerError::Camera(err) => write!(f, "{err}"),
            AnalyzerError::Image(err) => write!(f, "{err}"),
            AnalyzerError::Api(err) => write!(f, "{err}"),
            AnalyzerError::Config(err) => write!(f, "{err}"),
            AnalyzerError::NoImage => write!(f, "no image selected"),
            AnalyzerError::Busy => write!(f, "an analysis is already running"),
        }
    }
}

impl std::error::Error for AnalyzerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalyzerError::Camera(err) => Some(err),
            AnalyzerError::Image(err) => Some(err),
            AnalyzerError::Api(err) => Some(err),
            AnalyzerError::Config(err) => Some(err),
            AnalyzerError::NoImage | AnalyzerError::Busy => None,
        }
    }
}

impl From<CameraError> for AnalyzerError {
    fn from(value: CameraError) -> Self {
        AnalyzerError::Camera(value)
    }
}

impl From<ImageError> for AnalyzerError {
    fn from(value: ImageError) -> Self {
        AnalyzerError::Image(value)
    }
}

impl From<ApiError> for AnalyzerError {
    fn from(value: ApiError) -> Self {
        AnalyzerError::Api(value)
    }
}

impl From<ConfigError> for AnalyzerError {
    fn from(value: ConfigError) -> Self {
        AnalyzerError::Config(value)
    }
}
