use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response, multipart};
use serde::Deserialize;
use url::Url;

use crate::emotion::{AnalysisResult, Emotion};
use crate::payload::ImageFile;

/// Errors that can occur while talking to the prediction API.
#[derive(Debug)]
pub enum ApiError {
    Http(reqwest::Error),
    UnexpectedStatus { status: StatusCode, body: String },
    Decode { reason: String, body: String },
    InvalidResponse(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http(err) => write!(f, "http error: {err}"),
            ApiError::UnexpectedStatus { status, body } => {
                write!(f, "API error {}: {body}", status.as_u16())
            }
            ApiError::Decode { reason, body } => {
                write!(f, "could not decode API response ({reason}): {body}")
            }
            ApiError::InvalidResponse(reason) => write!(f, "invalid API response: {reason}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        ApiError::Http(value)
    }
}

/// Body of a successful `/api/predict` call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictResponse {
    pub emotion: Emotion,
    pub confidence: f64,
    #[serde(default)]
    pub audio: Option<String>,
}

impl PredictResponse {
    pub fn result(&self) -> AnalysisResult {
        AnalysisResult {
            emotion: self.emotion,
            confidence: self.confidence,
        }
    }
}

/// Body of `/api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_path: Option<String>,
}

/// Blocking client for the prediction endpoints.
#[derive(Debug, Clone)]
pub struct PredictClient {
    base_url: String,
    http: Client,
}

impl PredictClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Uploads one image as the multipart field `image` to `/api/predict`.
    pub fn predict(&self, file: ImageFile) -> Result<PredictResponse, ApiError> {
        let url = format!("{}/api/predict", self.base_url);
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime)?;
        let form = multipart::Form::new().part("image", part);

        let response = self.http.post(url).multipart(form).send()?;
        let body = Self::success_body(response)?;

        let parsed: PredictResponse =
            serde_json::from_str(&body).map_err(|err| ApiError::Decode {
                reason: err.to_string(),
                body: body.clone(),
            })?;

        if !parsed.confidence.is_finite() || !(0.0..=1.0).contains(&parsed.confidence) {
            return Err(ApiError::InvalidResponse(format!(
                "confidence {} is outside [0, 1]",
                parsed.confidence
            )));
        }

        Ok(parsed)
    }

    /// Queries `/api/health`, which also forces the service to load its model.
    pub fn health(&self) -> Result<HealthStatus, ApiError> {
        let url = format!("{}/api/health", self.base_url);
        let response = self.http.get(url).send()?;
        let body = Self::success_body(response)?;

        serde_json::from_str(&body).map_err(|err| ApiError::Decode {
            reason: err.to_string(),
            body,
        })
    }

    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute audio URLs are used as-is; anything else is appended to the
    /// base URL.
    pub fn resolve_audio_url(&self, audio: &str) -> Result<Url, url::ParseError> {
        resolve_audio_url(&self.base_url, audio)
    }

    fn success_body(response: Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::UnexpectedStatus { status, body })
        }
    }
}

pub fn resolve_audio_url(base_url: &str, audio: &str) -> Result<Url, url::ParseError> {
    if audio.starts_with("http") {
        Url::parse(audio)
    } else {
        Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), audio))
    }
}
