use std::env;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::media::{FacingMode, StreamConstraints};

pub const API_BASE_ENV: &str = "EMOTION_API_BASE";
pub const DEFAULT_API_BASE: &str = "http://localhost:7860";
const CONFIG_FILE_NAME: &str = "emotion-analyzer.json";
const DEFAULT_SURFACE_TIMEOUT_MS: u64 = 2000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse { path: PathBuf, reason: String },
    InvalidApiBase(String),
    NoHome,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "config io error: {err}"),
            ConfigError::Parse { path, reason } => {
                write!(f, "failed to parse config {}: {reason}", path.display())
            }
            ConfigError::InvalidApiBase(reason) => write!(f, "invalid API base URL: {reason}"),
            ConfigError::NoHome => write!(
                f,
                "HOME environment variable must be set to locate ~/.config/{CONFIG_FILE_NAME}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

/// Camera request preferences. The fallback request keeps only `device`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CameraPreferences {
    #[serde(default)]
    pub facing: FacingMode,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Device path for hosts that address cameras by path (e.g. `/dev/video0`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl Default for CameraPreferences {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            width: default_width(),
            height: default_height(),
            device: None,
        }
    }
}

impl CameraPreferences {
    pub fn preferred_constraints(&self) -> StreamConstraints {
        StreamConstraints::preferred(self.facing, self.width, self.height, self.device.clone())
    }
}

/// External command used by the CLI to play audio cues. `{url}` in `args` is
/// replaced by the audio URL; without it the URL is appended.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AudioPlayerCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for AudioPlayerCommand {
    fn default() -> Self {
        Self {
            program: "ffplay".into(),
            args: vec![
                "-nodisp".into(),
                "-autoexit".into(),
                "-loglevel".into(),
                "quiet".into(),
                "{url}".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    /// Base URL of the prediction API. Falls back to `EMOTION_API_BASE`,
    /// then `http://localhost:7860`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default)]
    pub camera: CameraPreferences,
    #[serde(default = "default_surface_timeout_ms")]
    pub surface_timeout_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub autoplay_audio: bool,
    #[serde(default)]
    pub audio_player: AudioPlayerCommand,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            camera: CameraPreferences::default(),
            surface_timeout_ms: default_surface_timeout_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            autoplay_audio: true,
            audio_player: AudioPlayerCommand::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Config pointing at an explicit API base, everything else default.
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: Some(api_base.into()),
            ..Self::default()
        }
    }

    /// Loads `~/.config/emotion-analyzer.json`. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(ConfigError::from(err)),
        };

        serde_json::from_str(&contents).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        fs::write(path, payload).map_err(ConfigError::from)
    }

    /// Resolves the API base: config file → env var → default. The result has
    /// no trailing slash.
    pub fn resolve_api_base(&self) -> Result<String, ConfigError> {
        let raw = self
            .api_base
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_owned)
            .or_else(|| env::var(API_BASE_ENV).ok().filter(|url| !url.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        validate_api_base(raw.trim())
    }

    pub fn surface_timeout(&self) -> Duration {
        Duration::from_millis(self.surface_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn validate_api_base(raw: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(raw).map_err(|err| ConfigError::InvalidApiBase(format!("{raw}: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidApiBase(format!(
            "{raw}: scheme must be http or https"
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let home = env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .ok_or(ConfigError::NoHome)?;
    Ok(home.join(".config").join(CONFIG_FILE_NAME))
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_surface_timeout_ms() -> u64 {
    DEFAULT_SURFACE_TIMEOUT_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir()
            .join(format!("emotion-analyzer-config-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AnalyzerConfig::load_from(&temp_path("missing.json")).expect("load");
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.surface_timeout(), Duration::from_millis(2000));
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.camera.height, 720);
        assert!(config.autoplay_audio);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temp_path("partial.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"{"api_base": "https://emotions.example.com/", "camera": {"facing": "environment"}}"#,
        )
        .unwrap();

        let config = AnalyzerConfig::load_from(&path).expect("load");
        assert_eq!(config.camera.facing, FacingMode::Environment);
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(
            config.resolve_api_base().unwrap(),
            "https://emotions.example.com"
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = temp_path("broken.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AnalyzerConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let path = temp_path("saved/config.json");
        let mut config = AnalyzerConfig::with_api_base("http://10.0.0.2:7860");
        config.autoplay_audio = false;
        config.save_to(&path).expect("save");
        assert_eq!(AnalyzerConfig::load_from(&path).expect("load"), config);
    }

    #[test]
    fn api_base_must_be_http() {
        assert!(matches!(
            AnalyzerConfig::with_api_base("ftp://example.com").resolve_api_base(),
            Err(ConfigError::InvalidApiBase(_))
        ));
        assert!(matches!(
            AnalyzerConfig::with_api_base("not a url").resolve_api_base(),
            Err(ConfigError::InvalidApiBase(_))
        ));
    }
}
