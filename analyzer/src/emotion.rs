use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of labels the prediction API may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

impl Emotion {
    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Neutral => "neutral",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Emotion::Happy => "😊",
            Emotion::Sad => "😢",
            Emotion::Angry => "😠",
            Emotion::Fear => "😨",
            Emotion::Surprise => "😲",
            Emotion::Disgust => "🤢",
            Emotion::Neutral => "😐",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label and confidence produced by one successful analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisResult {
    pub emotion: Emotion,
    /// Always within `[0, 1]`.
    pub confidence: f64,
}

impl AnalysisResult {
    pub fn display(&self) -> ResultDisplay {
        ResultDisplay {
            label: self.emotion.label().to_string(),
            emoji: self.emotion.emoji(),
            confidence: format_confidence(self.confidence),
            gauge_percent: (self.confidence * 100.0).clamp(0.0, 100.0),
        }
    }
}

/// What a front end renders for an [`AnalysisResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultDisplay {
    pub label: String,
    pub emoji: &'static str,
    pub confidence: String,
    pub gauge_percent: f64,
}

impl fmt::Display for ResultDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.emoji, self.label, self.confidence)
    }
}

/// Formats a `[0, 1]` confidence as a percentage with one decimal, e.g. `87.0%`.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}
