use thiserror::Error;

use crate::features::FeatureKind;

/// Main error type for the structure-segmenter library
#[derive(Error, Debug)]
pub enum SegmenterError {
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Audio source error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors raised by the analysis pipeline and the session that drives it
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid feature request: {reason}")]
    InvalidFeatureRequest { reason: String },

    #[error("Feature {kind} has identical minimum and maximum distance; normalization is undefined")]
    DegenerateNormalization { kind: FeatureKind },

    #[error("{stage} has not been computed yet")]
    NotYetComputed { stage: &'static str },

    #[error("Feature extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error("An analysis run is already in progress on this session")]
    SessionBusy,

    #[error("The session was cleared while the run was in progress")]
    Abandoned,
}

/// Audio source and decoding errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio source cannot supply frame {frame}: expected {expected} frames, source delivered {delivered} samples")]
    SourceUnavailable {
        frame: usize,
        expected: usize,
        delivered: usize,
    },

    #[error("Failed to load audio file: {path} ({reason})")]
    LoadFailed { path: String, reason: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid audio parameters: {details}")]
    InvalidParameters { details: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path} ({reason})")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using SegmenterError
pub type Result<T> = std::result::Result<T, SegmenterError>;

impl SegmenterError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if repeating the same call could succeed without changing its inputs
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Audio(AudioError::LoadFailed { .. }) => true,
            // The competing run will finish eventually
            Self::Analysis(AnalysisError::SessionBusy) => true,
            Self::Analysis(AnalysisError::Abandoned) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Audio(AudioError::LoadFailed { path, .. }) => {
                format!("Could not load audio file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Audio(AudioError::SourceUnavailable { expected, .. }) => {
                format!("The audio is too short or truncated: {} analysis frames were expected.", expected)
            }
            Self::Config(ConfigError::InvalidValue { key, value }) => {
                format!("Configuration value '{}' is not usable: {}", key, value)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::Analysis(AnalysisError::DegenerateNormalization { kind }) => {
                format!("The {} features do not vary across the recording (silent or constant audio?).", kind)
            }
            _ => self.to_string(),
        }
    }
}

impl AnalysisError {
    pub(crate) fn invalid_request<S: Into<String>>(reason: S) -> Self {
        Self::InvalidFeatureRequest { reason: reason.into() }
    }
}

impl ConfigError {
    pub(crate) fn invalid<K: Into<String>, V: ToString>(key: K, value: V) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_session_is_retryable() {
        let err: SegmenterError = AnalysisError::SessionBusy.into();
        assert!(err.is_retryable());

        let err: SegmenterError = ConfigError::invalid("frame_size", 0).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_user_message_mentions_config_key() {
        let err: SegmenterError = ConfigError::invalid("overlap", 4096).into();
        let message = err.user_message();
        assert!(message.contains("overlap"));
        assert!(message.contains("4096"));
    }

    #[test]
    fn test_degenerate_message_names_feature() {
        let err: SegmenterError = AnalysisError::DegenerateNormalization {
            kind: FeatureKind::Mfcc,
        }
        .into();
        assert!(err.to_string().contains("mfcc"));
    }
}
