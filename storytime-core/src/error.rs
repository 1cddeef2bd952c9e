//! Error types for a storytelling session.
//!
//! Confused or empty answers never show up here: the stage loops recover
//! from them locally. What remains is the generation boundary, participant
//! I/O, and configuration.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of a generation failure, used to decide whether a retry
/// makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// Connection or transport problem.
    Network,
    /// The request did not finish in time.
    Timeout,
    /// The service asked us to slow down (429).
    RateLimit,
    /// The service failed on its side (5xx).
    ServerError,
    /// The credential was rejected (401, 403).
    Auth,
    /// The service rejected the request itself (400 and other 4xx).
    InvalidRequest,
    /// The service answered, but without usable text.
    MalformedResponse,
}

impl GenerationErrorKind {
    /// Whether a failure of this kind may succeed when tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimit | Self::ServerError
        )
    }
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate limit",
            Self::ServerError => "server error",
            Self::Auth => "authentication",
            Self::InvalidRequest => "invalid request",
            Self::MalformedResponse => "malformed response",
        };
        f.write_str(name)
    }
}

/// The main error type for storytime-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The generation service could not produce text.
    #[error("story generation failed ({kind}): {message}")]
    Generation {
        /// What kind of failure this was.
        kind: GenerationErrorKind,
        /// Description of what went wrong.
        message: String,
    },

    /// The participant's input stream ended.
    #[error("participant input closed")]
    InputClosed,

    /// Reading from or writing to the participant failed.
    #[error("participant I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A bounded question ran out of attempts without a usable answer.
    #[error("no usable answer for the {step} step after {attempts} attempts")]
    AttemptsExhausted {
        /// The step that gave up (a stage name, or "feedback").
        step: String,
        /// How many answers were read.
        attempts: u32,
    },

    /// The story was revised before all three story elements were chosen.
    #[error("story elements are not all chosen yet")]
    MissingElements,

    /// No credential was supplied for the generation service.
    #[error("no API key configured for the generation service")]
    MissingApiKey,

    /// Configuration error.
    #[error("configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem.
        message: String,
    },

    /// Failed to read a marker table file from disk.
    #[error("failed to read marker file '{path}': {source}")]
    MarkersReadError {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a marker table file.
    #[error("failed to parse marker JSON from '{path}': {source}")]
    MarkersParseError {
        /// The path containing invalid JSON.
        path: PathBuf,
        /// The underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Create a new `Generation` error of the given kind.
    pub fn generation(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self::Generation {
            kind,
            message: message.into(),
        }
    }

    /// Create a new `ConfigError` with the given message.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// The generation failure kind, if this is a generation error.
    pub fn generation_kind(&self) -> Option<GenerationErrorKind> {
        match self {
            Self::Generation { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether retrying the failed operation may help.
    pub fn is_retryable(&self) -> bool {
        self.generation_kind()
            .is_some_and(|kind| kind.is_retryable())
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

/// A specialized `Result` type for storytime-core operations.
pub type Result<T> = std::result::Result<T, Error>;
