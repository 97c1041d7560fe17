use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::stages::Stage;

/// Custom result type alias for the application
pub type Result<T> = std::result::Result<T, SetupError>;

/// Errors that can occur while provisioning a host
#[derive(Debug, Error)]
pub enum SetupError {
    /// I/O errors
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// General message errors
    #[error("{0}")]
    Message(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operator aborted or the terminal could not be driven
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// A component descriptor could not be loaded
    #[error("Failed to load component from {}: {reason}", path.display())]
    Discovery {
        /// Descriptor file or directory that failed
        path: PathBuf,
        /// Why loading failed
        reason: String,
    },

    /// Non-success response from the monitoring API
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error text reported by the service
        message: String,
    },

    /// A component operation failed inside a lifecycle stage
    #[error("{stage} stage failed for component '{component}': {source}")]
    Stage {
        /// Stage being executed
        stage: Stage,
        /// Name of the failing component
        component: String,
        /// Underlying failure
        #[source]
        source: Box<SetupError>,
    },
}

impl SetupError {
    /// Creates a new error with the specified message
    pub fn new(message: &str) -> Self {
        Self::Message(message.to_string())
    }

    /// Wraps an error with the stage and component it happened in
    pub fn in_stage(self, stage: Stage, component: &str) -> Self {
        Self::Stage {
            stage,
            component: component.to_string(),
            source: Box::new(self),
        }
    }

    /// Checks if this error came from talking to the monitoring API
    pub fn is_remote(&self) -> bool {
        match self {
            Self::Http(_) | Self::Api { .. } => true,
            Self::Stage { source, .. } => source.is_remote(),
            _ => false,
        }
    }
}
