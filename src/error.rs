//! Error types for asrhub.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AsrHubError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    // Audio format / conversion errors
    #[error("Audio format error: {message}")]
    AudioFormat { message: String },

    #[error("Audio conversion failed: {message}")]
    Conversion { message: String },

    #[error("Converter program not found: {program}")]
    ConverterNotFound { program: String },

    // Transcription errors
    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    // Endpoint detection errors
    #[error("Endpoint detection failed: {message}")]
    Detector { message: String },

    // Session lifecycle errors
    #[error("Session error: {message}")]
    Session { message: String },

    // Transport errors
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Socket error: {message}")]
    Socket { message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, AsrHubError>;
