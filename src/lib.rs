//! asrhub - Streaming speech-transcription session hub
//!
//! Binds pub/sub-triggered listening sessions to pooled transcription
//! workers, detects end-of-utterance, and emits exactly one result per
//! session.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod asr;
pub mod audio;
pub mod config;
pub mod defaults;
pub mod error;
pub mod hub;
pub mod messages;
pub mod server;
pub mod session;

// Core capability traits (engine, detector, converter)
pub use asr::command::{CommandConfig, CommandTranscriber};
pub use asr::detector::{EndpointDetector, EnergyDetector, EnergyDetectorConfig, MockDetector};
pub use asr::transcriber::{MockStreamTranscriber, StreamTranscriber, Transcript};
pub use audio::convert::{AudioConverter, MockConverter, SoxConverter};
pub use audio::format::{AudioProfile, Normalizer};

// Session machinery
pub use hub::AsrHub;
pub use session::registry::SessionRegistry;
pub use session::worker::{DetectorFactory, TranscriberFactory, Worker};

// Message contract
pub use messages::{AsrCommand, AsrEvent};

// Transport adapter
pub use server::{EventHandler, EventServer, HubHandler};

// Error handling
pub use error::{AsrHubError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.1+abc1234"` when git hash is available, `"0.3.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
