//! Capability interfaces for the external speech collaborators: the
//! streaming transcription engine and the utterance-end detector.

pub mod command;
pub mod detector;
pub mod transcriber;

pub use command::{CommandConfig, CommandTranscriber};
pub use detector::{EndpointDetector, EnergyDetector, EnergyDetectorConfig, MockDetector};
pub use transcriber::{MockStreamTranscriber, StreamTranscriber, Transcript};
