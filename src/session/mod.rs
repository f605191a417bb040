//! Session lifecycle: pooled transcription workers and the registry that
//! binds them to listening sessions.

pub mod registry;
pub mod worker;

pub use registry::SessionRegistry;
pub use worker::{DetectorFactory, TranscriberFactory, Worker};
