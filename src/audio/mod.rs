//! Audio format handling: profile probing, pass-through, and conversion.

pub mod convert;
pub mod format;

pub use convert::{AudioConverter, MockConverter, SoxConverter};
pub use format::{AudioProfile, Normalizer};
