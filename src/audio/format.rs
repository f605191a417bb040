//! Required PCM profile and the inbound frame normalizer.

use crate::audio::convert::AudioConverter;
use crate::defaults;
use crate::error::{AsrHubError, Result};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// The PCM profile the transcription engine expects.
///
/// Inbound WAV frames are self-describing; frames already in this profile
/// pass through untouched, everything else goes through the external
/// converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioProfile {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Sample width in bytes.
    pub sample_width: u16,
    /// Channel count.
    pub channels: u16,
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            sample_width: defaults::SAMPLE_WIDTH,
            channels: defaults::CHANNELS,
        }
    }
}

impl AudioProfile {
    /// Returns true if a WAV spec already matches this profile.
    pub fn matches(&self, spec: &hound::WavSpec) -> bool {
        spec.sample_rate == self.sample_rate
            && spec.bits_per_sample == self.sample_width * 8
            && spec.channels == self.channels
            && spec.sample_format == hound::SampleFormat::Int
    }
}

/// Verifies or converts inbound WAV frames to the required profile.
pub struct Normalizer {
    profile: AudioProfile,
    converter: Box<dyn AudioConverter>,
}

impl Normalizer {
    /// Creates a normalizer targeting `profile`, converting mismatches with
    /// `converter`.
    pub fn new(profile: AudioProfile, converter: Box<dyn AudioConverter>) -> Self {
        Self { profile, converter }
    }

    /// The target profile.
    pub fn profile(&self) -> &AudioProfile {
        &self.profile
    }

    /// Returns the raw PCM payload of a WAV frame in the required profile.
    ///
    /// A frame that already matches passes through without conversion; only
    /// mismatched frames invoke the external converter. The pass-through path
    /// handles 16-bit PCM (the required profile in practice); any other
    /// target width is delegated to the converter.
    pub fn normalize(&self, wav_bytes: &[u8]) -> Result<Vec<u8>> {
        let reader =
            hound::WavReader::new(Cursor::new(wav_bytes)).map_err(|e| AsrHubError::AudioFormat {
                message: format!("failed to parse WAV frame: {}", e),
            })?;
        let spec = reader.spec();

        if self.profile.matches(&spec) && self.profile.sample_width == 2 {
            let mut raw = Vec::with_capacity(reader.len() as usize * 2);
            for sample in reader.into_samples::<i16>() {
                let sample = sample.map_err(|e| AsrHubError::AudioFormat {
                    message: format!("failed to read WAV samples: {}", e),
                })?;
                raw.extend_from_slice(&sample.to_le_bytes());
            }
            Ok(raw)
        } else {
            self.converter.convert(wav_bytes, &self.profile)
        }
    }
}
