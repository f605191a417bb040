//! Utterance-end detection.
//!
//! The hub feeds every routed chunk to the session's detector; when the
//! detector reports end-of-command the session is finalized immediately,
//! without waiting for an explicit stop.

use crate::defaults;
use crate::error::{AsrHubError, Result};

/// Trait for detecting the end of a spoken command.
///
/// This trait allows swapping implementations (RMS-based vs mock, or an
/// external VAD).
pub trait EndpointDetector: Send {
    /// Arm the detector for a new session.
    fn start(&mut self);

    /// Disarm the detector; subsequent chunks are ignored.
    fn stop(&mut self);

    /// Inspect one PCM chunk. Returns true when the utterance has ended.
    fn process_chunk(&mut self, chunk: &[u8]) -> Result<bool>;
}

/// Configuration for the RMS endpoint detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyDetectorConfig {
    /// RMS threshold for detecting speech (0.0 to 1.0).
    pub speech_threshold: f32,
    /// Trailing silence in milliseconds that ends the utterance.
    pub silence_duration_ms: u32,
    /// Minimum accumulated speech in milliseconds before silence can end it.
    pub min_speech_ms: u32,
    /// Sample rate used to convert chunk lengths into milliseconds.
    pub sample_rate: u32,
}

impl Default for EnergyDetectorConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::SPEECH_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

/// RMS-based endpoint detector.
///
/// Silence is measured in audio time (derived from chunk sample counts), not
/// wall-clock time, so detection is deterministic for a given chunk
/// sequence.
pub struct EnergyDetector {
    config: EnergyDetectorConfig,
    active: bool,
    in_speech: bool,
    speech_ms: u32,
    silence_ms: u32,
}

impl EnergyDetector {
    /// Creates a detector with default configuration.
    pub fn new() -> Self {
        Self::with_config(EnergyDetectorConfig::default())
    }

    /// Creates a detector with custom configuration.
    pub fn with_config(config: EnergyDetectorConfig) -> Self {
        Self {
            config,
            active: false,
            in_speech: false,
            speech_ms: 0,
            silence_ms: 0,
        }
    }

    fn chunk_ms(&self, sample_count: usize) -> u32 {
        if self.config.sample_rate == 0 {
            return 0;
        }
        (sample_count as u64 * 1000 / self.config.sample_rate as u64) as u32
    }
}

impl Default for EnergyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointDetector for EnergyDetector {
    fn start(&mut self) {
        self.active = true;
        self.in_speech = false;
        self.speech_ms = 0;
        self.silence_ms = 0;
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn process_chunk(&mut self, chunk: &[u8]) -> Result<bool> {
        if !self.active {
            return Ok(false);
        }

        let samples: Vec<i16> = chunk
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let ms = self.chunk_ms(samples.len());
        let rms = calculate_rms(&samples);

        if rms > self.config.speech_threshold {
            self.in_speech = true;
            self.speech_ms = self.speech_ms.saturating_add(ms);
            self.silence_ms = 0;
        } else if self.in_speech {
            self.silence_ms = self.silence_ms.saturating_add(ms);
            if self.silence_ms >= self.config.silence_duration_ms
                && self.speech_ms >= self.config.min_speech_ms
            {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Root-mean-square level of a sample buffer, normalized to 0.0..1.0.
fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Mock detector for testing.
///
/// Signals end-of-command after a fixed number of chunks (or never).
pub struct MockDetector {
    end_after: Option<usize>,
    chunks_seen: usize,
    started: bool,
    should_fail: bool,
}

impl MockDetector {
    /// Create a mock that never signals end-of-command.
    pub fn new() -> Self {
        Self {
            end_after: None,
            chunks_seen: 0,
            started: false,
            should_fail: false,
        }
    }

    /// Signal end-of-command once `count` chunks have been processed.
    pub fn end_after(mut self, count: usize) -> Self {
        self.end_after = Some(count);
        self
    }

    /// Configure the mock to fail on process_chunk.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Returns true while armed.
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl Default for MockDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointDetector for MockDetector {
    fn start(&mut self) {
        self.started = true;
        self.chunks_seen = 0;
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn process_chunk(&mut self, _chunk: &[u8]) -> Result<bool> {
        if self.should_fail {
            return Err(AsrHubError::Detector {
                message: "mock detector failure".to_string(),
            });
        }
        if !self.started {
            return Ok(false);
        }
        self.chunks_seen += 1;
        Ok(self.end_after.is_some_and(|n| self.chunks_seen >= n))
    }
}
