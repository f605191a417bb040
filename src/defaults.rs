//! Default configuration constants for asrhub.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default sample width in bytes (16-bit signed PCM).
pub const SAMPLE_WIDTH: u16 = 2;

/// Default channel count (mono).
pub const CHANNELS: u16 = 1;

/// Default site id used when an inbound message carries none.
pub const SITE_ID: &str = "default";

/// Seconds to wait for a worker's transcription result before emitting the
/// empty transcript, in milliseconds.
///
/// A timed-out wait is not an error: the session still produces exactly one
/// (empty) result event.
pub const RESULT_TIMEOUT_MS: u64 = 1000;

/// Default endpoint-detection RMS threshold.
///
/// This RMS-based threshold (0.0 to 1.0) determines when audio is considered
/// speech. A value of 0.02 is tuned for typical microphone input levels and
/// provides good sensitivity while filtering out background noise.
pub const SPEECH_THRESHOLD: f32 = 0.02;

/// Default silence duration in milliseconds before an utterance is considered
/// ended.
///
/// 800ms allows for short natural pauses in a voice command without
/// prematurely ending the session.
pub const SILENCE_DURATION_MS: u32 = 800;

/// Minimum duration of speech in milliseconds before a trailing silence can
/// end the utterance.
pub const MIN_SPEECH_MS: u32 = 300;

/// Default external converter program for audio-format normalization.
pub const CONVERTER_PROGRAM: &str = "sox";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_profile_is_16khz_mono_pcm16() {
        assert_eq!(SAMPLE_RATE, 16000);
        assert_eq!(SAMPLE_WIDTH, 2);
        assert_eq!(CHANNELS, 1);
    }

    #[test]
    fn silence_hold_exceeds_min_speech() {
        // An utterance must be able to finish: the hold time after speech has
        // to be reachable once min speech has accumulated.
        assert!(SILENCE_DURATION_MS >= MIN_SPEECH_MS);
    }
}
