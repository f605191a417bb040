//! Streaming transcription engine interface.

use crate::audio::format::AudioProfile;
use crate::error::{AsrHubError, Result};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A finished transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    /// Transcribed text.
    pub text: String,
    /// Recognizer confidence (0.0 to 1.0).
    pub likelihood: f32,
    /// Seconds spent transcribing.
    pub transcribe_seconds: f32,
}

impl Transcript {
    /// Creates a transcript.
    pub fn new(text: impl Into<String>, likelihood: f32, transcribe_seconds: f32) -> Self {
        Self {
            text: text.into(),
            likelihood,
            transcribe_seconds,
        }
    }

    /// The canonical empty transcript, emitted when no timely result exists.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            likelihood: 0.0,
            transcribe_seconds: 0.0,
        }
    }
}

/// Trait for streaming speech-to-text transcription.
///
/// The engine pulls PCM chunks from the iterator until it is exhausted (the
/// end-of-stream sentinel), then produces one transcript for the whole
/// utterance. This trait allows swapping implementations (external
/// recognizer process vs mock).
pub trait StreamTranscriber: Send {
    /// Transcribe a chunk stream to text.
    ///
    /// # Arguments
    /// * `chunks` - Raw PCM chunks in arrival order; ends at the sentinel
    /// * `profile` - The PCM profile of the chunks
    fn transcribe_stream(
        &mut self,
        chunks: &mut dyn Iterator<Item = Vec<u8>>,
        profile: &AudioProfile,
    ) -> Result<Transcript>;
}

/// Mock transcriber for testing.
///
/// Consumes the whole chunk stream, then either fails, echoes the chunk
/// bytes back as UTF-8 text, or returns a fixed response. An optional delay
/// (applied after the stream ends) simulates a slow engine for timeout
/// tests, and an optional shared log records every chunk received.
pub struct MockStreamTranscriber {
    response: String,
    likelihood: f32,
    echo: bool,
    should_fail: bool,
    delay: Option<Duration>,
    chunk_log: Option<Arc<Mutex<Vec<Vec<u8>>>>>,
}

impl MockStreamTranscriber {
    /// Create a new mock with default settings.
    pub fn new() -> Self {
        Self {
            response: "mock transcription".to_string(),
            likelihood: 1.0,
            echo: false,
            should_fail: false,
            delay: None,
            chunk_log: None,
        }
    }

    /// Configure the mock to return a specific response.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to echo the received chunk bytes as text.
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Configure the mock's reported likelihood.
    pub fn with_likelihood(mut self, likelihood: f32) -> Self {
        self.likelihood = likelihood;
        self
    }

    /// Configure the mock to fail after draining the stream.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure a delay between stream end and result, to simulate a slow
    /// engine.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Record every received chunk into a shared log.
    pub fn with_chunk_log(mut self, log: Arc<Mutex<Vec<Vec<u8>>>>) -> Self {
        self.chunk_log = Some(log);
        self
    }
}

impl Default for MockStreamTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTranscriber for MockStreamTranscriber {
    fn transcribe_stream(
        &mut self,
        chunks: &mut dyn Iterator<Item = Vec<u8>>,
        _profile: &AudioProfile,
    ) -> Result<Transcript> {
        let started = Instant::now();
        let mut received: Vec<Vec<u8>> = Vec::new();
        for chunk in chunks {
            received.push(chunk);
        }

        if let Some(ref log) = self.chunk_log
            && let Ok(mut log) = log.lock()
        {
            log.extend(received.iter().cloned());
        }

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        if self.should_fail {
            return Err(AsrHubError::Transcription {
                message: "mock transcription failure".to_string(),
            });
        }

        let text = if self.echo {
            let bytes: Vec<u8> = received.into_iter().flatten().collect();
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            self.response.clone()
        };

        Ok(Transcript::new(
            text,
            self.likelihood,
            started.elapsed().as_secs_f32(),
        ))
    }
}
