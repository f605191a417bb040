//! External audio-format conversion.
//!
//! Conversion is a black-box transform performed by an external process
//! (`sox` by default): WAV in on stdin, raw PCM in the target profile out on
//! stdout.

use crate::audio::format::AudioProfile;
use crate::error::{AsrHubError, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for converting WAV data to the required PCM profile.
///
/// This trait allows swapping implementations (real sox vs mock).
pub trait AudioConverter: Send + Sync {
    /// Convert WAV bytes to raw PCM in the target profile.
    fn convert(&self, wav_bytes: &[u8], target: &AudioProfile) -> Result<Vec<u8>>;
}

/// Converter that shells out to `sox` (or a compatible program).
pub struct SoxConverter {
    program: String,
}

impl SoxConverter {
    /// Creates a converter using the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SoxConverter {
    fn default() -> Self {
        Self::new(crate::defaults::CONVERTER_PROGRAM)
    }
}

impl AudioConverter for SoxConverter {
    fn convert(&self, wav_bytes: &[u8], target: &AudioProfile) -> Result<Vec<u8>> {
        let rate = target.sample_rate.to_string();
        let bits = (target.sample_width * 8).to_string();
        let channels = target.channels.to_string();

        let mut child = Command::new(&self.program)
            .args([
                "-t",
                "wav",
                "-",
                "-r",
                &rate,
                "-e",
                "signed-integer",
                "-b",
                &bits,
                "-c",
                &channels,
                "-t",
                "raw",
                "-",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AsrHubError::ConverterNotFound {
                        program: self.program.clone(),
                    }
                } else {
                    AsrHubError::Conversion {
                        message: format!("failed to spawn {}: {}", self.program, e),
                    }
                }
            })?;

        // Scope the handle so stdin closes before we wait
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(wav_bytes)
                .map_err(|e| AsrHubError::Conversion {
                    message: format!("failed to write to {}: {}", self.program, e),
                })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| AsrHubError::Conversion {
                message: format!("failed to wait for {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(AsrHubError::Conversion {
                message: format!("{} exited with {}", self.program, output.status),
            });
        }

        Ok(output.stdout)
    }
}

/// Mock converter for testing.
///
/// Counts invocations and records the target profile of each call; handles to
/// both survive moving the mock into a `Normalizer`.
pub struct MockConverter {
    calls: Arc<AtomicUsize>,
    targets: Arc<Mutex<Vec<AudioProfile>>>,
    response: Vec<u8>,
    should_fail: bool,
}

impl MockConverter {
    /// Create a mock that echoes the input bytes back.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            targets: Arc::new(Mutex::new(Vec::new())),
            response: Vec::new(),
            should_fail: false,
        }
    }

    /// Configure the mock to return fixed bytes instead of echoing.
    pub fn with_response(mut self, response: Vec<u8>) -> Self {
        self.response = response;
        self
    }

    /// Configure the mock to fail on convert.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Handle to the invocation counter.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Handle to the recorded target profiles.
    pub fn target_log(&self) -> Arc<Mutex<Vec<AudioProfile>>> {
        Arc::clone(&self.targets)
    }
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioConverter for MockConverter {
    fn convert(&self, wav_bytes: &[u8], target: &AudioProfile) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut targets) = self.targets.lock() {
            targets.push(*target);
        }
        if self.should_fail {
            return Err(AsrHubError::Conversion {
                message: "mock conversion failure".to_string(),
            });
        }
        if self.response.is_empty() {
            Ok(wav_bytes.to_vec())
        } else {
            Ok(self.response.clone())
        }
    }
}
