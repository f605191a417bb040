//! Engine adapter that pipes an utterance to an external recognizer process.
//!
//! The session's PCM chunks are written to the program's stdin in arrival
//! order; the transcript is read from its stdout once the process exits.
//! Argument placeholders `{rate}`, `{width}`, and `{channels}` are filled
//! from the audio profile.

use crate::asr::transcriber::{StreamTranscriber, Transcript};
use crate::audio::format::AudioProfile;
use crate::error::{AsrHubError, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Configuration for the external recognizer process.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandConfig {
    /// Creates a config for the given program with no extra arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Adds arguments (placeholders allowed).
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// Transcriber backed by an external recognizer process.
pub struct CommandTranscriber {
    config: CommandConfig,
}

impl CommandTranscriber {
    /// Creates a transcriber from the given config.
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    fn resolved_args(&self, profile: &AudioProfile) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{rate}", &profile.sample_rate.to_string())
                    .replace("{width}", &profile.sample_width.to_string())
                    .replace("{channels}", &profile.channels.to_string())
            })
            .collect()
    }
}

impl StreamTranscriber for CommandTranscriber {
    fn transcribe_stream(
        &mut self,
        chunks: &mut dyn Iterator<Item = Vec<u8>>,
        profile: &AudioProfile,
    ) -> Result<Transcript> {
        let started = Instant::now();

        let mut child = Command::new(&self.config.program)
            .args(self.resolved_args(profile))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AsrHubError::Transcription {
                message: format!("failed to spawn {}: {}", self.config.program, e),
            })?;

        // Scope the handle so stdin closes (EOF) before we wait
        {
            let mut stdin = child.stdin.take().ok_or_else(|| AsrHubError::Transcription {
                message: "recognizer stdin unavailable".to_string(),
            })?;
            for chunk in chunks {
                stdin
                    .write_all(&chunk)
                    .map_err(|e| AsrHubError::Transcription {
                        message: format!("failed to write to {}: {}", self.config.program, e),
                    })?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| AsrHubError::Transcription {
                message: format!("failed to wait for {}: {}", self.config.program, e),
            })?;

        if !output.status.success() {
            return Err(AsrHubError::Transcription {
                message: format!("{} exited with {}", self.config.program, output.status),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Transcript::new(text, 1.0, started.elapsed().as_secs_f32()))
    }
}
