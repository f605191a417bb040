//! Top-level command dispatch: the outermost error boundary.
//!
//! The hub owns the enable flag, the site filter, the frame normalizer, and
//! the session registry. `handle_command` never fails: every internal error
//! is turned into an `AsrEvent::Error` or a stderr log line, so the
//! transport loop driving the hub can never be taken down by one message.

use crate::audio::convert::AudioConverter;
use crate::audio::format::Normalizer;
use crate::config::Config;
use crate::messages::{AsrCommand, AsrEvent};
use crate::session::registry::SessionRegistry;
use crate::session::worker::{DetectorFactory, TranscriberFactory};

/// Streaming ASR session hub.
pub struct AsrHub {
    enabled: bool,
    site_ids: Vec<String>,
    normalizer: Normalizer,
    registry: SessionRegistry,
    first_audio: bool,
}

impl AsrHub {
    /// Creates a hub from configuration and its collaborator factories.
    pub fn new(
        config: &Config,
        transcriber_factory: TranscriberFactory,
        detector_factory: DetectorFactory,
        converter: Box<dyn AudioConverter>,
    ) -> Self {
        let profile = config.audio_profile();
        Self {
            enabled: config.site.enabled,
            site_ids: config.site.site_ids.clone(),
            normalizer: Normalizer::new(profile, converter),
            registry: SessionRegistry::new(
                transcriber_factory,
                detector_factory,
                profile,
                config.result_timeout(),
            ),
            first_audio: true,
        }
    }

    /// Handles one inbound command and returns the events it produced.
    ///
    /// Commands for sites outside the configured set are silently ignored,
    /// as is everything except toggles while the hub is disabled.
    pub fn handle_command(&mut self, command: AsrCommand) -> Vec<AsrEvent> {
        match command {
            AsrCommand::ToggleOn { site_id } => {
                if self.site_allowed(&site_id) {
                    self.enabled = true;
                }
                Vec::new()
            }
            AsrCommand::ToggleOff { site_id } => {
                if self.site_allowed(&site_id) {
                    self.enabled = false;
                }
                Vec::new()
            }
            AsrCommand::StartListening {
                session_id,
                site_id,
            } => {
                if !self.enabled || !self.site_allowed(&site_id) {
                    return Vec::new();
                }
                self.first_audio = true;
                self.registry.start(&session_id, &site_id)
            }
            AsrCommand::StopListening {
                session_id,
                site_id,
            } => {
                if !self.enabled || !self.site_allowed(&site_id) {
                    return Vec::new();
                }
                self.registry.stop(&session_id, &site_id)
            }
            AsrCommand::AudioFrame { site_id, wav_bytes } => {
                if !self.enabled || !self.site_allowed(&site_id) {
                    return Vec::new();
                }
                self.handle_audio_frame(&wav_bytes, &site_id)
            }
        }
    }

    /// True while the hub is handling sessions and audio.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of active sessions.
    pub fn active_sessions(&self) -> usize {
        self.registry.active_sessions()
    }

    /// Number of idle pooled workers.
    pub fn free_workers(&self) -> usize {
        self.registry.free_workers()
    }

    fn handle_audio_frame(&mut self, wav_bytes: &[u8], site_id: &str) -> Vec<AsrEvent> {
        if self.registry.is_empty() {
            // No session to feed; skip the (possibly external) conversion
            return Vec::new();
        }

        if self.first_audio {
            eprintln!("asrhub: receiving audio");
            self.first_audio = false;
        }

        match self.normalizer.normalize(wav_bytes) {
            Ok(chunk) => self.registry.route_chunk(&chunk, site_id),
            // Frame-scoped failure: the frame is dropped, sessions continue
            Err(e) => vec![AsrEvent::error(e.to_string(), "audio_frame", "", site_id)],
        }
    }

    fn site_allowed(&self, site_id: &str) -> bool {
        self.site_ids.is_empty() || self.site_ids.iter().any(|s| s == site_id)
    }
}
