//! JSON message contract for the hub: inbound commands and outbound events.
//!
//! This is the minimal event surface of the pub/sub transport; the transport
//! itself (broker, topics, subscriptions) lives outside the crate.

use crate::asr::transcriber::Transcript;
use crate::defaults;
use serde::{Deserialize, Serialize};

fn default_site() -> String {
    defaults::SITE_ID.to_string()
}

/// Commands delivered to the hub by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AsrCommand {
    /// Enable transcription handling (optionally scoped to a site)
    ToggleOn {
        #[serde(default = "default_site")]
        site_id: String,
    },
    /// Disable transcription handling
    ToggleOff {
        #[serde(default = "default_site")]
        site_id: String,
    },
    /// Open a listening session
    StartListening {
        session_id: String,
        #[serde(default = "default_site")]
        site_id: String,
    },
    /// Close a listening session and emit its result
    StopListening {
        session_id: String,
        #[serde(default = "default_site")]
        site_id: String,
    },
    /// One frame of WAV audio for a site
    AudioFrame {
        #[serde(default = "default_site")]
        site_id: String,
        wav_bytes: Vec<u8>,
    },
}

impl AsrCommand {
    /// Serialize command to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize command from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Events the hub produces for the transport to publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AsrEvent {
    /// Exactly one per session: the captured transcription
    TextCaptured {
        session_id: String,
        site_id: String,
        text: String,
        likelihood: f32,
        seconds: f32,
    },
    /// A session- or frame-scoped failure
    Error {
        session_id: String,
        site_id: String,
        message: String,
        context: String,
    },
}

impl AsrEvent {
    /// Build a `TextCaptured` event from a transcript.
    pub fn text_captured(transcript: &Transcript, session_id: &str, site_id: &str) -> Self {
        AsrEvent::TextCaptured {
            session_id: session_id.to_string(),
            site_id: site_id.to_string(),
            text: transcript.text.clone(),
            likelihood: transcript.likelihood,
            seconds: transcript.transcribe_seconds,
        }
    }

    /// Build an `Error` event scoped to a session (or a frame, with an empty
    /// session id).
    pub fn error(
        message: impl Into<String>,
        context: impl Into<String>,
        session_id: &str,
        site_id: &str,
    ) -> Self {
        AsrEvent::Error {
            session_id: session_id.to_string(),
            site_id: site_id.to_string(),
            message: message.into(),
            context: context.into(),
        }
    }

    /// Serialize event to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize event from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_roundtrip() {
        let commands = vec![
            AsrCommand::ToggleOn {
                site_id: "kitchen".to_string(),
            },
            AsrCommand::ToggleOff {
                site_id: "default".to_string(),
            },
            AsrCommand::StartListening {
                session_id: "s1".to_string(),
                site_id: "kitchen".to_string(),
            },
            AsrCommand::StopListening {
                session_id: "s1".to_string(),
                site_id: "kitchen".to_string(),
            },
            AsrCommand::AudioFrame {
                site_id: "kitchen".to_string(),
                wav_bytes: vec![0x52, 0x49, 0x46, 0x46],
            },
        ];

        for cmd in commands {
            let json = cmd.to_json().expect("should serialize");
            let back = AsrCommand::from_json(&json).expect("should deserialize");
            assert_eq!(cmd, back);
        }
    }

    #[test]
    fn test_command_tag_is_snake_case() {
        let cmd = AsrCommand::StartListening {
            session_id: "s1".to_string(),
            site_id: "default".to_string(),
        };
        let json = cmd.to_json().unwrap();
        assert!(json.contains(r#""type":"start_listening""#), "got: {json}");
    }

    #[test]
    fn test_command_site_id_defaults() {
        let cmd = AsrCommand::from_json(r#"{"type":"start_listening","session_id":"s1"}"#).unwrap();
        assert_eq!(
            cmd,
            AsrCommand::StartListening {
                session_id: "s1".to_string(),
                site_id: "default".to_string(),
            }
        );

        let cmd = AsrCommand::from_json(r#"{"type":"toggle_on"}"#).unwrap();
        assert_eq!(
            cmd,
            AsrCommand::ToggleOn {
                site_id: "default".to_string(),
            }
        );
    }

    #[test]
    fn test_event_json_roundtrip() {
        let event = AsrEvent::TextCaptured {
            session_id: "s1".to_string(),
            site_id: "kitchen".to_string(),
            text: "turn on the light".to_string(),
            likelihood: 0.93,
            seconds: 0.41,
        };
        let json = event.to_json().unwrap();
        assert_eq!(AsrEvent::from_json(&json).unwrap(), event);
    }

    #[test]
    fn test_text_captured_from_transcript() {
        let transcript = Transcript::new("hello", 0.5, 1.25);
        let event = AsrEvent::text_captured(&transcript, "s1", "office");
        match event {
            AsrEvent::TextCaptured {
                session_id,
                site_id,
                text,
                likelihood,
                seconds,
            } => {
                assert_eq!(session_id, "s1");
                assert_eq!(site_id, "office");
                assert_eq!(text, "hello");
                assert!((likelihood - 0.5).abs() < f32::EPSILON);
                assert!((seconds - 1.25).abs() < f32::EPSILON);
            }
            _ => panic!("Expected TextCaptured"),
        }
    }

    #[test]
    fn test_empty_transcript_event_shape() {
        let event = AsrEvent::text_captured(&Transcript::empty(), "s1", "default");
        match event {
            AsrEvent::TextCaptured {
                text,
                likelihood,
                seconds,
                ..
            } => {
                assert_eq!(text, "");
                assert_eq!(likelihood, 0.0);
                assert_eq!(seconds, 0.0);
            }
            _ => panic!("Expected TextCaptured"),
        }
    }

    #[test]
    fn test_error_event_builder() {
        let event = AsrEvent::error("boom", "audio_frame", "", "kitchen");
        match event {
            AsrEvent::Error {
                session_id,
                site_id,
                message,
                context,
            } => {
                assert_eq!(session_id, "");
                assert_eq!(site_id, "kitchen");
                assert_eq!(message, "boom");
                assert_eq!(context, "audio_frame");
            }
            _ => panic!("Expected Error"),
        }
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(AsrCommand::from_json("not json").is_err());
        assert!(AsrCommand::from_json(r#"{"type":"unknown_command"}"#).is_err());
    }
}
