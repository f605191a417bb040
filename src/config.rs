use crate::asr::detector::EnergyDetectorConfig;
use crate::audio::format::AudioProfile;
use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub audio: AudioConfig,
    pub session: SessionConfig,
    pub endpoint: EndpointConfig,
    pub transcriber: TranscriberConfig,
    pub converter: ConverterConfig,
}

/// Site scoping and global enable state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    /// Sites this hub handles. Empty = all sites.
    pub site_ids: Vec<String>,
    /// Whether the hub starts enabled.
    pub enabled: bool,
}

/// Required inbound audio profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub sample_width: u16,
    pub channels: u16,
}

/// Session lifecycle tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Milliseconds to wait for a worker's result before emitting the empty
    /// transcript.
    pub result_timeout_ms: u64,
}

/// Endpoint (utterance end) detection tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub speech_threshold: f32,
    pub silence_duration_ms: u32,
    pub min_speech_ms: u32,
}

/// External recognizer process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Program invoked per utterance; PCM is piped to stdin, the transcript
    /// is read from stdout. Empty = not configured.
    pub command: String,
    /// Arguments, with `{rate}`, `{width}`, `{channels}` placeholders.
    pub args: Vec<String>,
}

/// External audio converter process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConverterConfig {
    pub program: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_ids: Vec::new(),
            enabled: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            sample_width: defaults::SAMPLE_WIDTH,
            channels: defaults::CHANNELS,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            result_timeout_ms: defaults::RESULT_TIMEOUT_MS,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::SPEECH_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
        }
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: defaults::CONVERTER_PROGRAM.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns silent defaults if the file is missing; invalid TOML is
    /// reported to stderr before falling back.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                let missing = e
                    .downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false);
                if !missing {
                    eprintln!(
                        "asrhub: invalid config at {}: {} (using defaults)",
                        path.display(),
                        e
                    );
                }
                Self::default()
            }
        }
    }

    /// The required PCM profile inbound frames are normalized to.
    pub fn audio_profile(&self) -> AudioProfile {
        AudioProfile {
            sample_rate: self.audio.sample_rate,
            sample_width: self.audio.sample_width,
            channels: self.audio.channels,
        }
    }

    /// Bounded wait applied by the session finalizer.
    pub fn result_timeout(&self) -> Duration {
        Duration::from_millis(self.session.result_timeout_ms)
    }

    /// Endpoint-detector tuning derived from `[endpoint]` and `[audio]`.
    pub fn detector_config(&self) -> EnergyDetectorConfig {
        EnergyDetectorConfig {
            speech_threshold: self.endpoint.speech_threshold,
            silence_duration_ms: self.endpoint.silence_duration_ms,
            min_speech_ms: self.endpoint.min_speech_ms,
            sample_rate: self.audio.sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.site.site_ids.is_empty());
        assert!(config.site.enabled);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.sample_width, 2);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.session.result_timeout_ms, 1000);
        assert_eq!(config.converter.program, "sox");
        assert!(config.transcriber.command.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[site]
site_ids = ["kitchen", "office"]
enabled = false

[audio]
sample_rate = 8000
sample_width = 2
channels = 1

[session]
result_timeout_ms = 250

[endpoint]
speech_threshold = 0.05
silence_duration_ms = 400
min_speech_ms = 100

[transcriber]
command = "/usr/local/bin/recognize"
args = ["--rate", "{{rate}}"]

[converter]
program = "/opt/sox/bin/sox"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.site.site_ids, vec!["kitchen", "office"]);
        assert!(!config.site.enabled);
        assert_eq!(config.audio.sample_rate, 8000);
        assert_eq!(config.session.result_timeout_ms, 250);
        assert_eq!(config.endpoint.silence_duration_ms, 400);
        assert_eq!(config.transcriber.command, "/usr/local/bin/recognize");
        assert_eq!(config.transcriber.args, vec!["--rate", "{rate}"]);
        assert_eq!(config.converter.program, "/opt/sox/bin/sox");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[session]
result_timeout_ms = 500
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.session.result_timeout_ms, 500);
        assert_eq!(config.audio.sample_rate, 16000);
        assert!(config.site.enabled);
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not = valid = toml").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/asrhub.toml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_invalid_file_falls_back() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "broken [[").unwrap();
        let config = Config::load_or_default(file.path());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_audio_profile_from_config() {
        let config = Config::default();
        let profile = config.audio_profile();
        assert_eq!(profile.sample_rate, 16000);
        assert_eq!(profile.sample_width, 2);
        assert_eq!(profile.channels, 1);
    }

    #[test]
    fn test_result_timeout_duration() {
        let mut config = Config::default();
        config.session.result_timeout_ms = 250;
        assert_eq!(config.result_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_detector_config_takes_audio_rate() {
        let mut config = Config::default();
        config.audio.sample_rate = 8000;
        let dc = config.detector_config();
        assert_eq!(dc.sample_rate, 8000);
        assert_eq!(dc.silence_duration_ms, defaults::SILENCE_DURATION_MS);
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
