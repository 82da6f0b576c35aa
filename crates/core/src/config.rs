//! Pipeline configuration.
//!
//! Defaults cover every setting; a JSON file may override any subset, and
//! `VOICEOVER_FFMPEG` overrides the transcoder binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming the transcoder binary.
pub const FFMPEG_ENV: &str = "VOICEOVER_FFMPEG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory for per-run work directories and the merged track
    pub output_dir: PathBuf,
    /// Transcoder executable
    pub ffmpeg_path: String,
    /// Voice name handed to the synthesizer
    pub voice: String,
    /// Speaking rate multiplier (1.0 = engine default)
    pub rate: f64,
    /// Remote script download timeout
    pub fetch_timeout_secs: u64,
    /// Extraction timeout for local video files
    pub local_extract_timeout_secs: u64,
    /// Extraction timeout for video URLs (fetch time is folded in)
    pub remote_extract_timeout_secs: u64,
    /// Concatenation timeout
    pub concat_timeout_secs: u64,
    /// Per-scene synthesis timeout
    pub synthesis_timeout_secs: u64,
    /// Sample rate every segment is normalized to
    pub sample_rate: u32,
    /// Silence appended to every segment (seconds)
    pub trailing_silence_secs: f64,
    /// Minimum segment length after padding (seconds)
    pub min_duration_secs: f64,
    /// RNG seed for reproducible line/video selection
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./voiceover-output"),
            ffmpeg_path: "ffmpeg".to_string(),
            voice: "en".to_string(),
            rate: 1.0,
            fetch_timeout_secs: 30,
            local_extract_timeout_secs: 60,
            remote_extract_timeout_secs: 300,
            concat_timeout_secs: 300,
            synthesis_timeout_secs: 120,
            sample_rate: 16000,
            trailing_silence_secs: 1.0,
            min_duration_secs: 1.0,
            seed: None,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&data)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Apply environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(ffmpeg) = std::env::var(FFMPEG_ENV) {
            if !ffmpeg.trim().is_empty() {
                self.ffmpeg_path = ffmpeg;
            }
        }
        self
    }

    /// Reject settings that would make every scene fail.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.ffmpeg_path.trim().is_empty() {
            return Err(ConfigError::Missing("ffmpeg_path"));
        }
        if self.voice.trim().is_empty() {
            return Err(ConfigError::Missing("voice"));
        }
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(ConfigError::Invalid {
                name: "rate",
                reason: format!("must be positive, got {}", self.rate),
            });
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid {
                name: "sample_rate",
                reason: "must be non-zero".to_string(),
            });
        }
        for (name, secs) in [
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("local_extract_timeout_secs", self.local_extract_timeout_secs),
            ("remote_extract_timeout_secs", self.remote_extract_timeout_secs),
            ("concat_timeout_secs", self.concat_timeout_secs),
            ("synthesis_timeout_secs", self.synthesis_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    reason: "timeout must be at least one second".to_string(),
                });
            }
        }
        if self.trailing_silence_secs < 0.0 || self.min_duration_secs < 0.0 {
            return Err(ConfigError::Invalid {
                name: "trailing_silence_secs/min_duration_secs",
                reason: "durations cannot be negative".to_string(),
            });
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.local_extract_timeout_secs, 60);
        assert_eq!(config.remote_extract_timeout_secs, 300);
        assert_eq!(config.sample_rate, 16000);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = std::env::temp_dir().join(format!("voiceover_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"voice": "en-us+f3", "seed": 7}"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.voice, "en-us+f3");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.ffmpeg_path, "ffmpeg");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = std::env::temp_dir().join(format!("voiceover_config_bad_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(PipelineConfig::load(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = PipelineConfig {
            concat_timeout_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("concat_timeout_secs"));
    }

    #[test]
    fn test_empty_voice_rejected() {
        let config = PipelineConfig {
            voice: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Missing("voice"))));
    }
}
