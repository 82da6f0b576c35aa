//! Text-to-speech seam.
//!
//! The pipeline only needs "write speech for this text to this file".
//! `CommandSynthesizer` fulfils that with an espeak-ng compatible binary.

use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::process::run_with_timeout;

/// Default speaking rate of espeak-ng in words per minute.
const BASE_WPM: f64 = 175.0;

/// Speech synthesis backend.
pub trait SpeechSynthesizer {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Synthesize `text` into an audio file at `output`.
    ///
    /// Returning `Ok` is not proof of success: callers verify the file.
    fn synthesize(&self, text: &str, output: &Path, voice: &str, rate: f64) -> Result<()>;
}

/// Runs `<program> -v <voice> -s <wpm> -w <output> -f <textfile>`.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    timeout: Duration,
}

impl CommandSynthesizer {
    pub fn new(program: &str, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            timeout,
        }
    }

    /// Words per minute for a rate multiplier, clamped to espeak's range.
    fn words_per_minute(rate: f64) -> u32 {
        (BASE_WPM * rate).round().clamp(80.0, 450.0) as u32
    }
}

impl Default for CommandSynthesizer {
    fn default() -> Self {
        Self::new("espeak-ng", Duration::from_secs(120))
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn name(&self) -> &str {
        &self.program
    }

    fn synthesize(&self, text: &str, output: &Path, voice: &str, rate: f64) -> Result<()> {
        if text.trim().is_empty() {
            bail!("Nothing to synthesize");
        }

        // Text goes through a file so leading dashes or quotes are never
        // parsed as options.
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut text_file = tempfile::Builder::new()
            .prefix("tts-")
            .suffix(".txt")
            .tempfile_in(dir)
            .context("Failed to create TTS input file")?;
        text_file.write_all(text.as_bytes())?;
        text_file.flush()?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("-v")
            .arg(voice)
            .arg("-s")
            .arg(Self::words_per_minute(rate).to_string())
            .arg("-w")
            .arg(output)
            .arg("-f")
            .arg(text_file.path());

        run_with_timeout(&mut cmd, self.timeout)
            .with_context(|| format!("{} failed", self.program))?;
        Ok(())
    }
}

/// Check whether the synthesizer binary can be started.
pub fn synthesizer_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_per_minute() {
        assert_eq!(CommandSynthesizer::words_per_minute(1.0), 175);
        assert_eq!(CommandSynthesizer::words_per_minute(2.0), 350);
        assert_eq!(CommandSynthesizer::words_per_minute(0.1), 80);
        assert_eq!(CommandSynthesizer::words_per_minute(10.0), 450);
    }

    #[test]
    fn test_missing_program_is_error() {
        let synth = CommandSynthesizer::new("voiceover-no-such-tts", Duration::from_secs(1));
        let out = std::env::temp_dir().join(format!("voiceover_tts_{}.wav", std::process::id()));
        assert!(synth.synthesize("Hello", &out, "en", 1.0).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn test_blank_text_rejected() {
        let synth = CommandSynthesizer::default();
        let out = std::env::temp_dir().join("voiceover_tts_blank.wav");
        assert!(synth.synthesize("  ", &out, "en", 1.0).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_text_file_cleaned_up() {
        let dir = std::env::temp_dir().join(format!("voiceover_tts_clean_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // `true` accepts any arguments and writes nothing
        let synth = CommandSynthesizer::new("true", Duration::from_secs(5));
        synth.synthesize("Hello", &dir.join("out.wav"), "en", 1.0).unwrap();
        assert!(std::fs::read_dir(&dir).unwrap().next().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unavailable_program() {
        assert!(!synthesizer_available("voiceover-no-such-tts"));
    }
}
