//! External transcoder seam.
//!
//! `Transcoder` is the capability the extractor and concatenator consume;
//! `Ffmpeg` drives the real `ffmpeg` binary.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::error::TranscodeError;
use crate::process::{is_nonempty_file, run_with_timeout};

/// Audio transcoding operations used by the pipeline.
pub trait Transcoder {
    /// Extract the audio stream of `source` (path or URL) to mono 16 kHz
    /// 16-bit PCM WAV at `output`.
    fn extract_audio(
        &self,
        source: &str,
        output: &Path,
        timeout: Duration,
    ) -> Result<(), TranscodeError>;

    /// Stream-copy the inputs listed in a concat-demuxer manifest into `output`.
    fn concat(&self, manifest: &Path, output: &Path, timeout: Duration)
        -> Result<(), TranscodeError>;
}

/// `ffmpeg` command-line transcoder.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: String,
}

impl Ffmpeg {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn extract_args(source: &str, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-i".to_string(),
            source.to_string(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            "16000".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "wav".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    fn concat_args(manifest: &Path, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            manifest.to_string_lossy().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    fn run(&self, args: &[String], output: &Path, timeout: Duration) -> Result<(), TranscodeError> {
        log::debug!("{} {}", self.program, args.join(" "));
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        run_with_timeout(&mut cmd, timeout)?;
        if !is_nonempty_file(output) {
            return Err(TranscodeError::EmptyOutput(output.to_path_buf()));
        }
        Ok(())
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Transcoder for Ffmpeg {
    fn extract_audio(
        &self,
        source: &str,
        output: &Path,
        timeout: Duration,
    ) -> Result<(), TranscodeError> {
        self.run(&Self::extract_args(source, output), output, timeout)
    }

    fn concat(
        &self,
        manifest: &Path,
        output: &Path,
        timeout: Duration,
    ) -> Result<(), TranscodeError> {
        self.run(&Self::concat_args(manifest, output), output, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_args_mono_16k_pcm() {
        let args = Ffmpeg::extract_args("in.mp4", Path::new("/tmp/out.wav"));
        let joined = args.join(" ");
        assert!(joined.contains("-i in.mp4"));
        assert!(joined.contains("-vn"));
        assert!(joined.contains("-acodec pcm_s16le"));
        assert!(joined.contains("-ar 16000"));
        assert!(joined.contains("-ac 1"));
        assert!(joined.contains("-f wav"));
        assert_eq!(args.last().unwrap(), "/tmp/out.wav");
    }

    #[test]
    fn test_concat_args_stream_copy() {
        let args = Ffmpeg::concat_args(Path::new("/tmp/list.txt"), Path::new("/tmp/all.wav"));
        let joined = args.join(" ");
        assert!(joined.contains("-f concat -safe 0 -i /tmp/list.txt"));
        assert!(joined.contains("-c copy"));
        assert!(!joined.contains("pcm_s16le"));
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let ffmpeg = Ffmpeg::new("voiceover-no-such-ffmpeg");
        let result = ffmpeg.extract_audio(
            "in.mp4",
            Path::new("/tmp/voiceover_never_written.wav"),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(TranscodeError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_zero_exit_without_output_is_failure() {
        // `true` ignores its arguments and exits 0 without writing anything
        let ffmpeg = Ffmpeg::new("true");
        let out = std::env::temp_dir().join(format!("voiceover_true_{}.wav", std::process::id()));
        let result = ffmpeg.extract_audio("in.mp4", &out, Duration::from_secs(5));
        assert!(matches!(result, Err(TranscodeError::EmptyOutput(_))));
    }
}
