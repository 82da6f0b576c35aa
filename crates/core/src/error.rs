//! Typed failure values for the assembly pipeline.
//!
//! Step-level failures (`TranscodeError`, `ExtractionFailure`,
//! `SynthesisFailure`) are ordinary values the orchestrator inspects to pick
//! the next transition. Only `PipelineError` crosses the public boundary.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// An external transcoder invocation that did not produce usable output.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with code {code:?}: {stderr}")]
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{program} timed out after {}s", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
    #[error("output file missing or empty: {}", .0.display())]
    EmptyOutput(PathBuf),
    #[error("I/O error while running transcoder: {0}")]
    Io(#[from] std::io::Error),
}

/// Why audio could not be extracted from a visual source.
#[derive(Debug, Error)]
pub enum ExtractionFailure {
    #[error("image source carries no audio: {0}")]
    ImageSource(String),
    #[error("no video files found in directory: {}", .0.display())]
    NoVideoInDirectory(PathBuf),
    #[error("neither a video reference nor a directory: {0}")]
    Unrecognized(String),
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
    #[error("could not normalize extracted audio: {0}")]
    Normalize(String),
}

/// Why text-to-speech did not yield a usable segment.
#[derive(Debug, Error)]
pub enum SynthesisFailure {
    #[error("{0}")]
    Service(String),
    #[error("synthesized audio missing or empty: {}", .0.display())]
    EmptyOutput(PathBuf),
    #[error("could not normalize synthesized audio: {0}")]
    Normalize(String),
}

/// Fatal outcome of an assembly run. No partial output accompanies it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no scenes to assemble")]
    NoScenes,
    #[error("scene {scene}: {message}")]
    SceneFatal { scene: usize, message: String },
    #[error("audio concatenation failed: {0}")]
    Concat(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("work directory error: {0}")]
    Workspace(#[from] std::io::Error),
}

impl PipelineError {
    /// 1-based scene number for scene-level failures.
    pub fn scene(&self) -> Option<usize> {
        match self {
            PipelineError::SceneFatal { scene, .. } => Some(*scene),
            _ => None,
        }
    }
}

/// Invalid or missing configuration, detected before any scene runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_fatal_message_names_scene() {
        let err = PipelineError::SceneFatal {
            scene: 4,
            message: "visual source is an image".to_string(),
        };
        assert_eq!(err.scene(), Some(4));
        assert!(err.to_string().starts_with("scene 4:"));
    }

    #[test]
    fn test_extraction_wraps_transcode() {
        let err: ExtractionFailure = TranscodeError::EmptyOutput(PathBuf::from("/tmp/x.wav")).into();
        assert!(err.to_string().contains("/tmp/x.wav"));
    }
}
