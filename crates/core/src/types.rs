use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One narrative unit: an optional script source plus a visual source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    /// Position in the scene list (0-based)
    #[serde(default)]
    pub index: usize,
    /// Inline text, local script path, or http(s) URL
    #[serde(default, alias = "text")]
    pub text_source: Option<String>,
    /// Video file, image, directory of videos, or media URL
    #[serde(alias = "visual")]
    pub visual_source: String,
}

impl Scene {
    pub fn new(index: usize, text_source: Option<&str>, visual_source: &str) -> Self {
        Self {
            index,
            text_source: text_source.map(|s| s.to_string()),
            visual_source: visual_source.to_string(),
        }
    }

    /// 1-based number used in user-facing messages.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// A scene after its text source has been resolved to a single line.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedScene {
    pub scene_index: usize,
    /// Empty means "derive audio from the visual source".
    pub narration_text: String,
}

/// Where a scene's audio came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioSource {
    Synthesized,
    ExtractedFromVideo,
}

/// The one audio segment produced for a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAudioResult {
    pub scene_index: usize,
    /// Segment file. Transient: `Pipeline::assemble` deletes it once merged.
    #[serde(skip)]
    pub audio_file: PathBuf,
    pub source: AudioSource,
    /// Length after normalization, in seconds
    pub duration_secs: f64,
}

/// Media classification derived purely from the path/URL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Image,
    Unknown,
}

/// Result of a successful assembly run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyOutput {
    pub merged: PathBuf,
    pub scenes: Vec<SceneAudioResult>,
    /// Degradations the caller should surface (failed fetches, TTS fallbacks).
    pub warnings: Vec<String>,
}

/// One recognized sentence with timing in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub text: String,
    pub begin_ms: u64,
    pub end_ms: u64,
}
