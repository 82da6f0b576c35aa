//! Narration assembly: one audio segment per scene, then one merged track.
//!
//! Scenes are processed strictly in order. Each scene runs through a small
//! state machine: synthesize the narration if there is any, otherwise or on
//! failure fall back to extracting audio from the visual source. A scene
//! with no remaining option is fatal for the whole run: segments produced so
//! far are discarded and concatenation is never reached.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;

use crate::audio::normalize::{normalize_segment, NormalizeSpec};
use crate::concat::AudioConcatenator;
use crate::config::PipelineConfig;
use crate::error::{ExtractionFailure, PipelineError, SynthesisFailure};
use crate::media::classify::classify;
use crate::media::extract::AudioExtractor;
use crate::media::transcoder::Transcoder;
use crate::process::is_nonempty_file;
use crate::script::{ScriptResolver, TextFetcher};
use crate::tts::SpeechSynthesizer;
use crate::types::{AssemblyOutput, AudioSource, MediaKind, Scene, SceneAudioResult};
use crate::workspace::Workspace;

/// File name of the merged track inside the run directory.
pub const MERGED_FILE_NAME: &str = "narration.wav";

/// Per-scene processing state.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneState {
    Start,
    TryingSynthesis,
    SynthesisSucceeded(f64),
    SynthesisFailed(String),
    TryingExtraction,
    ExtractionSucceeded(f64),
    ExtractionFailed(String),
    SceneDone(AudioSource, f64),
    SceneFatal(String),
}

/// The assembly pipeline and its collaborators.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    synthesizer: &'a dyn SpeechSynthesizer,
    transcoder: &'a dyn Transcoder,
    fetcher: &'a dyn TextFetcher,
    run_name: Option<String>,
}

impl<'a> Pipeline<'a> {
    /// Validates the configuration before any scene is touched.
    pub fn new(
        config: PipelineConfig,
        synthesizer: &'a dyn SpeechSynthesizer,
        transcoder: &'a dyn Transcoder,
        fetcher: &'a dyn TextFetcher,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            synthesizer,
            transcoder,
            fetcher,
            run_name: None,
        })
    }

    /// Fixed name for the run directory instead of a random id.
    pub fn with_run_name(mut self, name: &str) -> Self {
        self.run_name = Some(name.to_string());
        self
    }

    /// Build the merged narration track for `scenes`.
    ///
    /// Scene indices are reassigned from list position. On any fatal scene
    /// the error names that scene and no merged file is produced. Segment
    /// files are deleted on every exit path; only the merged track remains.
    pub fn assemble<R: Rng + ?Sized>(
        &self,
        mut scenes: Vec<Scene>,
        rng: &mut R,
    ) -> Result<AssemblyOutput, PipelineError> {
        if scenes.is_empty() {
            return Err(PipelineError::NoScenes);
        }
        for (i, scene) in scenes.iter_mut().enumerate() {
            scene.index = i;
        }

        let mut workspace = Workspace::create(&self.config.output_dir, self.run_name.as_deref())?;
        log::info!(
            "Assembling narration for {} scene(s) in {}",
            scenes.len(),
            workspace.run_dir().display()
        );

        let mut warnings = Vec::new();
        let resolver = ScriptResolver::new(self.fetcher, workspace.run_dir());
        let resolved = resolver.resolve_scenes(&scenes, rng, &mut warnings);

        let mut results = Vec::with_capacity(scenes.len());
        for (scene, text) in scenes.iter().zip(&resolved) {
            let output = workspace.segment_path(scene.index);
            match self.run_scene(scene, &text.narration_text, &output, rng, &mut warnings) {
                Ok(result) => results.push(result),
                Err(e) => {
                    log::error!("{}", e);
                    workspace.discard_segments();
                    return Err(e);
                }
            }
        }

        let files: Vec<PathBuf> = results.iter().map(|r| r.audio_file.clone()).collect();
        let concatenator = AudioConcatenator::new(
            self.transcoder,
            Duration::from_secs(self.config.concat_timeout_secs),
        );
        let merged = workspace.output_path(MERGED_FILE_NAME);
        let merged = concatenator.concat(&files, workspace.run_dir(), &merged);
        workspace.discard_segments();
        let merged = merged?;

        Ok(AssemblyOutput {
            merged,
            scenes: results,
            warnings,
        })
    }

    /// Produce the audio segment for one scene at `output`.
    pub fn run_scene<R: Rng + ?Sized>(
        &self,
        scene: &Scene,
        narration: &str,
        output: &Path,
        rng: &mut R,
        warnings: &mut Vec<String>,
    ) -> Result<SceneAudioResult, PipelineError> {
        let number = scene.number();
        let has_text = !narration.trim().is_empty();
        let visual_is_image = classify(&scene.visual_source) == MediaKind::Image;

        let mut state = SceneState::Start;
        loop {
            log::debug!("Scene {}: {:?}", number, state);
            state = match state {
                SceneState::Start if has_text => SceneState::TryingSynthesis,
                SceneState::Start if visual_is_image => SceneState::SceneFatal(
                    "the visual source is an image, which has no audio. Provide a script for \
                     this scene so narration can be synthesized, or use a video file/URL \
                     instead of an image"
                        .to_string(),
                ),
                SceneState::Start => {
                    log::info!("Scene {}: no script, extracting audio from visual source", number);
                    SceneState::TryingExtraction
                }

                SceneState::TryingSynthesis => {
                    log::info!("Scene {}: synthesizing narration", number);
                    match self.synthesize(narration, output) {
                        Ok(duration) => SceneState::SynthesisSucceeded(duration),
                        Err(e) => SceneState::SynthesisFailed(e.to_string()),
                    }
                }
                SceneState::SynthesisSucceeded(duration) => {
                    SceneState::SceneDone(AudioSource::Synthesized, duration)
                }
                SceneState::SynthesisFailed(reason) if visual_is_image => SceneState::SceneFatal(format!(
                    "text-to-speech failed ({}) and the visual source is an image, so there \
                     is no audio to fall back on. Fix the TTS configuration or use a video \
                     file/URL instead of an image",
                    reason
                )),
                SceneState::SynthesisFailed(reason) => {
                    let warning = format!(
                        "scene {}: text-to-speech failed ({}), using audio from the visual source instead",
                        number, reason
                    );
                    log::warn!("{}", warning);
                    warnings.push(warning);
                    remove_partial(output);
                    SceneState::TryingExtraction
                }

                SceneState::TryingExtraction => match self.extract(&scene.visual_source, output, rng) {
                    Ok(duration) => SceneState::ExtractionSucceeded(duration),
                    Err(e) => SceneState::ExtractionFailed(e.to_string()),
                },
                SceneState::ExtractionSucceeded(duration) => {
                    SceneState::SceneDone(AudioSource::ExtractedFromVideo, duration)
                }
                SceneState::ExtractionFailed(reason) => {
                    remove_partial(output);
                    let hint = if has_text {
                        "Make sure the visual directory contains video files, or use a video file/URL"
                    } else {
                        "Provide a script for this scene, or make sure the visual directory \
                         contains video files, or use a video file/URL"
                    };
                    SceneState::SceneFatal(format!("could not extract audio ({}). {}", reason, hint))
                }

                SceneState::SceneDone(source, duration_secs) => {
                    log::info!("Scene {}: done ({:?}, {:.2}s)", number, source, duration_secs);
                    return Ok(SceneAudioResult {
                        scene_index: scene.index,
                        audio_file: output.to_path_buf(),
                        source,
                        duration_secs,
                    });
                }
                SceneState::SceneFatal(message) => {
                    return Err(PipelineError::SceneFatal {
                        scene: number,
                        message,
                    });
                }
            };
        }
    }

    /// Synthesize, verify the file, normalize. Returns the segment length.
    fn synthesize(&self, text: &str, output: &Path) -> Result<f64, SynthesisFailure> {
        self.synthesizer
            .synthesize(text, output, &self.config.voice, self.config.rate)
            .map_err(|e| SynthesisFailure::Service(format!("{:#}", e)))?;
        // Some engines report success and leave nothing behind
        if !is_nonempty_file(output) {
            return Err(SynthesisFailure::EmptyOutput(output.to_path_buf()));
        }
        normalize_segment(output, &NormalizeSpec::from(&self.config))
            .map_err(|e| SynthesisFailure::Normalize(format!("{:#}", e)))
    }

    /// Extract from the visual source, normalize. Returns the segment length.
    fn extract<R: Rng + ?Sized>(
        &self,
        visual_source: &str,
        output: &Path,
        rng: &mut R,
    ) -> Result<f64, ExtractionFailure> {
        AudioExtractor::from_config(self.transcoder, &self.config).extract(visual_source, output, rng)?;
        normalize_segment(output, &NormalizeSpec::from(&self.config))
            .map_err(|e| ExtractionFailure::Normalize(format!("{:#}", e)))
    }
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Could not remove partial segment {}: {}", path.display(), e);
        }
    }
}
