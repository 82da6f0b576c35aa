//! Audio extraction from a scene's visual source.
//!
//! The visual source may be a single video file, a video URL, or a
//! directory of videos (one is picked at random). Images are rejected up
//! front: they carry no audio.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

use super::classify::{classify, classify_local, is_url};
use super::transcoder::Transcoder;
use crate::config::PipelineConfig;
use crate::error::ExtractionFailure;
use crate::types::MediaKind;

/// Extracts mono 16 kHz WAV audio through a [`Transcoder`].
pub struct AudioExtractor<'a> {
    transcoder: &'a dyn Transcoder,
    local_timeout: Duration,
    remote_timeout: Duration,
}

impl<'a> AudioExtractor<'a> {
    pub fn new(transcoder: &'a dyn Transcoder, local_timeout: Duration, remote_timeout: Duration) -> Self {
        Self {
            transcoder,
            local_timeout,
            remote_timeout,
        }
    }

    pub fn from_config(transcoder: &'a dyn Transcoder, config: &PipelineConfig) -> Self {
        Self::new(
            transcoder,
            Duration::from_secs(config.local_extract_timeout_secs),
            Duration::from_secs(config.remote_extract_timeout_secs),
        )
    }

    /// Extract audio from `visual_source` into `output`.
    ///
    /// Policy, in order: image → fail; video file or URL → transcode;
    /// existing directory → random video inside it; anything else → fail.
    pub fn extract<R: Rng + ?Sized>(
        &self,
        visual_source: &str,
        output: &Path,
        rng: &mut R,
    ) -> Result<(), ExtractionFailure> {
        let source = visual_source.trim();

        if classify(source) == MediaKind::Image {
            log::info!("Image source, no audio to extract: {}", source);
            return Err(ExtractionFailure::ImageSource(source.to_string()));
        }

        if classify_local(source) == MediaKind::Video {
            log::info!("Extracting audio from video: {}", source);
            return self.extract_single(source, output);
        }

        let dir = Path::new(source);
        if !is_url(source) && dir.is_dir() {
            let videos = video_files_in(dir);
            let Some(selected) = videos.choose(rng) else {
                log::warn!("No video files found in directory: {}", dir.display());
                return Err(ExtractionFailure::NoVideoInDirectory(dir.to_path_buf()));
            };
            log::info!(
                "Picked {} from {} ({} videos)",
                selected.display(),
                dir.display(),
                videos.len()
            );
            return self.extract_single(&selected.to_string_lossy(), output);
        }

        log::warn!("Visual source is neither a video nor a directory: {}", source);
        Err(ExtractionFailure::Unrecognized(source.to_string()))
    }

    fn extract_single(&self, source: &str, output: &Path) -> Result<(), ExtractionFailure> {
        let timeout = if is_url(source) {
            self.remote_timeout
        } else {
            self.local_timeout
        };
        match self.transcoder.extract_audio(source, output, timeout) {
            Ok(()) => {
                log::info!("Extracted audio: {} -> {}", source, output.display());
                Ok(())
            }
            Err(e) => {
                log::warn!("Audio extraction failed for {}: {}", source, e);
                Err(e.into())
            }
        }
    }
}

/// Video files directly inside `dir`, sorted by path.
///
/// Sorting makes a seeded selection independent of directory listing order.
pub fn video_files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut videos: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && classify(&path.to_string_lossy()) == MediaKind::Video)
        .collect();
    videos.sort();
    videos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::io::write_wav;
    use crate::error::TranscodeError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    /// Writes a short WAV for every request and records what it was asked.
    struct RecordingTranscoder {
        calls: Mutex<Vec<(String, Duration)>>,
        fail: bool,
    }

    impl RecordingTranscoder {
        fn new(fail: bool) -> Self {
            Self { calls: Mutex::new(Vec::new()), fail }
        }

        fn calls(&self) -> Vec<(String, Duration)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Transcoder for RecordingTranscoder {
        fn extract_audio(&self, source: &str, output: &Path, timeout: Duration) -> Result<(), TranscodeError> {
            self.calls.lock().unwrap().push((source.to_string(), timeout));
            if self.fail {
                return Err(TranscodeError::ExitStatus {
                    program: "ffmpeg".to_string(),
                    code: Some(1),
                    stderr: "Output file does not contain any stream".to_string(),
                });
            }
            write_wav(output, &vec![0.1; 1600], 16000).unwrap();
            Ok(())
        }

        fn concat(&self, _: &Path, _: &Path, _: Duration) -> Result<(), TranscodeError> {
            unreachable!("extraction never concatenates")
        }
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("voiceover_extract_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn extractor(t: &RecordingTranscoder) -> AudioExtractor<'_> {
        AudioExtractor::new(t, Duration::from_secs(60), Duration::from_secs(300))
    }

    #[test]
    fn test_image_rejected_without_transcoding() {
        let t = RecordingTranscoder::new(false);
        let mut rng = StdRng::seed_from_u64(1);
        let out = scratch_dir("image").join("out.wav");

        let result = extractor(&t).extract("https://example.com/cover.png", &out, &mut rng);
        assert!(matches!(result, Err(ExtractionFailure::ImageSource(_))));
        assert!(t.calls().is_empty());

        std::fs::remove_dir_all(out.parent().unwrap()).ok();
    }

    #[test]
    fn test_local_video_uses_local_timeout() {
        let dir = scratch_dir("local");
        let video = dir.join("clip.mov");
        std::fs::write(&video, b"fake").unwrap();
        let out = dir.join("out.wav");

        let t = RecordingTranscoder::new(false);
        let mut rng = StdRng::seed_from_u64(1);
        extractor(&t).extract(video.to_str().unwrap(), &out, &mut rng).unwrap();

        let calls = t.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, video.to_string_lossy());
        assert_eq!(calls[0].1, Duration::from_secs(60));
        assert!(out.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_video_url_uses_remote_timeout() {
        let dir = scratch_dir("url");
        let out = dir.join("out.wav");
        let t = RecordingTranscoder::new(false);
        let mut rng = StdRng::seed_from_u64(1);

        extractor(&t)
            .extract("https://cdn.example.com/a/b.webm?token=1", &out, &mut rng)
            .unwrap();
        assert_eq!(t.calls()[0].1, Duration::from_secs(300));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_directory_picks_only_videos() {
        let dir = scratch_dir("dir");
        let media = dir.join("media");
        std::fs::create_dir_all(&media).unwrap();
        for name in ["a.mp4", "b.MP4", "cover.jpg", "notes.txt"] {
            std::fs::write(media.join(name), b"x").unwrap();
        }
        std::fs::create_dir_all(media.join("nested.mp4")).unwrap();

        let videos = video_files_in(&media);
        assert_eq!(videos, vec![media.join("a.mp4"), media.join("b.MP4")]);

        let t = RecordingTranscoder::new(false);
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = dir.join(format!("out-{}.wav", seed));
            extractor(&t).extract(media.to_str().unwrap(), &out, &mut rng).unwrap();
        }
        for (source, _) in t.calls() {
            assert!(source.ends_with("a.mp4") || source.ends_with("b.MP4"), "picked {}", source);
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_directory_selection_deterministic_with_seed() {
        let dir = scratch_dir("seeded");
        for name in ["1.mp4", "2.mp4", "3.mkv"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        let t = RecordingTranscoder::new(false);
        let out = dir.join("out.wav");

        let mut rng = StdRng::seed_from_u64(42);
        extractor(&t).extract(dir.to_str().unwrap(), &out, &mut rng).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        extractor(&t).extract(dir.to_str().unwrap(), &out, &mut rng).unwrap();

        let calls = t.calls();
        assert_eq!(calls[0].0, calls[1].0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_directory_without_videos_fails() {
        let dir = scratch_dir("novideo");
        std::fs::write(dir.join("a.png"), b"x").unwrap();
        std::fs::write(dir.join("b.jpeg"), b"x").unwrap();

        let t = RecordingTranscoder::new(false);
        let mut rng = StdRng::seed_from_u64(1);
        let result = extractor(&t).extract(dir.to_str().unwrap(), &dir.join("out.wav"), &mut rng);
        assert!(matches!(result, Err(ExtractionFailure::NoVideoInDirectory(_))));

        let empty = dir.join("empty");
        std::fs::create_dir_all(&empty).unwrap();
        let result = extractor(&t).extract(empty.to_str().unwrap(), &dir.join("out.wav"), &mut rng);
        assert!(matches!(result, Err(ExtractionFailure::NoVideoInDirectory(_))));
        assert!(t.calls().is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unrecognized_source() {
        let t = RecordingTranscoder::new(false);
        let mut rng = StdRng::seed_from_u64(1);
        let out = std::env::temp_dir().join("voiceover_unrecognized.wav");

        for source in ["/no/such/dir", "/no/such/clip.mp4", "https://example.com/page", ""] {
            let result = extractor(&t).extract(source, &out, &mut rng);
            assert!(matches!(result, Err(ExtractionFailure::Unrecognized(_))), "{}", source);
        }
        assert!(t.calls().is_empty());
    }

    #[test]
    fn test_transcoder_failure_is_value_not_panic() {
        let dir = scratch_dir("fail");
        let video = dir.join("silent.mp4");
        std::fs::write(&video, b"fake").unwrap();

        let t = RecordingTranscoder::new(true);
        let mut rng = StdRng::seed_from_u64(1);
        let result = extractor(&t).extract(video.to_str().unwrap(), &dir.join("out.wav"), &mut rng);
        assert!(matches!(result, Err(ExtractionFailure::Transcode(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
