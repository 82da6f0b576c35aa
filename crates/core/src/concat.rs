//! Lossless concatenation of scene segments.
//!
//! Segments are joined with the transcoder's concat demuxer and stream copy.
//! All inputs were normalized to the same format beforehand, so no
//! re-encoding is needed. The manifest lives only for the duration of the
//! transcoder call.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PipelineError;
use crate::media::transcoder::Transcoder;

/// Build concat-demuxer manifest text: one `file '<abs path>'` per input.
pub fn concat_manifest(files: &[PathBuf]) -> std::io::Result<String> {
    let mut manifest = String::new();
    for file in files {
        let abs = absolute(file)?;
        // Inside single quotes, a literal ' is written as '\''
        let escaped = abs.to_string_lossy().replace('\'', "'\\''");
        manifest.push_str(&format!("file '{}'\n", escaped));
    }
    Ok(manifest)
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(p) => Ok(p),
        Err(_) if path.is_absolute() => Ok(path.to_path_buf()),
        Err(_) => Ok(std::env::current_dir()?.join(path)),
    }
}

pub struct AudioConcatenator<'a> {
    transcoder: &'a dyn Transcoder,
    timeout: Duration,
}

impl<'a> AudioConcatenator<'a> {
    pub fn new(transcoder: &'a dyn Transcoder, timeout: Duration) -> Self {
        Self { transcoder, timeout }
    }

    /// Concatenate `files` in order into `output`.
    ///
    /// The manifest is written to `scratch_dir` and removed before this
    /// returns, whatever the outcome. Any transcoder failure is fatal.
    pub fn concat(
        &self,
        files: &[PathBuf],
        scratch_dir: &Path,
        output: &Path,
    ) -> Result<PathBuf, PipelineError> {
        if files.is_empty() {
            return Err(PipelineError::NoScenes);
        }

        let manifest_text = concat_manifest(files)?;
        let mut manifest = tempfile::Builder::new()
            .prefix("concat-")
            .suffix(".txt")
            .tempfile_in(scratch_dir)?;
        manifest.write_all(manifest_text.as_bytes())?;
        manifest.flush()?;
        log::debug!(
            "Concat manifest ({} entries): {}",
            files.len(),
            manifest.path().display()
        );

        let result = self.transcoder.concat(manifest.path(), output, self.timeout);

        let manifest_path = manifest.path().to_path_buf();
        if let Err(e) = manifest.close() {
            log::warn!("Could not remove {}: {}", manifest_path.display(), e);
        }

        match result {
            Ok(()) => {
                log::info!("Merged {} segments into {}", files.len(), output.display());
                Ok(output.to_path_buf())
            }
            Err(e) => {
                log::error!("Concatenation failed: {}", e);
                Err(PipelineError::Concat(e.to_string()))
            }
        }
    }
}
