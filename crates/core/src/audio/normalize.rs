//! Segment normalization: one sample rate, mono 16-bit, padded length.
//!
//! Every scene segment goes through here before concatenation, whatever its
//! origin, so the stream-copy concat sees identical formats and the video
//! timeline can rely on a minimum per-scene length.

use std::path::Path;

use anyhow::{Context, Result};

use super::io::{read_wav, resample};
use crate::config::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeSpec {
    pub sample_rate: u32,
    /// Silence always appended after the speech (seconds)
    pub trailing_silence: f64,
    /// Floor on the final length (seconds)
    pub min_duration: f64,
}

impl Default for NormalizeSpec {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            trailing_silence: 1.0,
            min_duration: 1.0,
        }
    }
}

impl From<&PipelineConfig> for NormalizeSpec {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            trailing_silence: config.trailing_silence_secs,
            min_duration: config.min_duration_secs,
        }
    }
}

/// Normalize the WAV at `path` in place. Returns the new duration in seconds.
///
/// The rewrite goes through a temp file in the same directory and is
/// renamed over the original, so a failure leaves the input untouched.
pub fn normalize_segment(path: &Path, spec: &NormalizeSpec) -> Result<f64> {
    let (samples, sr) = read_wav(path)?;
    let mut samples = resample(&samples, sr, spec.sample_rate)?;

    let rate = spec.sample_rate as f64;
    let tail = (spec.trailing_silence * rate).round() as usize;
    let floor = (spec.min_duration * rate).round() as usize;
    let target_len = (samples.len() + tail).max(floor);
    samples.resize(target_len, 0.0);

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::Builder::new()
        .prefix(".normalize-")
        .suffix(".wav")
        .tempfile_in(dir)
        .context("Failed to create temp file for normalization")?;
    super::io::write_wav(tmp.path(), &samples, spec.sample_rate)?;
    tmp.persist(path)
        .map_err(|e| anyhow::anyhow!("Failed to replace {}: {}", path.display(), e))?;

    let duration = target_len as f64 / rate;
    log::debug!("Normalized {} to {:.2}s", path.display(), duration);
    Ok(duration)
}
