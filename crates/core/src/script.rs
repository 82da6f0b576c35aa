//! Scene script resolution.
//!
//! A scene's text source is an http(s) URL, a local script file, or inline
//! narration. Script files hold one candidate line per row; one non-empty
//! line is chosen at random. Every failure degrades to empty text plus a
//! warning, which sends the scene down the extraction path.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::media::classify::is_url;
use crate::types::ResolvedScene;

/// Downloads a remote script into a writer.
pub trait TextFetcher {
    /// Stream the body of `url` into `dest`. Returns bytes written.
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> Result<u64>;
}

/// Blocking HTTP GET with a whole-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl TextFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        #[cfg(feature = "remote-fetch")]
        {
            let client = reqwest::blocking::Client::builder()
                .timeout(self.timeout)
                .build()
                .context("Failed to build HTTP client")?;

            let mut response = client
                .get(url)
                .send()
                .with_context(|| format!("Request failed: {}", url))?;
            if !response.status().is_success() {
                anyhow::bail!("HTTP {} for {}", response.status(), url);
            }

            let written = std::io::copy(&mut response, dest)
                .with_context(|| format!("Error reading body of {}", url))?;
            Ok(written)
        }

        #[cfg(not(feature = "remote-fetch"))]
        {
            let _ = (dest, self.timeout);
            anyhow::bail!(
                "Cannot fetch {}: built without the 'remote-fetch' feature",
                url
            );
        }
    }
}

/// Outcome of resolving one text source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedText {
    /// One narration line, or empty.
    pub text: String,
    /// Set when a provided source could not be used.
    pub warning: Option<String>,
}

impl ResolvedText {
    fn empty_with_warning(message: String) -> Self {
        log::warn!("{}", message);
        Self {
            text: String::new(),
            warning: Some(message),
        }
    }
}

/// Resolves text sources; downloads land in `scratch_dir`.
pub struct ScriptResolver<'a> {
    fetcher: &'a dyn TextFetcher,
    scratch_dir: PathBuf,
}

impl<'a> ScriptResolver<'a> {
    pub fn new(fetcher: &'a dyn TextFetcher, scratch_dir: &Path) -> Self {
        Self {
            fetcher,
            scratch_dir: scratch_dir.to_path_buf(),
        }
    }

    /// Resolve a text source to a single narration line.
    pub fn resolve<R: Rng + ?Sized>(&self, source: Option<&str>, rng: &mut R) -> ResolvedText {
        let source = match source.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return ResolvedText::default(),
        };

        if is_url(source) {
            return self.resolve_remote(source, rng);
        }

        let path = Path::new(source);
        if path.is_file() {
            return resolve_file(path, rng);
        }
        if looks_like_path(source) {
            return ResolvedText::empty_with_warning(format!(
                "Script file not found: {}",
                source
            ));
        }

        ResolvedText {
            text: pick_line(source, rng).unwrap_or_default(),
            warning: None,
        }
    }

    /// Resolve every scene's text source, in order.
    pub fn resolve_scenes<R: Rng + ?Sized>(
        &self,
        scenes: &[crate::types::Scene],
        rng: &mut R,
        warnings: &mut Vec<String>,
    ) -> Vec<ResolvedScene> {
        scenes
            .iter()
            .map(|scene| {
                let resolved = self.resolve(scene.text_source.as_deref(), rng);
                if let Some(w) = resolved.warning {
                    warnings.push(format!("scene {}: {}", scene.number(), w));
                }
                ResolvedScene {
                    scene_index: scene.index,
                    narration_text: resolved.text,
                }
            })
            .collect()
    }

    fn resolve_remote<R: Rng + ?Sized>(&self, url: &str, rng: &mut R) -> ResolvedText {
        let mut tmp = match tempfile::Builder::new()
            .prefix("script-")
            .suffix(".txt")
            .tempfile_in(&self.scratch_dir)
        {
            Ok(f) => f,
            Err(e) => {
                return ResolvedText::empty_with_warning(format!(
                    "Could not create temp file for {}: {}",
                    url, e
                ))
            }
        };

        let fetched = self
            .fetcher
            .fetch(url, tmp.as_file_mut())
            .and_then(|n| tmp.as_file_mut().flush().map(|_| n).map_err(Into::into));

        let result = match fetched {
            Ok(bytes) => {
                log::debug!("Downloaded {} bytes from {}", bytes, url);
                resolve_file(tmp.path(), rng)
            }
            Err(e) => ResolvedText::empty_with_warning(format!(
                "Could not download script {}: {:#}",
                url, e
            )),
        };

        let tmp_path = tmp.path().to_path_buf();
        if let Err(e) = tmp.close() {
            log::warn!("Could not remove {}: {}", tmp_path.display(), e);
        }
        result
    }
}

/// Join resolved narration lines into one script, skipping empty scenes.
pub fn narration_script(scenes: &[ResolvedScene]) -> String {
    scenes
        .iter()
        .map(|s| s.narration_text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve_file<R: Rng + ?Sized>(path: &Path, rng: &mut R) -> ResolvedText {
    match read_script(path) {
        Ok(content) => match pick_line(&content, rng) {
            Some(line) => ResolvedText {
                text: line,
                warning: None,
            },
            None => ResolvedText::empty_with_warning(format!(
                "Script file has no text: {}",
                path.display()
            )),
        },
        Err(e) => ResolvedText::empty_with_warning(format!("{:#}", e)),
    }
}

fn read_script(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// One non-empty trimmed line, chosen uniformly.
fn pick_line<R: Rng + ?Sized>(content: &str, rng: &mut R) -> Option<String> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines.choose(rng).map(|l| l.to_string())
}

/// Heuristic for "this was meant to be a file": a path separator, or a
/// short alphanumeric extension on a single word.
fn looks_like_path(source: &str) -> bool {
    if source.contains('/') || source.contains('\\') {
        return true;
    }
    if source.chars().any(char::is_whitespace) {
        return false;
    }
    match source.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (1..=4).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}
