//! Per-run work directory and temp-file ownership.
//!
//! Every run gets its own directory `<root>/<YYYY-MM-DD>-<id>`. Segment
//! files are named from the scene index plus a v4 UUID so concurrent runs
//! never collide. Scratch files (downloads, manifests) are created inside the
//! run directory by their owners and removed as soon as they are consumed.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

pub struct Workspace {
    run_dir: PathBuf,
    segments: Vec<PathBuf>,
}

impl Workspace {
    /// Create a unique run directory inside `root`.
    ///
    /// `run_name` replaces the random id part; the date prefix is always
    /// added. Collisions get -2, -3, ... appended.
    pub fn create(root: &Path, run_name: Option<&str>) -> io::Result<Self> {
        let id = match run_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => short_id(),
        };
        let base_name = format!("{}-{}", today(), id);

        std::fs::create_dir_all(root)?;
        // create_dir fails on an existing directory, so a concurrent run
        // with the same name moves on to the next suffix.
        let mut candidate = root.join(&base_name);
        let mut counter = 2u32;
        loop {
            match std::fs::create_dir(&candidate) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = root.join(format!("{}-{}", base_name, counter));
                    counter += 1;
                }
                Err(e) => return Err(e),
            }
        }
        log::debug!("Work directory: {}", candidate.display());

        Ok(Self {
            run_dir: candidate,
            segments: Vec::new(),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Reserve a fresh path for a scene's audio segment.
    pub fn segment_path(&mut self, scene_index: usize) -> PathBuf {
        let path = self
            .run_dir
            .join(format!("scene-{:03}-{}.wav", scene_index + 1, short_id()));
        self.segments.push(path.clone());
        path
    }

    /// Path for a final artifact inside the run directory.
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.run_dir.join(name)
    }

    /// Remove every segment file created by this run. Used on abort.
    pub fn discard_segments(&mut self) {
        for path in self.segments.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => log::debug!("Removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

/// First 8 hex digits of a v4 UUID.
fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Today's date as YYYY-MM-DD (UTC).
fn today() -> String {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let (year, month, day) = days_to_date((since_epoch.as_secs() / 86400) as i64);
    format!("{:04}-{:02}-{:02}", year, month, day)
}

/// Convert days since Unix epoch to (year, month, day).
fn days_to_date(days: i64) -> (i32, u32, u32) {
    // Howard Hinnant's civil_from_days
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}
