//! Blocking subprocess execution with a hard timeout.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::error::TranscodeError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const STDERR_TAIL_BYTES: usize = 2048;

/// Run `cmd` to completion, killing it after `timeout`.
///
/// stdout is discarded and stderr is spooled to an anonymous temp file so a
/// chatty child can never block on a full pipe. A non-zero exit becomes
/// `TranscodeError::ExitStatus` carrying the tail of stderr.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<(), TranscodeError> {
    let program = cmd.get_program().to_string_lossy().to_string();
    let mut stderr_file = tempfile::tempfile()?;

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr_file.try_clone()?))
        .spawn()
        .map_err(|source| TranscodeError::Spawn {
            program: program.clone(),
            source,
        })?;

    let started = Instant::now();
    let status: ExitStatus = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(e.into());
            }
        }
        if started.elapsed() >= timeout {
            log::warn!("{} exceeded {}s, killing", program, timeout.as_secs_f64());
            kill_and_reap(&mut child);
            return Err(TranscodeError::TimedOut { program, timeout });
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    if status.success() {
        return Ok(());
    }

    stderr_file.seek(SeekFrom::Start(0))?;
    let mut raw = Vec::new();
    stderr_file.read_to_end(&mut raw)?;
    // ffmpeg output is not guaranteed to be UTF-8
    let text = String::from_utf8_lossy(&raw);
    let tail_start = text.len().saturating_sub(STDERR_TAIL_BYTES);
    let tail_start = (tail_start..text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len());

    Err(TranscodeError::ExitStatus {
        program,
        code: status.code(),
        stderr: text[tail_start..].trim().to_string(),
    })
}

/// Kill a child we are abandoning and collect its exit status.
fn kill_and_reap(child: &mut Child) {
    child.kill().ok();
    child.wait().ok();
}

/// True if `path` is an existing file with at least one byte.
pub fn is_nonempty_file(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
