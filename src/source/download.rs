//! Download adapter: decode a network stream to mono f32 via ffmpeg.

use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::config::SyncConfig;
use crate::error::SourceError;
use crate::source::SampleSource;

/// Decodes the audio of a media URL through an ffmpeg child process.
///
/// The child writes little-endian f32 mono samples at the pipeline rate
/// to a pipe; `read` pulls blocks off that pipe. Page URLs are resolved
/// to direct media URLs with `yt-dlp` first, falling back to the URL as
/// given when resolution fails (direct stream URLs need none).
///
/// `stop` kills and reaps the child; dropping the source does the same,
/// so an abandoned download never leaves an orphan decoder behind.
pub struct DownloadSource {
    child: Child,
    stdout: ChildStdout,
    /// Bytes of a trailing partial sample from the previous read.
    carry: Vec<u8>,
    scratch: Vec<u8>,
    stopped: bool,
}

impl DownloadSource {
    /// Launches the decode pipeline for `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if ffmpeg cannot be spawned. Decode
    /// failures after launch surface later, through `read`.
    pub fn spawn(url: &str, config: &SyncConfig) -> Result<Self, SourceError> {
        let media_url = match resolve_media_url(url) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::debug!(error = %err, "URL resolution failed, passing URL to ffmpeg as-is");
                url.to_string()
            }
        };

        let mut child = Command::new("ffmpeg")
            .args([
                "-nostdin",
                "-loglevel",
                "error",
                "-i",
                &media_url,
                "-vn",
                "-f",
                "f32le",
                "-ac",
                "1",
                "-ar",
                &config.sample_rate.to_string(),
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SourceError::Spawn {
                command: "ffmpeg".to_string(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| SourceError::Spawn {
            command: "ffmpeg".to_string(),
            reason: "stdout was not piped".to_string(),
        })?;

        tracing::info!(rate = config.sample_rate, "decode process started");
        Ok(Self {
            child,
            stdout,
            carry: Vec::new(),
            scratch: Vec::new(),
            stopped: false,
        })
    }

    /// Kills and reaps the child if it is still running.
    fn stop_child(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if self.child.kill().is_ok() {
            let _ = self.child.wait();
        }
    }
}

impl SampleSource for DownloadSource {
    fn read(&mut self, out: &mut [f32]) -> Result<usize, SourceError> {
        loop {
            let want_bytes = out.len() * 4;
            let carried = self.carry.len();
            self.scratch.resize(want_bytes.max(carried + 4), 0);
            self.scratch[..carried].copy_from_slice(&self.carry);

            let read = self
                .stdout
                .read(&mut self.scratch[carried..])
                .map_err(|e| SourceError::backend(e.to_string()))?;

            if read == 0 {
                if carried > 0 {
                    tracing::warn!(bytes = carried, "stream ended mid-sample");
                }
                self.stopped = true;
                return match self.child.wait() {
                    Ok(status) if status.success() => Ok(0),
                    Ok(status) => Err(SourceError::backend(format!("ffmpeg exited with {status}"))),
                    Err(e) => Err(SourceError::backend(e.to_string())),
                };
            }

            let total = carried + read;
            let samples = decode_f32le(&self.scratch[..total], out);
            self.carry.clear();
            self.carry.extend_from_slice(&self.scratch[samples * 4..total]);
            if samples > 0 {
                return Ok(samples);
            }
            // Fewer than four bytes arrived; read again.
        }
    }

    fn stop(&mut self) {
        self.stop_child();
    }
}

impl Drop for DownloadSource {
    fn drop(&mut self) {
        self.stop_child();
    }
}

/// Resolves a page URL to a direct media URL with yt-dlp.
fn resolve_media_url(url: &str) -> Result<String, SourceError> {
    let output = Command::new("yt-dlp")
        .args(["--quiet", "--get-url", "--format", "bestaudio/best", url])
        .output()
        .map_err(|e| SourceError::Spawn {
            command: "yt-dlp".to_string(),
            reason: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(SourceError::backend(format!(
            "yt-dlp exited with {}",
            output.status
        )));
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SourceError::backend("yt-dlp returned no URL"))
}

/// Converts whole little-endian f32 samples from `bytes` into `out`.
/// Returns the number of samples written; trailing partial bytes are the
/// caller's to carry over.
fn decode_f32le(bytes: &[u8], out: &mut [f32]) -> usize {
    let mut written = 0;
    for (sample, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *sample = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        written += 1;
    }
    written
}
