use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use log::{debug, warn};
use crate::audio::cover_art::CoverArtCopier;
use crate::utils::file_ops::{file_size, remove_if_exists, staging_path};
use crate::{LibraryError, Result};

pub const MP3_BITRATE_KBPS: u32 = 320;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("encoder exited with code {}: {stderr}", .exit_code.map_or("<signal>".to_string(), |c| c.to_string()))]
    NonZeroExit { exit_code: Option<i32>, stderr: String },
    #[error("encoder timed out after {:.1}s", .timeout.as_secs_f64())]
    Timeout { timeout: Duration },
    #[error("encoder exited cleanly but produced no output")]
    EmptyOutput,
    #[error("failed to launch encoder: {0}")]
    Spawn(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns one source file into an MP3 at `destination`, blocking until done.
pub trait Encoder: Send + Sync {
    fn encode(&self, source: &Path, destination: &Path) -> std::result::Result<(), EncodeError>;
}

/// Runs an ffmpeg-compatible executable as a subprocess.
pub struct FfmpegEncoder {
    program: String,
    leading_args: Vec<String>,
    bitrate_kbps: u32,
    timeout: Option<Duration>,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            bitrate_kbps: MP3_BITRATE_KBPS,
            timeout: None,
        }
    }

    /// Arguments placed before the encoder arguments, for running the
    /// encoder through a wrapper such as `nice -n 10 ffmpeg`.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Kill the encoder if it runs longer than `timeout`. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Checks that the encoder can be launched at all.
    pub fn probe(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.leading_args)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| LibraryError::EncoderNotFound {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(LibraryError::EncoderNotFound {
                program: self.program.clone(),
                reason: format!("'-version' check exited with {}", status),
            });
        }
        Ok(())
    }

    pub fn build_args(&self, source: &Path, destination: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            source.to_string_lossy().to_string(),
            // Carry every readable tag over from the source.
            "-map_metadata".to_string(),
            "0".to_string(),
            "-id3v2_version".to_string(),
            "3".to_string(),
            "-codec:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.bitrate_kbps),
            // The destination may be a staging name without an .mp3 suffix.
            "-f".to_string(),
            "mp3".to_string(),
            destination.to_string_lossy().to_string(),
        ]
    }

    fn wait(&self, child: &mut Child) -> std::result::Result<ExitStatus, EncodeError> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    warn!("Lost track of encoder pid {}: {}", child.id(), e);
                    Self::terminate(child);
                    return Err(e.into());
                }
            }
            if Instant::now() >= deadline {
                warn!("Encoder exceeded {:?}, killing pid {}", timeout, child.id());
                Self::terminate(child);
                return Err(EncodeError::Timeout { timeout });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Kills the child and reaps it so no process outlives the item.
    fn terminate(child: &mut Child) {
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl Encoder for FfmpegEncoder {
    fn encode(&self, source: &Path, destination: &Path) -> std::result::Result<(), EncodeError> {
        let args = self.build_args(source, destination);
        debug!("Running {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EncodeError::Spawn(format!("{}: {}", self.program, e)))?;

        // Drain stderr on a side thread so a chatty encoder cannot fill the
        // pipe and stall while we wait on it.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        // On timeout the reader is left detached; it ends when the pipe closes.
        let status = self.wait(&mut child)?;

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .map(|buf| String::from_utf8_lossy(&buf).trim().to_string())
            .unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(EncodeError::NonZeroExit {
                exit_code: status.code(),
                stderr,
            })
        }
    }
}

/// Successful invocation, with any non-fatal problems met along the way.
#[derive(Debug, Default, PartialEq)]
pub struct EncodeSuccess {
    pub warnings: Vec<String>,
}

/// Wraps an [`Encoder`] with output staging, partial-output cleanup and
/// cover art copying.
pub struct EncoderInvoker {
    encoder: Arc<dyn Encoder>,
    cover_art: Option<CoverArtCopier>,
}

impl EncoderInvoker {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self {
            encoder,
            cover_art: None,
        }
    }

    pub fn with_cover_art(mut self, copier: Option<CoverArtCopier>) -> Self {
        self.cover_art = copier;
        self
    }

    /// Encodes `source` to `destination`.
    ///
    /// The encoder writes to a staging file that is renamed into place only
    /// after a clean exit. On any failure both the staging file and the
    /// destination are removed, so no file is left at the destination path.
    pub fn invoke(&self, source: &Path, destination: &Path) -> std::result::Result<EncodeSuccess, EncodeError> {
        let staging = staging_path(destination);
        remove_if_exists(&staging)?;

        let result = self
            .encoder
            .encode(source, &staging)
            .and_then(|()| match file_size(&staging) {
                Some(size) if size > 0 => Ok(()),
                _ => Err(EncodeError::EmptyOutput),
            })
            .and_then(|()| fs::rename(&staging, destination).map_err(EncodeError::from));

        if let Err(e) = result {
            Self::discard_partial(&staging, destination);
            return Err(e);
        }

        let mut success = EncodeSuccess::default();
        if let (Some(copier), Some(src_dir), Some(dst_dir)) = (&self.cover_art, source.parent(), destination.parent()) {
            success.warnings = copier.copy_siblings(src_dir, dst_dir).warnings;
        }
        Ok(success)
    }

    fn discard_partial(staging: &Path, destination: &Path) {
        for path in [staging, destination] {
            match remove_if_exists(path) {
                Ok(true) => debug!("Removed partial output {}", path.display()),
                Ok(false) => {}
                Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
            }
        }
    }
}
