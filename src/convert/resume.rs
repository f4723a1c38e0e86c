use std::path::Path;
use log::debug;
use crate::utils::file_ops::file_size;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    ShouldSkip,
    ShouldProcess,
}

/// Decides whether a destination already holds a finished conversion.
///
/// The check is presence plus non-zero size; no checksum is computed. This is
/// sound here because encoder output is staged under a temporary name and
/// only renamed to the destination after a clean exit, so a file at the
/// destination path was written completely by an earlier run.
#[derive(Debug, Clone, Copy)]
pub struct ResumeGuard {
    enabled: bool,
}

impl ResumeGuard {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// A guard that never skips (`--force`).
    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn check(&self, destination: &Path) -> ResumeDecision {
        if !self.enabled {
            return ResumeDecision::ShouldProcess;
        }
        match file_size(destination) {
            Some(size) if size > 0 => {
                debug!("Existing output found, skipping: {}", destination.display());
                ResumeDecision::ShouldSkip
            }
            _ => ResumeDecision::ShouldProcess,
        }
    }
}

impl Default for ResumeGuard {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn skips_only_non_empty_existing_files() {
        let dir = tempdir().unwrap();
        let guard = ResumeGuard::default();

        let missing = dir.path().join("missing.mp3");
        assert_eq!(guard.check(&missing), ResumeDecision::ShouldProcess);

        let empty = dir.path().join("empty.mp3");
        fs::write(&empty, b"").unwrap();
        assert_eq!(guard.check(&empty), ResumeDecision::ShouldProcess);

        let done = dir.path().join("done.mp3");
        fs::write(&done, b"ID3").unwrap();
        assert_eq!(guard.check(&done), ResumeDecision::ShouldSkip);
    }

    #[test]
    fn directories_are_never_treated_as_output() {
        let dir = tempdir().unwrap();
        let odd = dir.path().join("odd.mp3");
        fs::create_dir(&odd).unwrap();
        assert_eq!(ResumeGuard::default().check(&odd), ResumeDecision::ShouldProcess);
    }

    #[test]
    fn disabled_guard_always_processes() {
        let dir = tempdir().unwrap();
        let done = dir.path().join("done.mp3");
        fs::write(&done, b"ID3").unwrap();
        let guard = ResumeGuard::disabled();
        assert!(!guard.is_enabled());
        assert_eq!(guard.check(&done), ResumeDecision::ShouldProcess);
    }
}
