use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use crate::Result;

const STAGING_SUFFIX: &str = "part";

pub fn ensure_directory(path: impl AsRef<Path>) -> Result<()> {
    fs::create_dir_all(path.as_ref())?;
    Ok(())
}

/// Path the encoder writes to before the output is moved into place.
pub fn staging_path(destination: &Path) -> PathBuf {
    append_to_file_name(destination, &format!(".{}", STAGING_SUFFIX))
}

/// A sibling temp path unique to the calling thread, so concurrent writers
/// of the same target never share a temp file.
pub fn temp_sibling(target: &Path) -> PathBuf {
    let thread_tag: String = format!("{:?}", std::thread::current().id())
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    append_to_file_name(target, &format!(".{}-{}.tmp", std::process::id(), thread_tag))
}

fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Removes `path` if it exists. Returns whether a file was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Size of the file at `path`, or `None` if it is missing or not a file.
pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Copies `source` to `destination` through a temp sibling and a rename, so
/// readers never observe a half-copied file.
pub fn copy_atomic(source: &Path, destination: &Path) -> io::Result<u64> {
    let temp = temp_sibling(destination);
    let copied = match fs::copy(source, &temp) {
        Ok(n) => n,
        Err(e) => {
            let _ = remove_if_exists(&temp);
            return Err(e);
        }
    };
    if let Err(e) = fs::rename(&temp, destination) {
        let _ = remove_if_exists(&temp);
        return Err(e);
    }
    Ok(copied)
}

/// Writes `contents` to `path` in one step: temp sibling, then rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp = temp_sibling(path);
    if let Err(e) = fs::write(&temp, contents) {
        let _ = remove_if_exists(&temp);
        return Err(e);
    }
    fs::rename(&temp, path).inspect_err(|_| {
        let _ = remove_if_exists(&temp);
    })
}
