use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use walkdir::WalkDir;
use crate::utils::file_ops::ensure_directory;
use crate::{LibraryError, Result, SourceFile, SourceFormat, SourceKind};

/// Enumerates convertible files under a library root and maps each one to
/// its place in the output tree.
pub struct FileDiscovery {
    input_root: PathBuf,
    output_root: PathBuf,
    include_extras: bool,
}

impl FileDiscovery {
    /// Fails with a discovery error if `input_root` is missing or is not a
    /// directory. The output root is created if needed.
    pub fn new(input_root: impl AsRef<Path>, output_root: impl Into<PathBuf>) -> Result<Self> {
        let input_ref = input_root.as_ref();
        if !input_ref.is_dir() {
            let reason = if input_ref.exists() {
                "not a directory"
            } else {
                "directory does not exist"
            };
            return Err(LibraryError::Discovery {
                path: input_ref.to_path_buf(),
                reason: reason.to_string(),
            });
        }

        let input_root = fs::canonicalize(input_ref).unwrap_or_else(|_| input_ref.to_path_buf());
        let output_root = output_root.into();
        ensure_directory(&output_root)?;
        let output_root = fs::canonicalize(&output_root).unwrap_or(output_root);

        Ok(Self {
            input_root,
            output_root,
            include_extras: false,
        })
    }

    /// Also discover non-audio files, to be mirrored verbatim.
    pub fn with_extras(mut self, include_extras: bool) -> Self {
        self.include_extras = include_extras;
        self
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Lazily walks the library in file-name order. Each call starts a fresh
    /// walk. Unreadable entries are logged and left out.
    pub fn iter(&self) -> impl Iterator<Item = SourceFile> + '_ {
        let nested_output = self.nested_output().map(Path::to_path_buf);
        WalkDir::new(&self.input_root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| match &nested_output {
                Some(output) => !e.path().starts_with(output),
                None => true,
            })
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Error accessing entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(move |e| self.classify(e.path()))
    }

    /// The output root when it lives strictly below the input root; that
    /// subtree holds converted files and must not be rescanned. Converting
    /// in place, or into a parent of the library, excludes nothing.
    fn nested_output(&self) -> Option<&Path> {
        (self.output_root != self.input_root && self.output_root.starts_with(&self.input_root))
            .then_some(self.output_root.as_path())
    }

    fn classify(&self, path: &Path) -> Option<SourceFile> {
        let kind = match SourceFormat::from_path(path) {
            Some(format) => SourceKind::Audio(format),
            None if self.include_extras => SourceKind::Extra,
            None => {
                debug!("Skipping non-audio file: {}", path.display());
                return None;
            }
        };

        if let Err(err) = fs::File::open(path) {
            warn!("Skipping unreadable file {}: {}", path.display(), err);
            return None;
        }

        let relative_path = path.strip_prefix(&self.input_root).ok()?.to_path_buf();
        let destination = self.destination_for(&relative_path, kind);
        Some(SourceFile {
            path: path.to_path_buf(),
            relative_path,
            kind,
            destination,
        })
    }

    /// Output path for a file at `relative_path` under the library root.
    pub fn destination_for(&self, relative_path: &Path, kind: SourceKind) -> PathBuf {
        let mirrored = self.output_root.join(relative_path);
        match kind {
            SourceKind::Audio(_) => mirrored.with_extension("mp3"),
            SourceKind::Extra => mirrored,
        }
    }

    /// Collects the full list and creates every destination directory up
    /// front, so workers never race on directory creation.
    ///
    /// When two sources map to the same output (for example `song.flac` and
    /// `song.wav`), later ones keep their source extension in the output
    /// name: `song.wav.mp3`. An extra file whose name is already taken by a
    /// converted track is left out.
    pub fn discover(&self) -> Result<Vec<SourceFile>> {
        info!("Scanning directory structure: {}", self.input_root.display());

        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut directories: HashSet<PathBuf> = HashSet::new();
        let mut files = Vec::new();

        for mut source in self.iter() {
            if !claimed.insert(source.destination.clone()) {
                if let SourceKind::Audio(format) = source.kind {
                    let renamed = source
                        .destination
                        .with_extension(format!("{}.mp3", format.extension()));
                    warn!(
                        "{} collides with another file's output; writing {}",
                        source.relative_path.display(),
                        renamed.display()
                    );
                    source.destination = renamed;
                    claimed.insert(source.destination.clone());
                } else {
                    warn!(
                        "Not copying {}: its name is taken by a converted track",
                        source.relative_path.display()
                    );
                    continue;
                }
            }
            if let Some(parent) = source.destination.parent() {
                if directories.insert(parent.to_path_buf()) {
                    ensure_directory(parent)?;
                }
            }
            files.push(source);
        }

        info!("Found {} files to process", files.len());
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn rejects_missing_or_file_roots() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            FileDiscovery::new(&missing, dir.path().join("out")),
            Err(LibraryError::Discovery { .. })
        ));

        let file = dir.path().join("file.flac");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FileDiscovery::new(&file, dir.path().join("out")),
            Err(LibraryError::Discovery { .. })
        ));
    }

    #[test]
    fn filters_by_extension_and_mirrors_structure() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        touch(input.path(), "Artist/Album/01.FLAC");
        touch(input.path(), "Artist/Album/02.wav");
        touch(input.path(), "Artist/Album/cover.jpg");
        touch(input.path(), "Other/song.ogg");
        touch(input.path(), "Other/tune.m4a");
        touch(input.path(), "Other/already.mp3");

        let discovery = FileDiscovery::new(input.path(), output.path()).unwrap();
        let files = discovery.discover().unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|f| f.destination.strip_prefix(discovery.output_root()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            rel,
            vec![
                PathBuf::from("Artist/Album/01.mp3"),
                PathBuf::from("Artist/Album/02.mp3"),
                PathBuf::from("Other/song.mp3"),
                PathBuf::from("Other/tune.mp3"),
            ]
        );
        assert!(output.path().join("Artist/Album").is_dir());
        assert!(output.path().join("Other").is_dir());
        assert!(files.iter().all(SourceFile::is_audio));
    }

    #[test]
    fn iteration_is_restartable_and_deterministic() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        touch(input.path(), "b.flac");
        touch(input.path(), "a.flac");
        touch(input.path(), "sub/c.wav");

        let discovery = FileDiscovery::new(input.path(), output.path()).unwrap();
        let first: Vec<_> = discovery.iter().map(|f| f.relative_path).collect();
        let second: Vec<_> = discovery.iter().map(|f| f.relative_path).collect();
        assert_eq!(first, second);
        assert_eq!(first[0], PathBuf::from("a.flac"));
    }

    #[test]
    fn extras_are_included_on_request() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        touch(input.path(), "Album/01.flac");
        touch(input.path(), "Album/cover.jpg");
        touch(input.path(), "Album/lyrics.txt");

        let files = FileDiscovery::new(input.path(), output.path())
            .unwrap()
            .with_extras(true)
            .discover()
            .unwrap();
        let extras: Vec<_> = files.iter().filter(|f| f.kind == SourceKind::Extra).collect();
        assert_eq!(extras.len(), 2);
        assert!(extras.iter().any(|f| f.destination.ends_with("Album/cover.jpg")));
    }

    #[test]
    fn colliding_outputs_get_distinct_names() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        touch(input.path(), "song.flac");
        touch(input.path(), "song.wav");

        let files = FileDiscovery::new(input.path(), output.path()).unwrap().discover().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.destination.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["song.mp3".to_string(), "song.wav.mp3".to_string()]);
    }

    #[test]
    fn nested_output_tree_is_not_rescanned() {
        let input = tempdir().unwrap();
        touch(input.path(), "a.flac");
        touch(input.path(), "converted/old.flac");
        let output = input.path().join("converted");

        let files = FileDiscovery::new(input.path(), &output).unwrap().discover().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, PathBuf::from("a.flac"));
    }

    #[test]
    fn in_place_conversion_discovers_everything() {
        let library = tempdir().unwrap();
        touch(library.path(), "Album/a.flac");
        touch(library.path(), "Album/b.wav");

        let discovery = FileDiscovery::new(library.path(), library.path()).unwrap();
        let files = discovery.discover().unwrap();
        let destinations: Vec<_> = files
            .iter()
            .map(|f| f.destination.strip_prefix(discovery.output_root()).unwrap().to_path_buf())
            .collect();
        assert_eq!(destinations, vec![PathBuf::from("Album/a.mp3"), PathBuf::from("Album/b.mp3")]);
    }

    #[test]
    fn output_above_the_library_discovers_everything() {
        let library = tempdir().unwrap();
        touch(library.path(), "Album/a.flac");
        touch(library.path(), "Album/b.wav");

        let files = FileDiscovery::new(library.path().join("Album"), library.path())
            .unwrap()
            .discover()
            .unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative_path.clone()).collect();
        assert_eq!(names, vec![PathBuf::from("a.flac"), PathBuf::from("b.wav")]);
        assert_eq!(files[0].destination, fs::canonicalize(library.path()).unwrap().join("a.mp3"));
    }
}
