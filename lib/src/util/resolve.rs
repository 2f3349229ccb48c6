use std::path::{Path, PathBuf};

/// Finds texture files referenced by material names.
///
/// Directories are probed in the order they were added.
#[derive(Clone, Debug, Default)]
pub struct PathResolver {
    dirs: Vec<PathBuf>,
}

impl PathResolver {
    pub fn new() -> Self { Self::default() }

    /// Adds the directory holding `path`, or `path` itself when it has no parent.
    pub fn add_path_containing<P: AsRef<Path>>(&mut self, path: P) {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => path,
        };
        if !self.dirs.iter().any(|d| d == dir) {
            self.dirs.push(dir.to_path_buf());
        }
    }

    pub fn add_dir<P: Into<PathBuf>>(&mut self, dir: P) {
        let dir = dir.into();
        if !self.dirs.contains(&dir) {
            self.dirs.push(dir);
        }
    }

    pub fn dirs(&self) -> &[PathBuf] { &self.dirs }

    /// First existing `dir/name`, else `name` unchanged.
    pub fn resolve(&self, name: &str) -> PathBuf {
        for dir in &self.dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                log::trace!("Resolved '{}' to '{}'", name, candidate.display());
                return candidate;
            }
        }
        PathBuf::from(name)
    }
}
