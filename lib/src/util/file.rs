use std::{ffi::OsStr, fs::File, path::Path};

use anyhow::{bail, Context, Result};
use memmap2::{Mmap, MmapOptions};

/// Opens a memory mapped file.
pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Mmap> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open file '{}'", path.as_ref().display()))?;
    let map = unsafe { MmapOptions::new().map(&file) }
        .with_context(|| format!("Failed to mmap file: '{}'", path.as_ref().display()))?;
    Ok(map)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::Display)]
pub enum FileKind {
    /// Shape with geometry and embedded sequences.
    #[strum(serialize = "shape")]
    Shape,
    /// Standalone sequence file.
    #[strum(serialize = "sequence")]
    Sequence,
}

impl FileKind {
    /// Picks the decoder from the file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("dts") => Ok(FileKind::Shape),
            Some("dsq") => Ok(FileKind::Sequence),
            _ => bail!("Unknown file type: '{}'", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(FileKind::from_path("a/player.dts").unwrap(), FileKind::Shape);
        assert_eq!(FileKind::from_path("RUN.DSQ").unwrap(), FileKind::Sequence);
        assert!(FileKind::from_path("readme.txt").is_err());
        assert!(FileKind::from_path("noext").is_err());
    }

    #[test]
    fn maps_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"shape").unwrap();
        let map = map_file(file.path()).unwrap();
        assert_eq!(&map[..], b"shape");
    }

    #[test]
    fn missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.dts");
        let err = map_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing.dts"), "{err}");
    }
}
