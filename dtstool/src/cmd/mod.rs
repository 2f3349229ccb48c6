pub mod dump;
pub mod info;

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use binrw::Endian;
use dtslib::{
    format::{sequence::SequenceFile, NATIVE_ENDIAN},
    util::{
        file::{map_file, FileKind},
        resolve::PathResolver,
    },
};

/// Parses the `--endian` option.
pub fn parse_endian(value: &str) -> Result<Endian, String> {
    match value {
        "little" | "le" => Ok(Endian::Little),
        "big" | "be" => Ok(Endian::Big),
        "native" => Ok(NATIVE_ENDIAN),
        _ => Err(format!("invalid byte order '{value}', expected little, big or native")),
    }
}

/// Decodes external sequence files accompanying a shape. Each file's
/// directory is added to `resolver`.
pub fn load_sequence_files(
    paths: &[PathBuf],
    e: Endian,
    resolver: &mut PathResolver,
) -> Result<Vec<(PathBuf, SequenceFile)>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let kind = FileKind::from_path(path)?;
        ensure!(kind == FileKind::Sequence, "Expected a sequence file, got '{}'", path.display());
        let data = map_file(path)?;
        let file = SequenceFile::slice(&data, e)
            .with_context(|| format!("Failed to decode '{}'", path.display()))?;
        log::info!("Read {} sequences from {}", file.sequences.len(), path.display());
        resolver.add_path_containing(path);
        files.push((path.clone(), file));
    }
    Ok(files)
}
