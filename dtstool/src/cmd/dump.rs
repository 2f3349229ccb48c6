use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::{ensure, Context, Result};
use argh::FromArgs;
use binrw::Endian;
use dtslib::{
    format::{sequence::SequenceFile, shape::ShapeModel, NATIVE_ENDIAN},
    util::{
        file::{map_file, FileKind},
        resolve::PathResolver,
    },
};
use serde_json::{Map, Value};

use crate::cmd::{load_sequence_files, parse_endian};

#[derive(FromArgs, PartialEq, Debug)]
/// dump a DTS or DSQ file as JSON
#[argh(subcommand, name = "dump")]
pub struct Args {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(positional)]
    /// external DSQ files animating the input shape
    sequences: Vec<PathBuf>,
    #[argh(option, short = 'o')]
    /// output JSON file (default: stdout)
    output: Option<PathBuf>,
    #[argh(option, short = 'e', from_str_fn(parse_endian), default = "NATIVE_ENDIAN")]
    /// byte order: little, big or native
    endian: Endian,
}

pub fn run(args: Args) -> Result<()> {
    let kind = FileKind::from_path(&args.input)?;
    let data = map_file(&args.input)?;
    let value = match kind {
        FileKind::Shape if args.sequences.is_empty() => {
            serde_json::to_value(ShapeModel::slice(&data, args.endian)?)?
        }
        FileKind::Shape => {
            let shape = ShapeModel::slice(&data, args.endian)?;
            let mut resolver = PathResolver::new();
            let files = load_sequence_files(&args.sequences, args.endian, &mut resolver)?;
            let mut external = Vec::with_capacity(files.len());
            for (path, file) in files {
                let mut entry = Map::new();
                entry.insert("path".into(), Value::String(path.display().to_string()));
                entry.insert("file".into(), serde_json::to_value(file)?);
                external.push(Value::Object(entry));
            }
            let mut root = Map::new();
            root.insert("shape".into(), serde_json::to_value(shape)?);
            root.insert("sequence_files".into(), Value::Array(external));
            Value::Object(root)
        }
        FileKind::Sequence => {
            ensure!(
                args.sequences.is_empty(),
                "External sequence files need a base shape, got '{}'",
                args.input.display()
            );
            serde_json::to_value(SequenceFile::slice(&data, args.endian)?)?
        }
    };
    match &args.output {
        Some(path) => {
            log::info!("Writing {}", path.display());
            let file = File::create(path)
                .with_context(|| format!("Failed to create file '{}'", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &value)?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &value)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
