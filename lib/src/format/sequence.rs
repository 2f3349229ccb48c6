use std::io::{Cursor, Read, Seek};

use anyhow::{Context, Result};
use binrw::{BinRead, BinReaderExt, BinResult, Endian};
use serde_derive::Serialize;

use crate::format::{read_counted, DecodeError, Point3F, Quaternion, SizedString};

/// Packed boolean array, one flag per key frame.
///
/// Stored as a discarded 32-bit word, a bit count, then `ceil(count / 32)`
/// words holding the flags least significant bit first.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BitVector(pub Vec<bool>);

impl BitVector {
    #[inline]
    pub fn len(&self) -> usize { self.0.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    #[inline]
    pub fn get(&self, index: usize) -> bool { self.0.get(index).copied().unwrap_or(false) }

    /// Number of set flags.
    pub fn count_ones(&self) -> usize { self.0.iter().filter(|b| **b).count() }
}

impl BinRead for BitVector {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let _unused = i32::read_options(reader, endian, ())?;
        let used = i32::read_options(reader, endian, ())?;
        if used <= 0 {
            return Ok(Self::default());
        }
        let used = used as usize;
        let mut bits = Vec::new();
        for _ in 0..used.div_ceil(32) {
            let word = u32::read_options(reader, endian, ())?;
            let take = (used - bits.len()).min(32);
            bits.extend((0..take).map(|bit| word & (1 << bit) != 0));
        }
        Ok(Self(bits))
    }
}

/// Which animation channels a sequence drives.
#[derive(BinRead, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Matters {
    pub rotation: BitVector,
    pub translation: BitVector,
    pub scale: BitVector,
    pub decal: BitVector,
    pub ifl: BitVector,
    pub vis: BitVector,
    pub frame: BitVector,
    pub mat_frame: BitVector,
}

/// Sequence names are an index into the shape name table, or inline in
/// standalone sequence files.
#[derive(BinRead, Clone, Debug, Eq, PartialEq, Serialize)]
#[br(import(inline: bool))]
#[serde(untagged)]
pub enum SequenceName {
    #[br(pre_assert(!inline))]
    Index(i32),
    #[br(pre_assert(inline))]
    Inline(#[br(map = |s: SizedString| s.into_string())] String),
}

#[derive(BinRead, Clone, Debug, PartialEq, Serialize)]
#[br(import(inline: bool))]
pub struct Sequence {
    #[br(args(inline))]
    pub name: SequenceName,
    pub flags: u32,
    pub num_key_frames: i32,
    pub duration: f32,
    pub priority: i32,
    pub first_ground_frame: i32,
    pub num_ground_frames: i32,
    pub base_rotation: i32,
    pub base_translation: i32,
    pub base_scale: i32,
    pub base_object_state: i32,
    pub base_decal_state: i32,
    pub first_trigger: i32,
    pub num_triggers: i32,
    pub tool_begin: f32,
    pub matters: Matters,
}

impl Sequence {
    /// Resolves the sequence name, looking indexed names up in `names`.
    pub fn name<'a>(&'a self, names: &'a [String]) -> Option<&'a str> {
        match &self.name {
            SequenceName::Index(index) => {
                usize::try_from(*index).ok().and_then(|i| names.get(i)).map(String::as_str)
            }
            SequenceName::Inline(name) => Some(name.as_str()),
        }
    }
}

/// Reads a count prefixed sequence block.
pub fn read_sequences<R: Read + Seek>(reader: &mut R, e: Endian, inline: bool) -> Result<Vec<Sequence>> {
    let count = read_count(reader, e, "sequence").context("Failed to read sequence count")?;
    let mut sequences = Vec::new();
    for i in 0..count {
        let sequence: Sequence = reader
            .read_type_args(e, (inline,))
            .with_context(|| format!("Failed to read sequence {i}"))?;
        log::debug!("Sequence {i}: {:?}, {} key frames", sequence.name, sequence.num_key_frames);
        sequences.push(sequence);
    }
    Ok(sequences)
}

#[derive(BinRead, Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Trigger {
    pub state: u32,
    pub pos: f32,
}

/// Standalone animation file.
///
/// Holds the same transform tables as a shape, without the word regions or
/// checkpoints, and sequences carrying their own names.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SequenceFile {
    pub version: i32,
    pub names: Vec<String>,
    pub num_objects: i32,
    pub node_rotations: Vec<Quaternion>,
    pub node_translations: Vec<Point3F>,
    pub node_scales_uniform: Vec<f32>,
    pub node_scales_aligned: Vec<Point3F>,
    pub node_scale_rots_arbitrary: Vec<Quaternion>,
    pub node_scales_arbitrary: Vec<Point3F>,
    pub ground_translations: Vec<Point3F>,
    pub ground_rotations: Vec<Quaternion>,
    pub sequences: Vec<Sequence>,
    pub triggers: Vec<Trigger>,
}

impl SequenceFile {
    pub fn slice(data: &[u8], e: Endian) -> Result<Self> { Self::read(&mut Cursor::new(data), e) }

    pub fn read<R: Read + Seek>(reader: &mut R, e: Endian) -> Result<Self> {
        let version: i32 = reader.read_type(e).context("Failed to read version")?;
        log::debug!("Sequence file version {version}");
        let names = read_counted::<SizedString, _>(reader, e, "name")
            .context("Failed to read name table")?
            .into_iter()
            .map(SizedString::into_string)
            .collect();
        let _export_flags: i32 = reader.read_type(e).context("Failed to read export flags")?;
        let num_objects = reader.read_type(e).context("Failed to read object count")?;
        let node_rotations =
            read_counted(reader, e, "rotation").context("Failed to read node rotations")?;
        let node_translations =
            read_counted(reader, e, "translation").context("Failed to read node translations")?;
        let node_scales_uniform =
            read_counted(reader, e, "uniform scale").context("Failed to read uniform scales")?;
        let node_scales_aligned =
            read_counted(reader, e, "aligned scale").context("Failed to read aligned scales")?;
        let (node_scale_rots_arbitrary, node_scales_arbitrary) = read_paired(reader, e)
            .context("Failed to read arbitrary scales")?;
        let (ground_rotations, ground_translations) =
            read_paired_rev(reader, e).context("Failed to read ground frames")?;
        let _unused: i32 = reader.read_type(e).context("Failed to read reserved word")?;
        let sequences = read_sequences(reader, e, true)?;
        let triggers = read_counted(reader, e, "trigger").context("Failed to read triggers")?;
        Ok(Self {
            version,
            names,
            num_objects,
            node_rotations,
            node_translations,
            node_scales_uniform,
            node_scales_aligned,
            node_scale_rots_arbitrary,
            node_scales_arbitrary,
            ground_translations,
            ground_rotations,
            sequences,
            triggers,
        })
    }

    pub fn name(&self, index: i32) -> Option<&str> {
        usize::try_from(index).ok().and_then(|i| self.names.get(i)).map(String::as_str)
    }
}

/// Reads a 32-bit table size, rejecting negative values.
fn read_count<R: Read + Seek>(reader: &mut R, e: Endian, what: &'static str) -> Result<usize> {
    let count: i32 = reader.read_type(e)?;
    usize::try_from(count).map_err(|_| DecodeError::NegativeCount { what, count }.into())
}

/// Count, then rotations, then scale factors.
fn read_paired<R: Read + Seek>(reader: &mut R, e: Endian) -> Result<(Vec<Quaternion>, Vec<Point3F>)> {
    let count = read_count(reader, e, "arbitrary scale")?;
    let mut rotations = Vec::new();
    for _ in 0..count {
        rotations.push(reader.read_type(e)?);
    }
    let mut scales = Vec::new();
    for _ in 0..count {
        scales.push(reader.read_type(e)?);
    }
    Ok((rotations, scales))
}

/// Count, then translations, then rotations.
fn read_paired_rev<R: Read + Seek>(
    reader: &mut R,
    e: Endian,
) -> Result<(Vec<Quaternion>, Vec<Point3F>)> {
    let count = read_count(reader, e, "ground frame")?;
    let mut translations = Vec::new();
    for _ in 0..count {
        translations.push(reader.read_type(e)?);
    }
    let mut rotations = Vec::new();
    for _ in 0..count {
        rotations.push(reader.read_type(e)?);
    }
    Ok((rotations, translations))
}
