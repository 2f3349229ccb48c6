use thiserror::Error;

use crate::format::region::Region;

/// Structural failures raised while decoding shape and sequence files.
///
/// These travel inside [`anyhow::Error`] with the failing section attached as
/// context; use `downcast_ref::<DecodeError>()` to inspect the kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The header declares region boundaries that cannot describe a file.
    #[error("invalid header: total size {total_size}, offset16 {offset16}, offset8 {offset8}")]
    InvalidHeader { total_size: i32, offset16: i32, offset8: i32 },
    /// Fewer bytes remained than a region declares.
    #[error("{region} region truncated: need {need} bytes, {available} available")]
    Truncated { region: Region, need: usize, available: usize },
    /// A read would move a region cursor past the end of its region.
    #[error("{region} region overrun: cursor {cursor} + {requested} words exceeds {capacity}")]
    RegionOverrun { region: Region, cursor: usize, requested: usize, capacity: usize },
    /// The three redundant checkpoint values disagree with the running counter.
    #[error(
        "checkpoint {expected} mismatch: found {found32} (32-bit), {found16} (16-bit), {found8} (8-bit)"
    )]
    CheckpointMismatch { expected: u32, found32: i32, found16: i16, found8: i8 },
    /// A table count read from the file was negative.
    #[error("negative {what} count {count}")]
    NegativeCount { what: &'static str, count: i32 },
    /// Leading mesh tag outside the known mesh kinds.
    #[error("unknown mesh type {0}")]
    UnknownMeshType(i32),
    /// Primitive type word with a topology other than list, strip or fan.
    #[error("unknown primitive topology in type {0:#010X}")]
    UnknownTopology(u32),
    /// A primitive references an element outside the mesh index buffer.
    #[error("primitive element {element} out of range for {len} indices")]
    ElementOutOfRange { element: usize, len: usize },
}
