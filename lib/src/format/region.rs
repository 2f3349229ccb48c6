//! Word-width demultiplexed storage used by shape files.
//!
//! A shape file stores its structural data in three consecutive regions, each
//! holding words of a single width. Every logical field is read from the
//! region matching its width, so a record like a node (five 32-bit fields) and
//! a quaternion (four 16-bit fields) advance different cursors. Redundant
//! checkpoints written across all three regions keep the cursors honest.

use std::io::{Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use binrw::{BinRead, BinReaderExt, Endian, VecArgs};
use serde_derive::Serialize;

use crate::format::{Box3F, DecodeError, Matrix4F, Point2F, Point3F, Quaternion};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, strum::Display)]
pub enum Region {
    #[strum(serialize = "32-bit")]
    Word32,
    #[strum(serialize = "16-bit")]
    Word16,
    #[strum(serialize = "8-bit")]
    Word8,
}

impl Region {
    #[inline]
    pub const fn word_size(self) -> usize {
        match self {
            Region::Word32 => 4,
            Region::Word16 => 2,
            Region::Word8 => 1,
        }
    }
}

/// Fixed header preceding the regions. Offsets are expressed in 32-bit words
/// from the start of region data.
#[derive(BinRead, Serialize, Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegionHeader {
    pub version: i32,
    pub total_size: i32,
    pub offset16: i32,
    pub offset8: i32,
}

impl RegionHeader {
    /// Number of words held by each region, in region order.
    pub fn word_counts(&self) -> Result<[usize; 3], DecodeError> {
        let invalid = || DecodeError::InvalidHeader {
            total_size: self.total_size,
            offset16: self.offset16,
            offset8: self.offset8,
        };
        if self.offset16 < 0 || self.offset8 < self.offset16 || self.total_size < self.offset8 {
            return Err(invalid());
        }
        let words32 = self.offset16 as usize;
        let words16 = (self.offset8 - self.offset16) as usize * 2;
        let words8 = (self.total_size - self.offset8) as usize * 4;
        Ok([words32, words16, words8])
    }
}

/// The three word regions of a shape file with their read cursors.
#[derive(Clone, Debug, Default)]
pub struct RegionBuffer {
    version: i32,
    buf32: Vec<u32>,
    buf16: Vec<u16>,
    buf8: Vec<u8>,
    pos32: usize,
    pos16: usize,
    pos8: usize,
    checkpoint: u32,
}

impl RegionBuffer {
    /// Reads the header and all three regions from `reader`.
    pub fn load<R: Read + Seek>(reader: &mut R, e: Endian) -> Result<Self> {
        let header: RegionHeader = reader.read_type(e).context("Failed to read region header")?;
        let [words32, words16, words8] = header.word_counts()?;
        log::debug!(
            "Shape version {}: {} 32-bit, {} 16-bit, {} 8-bit words",
            header.version,
            words32,
            words16,
            words8
        );

        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;
        let mut available = end.saturating_sub(start) as usize;
        for (region, words) in
            [(Region::Word32, words32), (Region::Word16, words16), (Region::Word8, words8)]
        {
            let need = words * region.word_size();
            if need > available {
                return Err(DecodeError::Truncated { region, need, available }.into());
            }
            available -= need;
        }

        let buf32: Vec<u32> = reader
            .read_type_args(e, VecArgs { count: words32, inner: () })
            .context("Failed to read 32-bit region")?;
        let buf16: Vec<u16> = reader
            .read_type_args(e, VecArgs { count: words16, inner: () })
            .context("Failed to read 16-bit region")?;
        let buf8: Vec<u8> = reader
            .read_type_args(e, VecArgs { count: words8, inner: () })
            .context("Failed to read 8-bit region")?;
        Ok(Self::from_parts(header.version, buf32, buf16, buf8))
    }

    /// Builds a buffer from already demultiplexed regions.
    pub fn from_parts(version: i32, buf32: Vec<u32>, buf16: Vec<u16>, buf8: Vec<u8>) -> Self {
        Self { version, buf32, buf16, buf8, ..Default::default() }
    }

    #[inline]
    pub fn version(&self) -> i32 { self.version }

    /// Number of checkpoints validated so far.
    #[inline]
    pub fn checkpoint(&self) -> u32 { self.checkpoint }

    /// Cursor of each region, in words.
    #[inline]
    pub fn positions(&self) -> [usize; 3] { [self.pos32, self.pos16, self.pos8] }

    /// Size of each region, in words.
    #[inline]
    pub fn capacities(&self) -> [usize; 3] {
        [self.buf32.len(), self.buf16.len(), self.buf8.len()]
    }

    /// Whether every region has been consumed up to its 32-bit alignment padding.
    pub fn is_exhausted(&self) -> bool {
        self.pos32 == self.buf32.len()
            && self.buf16.len() - self.pos16 < 2
            && self.buf8.len() - self.pos8 < 4
    }

    pub fn consume32(&mut self, n: usize) -> Result<&[u32], DecodeError> {
        let start = self.pos32;
        let end = advance(Region::Word32, &mut self.pos32, n, self.buf32.len())?;
        Ok(&self.buf32[start..end])
    }

    pub fn consume16(&mut self, n: usize) -> Result<&[u16], DecodeError> {
        let start = self.pos16;
        let end = advance(Region::Word16, &mut self.pos16, n, self.buf16.len())?;
        Ok(&self.buf16[start..end])
    }

    pub fn consume8(&mut self, n: usize) -> Result<&[u8], DecodeError> {
        let start = self.pos8;
        let end = advance(Region::Word8, &mut self.pos8, n, self.buf8.len())?;
        Ok(&self.buf8[start..end])
    }

    #[inline]
    pub fn get<T: RegionRead>(&mut self) -> Result<T, DecodeError> { T::read_regions(self) }

    pub fn get_vec<T: RegionRead>(&mut self, count: usize) -> Result<Vec<T>, DecodeError> {
        (0..count).map(|_| T::read_regions(self)).collect()
    }

    /// Reads a 32-bit table size.
    pub fn get_count(&mut self, what: &'static str) -> Result<usize, DecodeError> {
        let count: i32 = self.get()?;
        usize::try_from(count).map_err(|_| DecodeError::NegativeCount { what, count })
    }

    /// Reads a 32-bit table size followed by that many elements.
    pub fn get_counted<T: RegionRead>(&mut self, what: &'static str) -> Result<Vec<T>, DecodeError> {
        let count = self.get_count(what)?;
        self.get_vec(count)
    }

    /// Reads a zero terminated string from the 8-bit region.
    pub fn get_cstring(&mut self) -> Result<String, DecodeError> {
        let start = self.pos8;
        loop {
            if self.consume8(1)?[0] == 0 {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&self.buf8[start..self.pos8 - 1]).into_owned())
    }

    /// Validates the next checkpoint against the running counter.
    pub fn check(&mut self) -> Result<(), DecodeError> {
        let expected = self.checkpoint;
        let found32: i32 = self.get()?;
        let found16: i16 = self.get()?;
        let found8: i8 = self.get()?;
        if found32 != expected as i32 || found16 != expected as i16 || found8 != expected as i8 {
            return Err(DecodeError::CheckpointMismatch { expected, found32, found16, found8 });
        }
        log::trace!("Checkpoint {expected} at {:?}", self.positions());
        self.checkpoint += 1;
        Ok(())
    }
}

#[inline]
fn advance(region: Region, pos: &mut usize, n: usize, capacity: usize) -> Result<usize, DecodeError> {
    match pos.checked_add(n) {
        Some(end) if end <= capacity => {
            *pos = end;
            Ok(end)
        }
        _ => Err(DecodeError::RegionOverrun { region, cursor: *pos, requested: n, capacity }),
    }
}

/// Values that decode from the word regions.
pub trait RegionRead: Sized {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError>;
}

impl RegionRead for u32 {
    #[inline]
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> { Ok(buf.consume32(1)?[0]) }
}

impl RegionRead for i32 {
    #[inline]
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(buf.consume32(1)?[0] as i32)
    }
}

impl RegionRead for f32 {
    // Raw bits, never a numeric conversion.
    #[inline]
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(f32::from_bits(buf.consume32(1)?[0]))
    }
}

impl RegionRead for u16 {
    #[inline]
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> { Ok(buf.consume16(1)?[0]) }
}

impl RegionRead for i16 {
    #[inline]
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(buf.consume16(1)?[0] as i16)
    }
}

impl RegionRead for u8 {
    #[inline]
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> { Ok(buf.consume8(1)?[0]) }
}

impl RegionRead for i8 {
    #[inline]
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(buf.consume8(1)?[0] as i8)
    }
}

impl RegionRead for Point2F {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self { x: buf.get()?, y: buf.get()? })
    }
}

impl RegionRead for Point3F {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self { x: buf.get()?, y: buf.get()?, z: buf.get()? })
    }
}

impl RegionRead for Box3F {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self { min: buf.get()?, max: buf.get()? })
    }
}

impl RegionRead for Matrix4F {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        let mut m = [0f32; 16];
        for (out, bits) in m.iter_mut().zip(buf.consume32(16)?) {
            *out = f32::from_bits(*bits);
        }
        Ok(Self { m })
    }
}

impl RegionRead for Quaternion {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        let raw = buf.consume16(4)?;
        Ok(Self::from_fixed([raw[0] as i16, raw[1] as i16, raw[2] as i16, raw[3] as i16]))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::format::test_support::RegionWriter;

    #[test]
    fn region_sizes_follow_header() {
        let header = RegionHeader { version: 24, total_size: 10, offset16: 4, offset8: 7 };
        assert_eq!(header.word_counts().unwrap(), [4, 6, 12]);
    }

    #[test]
    fn inverted_offsets_are_rejected() {
        let header = RegionHeader { version: 24, total_size: 10, offset16: 8, offset8: 7 };
        assert!(matches!(header.word_counts(), Err(DecodeError::InvalidHeader { .. })));
    }

    #[test]
    fn loads_regions_in_order() {
        let mut w = RegionWriter::default();
        w.u32(0xDEADBEEF).u32(7).u16(0x1234).u16(0xFFFF).u8(9).u8(0xFE).u8(3).u8(4);
        let data = w.finish(24);
        let mut buf = RegionBuffer::load(&mut Cursor::new(&data), Endian::Little).unwrap();
        assert_eq!(buf.version(), 24);
        assert_eq!(buf.capacities(), [2, 2, 4]);
        assert_eq!(buf.get::<u32>().unwrap(), 0xDEADBEEF);
        assert_eq!(buf.get::<i16>().unwrap(), 0x1234);
        assert_eq!(buf.get::<i16>().unwrap(), -1);
        assert_eq!(buf.get::<u8>().unwrap(), 9);
        assert_eq!(buf.get::<i8>().unwrap(), -2);
        assert_eq!(buf.get::<i32>().unwrap(), 7);
        assert_eq!(buf.positions(), [2, 2, 2]);
    }

    #[test]
    fn loads_big_endian_regions() {
        let mut w = RegionWriter::default();
        w.u32(0xDEADBEEF).u16(0x1234).u16(0xFFFE).u8(9);
        let data = w.finish_with(22, Endian::Big);
        assert_eq!(&data[..4], &22i32.to_be_bytes());
        let mut buf = RegionBuffer::load(&mut Cursor::new(&data), Endian::Big).unwrap();
        assert_eq!(buf.version(), 22);
        assert_eq!(buf.capacities(), [1, 2, 4]);
        assert_eq!(buf.get::<u32>().unwrap(), 0xDEADBEEF);
        assert_eq!(buf.get::<u16>().unwrap(), 0x1234);
        assert_eq!(buf.get::<i16>().unwrap(), -2);
        assert_eq!(buf.get::<u8>().unwrap(), 9);
    }

    #[test]
    fn truncated_region_is_fatal() {
        let mut w = RegionWriter::default();
        w.u32(1).u32(2).u16(3).u16(4);
        let mut data = w.finish(24);
        data.truncate(data.len() - 3);
        let err = RegionBuffer::load(&mut Cursor::new(&data), Endian::Little).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecodeError>(),
            Some(DecodeError::Truncated { region: Region::Word16, .. })
        ));
    }

    #[test]
    fn overrun_leaves_cursor_in_place() {
        let mut buf = RegionBuffer::from_parts(24, vec![1, 2], vec![], vec![]);
        assert_eq!(buf.consume32(1).unwrap(), &[1]);
        let err = buf.consume32(2).unwrap_err();
        assert_eq!(err, DecodeError::RegionOverrun {
            region: Region::Word32,
            cursor: 1,
            requested: 2,
            capacity: 2
        });
        assert_eq!(buf.positions(), [1, 0, 0]);
        assert!(buf.consume16(1).is_err());
        assert!(buf.consume8(1).is_err());
    }

    #[test]
    fn floats_are_bit_reinterpreted() {
        let mut buf = RegionBuffer::from_parts(24, vec![0x3F800000, 0xC0490FDB], vec![], vec![]);
        assert_eq!(buf.get::<f32>().unwrap(), 1.0);
        assert_eq!(buf.get::<f32>().unwrap(), -std::f32::consts::PI);
    }

    #[test]
    fn composites_read_from_their_regions() {
        let mut w = RegionWriter::default();
        w.point(1.0, 2.0, 3.0).point(4.0, 5.0, 6.0).quat([32767, 0, 0, -32768]);
        let mut buf = w.into_buffer(24);
        let bounds: Box3F = buf.get().unwrap();
        assert_eq!(bounds.max, Point3F { x: 4.0, y: 5.0, z: 6.0 });
        let q: Quaternion = buf.get().unwrap();
        assert_eq!(q.x, 1.0);
        assert!((q.w + 1.0).abs() < 1e-4);
        assert_eq!(buf.positions(), [6, 4, 0]);
    }

    #[test]
    fn checkpoints_count_up() {
        let mut w = RegionWriter::default();
        w.check().check().check();
        let mut buf = w.into_buffer(24);
        for expected in 0..3 {
            assert_eq!(buf.checkpoint(), expected);
            buf.check().unwrap();
        }
        assert_eq!(buf.checkpoint(), 3);
        assert!(buf.is_exhausted());
    }

    #[test]
    fn checkpoint_mismatch_is_fatal() {
        let mut buf = RegionBuffer::from_parts(24, vec![0], vec![0], vec![1]);
        let err = buf.check().unwrap_err();
        assert_eq!(err, DecodeError::CheckpointMismatch {
            expected: 0,
            found32: 0,
            found16: 0,
            found8: 1
        });
        assert_eq!(buf.checkpoint(), 0);
    }

    #[test]
    fn checkpoint_truncates_per_width() {
        let mut buf = RegionBuffer::from_parts(24, vec![300], vec![300], vec![300u32 as u8]);
        buf.checkpoint = 300;
        buf.check().unwrap();
        assert_eq!(buf.checkpoint(), 301);
    }

    #[test]
    fn cstrings_stop_at_zero() {
        let mut buf = RegionBuffer::from_parts(24, vec![], vec![], b"root\0\0hip\0".to_vec());
        assert_eq!(buf.get_cstring().unwrap(), "root");
        assert_eq!(buf.get_cstring().unwrap(), "");
        assert_eq!(buf.get_cstring().unwrap(), "hip");
        assert!(buf.get_cstring().is_err());
    }

    #[test]
    fn negative_count() {
        let mut buf = RegionBuffer::from_parts(24, vec![(-1i32) as u32], vec![], vec![]);
        assert_eq!(
            buf.get_count("nodes").unwrap_err(),
            DecodeError::NegativeCount { what: "nodes", count: -1 }
        );
    }
}
