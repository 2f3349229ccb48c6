pub mod error;
pub mod material;
pub mod mesh;
pub mod region;
pub mod sequence;
pub mod shape;
#[cfg(test)]
pub(crate) mod test_support;

use std::{
    fmt::{Debug, Formatter},
    io::{Read, Seek},
};

use binrw::{BinRead, BinResult, Endian};
use serde_derive::Serialize;

pub use self::error::DecodeError;

/// Byte order of the machine running the decoder. Files carry no marker of
/// their own and are written in the byte order of the exporting host.
#[cfg(target_endian = "little")]
pub const NATIVE_ENDIAN: Endian = Endian::Little;
#[cfg(target_endian = "big")]
pub const NATIVE_ENDIAN: Endian = Endian::Big;

/// Scale of the fixed-point quaternion components.
pub const QUAT_SCALE: f32 = 32767.0;

#[derive(BinRead, Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct Point2F {
    pub x: f32,
    pub y: f32,
}

#[derive(BinRead, Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct Point3F {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(BinRead, Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct Box3F {
    pub min: Point3F,
    pub max: Point3F,
}

/// Row-major 4x4 matrix.
#[derive(BinRead, Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct Matrix4F {
    pub m: [f32; 16],
}

/// Rotation decoded from four signed 16-bit components.
#[derive(Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    #[inline]
    pub fn from_fixed([x, y, z, w]: [i16; 4]) -> Self {
        Self {
            x: x as f32 / QUAT_SCALE,
            y: y as f32 / QUAT_SCALE,
            z: z as f32 / QUAT_SCALE,
            w: w as f32 / QUAT_SCALE,
        }
    }
}

impl BinRead for Quaternion {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let raw = <[i16; 4]>::read_options(reader, endian, ())?;
        Ok(Self::from_fixed(raw))
    }
}

/// Byte string prefixed by a 32-bit length.
#[derive(BinRead, Clone, Default)]
pub struct SizedString {
    #[br(assert(size >= 0, "{}", DecodeError::NegativeCount { what: "string length", count: size }))]
    pub size: i32,
    #[br(count = size as usize)]
    pub text: Vec<u8>,
}

impl SizedString {
    pub fn into_string(self) -> String { String::from_utf8_lossy(&self.text).into_owned() }
}

impl Debug for SizedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&String::from_utf8_lossy(&self.text), f)
    }
}

/// Byte string prefixed by an 8-bit length.
#[derive(BinRead, Clone, Default)]
pub struct ShortString {
    pub size: u8,
    #[br(count = size)]
    pub text: Vec<u8>,
}

impl ShortString {
    pub fn into_string(self) -> String { String::from_utf8_lossy(&self.text).into_owned() }
}

impl Debug for ShortString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&String::from_utf8_lossy(&self.text), f)
    }
}

/// Reads a 32-bit element count followed by that many elements.
pub fn read_counted<T, R>(reader: &mut R, e: Endian, what: &'static str) -> BinResult<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()>,
    R: Read + Seek,
{
    let pos = reader.stream_position()?;
    let count = i32::read_options(reader, e, ())?;
    if count < 0 {
        return Err(binrw::Error::AssertFail {
            pos,
            message: DecodeError::NegativeCount { what, count }.to_string(),
        });
    }
    // No reservation; a corrupt count runs into EOF.
    let mut out = Vec::new();
    for _ in 0..count {
        out.push(T::read_options(reader, e, ())?);
    }
    Ok(out)
}
