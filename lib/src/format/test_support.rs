//! Builders producing encoded shape data for tests.

use binrw::Endian;

use crate::format::{
    mesh::{MESH_TYPE_NULL, MESH_TYPE_SKIN, MESH_TYPE_SORTED, MESH_TYPE_STANDARD},
    region::RegionBuffer,
};

/// Accumulates words per region, mirroring the decoder's read order.
#[derive(Default)]
pub struct RegionWriter {
    buf32: Vec<u32>,
    buf16: Vec<u16>,
    buf8: Vec<u8>,
    checkpoint: u32,
}

impl RegionWriter {
    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf32.push(v);
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self { self.u32(v as u32) }

    pub fn f32(&mut self, v: f32) -> &mut Self { self.u32(v.to_bits()) }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf16.push(v);
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self { self.u16(v as u16) }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf8.push(v);
        self
    }

    pub fn point(&mut self, x: f32, y: f32, z: f32) -> &mut Self { self.f32(x).f32(y).f32(z) }

    pub fn point2(&mut self, x: f32, y: f32) -> &mut Self { self.f32(x).f32(y) }

    pub fn quat(&mut self, q: [i16; 4]) -> &mut Self {
        for v in q {
            self.i16(v);
        }
        self
    }

    pub fn cstring(&mut self, s: &str) -> &mut Self {
        self.buf8.extend_from_slice(s.as_bytes());
        self.u8(0)
    }

    pub fn check(&mut self) -> &mut Self {
        let n = self.checkpoint;
        self.checkpoint += 1;
        self.u32(n).u16(n as u16).u8(n as u8)
    }

    fn padded(&self) -> (Vec<u32>, Vec<u16>, Vec<u8>) {
        let mut buf16 = self.buf16.clone();
        buf16.resize(buf16.len().next_multiple_of(2), 0);
        let mut buf8 = self.buf8.clone();
        buf8.resize(buf8.len().next_multiple_of(4), 0);
        (self.buf32.clone(), buf16, buf8)
    }

    pub fn into_buffer(self, version: i32) -> RegionBuffer {
        let (buf32, buf16, buf8) = self.padded();
        RegionBuffer::from_parts(version, buf32, buf16, buf8)
    }

    /// Encodes the header and all three regions, little endian.
    pub fn finish(&self, version: i32) -> Vec<u8> { self.finish_with(version, Endian::Little) }

    pub fn finish_with(&self, version: i32, e: Endian) -> Vec<u8> {
        let (buf32, buf16, buf8) = self.padded();
        let offset16 = buf32.len() as i32;
        let offset8 = offset16 + (buf16.len() / 2) as i32;
        let total = offset8 + (buf8.len() / 4) as i32;
        let mut w = StreamWriter::new(e);
        for v in [version, total, offset16, offset8] {
            w.i32(v);
        }
        for v in buf32 {
            w.u32(v);
        }
        for v in buf16 {
            w.u16(v);
        }
        w.bytes(&buf8);
        w.into_inner()
    }
}

/// Stream encoder for the blocks after the regions, little endian by default.
pub struct StreamWriter {
    data: Vec<u8>,
    endian: Endian,
}

impl Default for StreamWriter {
    fn default() -> Self { Self::new(Endian::Little) }
}

impl StreamWriter {
    pub fn new(endian: Endian) -> Self { Self { data: Vec::new(), endian } }

    fn put<const N: usize>(&mut self, le: [u8; N], be: [u8; N]) -> &mut Self {
        match self.endian {
            Endian::Little => self.data.extend_from_slice(&le),
            Endian::Big => self.data.extend_from_slice(&be),
        }
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self { self.put(v.to_le_bytes(), v.to_be_bytes()) }

    pub fn u32(&mut self, v: u32) -> &mut Self { self.put(v.to_le_bytes(), v.to_be_bytes()) }

    pub fn f32(&mut self, v: f32) -> &mut Self { self.put(v.to_le_bytes(), v.to_be_bytes()) }

    pub fn u16(&mut self, v: u16) -> &mut Self { self.put(v.to_le_bytes(), v.to_be_bytes()) }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.data.push(v);
        self
    }

    /// 32-bit length prefixed string.
    pub fn string(&mut self, s: &str) -> &mut Self {
        self.i32(s.len() as i32);
        self.data.extend_from_slice(s.as_bytes());
        self
    }

    /// 8-bit length prefixed string.
    pub fn short_string(&mut self, s: &str) -> &mut Self {
        self.u8(s.len() as u8);
        self.data.extend_from_slice(s.as_bytes());
        self
    }

    pub fn quat(&mut self, q: [i16; 4]) -> &mut Self {
        for v in q {
            self.u16(v as u16);
        }
        self
    }

    pub fn point(&mut self, x: f32, y: f32, z: f32) -> &mut Self { self.f32(x).f32(y).f32(z) }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.data.extend_from_slice(data);
        self
    }

    pub fn into_inner(self) -> Vec<u8> { self.data }
}

pub struct MeshFixture {
    pub kind: i32,
    /// Writes a stray word before the closing checkpoint.
    pub extra_flag_word: bool,
}

impl MeshFixture {
    pub fn standard() -> Self { Self { kind: MESH_TYPE_STANDARD, extra_flag_word: false } }

    pub fn skin() -> Self { Self { kind: MESH_TYPE_SKIN, extra_flag_word: false } }

    pub fn sorted() -> Self { Self { kind: MESH_TYPE_SORTED, extra_flag_word: false } }

    pub fn null() -> Self { Self { kind: MESH_TYPE_NULL, extra_flag_word: false } }
}

const IDENTITY: [f32; 16] =
    [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];

/// A unit quad: four vertices, two triangles.
pub fn write_mesh(w: &mut RegionWriter, mesh: &MeshFixture) {
    w.i32(mesh.kind);
    if mesh.kind == MESH_TYPE_NULL {
        return;
    }
    w.check();
    w.i32(1).i32(1).i32(-1);
    w.point(-1.0, -1.0, 0.0).point(1.0, 1.0, 0.0);
    w.point(0.0, 0.0, 0.0);
    w.f32(2.5);
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    w.i32(4);
    for (x, y) in corners {
        w.point(x, y, 0.0);
    }
    w.i32(4);
    for (x, y) in corners {
        w.point2((x + 1.0) / 2.0, (y + 1.0) / 2.0);
    }
    for _ in 0..4 {
        w.point(0.0, 0.0, 1.0);
    }
    w.u8(0).u8(1).u8(2).u8(3);
    w.i32(1).u16(0).u16(6).u32(0);
    w.i32(6);
    for i in [0, 1, 2, 0, 2, 3] {
        w.u16(i);
    }
    w.i32(0);
    w.i32(4).u32(0);
    if mesh.extra_flag_word {
        w.i32(0x7777);
    }
    w.check();

    match mesh.kind {
        MESH_TYPE_SKIN => {
            w.i32(4);
            for (x, y) in corners {
                w.point(x, y, 0.0);
            }
            for _ in 0..4 {
                w.point(0.0, 0.0, 1.0);
            }
            w.u8(0).u8(1).u8(2).u8(3);
            w.i32(2);
            for _ in 0..2 {
                for v in IDENTITY {
                    w.f32(v);
                }
            }
            w.i32(4);
            for v in [0, 1, 2, 3] {
                w.i32(v);
            }
            for v in [0, 0, 1, 1] {
                w.i32(v);
            }
            for v in [1.0, 1.0, 0.5, 0.5] {
                w.f32(v);
            }
            w.i32(2).i32(0).i32(1);
            w.check();
        }
        MESH_TYPE_SORTED => {
            w.i32(1);
            w.i32(0).i32(1).point(0.0, 0.0, 1.0).f32(0.5).i32(-1).i32(-1);
            w.i32(1).i32(0);
            w.i32(1).i32(0);
            w.i32(1).i32(4);
            w.i32(1).i32(0);
            w.i32(1);
            w.check();
        }
        _ => {}
    }
}

/// Writes one sequence: three key frames, rotation and material frame
/// channels in use.
pub fn write_sequence(w: &mut StreamWriter, inline_name: Option<&str>) {
    match inline_name {
        Some(name) => w.string(name),
        None => w.i32(2),
    };
    w.u32(0).i32(3).f32(1.5).i32(0);
    w.i32(0).i32(0);
    w.i32(0).i32(0).i32(0).i32(0).i32(5);
    w.i32(0).i32(1);
    w.f32(0.0);
    let bits: [(i32, &[u32]); 8] = [
        (3, &[0b101]),
        (0, &[]),
        (0, &[]),
        (0, &[]),
        (0, &[]),
        (0, &[]),
        (0, &[]),
        (3, &[0b111]),
    ];
    for (used, words) in bits {
        w.i32(0).i32(used);
        for word in words {
            w.u32(*word);
        }
    }
}

pub fn write_materials(w: &mut StreamWriter, names: &[&str]) {
    let n = names.len() as i32;
    w.u8(1).i32(n);
    for name in names {
        w.short_string(name);
    }
    for i in 0..n {
        w.u32(0x100 + i as u32);
    }
    for i in 0..n {
        w.i32(-i);
    }
    for i in 0..n {
        w.i32(10 + i);
    }
    for i in 0..n {
        w.i32(20 + i);
    }
    for _ in 0..n {
        w.i32(1);
    }
    for i in 0..n {
        w.i32(40 + i);
    }
}

/// Two node shape with one object, two subshapes, a quad mesh and a null
/// mesh, followed by one sequence and two materials.
pub struct ShapeFixture {
    pub version: i32,
    /// Writes a stray word before the object checkpoint.
    pub extra_object_word: bool,
    pub declared_nodes: Option<i32>,
    /// Combined node state count used before version 22.
    pub declared_states: Option<i32>,
    pub endian: Endian,
}

impl ShapeFixture {
    pub fn new(version: i32) -> Self {
        Self {
            version,
            extra_object_word: false,
            declared_nodes: None,
            declared_states: None,
            endian: Endian::Little,
        }
    }
}

pub fn write_shape(fixture: &ShapeFixture) -> Vec<u8> {
    let version = fixture.version;
    let mut w = RegionWriter::default();

    // Counts
    w.i32(fixture.declared_nodes.unwrap_or(2)).i32(1).i32(0).i32(2).i32(1);
    if version < 22 {
        w.i32(fixture.declared_states.unwrap_or(4));
    } else {
        w.i32(2).i32(2).i32(1).i32(1).i32(1);
        if version > 23 {
            w.i32(1);
        }
    }
    w.i32(1).i32(0).i32(1).i32(1).i32(2);
    if version < 23 {
        w.i32(1);
    }
    w.i32(5);
    w.i32(2).i32(0);
    w.check();

    w.f32(4.0).f32(1.5).point(0.0, 0.0, 1.0);
    w.point(-1.0, -1.0, 0.0).point(1.0, 1.0, 2.0);
    w.check();

    w.i32(0).i32(-1).i32(0).i32(1).i32(-1);
    w.i32(1).i32(0).i32(-1).i32(-1).i32(-1);
    w.check();

    w.i32(3).i32(2).i32(0).i32(1).i32(-1).i32(-1);
    if fixture.extra_object_word {
        w.i32(0);
    }
    w.check();

    // No decals
    w.check();

    w.i32(0).i32(1).i32(0).i32(0).i32(2);
    w.check();

    // Subshapes, one column at a time
    w.i32(0).i32(1);
    w.i32(0).i32(1);
    w.i32(0).i32(0);
    w.check();
    w.i32(1).i32(1);
    w.i32(1).i32(0);
    w.i32(0).i32(0);
    w.check();

    if version < 16 {
        w.i32(2).i32(0).i32(1);
    }

    w.quat([0, 0, 0, 32767]).point(0.0, 0.0, 0.0);
    w.quat([0, 0, 32767, 0]).point(0.0, 0.0, 1.0);

    w.point(1.0, 0.0, 0.0).point(2.0, 0.0, 0.0);
    w.quat([0, 0, 0, 32767]).quat([32767, 0, 0, 0]);
    w.check();

    if version > 21 {
        w.f32(0.5);
        w.point(1.0, 1.0, 1.0);
        w.point(2.0, 2.0, 2.0);
        w.quat([0, 32767, 0, 0]);
        w.check();
    }

    if version > 23 {
        w.point(0.0, 3.0, 0.0);
        w.quat([0, 0, 0, 32767]);
        w.check();
    }

    w.f32(1.0).i32(0).i32(0);
    w.check();
    // No decal states
    w.check();
    w.u32(1).f32(0.25);
    w.check();
    w.i32(4).i32(0).i32(0).f32(64.0).f32(-1.0).f32(-1.0).i32(2);
    w.check();

    write_mesh(&mut w, &MeshFixture::standard());
    write_mesh(&mut w, &MeshFixture::null());
    w.check();

    for name in ["root", "hip", "run", "body", "detail2"] {
        w.cstring(name);
    }
    w.check();

    let mut stream = StreamWriter::new(fixture.endian);
    stream.bytes(&w.finish_with(version, fixture.endian));
    stream.i32(1);
    write_sequence(&mut stream, None);
    write_materials(&mut stream, &["base.png", "glass"]);
    stream.into_inner()
}
