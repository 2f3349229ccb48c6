use std::{
    io::{Cursor, Read, Seek},
    ops::Range,
};

use anyhow::{Context, Result};
use binrw::Endian;
use serde_derive::Serialize;

use crate::format::{
    material::{Material, MaterialList},
    mesh::Mesh,
    region::{RegionBuffer, RegionRead},
    sequence::{read_sequences, Sequence, Trigger},
    Box3F, DecodeError, Point3F, Quaternion,
};

/// First version storing rotations, translations and scales separately.
pub const VERSION_SEPARATE_STATES: i32 = 22;
/// First version without the legacy skin count.
pub const VERSION_NO_SKIN_COUNT: i32 = 23;
/// First version with ground frames.
pub const VERSION_GROUND_FRAMES: i32 = 24;
/// First version without the mesh index list.
pub const VERSION_NO_MESH_INDEX_LIST: i32 = 16;

pub const NULL_NAME: &str = "(null)";
pub const INVALID_NAME: &str = "(invalid)";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Node {
    pub name: i32,
    pub parent: i32,
    pub first_object: i32,
    pub child: i32,
    pub sibling: i32,
}

impl Node {
    #[inline]
    pub fn is_root(&self) -> bool { self.parent < 0 }
}

impl RegionRead for Node {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self {
            name: buf.get()?,
            parent: buf.get()?,
            first_object: buf.get()?,
            child: buf.get()?,
            sibling: buf.get()?,
        })
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Object {
    pub name: i32,
    pub num_meshes: i32,
    pub first_mesh: i32,
    pub node: i32,
    pub sibling: i32,
    pub first_decal: i32,
}

impl RegionRead for Object {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self {
            name: buf.get()?,
            num_meshes: buf.get()?,
            first_mesh: buf.get()?,
            node: buf.get()?,
            sibling: buf.get()?,
            first_decal: buf.get()?,
        })
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Decal {
    pub name: i32,
    pub num_meshes: i32,
    pub first_mesh: i32,
    pub object: i32,
    pub sibling: i32,
}

impl RegionRead for Decal {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self {
            name: buf.get()?,
            num_meshes: buf.get()?,
            first_mesh: buf.get()?,
            object: buf.get()?,
            sibling: buf.get()?,
        })
    }
}

/// Material animated from an image file list.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct IflMaterial {
    pub name: i32,
    pub slot: i32,
    pub first_frame: i32,
    pub time: i32,
    pub num_frames: i32,
}

impl RegionRead for IflMaterial {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self {
            name: buf.get()?,
            slot: buf.get()?,
            first_frame: buf.get()?,
            time: buf.get()?,
            num_frames: buf.get()?,
        })
    }
}

/// Contiguous slice of the node, object and decal tables.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Subshape {
    pub first_node: i32,
    pub first_object: i32,
    pub first_decal: i32,
    pub num_nodes: i32,
    pub num_objects: i32,
    pub num_decals: i32,
}

impl Subshape {
    pub fn node_range(&self) -> Range<i32> {
        self.first_node..self.first_node.saturating_add(self.num_nodes)
    }

    pub fn object_range(&self) -> Range<i32> {
        self.first_object..self.first_object.saturating_add(self.num_objects)
    }

    pub fn decal_range(&self) -> Range<i32> {
        self.first_decal..self.first_decal.saturating_add(self.num_decals)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct ObjectState {
    pub vis: f32,
    pub frame: i32,
    pub mat_frame: i32,
}

impl RegionRead for ObjectState {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self { vis: buf.get()?, frame: buf.get()?, mat_frame: buf.get()? })
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DecalState {
    pub frame: i32,
}

impl RegionRead for DecalState {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self { frame: buf.get()? })
    }
}

impl RegionRead for Trigger {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self { state: buf.get()?, pos: buf.get()? })
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct DetailLevel {
    pub name: i32,
    pub subshape: i32,
    pub object_detail: i32,
    pub size: f32,
    pub average_error: f32,
    pub max_error: f32,
    pub poly_count: i32,
}

impl RegionRead for DetailLevel {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self {
            name: buf.get()?,
            subshape: buf.get()?,
            object_detail: buf.get()?,
            size: buf.get()?,
            average_error: buf.get()?,
            max_error: buf.get()?,
            poly_count: buf.get()?,
        })
    }
}

/// Table sizes declared at the start of the 32-bit region.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ShapeStats {
    pub nodes: usize,
    pub objects: usize,
    pub decals: usize,
    pub subshapes: usize,
    pub ifl_materials: usize,
    pub node_rotations: usize,
    pub node_translations: usize,
    pub node_scales_uniform: usize,
    pub node_scales_aligned: usize,
    pub node_scales_arbitrary: usize,
    pub ground_frames: usize,
    pub object_states: usize,
    pub decal_states: usize,
    pub triggers: usize,
    pub detail_levels: usize,
    pub meshes: usize,
    pub skins: usize,
    pub names: usize,
}

impl ShapeStats {
    fn read(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        let version = buf.version();
        let mut stats = ShapeStats {
            nodes: buf.get_count("node")?,
            objects: buf.get_count("object")?,
            decals: buf.get_count("decal")?,
            subshapes: buf.get_count("subshape")?,
            ifl_materials: buf.get_count("IFL material")?,
            ..Default::default()
        };
        if version < VERSION_SEPARATE_STATES {
            // One count covering default and animated node states
            let states: i32 = buf.get()?;
            let count = states.wrapping_sub(stats.nodes as i32);
            let rotations = usize::try_from(count)
                .map_err(|_| DecodeError::NegativeCount { what: "node rotation", count })?;
            stats.node_rotations = rotations;
            stats.node_translations = rotations;
        } else {
            stats.node_rotations = buf.get_count("node rotation")?;
            stats.node_translations = buf.get_count("node translation")?;
            stats.node_scales_uniform = buf.get_count("uniform scale")?;
            stats.node_scales_aligned = buf.get_count("aligned scale")?;
            stats.node_scales_arbitrary = buf.get_count("arbitrary scale")?;
            if version >= VERSION_GROUND_FRAMES {
                stats.ground_frames = buf.get_count("ground frame")?;
            }
        }
        stats.object_states = buf.get_count("object state")?;
        stats.decal_states = buf.get_count("decal state")?;
        stats.triggers = buf.get_count("trigger")?;
        stats.detail_levels = buf.get_count("detail level")?;
        stats.meshes = buf.get_count("mesh")?;
        if version < VERSION_NO_SKIN_COUNT {
            stats.skins = buf.get_count("skin")?;
        }
        stats.names = buf.get_count("name")?;
        Ok(stats)
    }
}

/// Fully decoded shape.
///
/// Tables reference each other by plain index; nothing is validated against
/// table bounds while decoding.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ShapeModel {
    pub version: i32,
    /// Legacy skin count, zero from version 23 on.
    pub num_skins: usize,
    pub smallest_size: f32,
    pub smallest_detail_level: i32,
    pub radius: f32,
    pub tube_radius: f32,
    pub center: Point3F,
    pub bounds: Box3F,
    pub nodes: Vec<Node>,
    pub objects: Vec<Object>,
    pub decals: Vec<Decal>,
    pub ifl_materials: Vec<IflMaterial>,
    pub subshapes: Vec<Subshape>,
    pub default_rotations: Vec<Quaternion>,
    pub default_translations: Vec<Point3F>,
    pub node_rotations: Vec<Quaternion>,
    pub node_translations: Vec<Point3F>,
    pub node_scales_uniform: Vec<f32>,
    pub node_scales_aligned: Vec<Point3F>,
    pub node_scales_arbitrary: Vec<Point3F>,
    pub node_scale_rots_arbitrary: Vec<Quaternion>,
    pub ground_translations: Vec<Point3F>,
    pub ground_rotations: Vec<Quaternion>,
    pub object_states: Vec<ObjectState>,
    pub decal_states: Vec<DecalState>,
    pub triggers: Vec<Trigger>,
    pub detail_levels: Vec<DetailLevel>,
    pub meshes: Vec<Mesh>,
    pub names: Vec<String>,
    pub sequences: Vec<Sequence>,
    pub materials: Vec<Material>,
}

/// Reads `count` records followed by a checkpoint.
fn read_table<T: RegionRead>(buf: &mut RegionBuffer, count: usize, what: &str) -> Result<Vec<T>> {
    let table = buf.get_vec(count).with_context(|| format!("Failed to read {what}"))?;
    buf.check().with_context(|| format!("Failed to validate {what}"))?;
    log::debug!("Read {count} {what}, cursors at {:?}", buf.positions());
    Ok(table)
}

impl ShapeModel {
    pub fn slice(data: &[u8], e: Endian) -> Result<Self> { Self::read(&mut Cursor::new(data), e) }

    /// Decodes a complete shape: the word regions, then the sequence and
    /// material blocks that follow them.
    pub fn read<R: Read + Seek>(reader: &mut R, e: Endian) -> Result<Self> {
        let mut buf = RegionBuffer::load(reader, e)?;
        let mut shape = Self::decode_regions(&mut buf)?;
        if !buf.is_exhausted() {
            log::warn!(
                "Unread region data: cursors at {:?}, regions hold {:?} words",
                buf.positions(),
                buf.capacities()
            );
        }
        shape.sequences =
            read_sequences(reader, e, false).context("Failed to read sequence block")?;
        shape.materials = MaterialList::read(reader, e)?.into_materials();
        Ok(shape)
    }

    /// Decodes the structural sections held in the word regions.
    pub(crate) fn decode_regions(buf: &mut RegionBuffer) -> Result<Self> {
        let version = buf.version();
        let stats = ShapeStats::read(buf).context("Failed to read header counts")?;
        log::debug!("Shape counts: {stats:?}");

        // Stored as an integer
        let smallest_size = buf.get::<i32>()? as f32;
        let smallest_detail_level = buf.get()?;
        buf.check().context("Failed to validate header")?;

        let radius = buf.get()?;
        let tube_radius = buf.get()?;
        let center = buf.get()?;
        let bounds = buf.get()?;
        buf.check().context("Failed to validate bounds")?;

        let nodes = read_table(buf, stats.nodes, "nodes")?;
        let objects = read_table(buf, stats.objects, "objects")?;
        let decals = read_table(buf, stats.decals, "decals")?;
        let ifl_materials = read_table(buf, stats.ifl_materials, "IFL materials")?;
        let subshapes = read_subshapes(buf, stats.subshapes).context("Failed to read subshapes")?;

        if version < VERSION_NO_MESH_INDEX_LIST {
            let count = buf.get_count("mesh index")?;
            buf.consume32(count).context("Failed to skip mesh index list")?;
        }

        let mut default_rotations = Vec::with_capacity(stats.nodes);
        let mut default_translations = Vec::with_capacity(stats.nodes);
        for _ in 0..stats.nodes {
            default_rotations.push(buf.get()?);
            default_translations.push(buf.get()?);
        }

        let node_translations = buf.get_vec(stats.node_translations)?;
        let node_rotations = read_table(buf, stats.node_rotations, "node transforms")?;

        let mut node_scales_uniform = Vec::new();
        let mut node_scales_aligned = Vec::new();
        let mut node_scales_arbitrary = Vec::new();
        let mut node_scale_rots_arbitrary = Vec::new();
        if version >= VERSION_SEPARATE_STATES {
            node_scales_uniform = buf.get_vec(stats.node_scales_uniform)?;
            node_scales_aligned = buf.get_vec(stats.node_scales_aligned)?;
            node_scales_arbitrary = buf.get_vec(stats.node_scales_arbitrary)?;
            node_scale_rots_arbitrary =
                read_table(buf, stats.node_scales_arbitrary, "node scales")?;
        }

        let mut ground_translations = Vec::new();
        let mut ground_rotations = Vec::new();
        if version >= VERSION_GROUND_FRAMES {
            ground_translations = buf.get_vec(stats.ground_frames)?;
            ground_rotations = read_table(buf, stats.ground_frames, "ground frames")?;
        }

        let object_states = read_table(buf, stats.object_states, "object states")?;
        let decal_states = read_table(buf, stats.decal_states, "decal states")?;
        let triggers = read_table(buf, stats.triggers, "triggers")?;
        let detail_levels = read_table(buf, stats.detail_levels, "detail levels")?;

        let mut meshes = Vec::with_capacity(stats.meshes.min(buf.capacities()[0]));
        for i in 0..stats.meshes {
            let mesh = Mesh::read(buf).with_context(|| format!("Failed to read mesh {i}"))?;
            log::trace!("Mesh {i}: {}", mesh.kind());
            meshes.push(mesh);
        }
        buf.check().context("Failed to validate meshes")?;

        let mut names = Vec::with_capacity(stats.names.min(buf.capacities()[2]));
        for i in 0..stats.names {
            names.push(buf.get_cstring().with_context(|| format!("Failed to read name {i}"))?);
        }
        buf.check().context("Failed to validate names")?;

        Ok(Self {
            version,
            num_skins: stats.skins,
            smallest_size,
            smallest_detail_level,
            radius,
            tube_radius,
            center,
            bounds,
            nodes,
            objects,
            decals,
            ifl_materials,
            subshapes,
            default_rotations,
            default_translations,
            node_rotations,
            node_translations,
            node_scales_uniform,
            node_scales_aligned,
            node_scales_arbitrary,
            node_scale_rots_arbitrary,
            ground_translations,
            ground_rotations,
            object_states,
            decal_states,
            triggers,
            detail_levels,
            meshes,
            names,
            sequences: Vec::new(),
            materials: Vec::new(),
        })
    }

    pub fn stats(&self) -> ShapeStats {
        ShapeStats {
            nodes: self.nodes.len(),
            objects: self.objects.len(),
            decals: self.decals.len(),
            subshapes: self.subshapes.len(),
            ifl_materials: self.ifl_materials.len(),
            node_rotations: self.node_rotations.len(),
            node_translations: self.node_translations.len(),
            node_scales_uniform: self.node_scales_uniform.len(),
            node_scales_aligned: self.node_scales_aligned.len(),
            node_scales_arbitrary: self.node_scales_arbitrary.len(),
            ground_frames: self.ground_translations.len(),
            object_states: self.object_states.len(),
            decal_states: self.decal_states.len(),
            triggers: self.triggers.len(),
            detail_levels: self.detail_levels.len(),
            meshes: self.meshes.len(),
            skins: self.num_skins,
            names: self.names.len(),
        }
    }

    /// Looks up an entry of the name table.
    pub fn name(&self, index: i32) -> &str {
        if index < 0 {
            return NULL_NAME;
        }
        self.names.get(index as usize).map_or(INVALID_NAME, String::as_str)
    }

    pub fn node_name(&self, index: i32) -> &str {
        match lookup(&self.nodes, index) {
            Ok(node) => self.name(node.name),
            Err(name) => name,
        }
    }

    pub fn object_name(&self, index: i32) -> &str {
        match lookup(&self.objects, index) {
            Ok(object) => self.name(object.name),
            Err(name) => name,
        }
    }

    pub fn decal_name(&self, index: i32) -> &str {
        match lookup(&self.decals, index) {
            Ok(decal) => self.name(decal.name),
            Err(name) => name,
        }
    }

    /// Index of the first node called `name`.
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| self.name(node.name) == name)
    }

    pub fn node_is_linked_to_object(&self, node: i32) -> bool {
        self.objects.iter().any(|object| object.node == node)
    }

    pub fn root_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().enumerate().filter(|(_, node)| node.is_root()).map(|(i, _)| i)
    }

    /// Nodes whose parent is `node`, in table order.
    pub fn children(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| usize::try_from(n.parent).ok() == Some(node))
            .map(|(i, _)| i)
    }
}

fn lookup<T>(table: &[T], index: i32) -> Result<&T, &'static str> {
    if index < 0 {
        return Err(NULL_NAME);
    }
    table.get(index as usize).ok_or(INVALID_NAME)
}

/// Subshapes are stored column by column: every first node, then every first
/// object, and so on, with a checkpoint after the first and count columns.
fn read_subshapes(buf: &mut RegionBuffer, count: usize) -> Result<Vec<Subshape>> {
    let first_node: Vec<i32> = buf.get_vec(count)?;
    let first_object: Vec<i32> = buf.get_vec(count)?;
    let first_decal: Vec<i32> = buf.get_vec(count)?;
    buf.check()?;
    let num_nodes: Vec<i32> = buf.get_vec(count)?;
    let num_objects: Vec<i32> = buf.get_vec(count)?;
    let num_decals: Vec<i32> = buf.get_vec(count)?;
    buf.check()?;
    Ok((0..count)
        .map(|i| Subshape {
            first_node: first_node[i],
            first_object: first_object[i],
            first_decal: first_decal[i],
            num_nodes: num_nodes[i],
            num_objects: num_objects[i],
            num_decals: num_decals[i],
        })
        .collect())
}
