use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_derive::Serialize;

use crate::format::{
    region::{RegionBuffer, RegionRead},
    Box3F, DecodeError, Matrix4F, Point2F, Point3F,
};

pub const MESH_TYPE_STANDARD: i32 = 0;
pub const MESH_TYPE_SKIN: i32 = 1;
pub const MESH_TYPE_DECAL: i32 = 2;
pub const MESH_TYPE_SORTED: i32 = 3;
pub const MESH_TYPE_NULL: i32 = 4;

// Primitive type word layout
pub const PRIMITIVE_TOPOLOGY_SHIFT: u32 = 30;
pub const PRIMITIVE_MATERIAL_MASK: u32 = 0xFFFF;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, strum::Display)]
pub enum MeshKind {
    Standard,
    Skin,
    Decal,
    Sorted,
    Null,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, strum::Display)]
pub enum Topology {
    Triangles,
    Strip,
    Fan,
}

/// A run of elements in the mesh index buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Primitive {
    pub first_element: u16,
    pub num_elements: u16,
    pub kind: u32,
}

impl RegionRead for Primitive {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self { first_element: buf.get()?, num_elements: buf.get()?, kind: buf.get()? })
    }
}

impl Primitive {
    pub fn topology(&self) -> Result<Topology, DecodeError> {
        match self.kind >> PRIMITIVE_TOPOLOGY_SHIFT {
            0 => Ok(Topology::Triangles),
            1 => Ok(Topology::Strip),
            2 => Ok(Topology::Fan),
            _ => Err(DecodeError::UnknownTopology(self.kind)),
        }
    }

    #[inline]
    pub fn material_index(&self) -> usize { (self.kind & PRIMITIVE_MATERIAL_MASK) as usize }

    /// Expands the primitive into triangles of vertex indices.
    ///
    /// Strips alternate winding on every other triangle; fans pivot on the
    /// first element.
    pub fn triangles(&self, indices: &[u16]) -> Result<Vec<[u16; 3]>, DecodeError> {
        let topology = self.topology()?;
        let first = self.first_element as usize;
        let end = first + self.num_elements as usize;
        if self.num_elements > 0 && end > indices.len() {
            return Err(DecodeError::ElementOutOfRange { element: end - 1, len: indices.len() });
        }
        let mut out = Vec::new();
        match topology {
            Topology::Triangles => {
                let mut i = first;
                while i + 3 <= end {
                    out.push([indices[i], indices[i + 1], indices[i + 2]]);
                    i += 3;
                }
            }
            Topology::Strip => {
                for (n, i) in (first + 2..end).enumerate() {
                    if n % 2 == 0 {
                        out.push([indices[i], indices[i - 1], indices[i - 2]]);
                    } else {
                        out.push([indices[i], indices[i - 2], indices[i - 1]]);
                    }
                }
            }
            Topology::Fan => {
                for i in first + 2..end {
                    out.push([indices[first], indices[i - 1], indices[i]]);
                }
            }
        }
        Ok(out)
    }
}

/// Sorting cluster of a sorted mesh.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Cluster {
    pub start_primitive: i32,
    pub end_primitive: i32,
    pub normal: Point3F,
    pub k: f32,
    pub front_cluster: i32,
    pub back_cluster: i32,
}

impl RegionRead for Cluster {
    fn read_regions(buf: &mut RegionBuffer) -> Result<Self, DecodeError> {
        Ok(Self {
            start_primitive: buf.get()?,
            end_primitive: buf.get()?,
            normal: buf.get()?,
            k: buf.get()?,
            front_cluster: buf.get()?,
            back_cluster: buf.get()?,
        })
    }
}

/// Geometry shared by every non-null mesh kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MeshData {
    pub num_frames: i32,
    pub num_mat_frames: i32,
    pub parent: i32,
    pub bounds: Box3F,
    pub center: Point3F,
    pub radius: f32,
    pub verts: Vec<Point3F>,
    pub tverts: Vec<Point2F>,
    pub normals: Vec<Point3F>,
    pub encoded_normals: Vec<u8>,
    pub primitives: Vec<Primitive>,
    pub indices: Vec<u16>,
    pub merge_indices: Vec<u16>,
    pub verts_per_frame: i32,
    pub flags: u32,
}

impl MeshData {
    fn read(buf: &mut RegionBuffer) -> Result<Self> {
        buf.check()?;
        let num_frames = buf.get()?;
        let num_mat_frames = buf.get()?;
        let parent = buf.get()?;
        let bounds = buf.get()?;
        let center = buf.get()?;
        let radius = buf.get()?;
        let num_verts = buf.get_count("vertex")?;
        let verts = buf.get_vec(num_verts).context("Failed to read vertices")?;
        let tverts = buf.get_counted("texture vertex").context("Failed to read texture vertices")?;
        let normals = buf.get_vec(num_verts).context("Failed to read normals")?;
        let encoded_normals = buf.consume8(num_verts)?.to_vec();
        let primitives = buf.get_counted("primitive").context("Failed to read primitives")?;
        let indices = buf.get_counted("index").context("Failed to read indices")?;
        let merge_indices = buf.get_counted("merge index").context("Failed to read merge indices")?;
        let verts_per_frame = buf.get()?;
        let flags = buf.get()?;
        buf.check()?;
        Ok(Self {
            num_frames,
            num_mat_frames,
            parent,
            bounds,
            center,
            radius,
            verts,
            tverts,
            normals,
            encoded_normals,
            primitives,
            indices,
            merge_indices,
            verts_per_frame,
            flags,
        })
    }

    /// Expands every primitive into triangles, grouped by material index.
    pub fn triangles(&self) -> Result<BTreeMap<usize, Vec<[u16; 3]>>, DecodeError> {
        let mut out: BTreeMap<usize, Vec<[u16; 3]>> = BTreeMap::new();
        for primitive in &self.primitives {
            let tris = primitive.triangles(&self.indices)?;
            out.entry(primitive.material_index()).or_default().extend(tris);
        }
        Ok(out)
    }
}

/// Bind pose and vertex weights of a skinned mesh.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SkinData {
    pub initial_verts: Vec<Point3F>,
    pub initial_normals: Vec<Point3F>,
    pub initial_encoded_normals: Vec<u8>,
    pub node_transforms: Vec<Matrix4F>,
    pub vertex_index: Vec<i32>,
    pub bone_index: Vec<i32>,
    pub weight: Vec<f32>,
    pub node_index: Vec<i32>,
}

impl SkinData {
    fn read(buf: &mut RegionBuffer) -> Result<Self> {
        let num_verts = buf.get_count("initial vertex")?;
        let initial_verts = buf.get_vec(num_verts).context("Failed to read initial vertices")?;
        let initial_normals = buf.get_vec(num_verts).context("Failed to read initial normals")?;
        let initial_encoded_normals = buf.consume8(num_verts)?.to_vec();
        let node_transforms =
            buf.get_counted("node transform").context("Failed to read node transforms")?;
        let num_weights = buf.get_count("vertex weight")?;
        let vertex_index = buf.get_vec(num_weights).context("Failed to read vertex indices")?;
        let bone_index = buf.get_vec(num_weights).context("Failed to read bone indices")?;
        let weight = buf.get_vec(num_weights).context("Failed to read vertex weights")?;
        let node_index = buf.get_counted("node index").context("Failed to read node indices")?;
        buf.check()?;
        Ok(Self {
            initial_verts,
            initial_normals,
            initial_encoded_normals,
            node_transforms,
            vertex_index,
            bone_index,
            weight,
            node_index,
        })
    }
}

/// Back-to-front sorting data of a sorted mesh.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SortData {
    pub clusters: Vec<Cluster>,
    pub start_cluster: Vec<i32>,
    pub first_verts: Vec<i32>,
    pub num_verts: Vec<i32>,
    pub first_tverts: Vec<i32>,
    pub always_write_depth: bool,
}

impl SortData {
    fn read(buf: &mut RegionBuffer) -> Result<Self> {
        let clusters = buf.get_counted("cluster").context("Failed to read clusters")?;
        let start_cluster = buf.get_counted("start cluster")?;
        let first_verts = buf.get_counted("first vertex")?;
        let num_verts = buf.get_counted("vertex count")?;
        let first_tverts = buf.get_counted("first texture vertex")?;
        let always_write_depth = buf.get::<i32>()? != 0;
        buf.check()?;
        Ok(Self { clusters, start_cluster, first_verts, num_verts, first_tverts, always_write_depth })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkinMesh {
    pub data: MeshData,
    pub skin: SkinData,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SortedMesh {
    pub data: MeshData,
    pub sort: SortData,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Mesh {
    Standard(MeshData),
    Skin(SkinMesh),
    Decal(MeshData),
    Sorted(SortedMesh),
    /// Placeholder without geometry.
    Null,
}

impl Mesh {
    /// Decodes one mesh, dispatching on its leading type tag.
    pub fn read(buf: &mut RegionBuffer) -> Result<Self> {
        let kind: i32 = buf.get()?;
        Ok(match kind {
            MESH_TYPE_NULL => Mesh::Null,
            MESH_TYPE_STANDARD => Mesh::Standard(MeshData::read(buf)?),
            MESH_TYPE_DECAL => Mesh::Decal(MeshData::read(buf)?),
            MESH_TYPE_SKIN => {
                let data = MeshData::read(buf)?;
                let skin = SkinData::read(buf).context("Failed to read skin data")?;
                Mesh::Skin(SkinMesh { data, skin })
            }
            MESH_TYPE_SORTED => {
                let data = MeshData::read(buf)?;
                let sort = SortData::read(buf).context("Failed to read sort data")?;
                Mesh::Sorted(SortedMesh { data, sort })
            }
            kind => return Err(DecodeError::UnknownMeshType(kind).into()),
        })
    }

    pub fn kind(&self) -> MeshKind {
        match self {
            Mesh::Standard(_) => MeshKind::Standard,
            Mesh::Skin(_) => MeshKind::Skin,
            Mesh::Decal(_) => MeshKind::Decal,
            Mesh::Sorted(_) => MeshKind::Sorted,
            Mesh::Null => MeshKind::Null,
        }
    }

    /// Common geometry, absent for null meshes.
    pub fn data(&self) -> Option<&MeshData> {
        match self {
            Mesh::Standard(data) | Mesh::Decal(data) => Some(data),
            Mesh::Skin(SkinMesh { data, .. }) | Mesh::Sorted(SortedMesh { data, .. }) => Some(data),
            Mesh::Null => None,
        }
    }

    pub fn skin(&self) -> Option<&SkinData> {
        match self {
            Mesh::Skin(mesh) => Some(&mesh.skin),
            _ => None,
        }
    }

    pub fn sort(&self) -> Option<&SortData> {
        match self {
            Mesh::Sorted(mesh) => Some(&mesh.sort),
            _ => None,
        }
    }
}
