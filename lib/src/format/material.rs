use std::io::{Read, Seek};

use anyhow::{Context, Result};
use binrw::{BinRead, BinReaderExt, Endian};
use serde_derive::Serialize;

use crate::format::ShortString;

/// Material list trailing a shape, stored column by column.
#[derive(BinRead, Clone, Debug)]
pub struct MaterialList {
    pub version: u8,
    #[br(assert(count >= 0, "negative material count {}", count))]
    pub count: i32,
    #[br(count = count as usize)]
    pub names: Vec<ShortString>,
    #[br(count = count as usize)]
    pub flags: Vec<u32>,
    #[br(count = count as usize)]
    pub reflectance: Vec<i32>,
    #[br(count = count as usize)]
    pub bump: Vec<i32>,
    #[br(count = count as usize)]
    pub detail: Vec<i32>,
    #[br(count = count as usize)]
    pub detail_scale: Vec<i32>,
    #[br(count = count as usize)]
    pub reflection: Vec<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Material {
    /// Name as stored, usually a texture file name.
    pub name: String,
    pub flags: u32,
    pub reflectance: i32,
    pub bump: i32,
    pub detail: i32,
    pub detail_scale: i32,
    pub reflection: i32,
}

impl Material {
    /// Material name without its file extension.
    pub fn stem(&self) -> &str { material_stem(&self.name) }
}

/// Strips the extension from a stored material name.
pub fn material_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) => &name[..pos],
        None => name,
    }
}

impl MaterialList {
    pub fn read<R: Read + Seek>(reader: &mut R, e: Endian) -> Result<Self> {
        let list: Self = reader.read_type(e).context("Failed to read material list")?;
        log::debug!("Material list version {}: {} materials", list.version, list.count);
        Ok(list)
    }

    /// Reassembles the columns into one record per material.
    pub fn into_materials(self) -> Vec<Material> {
        let MaterialList { names, flags, reflectance, bump, detail, detail_scale, reflection, .. } =
            self;
        names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Material {
                name: name.into_string(),
                flags: flags[i],
                reflectance: reflectance[i],
                bump: bump[i],
                detail: detail[i],
                detail_scale: detail_scale[i],
                reflection: reflection[i],
            })
            .collect()
    }
}
