use std::io::{Read, Seek, Write};

use binrw::{prelude::*, Endian};

/// Length-prefixed UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BinString(pub String);

impl BinRead for BinString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let length = u32::read_options(reader, endian, ())?;
        let pos = reader.stream_position()?;
        let mut bytes = Vec::new();
        reader.by_ref().take(length as u64).read_to_end(&mut bytes)?;
        if bytes.len() != length as usize {
            return Err(binrw::Error::AssertFail {
                pos,
                message: format!("Text of {} bytes ends after {} bytes", length, bytes.len()),
            });
        }
        String::from_utf8(bytes).map(Self).map_err(|err| binrw::Error::AssertFail {
            pos,
            message: format!("Bad UTF-8 text: {}", err),
        })
    }
}

impl BinWrite for BinString {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        let length = u32::try_from(self.0.len()).map_err(|_| binrw::Error::AssertFail {
            pos: 0,
            message: format!("Text of {} bytes is too long", self.0.len()),
        })?;
        length.write_options(writer, endian, ())?;
        writer.write_all(self.0.as_bytes())?;
        Ok(())
    }
}

impl From<&str> for BinString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One byte, 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BinBool(pub bool);

impl BinRead for BinBool {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        match u8::read_options(reader, endian, ())? {
            0 => Ok(Self(false)),
            1 => Ok(Self(true)),
            value => {
                let pos = reader.stream_position()?;
                Err(binrw::Error::AssertFail {
                    pos,
                    message: format!("Bad boolean value: {}", value),
                })
            }
        }
    }
}

impl BinWrite for BinBool {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        u8::from(self.0).write_options(writer, endian, ())
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct ModelRecord {
    #[bw(calc = materials.len() as u32)]
    material_count: u32,
    #[br(count = material_count)]
    pub materials: Vec<MaterialRecord>,
    #[bw(calc = meshes.len() as u32)]
    mesh_count: u32,
    #[br(count = mesh_count)]
    pub meshes: Vec<MeshRecord>,
    #[bw(calc = bones.len() as u32)]
    bone_count: u32,
    #[br(count = bone_count)]
    pub bones: Vec<BoneRecord>,
    #[bw(calc = BinBool(root.is_some()))]
    has_skeleton: BinBool,
    #[br(if(has_skeleton.0), args { depth: 0 })]
    pub root: Option<NodeRecord>,
    #[bw(calc = clips.len() as u32)]
    clip_count: u32,
    #[br(count = clip_count)]
    pub clips: Vec<ClipRecord>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextureUsageRecord {
    #[brw(magic = 0u8)]
    Diffuse,
    #[brw(magic = 1u8)]
    SpecularMap,
    #[brw(magic = 2u8)]
    Ambient,
    #[brw(magic = 3u8)]
    Emissive,
    #[brw(magic = 4u8)]
    Heightmap,
    #[brw(magic = 5u8)]
    NormalMap,
    #[brw(magic = 6u8)]
    SpecularPowerMap,
    #[brw(magic = 7u8)]
    DisplacementMap,
    #[brw(magic = 8u8)]
    LightMap,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct TextureRecord {
    pub usage: TextureUsageRecord,
    pub path: BinString,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct MaterialRecord {
    pub name: BinString,
    #[bw(calc = textures.len() as u32)]
    texture_count: u32,
    #[br(count = texture_count)]
    pub textures: Vec<TextureRecord>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct Vec3ListRecord {
    #[bw(calc = items.len() as u32)]
    count: u32,
    #[br(count = count)]
    pub items: Vec<[f32; 3]>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct Vec4ListRecord {
    #[bw(calc = items.len() as u32)]
    count: u32,
    #[br(count = count)]
    pub items: Vec<[f32; 4]>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct VertexWeightRecord {
    pub weight: f32,
    pub bone_index: u32,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct VertexWeightsRecord {
    #[bw(calc = weights.len() as u8)]
    count: u8,
    #[br(count = count)]
    pub weights: Vec<VertexWeightRecord>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct MeshRecord {
    pub name: BinString,
    pub material_index: u32,
    pub positions: Vec3ListRecord,
    pub normals: Vec3ListRecord,
    pub tangents: Vec3ListRecord,
    pub binormals: Vec3ListRecord,
    #[bw(calc = tex_coords.len() as u32)]
    tex_coord_set_count: u32,
    #[br(count = tex_coord_set_count)]
    pub tex_coords: Vec<Vec3ListRecord>,
    #[bw(calc = colors.len() as u32)]
    color_set_count: u32,
    #[br(count = color_set_count)]
    pub colors: Vec<Vec4ListRecord>,
    pub face_count: u32,
    #[bw(calc = indices.len() as u32)]
    index_count: u32,
    #[br(count = index_count)]
    pub indices: Vec<u32>,
    #[bw(calc = bone_weights.len() as u32)]
    bone_weight_count: u32,
    #[br(count = bone_weight_count)]
    pub bone_weights: Vec<VertexWeightsRecord>,
}

/// Scene node part first, then the bone part.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct BoneRecord {
    pub name: BinString,
    pub transform: [f32; 16],
    pub index: u32,
    pub offset_transform: [f32; 16],
}

/// Deepest hierarchy level a file may nest, the root being level 0.
pub(crate) const MAX_NODE_DEPTH: u32 = 128;

/// Hierarchy node. Bones only carry their name, their data lives in the
/// bone list.
#[binrw]
#[brw(little)]
#[br(import { depth: u32 })]
#[derive(Debug, Clone)]
pub(crate) struct NodeRecord {
    #[br(assert(
        depth <= MAX_NODE_DEPTH,
        "Node {} nested deeper than {} levels",
        name.0,
        MAX_NODE_DEPTH
    ))]
    pub name: BinString,
    pub is_bone: BinBool,
    #[br(if(!is_bone.0))]
    pub transform: Option<[f32; 16]>,
    #[bw(calc = children.len() as u32)]
    child_count: u32,
    #[br(args { count: child_count as usize, inner: binrw::args! { depth: depth + 1 } })]
    pub children: Vec<NodeRecord>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyframeRecord {
    pub time: f32,
    pub translation: [f32; 3],
    /// x, y, z, w
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct TrackRecord {
    pub bone_name: BinString,
    #[bw(calc = keyframes.len() as u32)]
    keyframe_count: u32,
    #[br(count = keyframe_count)]
    pub keyframes: Vec<KeyframeRecord>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct ClipRecord {
    pub name: BinString,
    pub duration: f32,
    pub ticks_per_second: f32,
    #[bw(calc = tracks.len() as u32)]
    track_count: u32,
    #[br(count = track_count)]
    pub tracks: Vec<TrackRecord>,
    pub keyframe_count: u32,
}
