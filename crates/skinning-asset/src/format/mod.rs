//! Layout, all little-endian:
//!
//! 1. Materials: count, then per material its name and its textures
//!    (count, then usage tag byte and path each).
//! 2. Meshes: count, then per mesh its name, material index, vertex
//!    attribute lists, face count, indices and per-vertex bone weights.
//! 3. Bones: count, then per bone its name, local transform, index and
//!    offset transform. Index equals position in the list.
//! 4. Hierarchy: a presence byte, then the root node. Each node is its name,
//!    a bone flag byte, the local transform for non-bone nodes only, a child
//!    count and the children. Nodes nest at most `MAX_NODE_DEPTH` levels
//!    below the root.
//! 5. Clips: count, then per clip its name, duration, ticks per second,
//!    tracks (bone name and keyframes each) and keyframe count.
//!
//! Strings are a `u32` byte length followed by UTF-8. Matrices are 16
//! `f32` in glam column order.

use std::{
    collections::{HashMap, HashSet},
    error::Error,
    fmt::{self, Display, Formatter},
    fs::File,
    io::{self, BufReader, BufWriter, Read, Seek, Write},
    path::Path,
};

use binrw::{BinRead, BinWrite};
use glam::{Mat4, Quat, Vec3};
use log::trace;

use crate::{
    animation::{AnimationClip, AnimationError, AnimationTrack, Keyframe},
    material::{MaterialAsset, MaterialTexture, TextureUsage},
    mesh::{BoneVertexWeights, MeshAsset, MeshError},
    model::{Model, ModelData, ModelError},
    node::{Bone, NodeId, SceneGraph, SceneGraphError, SceneNode},
};

use record::{
    BinBool, BinString, BoneRecord, ClipRecord, KeyframeRecord, MaterialRecord, MeshRecord,
    ModelRecord, NodeRecord, TextureRecord, TextureUsageRecord, TrackRecord, Vec3ListRecord,
    Vec4ListRecord, VertexWeightRecord, VertexWeightsRecord, MAX_NODE_DEPTH,
};

mod record;

#[derive(Debug)]
pub enum ModelFormatError {
    Format(binrw::Error),
    Io(io::Error),
    BadBoneIndex { expected: u32, actual: u32 },
    UnknownBone(String),
    DuplicateBoneInHierarchy(String),
    MissingTransform(String),
    KeyframeCountMismatch { clip: String, expected: u32, actual: u32 },
    TooLarge(&'static str, usize),
    TooDeep(String),
    Animation(AnimationError),
    Mesh(MeshError),
    SceneGraph(SceneGraphError),
    Model(ModelError),
}

impl Display for ModelFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ModelFormatError::Format(error) => Display::fmt(error, f),
            ModelFormatError::Io(error) => Display::fmt(error, f),
            ModelFormatError::BadBoneIndex { expected, actual } => write!(
                f,
                "Bad bone record index: expected {}, but got {}",
                expected, actual
            ),
            ModelFormatError::UnknownBone(name) => write!(f, "Unknown bone {}", name),
            ModelFormatError::DuplicateBoneInHierarchy(name) => {
                write!(f, "Bone {} appears more than once in the hierarchy", name)
            }
            ModelFormatError::MissingTransform(name) => {
                write!(f, "Node {} has no transform", name)
            }
            ModelFormatError::KeyframeCountMismatch {
                clip,
                expected,
                actual,
            } => write!(
                f,
                "Clip {} stores keyframe count {}, but its tracks have {}",
                clip, actual, expected
            ),
            ModelFormatError::TooLarge(what, count) => {
                write!(f, "Too many {} to store: {}", what, count)
            }
            ModelFormatError::TooDeep(name) => write!(
                f,
                "Node {} is nested deeper than {} levels",
                name, MAX_NODE_DEPTH
            ),
            ModelFormatError::Animation(error) => Display::fmt(error, f),
            ModelFormatError::Mesh(error) => Display::fmt(error, f),
            ModelFormatError::SceneGraph(error) => Display::fmt(error, f),
            ModelFormatError::Model(error) => Display::fmt(error, f),
        }
    }
}

impl Error for ModelFormatError {}

impl From<binrw::Error> for ModelFormatError {
    fn from(value: binrw::Error) -> Self {
        Self::Format(value)
    }
}

impl From<io::Error> for ModelFormatError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<AnimationError> for ModelFormatError {
    fn from(value: AnimationError) -> Self {
        Self::Animation(value)
    }
}

impl From<MeshError> for ModelFormatError {
    fn from(value: MeshError) -> Self {
        Self::Mesh(value)
    }
}

impl From<SceneGraphError> for ModelFormatError {
    fn from(value: SceneGraphError) -> Self {
        Self::SceneGraph(value)
    }
}

impl From<ModelError> for ModelFormatError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

fn check_count(what: &'static str, count: usize) -> Result<u32, ModelFormatError> {
    u32::try_from(count).map_err(|_| ModelFormatError::TooLarge(what, count))
}

impl From<TextureUsage> for TextureUsageRecord {
    fn from(value: TextureUsage) -> Self {
        match value {
            TextureUsage::Diffuse => Self::Diffuse,
            TextureUsage::SpecularMap => Self::SpecularMap,
            TextureUsage::Ambient => Self::Ambient,
            TextureUsage::Emissive => Self::Emissive,
            TextureUsage::Heightmap => Self::Heightmap,
            TextureUsage::NormalMap => Self::NormalMap,
            TextureUsage::SpecularPowerMap => Self::SpecularPowerMap,
            TextureUsage::DisplacementMap => Self::DisplacementMap,
            TextureUsage::LightMap => Self::LightMap,
        }
    }
}

impl From<TextureUsageRecord> for TextureUsage {
    fn from(value: TextureUsageRecord) -> Self {
        match value {
            TextureUsageRecord::Diffuse => Self::Diffuse,
            TextureUsageRecord::SpecularMap => Self::SpecularMap,
            TextureUsageRecord::Ambient => Self::Ambient,
            TextureUsageRecord::Emissive => Self::Emissive,
            TextureUsageRecord::Heightmap => Self::Heightmap,
            TextureUsageRecord::NormalMap => Self::NormalMap,
            TextureUsageRecord::SpecularPowerMap => Self::SpecularPowerMap,
            TextureUsageRecord::DisplacementMap => Self::DisplacementMap,
            TextureUsageRecord::LightMap => Self::LightMap,
        }
    }
}

fn write_material(material: &MaterialAsset) -> Result<MaterialRecord, ModelFormatError> {
    check_count("textures", material.textures.len())?;
    Ok(MaterialRecord {
        name: BinString::from(material.name.as_str()),
        textures: material
            .textures
            .iter()
            .map(|texture| TextureRecord {
                usage: texture.usage.into(),
                path: BinString::from(texture.path.as_str()),
            })
            .collect(),
    })
}

fn read_material(record: MaterialRecord) -> MaterialAsset {
    MaterialAsset {
        name: record.name.0,
        textures: record
            .textures
            .into_iter()
            .map(|texture| MaterialTexture {
                usage: texture.usage.into(),
                path: texture.path.0,
            })
            .collect(),
    }
}

fn write_vec3_list(
    what: &'static str,
    items: &[[f32; 3]],
) -> Result<Vec3ListRecord, ModelFormatError> {
    check_count(what, items.len())?;
    Ok(Vec3ListRecord {
        items: items.to_vec(),
    })
}

fn write_mesh(mesh: &MeshAsset) -> Result<MeshRecord, ModelFormatError> {
    check_count("indices", mesh.indices.len())?;
    check_count("bone weights", mesh.bone_weights.len())?;
    check_count("texture coordinate sets", mesh.tex_coords.len())?;
    check_count("color sets", mesh.colors.len())?;
    Ok(MeshRecord {
        name: BinString::from(mesh.name.as_str()),
        material_index: mesh.material_index,
        positions: write_vec3_list("positions", &mesh.positions)?,
        normals: write_vec3_list("normals", &mesh.normals)?,
        tangents: write_vec3_list("tangents", &mesh.tangents)?,
        binormals: write_vec3_list("binormals", &mesh.binormals)?,
        tex_coords: mesh
            .tex_coords
            .iter()
            .map(|set| write_vec3_list("texture coordinates", set))
            .collect::<Result<_, _>>()?,
        colors: mesh
            .colors
            .iter()
            .map(|set| -> Result<_, ModelFormatError> {
                check_count("colors", set.len())?;
                Ok(Vec4ListRecord { items: set.clone() })
            })
            .collect::<Result<_, _>>()?,
        face_count: mesh.face_count,
        indices: mesh.indices.clone(),
        bone_weights: mesh
            .bone_weights
            .iter()
            .map(|weights| VertexWeightsRecord {
                weights: weights
                    .weights()
                    .iter()
                    .map(|weight| VertexWeightRecord {
                        weight: weight.weight,
                        bone_index: weight.bone_index,
                    })
                    .collect(),
            })
            .collect(),
    })
}

fn read_mesh(record: MeshRecord) -> Result<MeshAsset, ModelFormatError> {
    let bone_weights = record
        .bone_weights
        .into_iter()
        .map(|record| -> Result<_, ModelFormatError> {
            let mut weights = BoneVertexWeights::default();
            for weight in record.weights {
                weights.add_weight(weight.weight, weight.bone_index)?;
            }
            Ok(weights)
        })
        .collect::<Result<_, ModelFormatError>>()?;
    Ok(MeshAsset {
        name: record.name.0,
        material_index: record.material_index,
        positions: record.positions.items,
        normals: record.normals.items,
        tangents: record.tangents.items,
        binormals: record.binormals.items,
        tex_coords: record.tex_coords.into_iter().map(|set| set.items).collect(),
        colors: record.colors.into_iter().map(|set| set.items).collect(),
        face_count: record.face_count,
        indices: record.indices,
        bone_weights,
    })
}

fn write_node(
    graph: &SceneGraph,
    id: NodeId,
    depth: u32,
) -> Result<NodeRecord, ModelFormatError> {
    let node = graph
        .node(id)
        .ok_or(ModelFormatError::SceneGraph(SceneGraphError::UnknownNode(id)))?;
    if depth > MAX_NODE_DEPTH {
        return Err(ModelFormatError::TooDeep(node.name().to_string()));
    }
    check_count("children", node.children().len())?;
    Ok(NodeRecord {
        name: BinString::from(node.name()),
        is_bone: BinBool(node.is_bone()),
        transform: (!node.is_bone()).then(|| node.transform().to_cols_array()),
        children: node
            .children()
            .iter()
            .map(|child| write_node(graph, *child, depth + 1))
            .collect::<Result<_, _>>()?,
    })
}

fn write_clip(model: &Model, clip: &AnimationClip) -> Result<ClipRecord, ModelFormatError> {
    check_count("tracks", clip.tracks().len())?;
    let tracks = clip
        .tracks()
        .iter()
        .map(|track| -> Result<_, ModelFormatError> {
            let (node, _) = model
                .bone(track.bone())
                .ok_or(ModelError::UnknownTrackBone {
                    clip: clip.name().to_string(),
                    bone: track.bone(),
                })?;
            check_count("keyframes", track.len())?;
            Ok(TrackRecord {
                bone_name: BinString::from(node.name()),
                keyframes: track
                    .keyframes()
                    .iter()
                    .map(|keyframe| KeyframeRecord {
                        time: keyframe.time(),
                        translation: keyframe.translation().to_array(),
                        rotation: keyframe.rotation().to_array(),
                        scale: keyframe.scale().to_array(),
                    })
                    .collect(),
            })
        })
        .collect::<Result<_, ModelFormatError>>()?;
    Ok(ClipRecord {
        name: BinString::from(clip.name()),
        duration: clip.duration(),
        ticks_per_second: clip.ticks_per_second(),
        tracks,
        keyframe_count: check_count("keyframes", clip.keyframe_count())?,
    })
}

impl TryFrom<&Model> for ModelRecord {
    type Error = ModelFormatError;

    fn try_from(model: &Model) -> Result<Self, Self::Error> {
        check_count("materials", model.materials().len())?;
        check_count("meshes", model.meshes().len())?;
        check_count("bones", model.bone_count())?;
        check_count("clips", model.clips().len())?;

        let materials = model
            .materials()
            .iter()
            .map(write_material)
            .collect::<Result<_, _>>()?;
        let meshes = model
            .meshes()
            .iter()
            .map(write_mesh)
            .collect::<Result<_, _>>()?;
        let bones = model
            .bones()
            .map(|(_, node, bone)| BoneRecord {
                name: BinString::from(node.name()),
                transform: node.transform().to_cols_array(),
                index: bone.index(),
                offset_transform: bone.offset_transform().to_cols_array(),
            })
            .collect();
        let root = model
            .root()
            .map(|root| write_node(model.scene_graph(), root, 0))
            .transpose()?;
        let clips = model
            .clips()
            .iter()
            .map(|clip| write_clip(model, clip))
            .collect::<Result<_, _>>()?;

        Ok(ModelRecord {
            materials,
            meshes,
            bones,
            root,
            clips,
        })
    }
}

struct ModelReader {
    data: ModelData,
    bone_index_by_name: HashMap<String, u32>,
    attached_bones: HashSet<u32>,
}

impl ModelReader {
    fn new() -> Self {
        Self {
            data: ModelData::default(),
            bone_index_by_name: HashMap::new(),
            attached_bones: HashSet::new(),
        }
    }

    fn resolve_bone(&self, name: &str) -> Result<u32, ModelFormatError> {
        self.bone_index_by_name
            .get(name)
            .copied()
            .ok_or_else(|| ModelFormatError::UnknownBone(name.to_string()))
    }

    fn read_bone(&mut self, record: BoneRecord) -> Result<(), ModelFormatError> {
        let expected = check_count("bones", self.data.bones.len())?;
        if record.index != expected {
            return Err(ModelFormatError::BadBoneIndex {
                expected,
                actual: record.index,
            });
        }
        let node = SceneNode::bone(
            record.name.0.clone(),
            Mat4::from_cols_array(&record.transform),
            Bone::new(record.index, Mat4::from_cols_array(&record.offset_transform)),
        );
        let id = self.data.scene_graph.add_node(node);
        self.data.bones.push(id);
        if self
            .bone_index_by_name
            .insert(record.name.0.clone(), record.index)
            .is_some()
        {
            return Err(ModelError::DuplicateBoneName(record.name.0).into());
        }
        Ok(())
    }

    fn read_node(&mut self, record: NodeRecord) -> Result<NodeId, ModelFormatError> {
        let NodeRecord {
            name,
            is_bone,
            transform,
            children,
        } = record;
        let id = if is_bone.0 {
            let index = self.resolve_bone(&name.0)?;
            if !self.attached_bones.insert(index) {
                return Err(ModelFormatError::DuplicateBoneInHierarchy(name.0));
            }
            self.data.bones[index as usize]
        } else {
            let transform =
                transform.ok_or_else(|| ModelFormatError::MissingTransform(name.0.clone()))?;
            self.data
                .scene_graph
                .add_node(SceneNode::joint(name.0, Mat4::from_cols_array(&transform)))
        };
        for child in children {
            let child = self.read_node(child)?;
            self.data.scene_graph.add_child(id, child)?;
        }
        Ok(id)
    }

    fn read_clip(&self, record: ClipRecord) -> Result<AnimationClip, ModelFormatError> {
        let tracks = record
            .tracks
            .into_iter()
            .map(|track| -> Result<_, ModelFormatError> {
                let bone = self.resolve_bone(&track.bone_name.0)?;
                let keyframes = track
                    .keyframes
                    .into_iter()
                    .map(|keyframe| {
                        Keyframe::new(
                            keyframe.time,
                            Vec3::from_array(keyframe.translation),
                            Quat::from_array(keyframe.rotation),
                            Vec3::from_array(keyframe.scale),
                        )
                    })
                    .collect();
                Ok(AnimationTrack::new(bone, keyframes)?)
            })
            .collect::<Result<_, ModelFormatError>>()?;
        let clip = AnimationClip::new(
            record.name.0,
            record.duration,
            record.ticks_per_second,
            tracks,
        )?;
        let expected = check_count("keyframes", clip.keyframe_count())?;
        if expected != record.keyframe_count {
            return Err(ModelFormatError::KeyframeCountMismatch {
                clip: clip.name().to_string(),
                expected,
                actual: record.keyframe_count,
            });
        }
        Ok(clip)
    }

    fn read(mut self, record: ModelRecord) -> Result<Model, ModelFormatError> {
        self.data.materials = record.materials.into_iter().map(read_material).collect();
        self.data.meshes = record
            .meshes
            .into_iter()
            .map(read_mesh)
            .collect::<Result<_, _>>()?;
        // Bones must exist before the hierarchy refers to them by name
        for bone in record.bones {
            self.read_bone(bone)?;
        }
        if let Some(root) = record.root {
            let root = self.read_node(root)?;
            self.data.scene_graph.set_root(root)?;
        }
        self.data.clips = record
            .clips
            .into_iter()
            .map(|clip| self.read_clip(clip))
            .collect::<Result<_, _>>()?;
        Ok(Model::new(self.data)?)
    }
}

impl Model {
    pub fn save<W: Write + Seek>(&self, writer: &mut W) -> Result<(), ModelFormatError> {
        let record = ModelRecord::try_from(self)?;
        record.write_le(writer)?;
        trace!(
            "Saved model with {} bones and {} clips",
            self.bone_count(),
            self.clips().len()
        );
        Ok(())
    }

    pub fn load<R: Read + Seek>(reader: &mut R) -> Result<Model, ModelFormatError> {
        let record = ModelRecord::read_le(reader)?;
        let model = ModelReader::new().read(record)?;
        trace!(
            "Loaded model with {} bones and {} clips",
            model.bone_count(),
            model.clips().len()
        );
        Ok(model)
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<(), ModelFormatError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Model, ModelFormatError> {
        let mut reader = BufReader::new(File::open(path)?);
        Model::load(&mut reader)
    }
}
