use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
    path::Path,
};

use glam::{Mat4, Quat, Vec3};
use gltf::{
    animation::{util::ReadOutputs, Interpolation, Property},
    buffer,
    image::Source,
    mesh::Mode,
    scene::Transform,
    Animation, Document, Material, Node, Primitive, Texture,
};
use log::{debug, trace, warn};

use crate::{
    animation::{AnimationClip, AnimationError, AnimationTrack, Keyframe},
    material::{MaterialAsset, MaterialTexture, TextureUsage},
    mesh::{BoneVertexWeights, MeshAsset, MeshError},
    model::{Model, ModelData, ModelError},
    node::{DecomposedTransform, NodeId, NodeTransform, SceneGraphError, SceneNode},
};

use super::ImportParams;

#[derive(Debug)]
pub enum GltfImportError {
    Gltf(gltf::Error),
    UnsupportedPrimitiveMode(Mode),
    MissingPositions(String),
    BadJointIndex { mesh: String, joint: u16 },
    MissingChannelData(String),
    Animation(AnimationError),
    Mesh(MeshError),
    SceneGraph(SceneGraphError),
    Model(ModelError),
}

impl Display for GltfImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GltfImportError::Gltf(error) => Display::fmt(error, f),
            GltfImportError::UnsupportedPrimitiveMode(mode) => {
                write!(f, "Unsupported primitive mode: {:?}", mode)
            }
            GltfImportError::MissingPositions(mesh) => {
                write!(f, "Mesh {} has no vertex positions", mesh)
            }
            GltfImportError::BadJointIndex { mesh, joint } => {
                write!(f, "Mesh {} refers to joint {} outside of its skin", mesh, joint)
            }
            GltfImportError::MissingChannelData(animation) => {
                write!(f, "Animation {} has a channel without keyframes", animation)
            }
            GltfImportError::Animation(error) => Display::fmt(error, f),
            GltfImportError::Mesh(error) => Display::fmt(error, f),
            GltfImportError::SceneGraph(error) => Display::fmt(error, f),
            GltfImportError::Model(error) => Display::fmt(error, f),
        }
    }
}

impl Error for GltfImportError {}

impl From<gltf::Error> for GltfImportError {
    fn from(value: gltf::Error) -> Self {
        Self::Gltf(value)
    }
}

impl From<AnimationError> for GltfImportError {
    fn from(value: AnimationError) -> Self {
        Self::Animation(value)
    }
}

impl From<MeshError> for GltfImportError {
    fn from(value: MeshError) -> Self {
        Self::Mesh(value)
    }
}

impl From<SceneGraphError> for GltfImportError {
    fn from(value: SceneGraphError) -> Self {
        Self::SceneGraph(value)
    }
}

impl From<ModelError> for GltfImportError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<Transform> for NodeTransform {
    fn from(value: Transform) -> Self {
        match value {
            Transform::Matrix { matrix } => {
                NodeTransform::Matrix(Mat4::from_cols_array_2d(&matrix))
            }
            Transform::Decomposed {
                translation,
                rotation,
                scale,
            } => NodeTransform::Decomposed(DecomposedTransform {
                translation: Vec3::from_array(translation),
                rotation: Quat::from_array(rotation),
                scale: Vec3::from_array(scale),
            }),
        }
    }
}

#[inline]
fn pad_uv_to_uvw([u, v]: [f32; 2], flip: bool) -> [f32; 3] {
    if flip {
        [u, 1.0 - v, 0.0]
    } else {
        [u, v, 0.0]
    }
}

/// Keyframes of one animated property of one node.
#[derive(Debug, Clone)]
struct ChannelCurve<T> {
    times: Vec<f32>,
    values: Vec<T>,
    interpolation: Interpolation,
}

impl<T: Copy> ChannelCurve<T> {
    fn new(times: Vec<f32>, values: Vec<T>, interpolation: Interpolation) -> Self {
        // in-tangent, value, out-tangent
        let values: Vec<T> = match interpolation {
            Interpolation::CubicSpline => values.chunks_exact(3).map(|chunk| chunk[1]).collect(),
            Interpolation::Linear | Interpolation::Step => values,
        };
        // Sampler input is not validated by the reader
        let mut keys: Vec<(f32, T)> = times
            .into_iter()
            .zip(values)
            .filter(|(time, _)| time.is_finite())
            .collect();
        if keys.windows(2).any(|pair| pair[1].0 < pair[0].0) {
            warn!("Sampler input is not sorted, sorting it");
            keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        }
        let (times, values) = keys.into_iter().unzip();
        Self {
            times,
            values,
            interpolation,
        }
    }

    fn sample(&self, time: f32, blend: impl Fn(T, T, f32) -> T) -> Option<T> {
        let first = *self.times.first()?;
        if time <= first {
            return self.values.first().copied();
        }
        let last = self.times.len() - 1;
        if time >= self.times[last] {
            return self.values.last().copied();
        }
        let next = self.times.partition_point(|key| *key <= time);
        let index = next - 1;
        Some(match self.interpolation {
            Interpolation::Step => self.values[index],
            Interpolation::Linear | Interpolation::CubicSpline => {
                let span = self.times[next] - self.times[index];
                let t = (time - self.times[index]) / span;
                blend(self.values[index], self.values[next], t)
            }
        })
    }
}

/// Curves of one node, over its rest pose.
#[derive(Debug, Clone)]
struct NodeCurves {
    rest: DecomposedTransform,
    translation: Option<ChannelCurve<Vec3>>,
    rotation: Option<ChannelCurve<Quat>>,
    scale: Option<ChannelCurve<Vec3>>,
}

impl NodeCurves {
    fn new(rest: DecomposedTransform) -> Self {
        Self {
            rest,
            translation: None,
            rotation: None,
            scale: None,
        }
    }

    fn times(&self) -> Vec<f32> {
        let mut times: Vec<f32> = self
            .translation
            .iter()
            .flat_map(|curve| curve.times.iter())
            .chain(self.rotation.iter().flat_map(|curve| curve.times.iter()))
            .chain(self.scale.iter().flat_map(|curve| curve.times.iter()))
            .copied()
            .collect();
        times.sort_by(f32::total_cmp);
        times.dedup();
        times
    }

    fn sample(&self, time: f32) -> Keyframe {
        let translation = self
            .translation
            .as_ref()
            .and_then(|curve| curve.sample(time, Vec3::lerp))
            .unwrap_or(self.rest.translation);
        let rotation = self
            .rotation
            .as_ref()
            .and_then(|curve| curve.sample(time, |a, b, t| a.slerp(b, t).normalize()))
            .unwrap_or(self.rest.rotation);
        let scale = self
            .scale
            .as_ref()
            .and_then(|curve| curve.sample(time, Vec3::lerp))
            .unwrap_or(self.rest.scale);
        Keyframe::from_decomposed(
            time,
            DecomposedTransform {
                translation,
                rotation,
                scale,
            },
        )
    }
}

struct GltfModelImporter<'a> {
    document: &'a Document,
    buffers: &'a [buffer::Data],
    params: &'a ImportParams,
    data: ModelData,
    bone_by_node: HashMap<usize, u32>,
    skin_bones: HashMap<usize, Vec<u32>>,
    default_material: Option<u32>,
}

impl<'a> GltfModelImporter<'a> {
    fn new(
        document: &'a Document,
        buffers: &'a [buffer::Data],
        params: &'a ImportParams,
    ) -> Self {
        Self {
            document,
            buffers,
            params,
            data: ModelData::default(),
            bone_by_node: HashMap::new(),
            skin_bones: HashMap::new(),
            default_material: None,
        }
    }

    fn texture_path(texture: Texture) -> String {
        let image = texture.source();
        match image.source() {
            Source::Uri { uri, .. } => uri.to_string(),
            Source::View { .. } => image
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("image_{}", image.index())),
        }
    }

    fn load_material(material: Material) -> MaterialAsset {
        let name = material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("material_{}", material.index().unwrap_or_default()));
        let mut textures = Vec::new();
        let mut push = |usage: TextureUsage, texture: Texture| {
            textures.push(MaterialTexture {
                usage,
                path: Self::texture_path(texture),
            })
        };
        if let Some(info) = material.pbr_metallic_roughness().base_color_texture() {
            push(TextureUsage::Diffuse, info.texture());
        }
        if let Some(normal) = material.normal_texture() {
            push(TextureUsage::NormalMap, normal.texture());
        }
        if let Some(info) = material.emissive_texture() {
            push(TextureUsage::Emissive, info.texture());
        }
        if let Some(occlusion) = material.occlusion_texture() {
            push(TextureUsage::LightMap, occlusion.texture());
        }
        MaterialAsset { name, textures }
    }

    fn material_index(&mut self, material: Material) -> u32 {
        if let Some(index) = material.index() {
            return index as u32;
        }
        if let Some(index) = self.default_material {
            return index;
        }
        let index = self.data.materials.len() as u32;
        self.data.materials.push(MaterialAsset::new("default"));
        self.default_material = Some(index);
        index
    }

    fn load_skins(&mut self) -> Result<(), GltfImportError> {
        let document = self.document;
        let buffers = self.buffers;
        for skin in document.skins() {
            let reader =
                skin.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            let inverse_bind_matrices: Vec<Mat4> = reader
                .read_inverse_bind_matrices()
                .map(|matrices| {
                    matrices
                        .map(|matrix| Mat4::from_cols_array_2d(&matrix))
                        .collect()
                })
                .unwrap_or_default();

            let mut bones = Vec::new();
            for (position, joint) in skin.joints().enumerate() {
                let index = match self.bone_by_node.get(&joint.index()) {
                    Some(index) => *index,
                    None => {
                        let name = joint
                            .name()
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("joint_{}", joint.index()));
                        let offset = inverse_bind_matrices
                            .get(position)
                            .copied()
                            .unwrap_or(Mat4::IDENTITY);
                        let transform = Mat4::from(NodeTransform::from(joint.transform()));
                        let index = self.data.add_bone(name, transform, offset)?;
                        self.bone_by_node.insert(joint.index(), index);
                        index
                    }
                };
                bones.push(index);
            }
            trace!("Skin #{} uses {} bones", skin.index(), bones.len());
            self.skin_bones.insert(skin.index(), bones);
        }
        Ok(())
    }

    fn load_primitive(
        &mut self,
        name: String,
        primitive: Primitive,
        skin: Option<usize>,
    ) -> Result<MeshAsset, GltfImportError> {
        if primitive.mode() != Mode::Triangles {
            return Err(GltfImportError::UnsupportedPrimitiveMode(primitive.mode()));
        }
        let buffers = self.buffers;
        let reader =
            primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| GltfImportError::MissingPositions(name.clone()))?
            .collect();
        let normals: Vec<[f32; 3]> = reader
            .read_normals()
            .map(Iterator::collect)
            .unwrap_or_default();
        let tangents_w: Vec<[f32; 4]> = reader
            .read_tangents()
            .map(Iterator::collect)
            .unwrap_or_default();
        let tangents = tangents_w.iter().map(|[x, y, z, _]| [*x, *y, *z]).collect();
        let binormals = if normals.len() == tangents_w.len() {
            normals
                .iter()
                .zip(&tangents_w)
                .map(|(normal, [x, y, z, w])| {
                    (Vec3::from_array(*normal).cross(Vec3::new(*x, *y, *z)) * *w).to_array()
                })
                .collect()
        } else {
            Vec::new()
        };

        let mut tex_coords = Vec::new();
        while let Some(set) = reader.read_tex_coords(tex_coords.len() as u32) {
            tex_coords.push(
                set.into_f32()
                    .map(|uv| pad_uv_to_uvw(uv, self.params.flip_uvs))
                    .collect(),
            );
        }
        let mut colors = Vec::new();
        while let Some(set) = reader.read_colors(colors.len() as u32) {
            colors.push(set.into_rgba_f32().collect());
        }

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let skin_bones = skin.and_then(|skin| self.skin_bones.get(&skin));
        let bone_weights = match (skin_bones, reader.read_joints(0), reader.read_weights(0)) {
            (Some(skin_bones), Some(joints), Some(weights)) => joints
                .into_u16()
                .zip(weights.into_f32())
                .map(|(joints, weights)| -> Result<BoneVertexWeights, GltfImportError> {
                    let mut vertex = BoneVertexWeights::default();
                    for (joint, weight) in joints.into_iter().zip(weights) {
                        if weight <= 0.0 {
                            continue;
                        }
                        let bone = skin_bones.get(joint as usize).copied().ok_or_else(|| {
                            GltfImportError::BadJointIndex {
                                mesh: name.clone(),
                                joint,
                            }
                        })?;
                        vertex.add_weight(weight, bone)?;
                    }
                    Ok(vertex)
                })
                .collect::<Result<_, _>>()?,
            (None, Some(_), _) => {
                warn!("Mesh {} has joints but its node has no skin", name);
                Vec::new()
            }
            _ => Vec::new(),
        };

        let material_index = self.material_index(primitive.material());
        Ok(MeshAsset {
            name,
            material_index,
            face_count: (indices.len() / 3) as u32,
            positions,
            normals,
            tangents,
            binormals,
            tex_coords,
            colors,
            indices,
            bone_weights,
        })
    }

    fn load_meshes(&mut self) -> Result<(), GltfImportError> {
        let document = self.document;
        for node in document.nodes() {
            let Some(mesh) = node.mesh() else {
                continue;
            };
            let skin = node.skin().map(|skin| skin.index());
            let mesh_name = mesh
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
            let primitive_count = mesh.primitives().len();
            for primitive in mesh.primitives() {
                let name = if primitive_count > 1 {
                    format!("{}_{}", mesh_name, primitive.index())
                } else {
                    mesh_name.clone()
                };
                let asset = self.load_primitive(name, primitive, skin)?;
                self.data.meshes.push(asset);
            }
        }
        Ok(())
    }

    fn load_node(&mut self, node: Node) -> Result<NodeId, GltfImportError> {
        let id = match self.bone_by_node.get(&node.index()) {
            Some(bone) => self.data.bones[*bone as usize],
            None => {
                let name = node
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("node_{}", node.index()));
                let transform = Mat4::from(NodeTransform::from(node.transform()));
                self.data
                    .scene_graph
                    .add_node(SceneNode::joint(name, transform))
            }
        };
        for child in node.children() {
            let child = self.load_node(child)?;
            self.data.scene_graph.add_child(id, child)?;
        }
        Ok(id)
    }

    fn load_hierarchy(&mut self) -> Result<(), GltfImportError> {
        let document = self.document;
        let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) else {
            debug!("No scene found, the model has no skeleton");
            return Ok(());
        };

        let mut roots: Vec<Node> = scene.nodes().collect();
        let root = if roots.len() == 1 {
            match roots.pop() {
                Some(node) => self.load_node(node)?,
                None => return Ok(()),
            }
        } else {
            let name = scene.name().unwrap_or("scene").to_string();
            let root = self
                .data
                .scene_graph
                .add_node(SceneNode::joint(name, Mat4::IDENTITY));
            for node in roots {
                let child = self.load_node(node)?;
                self.data.scene_graph.add_child(root, child)?;
            }
            root
        };
        self.data.scene_graph.set_root(root)?;
        Ok(())
    }

    fn load_animation(&self, animation: Animation) -> Result<AnimationClip, GltfImportError> {
        let name = animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation_{}", animation.index()));

        let mut curves: HashMap<usize, NodeCurves> = HashMap::new();
        for channel in animation.channels() {
            let target = channel.target();
            let node = target.node();
            if !self.bone_by_node.contains_key(&node.index()) {
                warn!(
                    "Animation {} targets node {} which is not a bone, skipping",
                    name,
                    node.name().unwrap_or_default()
                );
                continue;
            }
            if target.property() == Property::MorphTargetWeights {
                warn!("Animation {} has morph target weights, skipping", name);
                continue;
            }

            let buffers = self.buffers;
            let reader =
                channel.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
                return Err(GltfImportError::MissingChannelData(name));
            };
            let times: Vec<f32> = inputs.collect();
            let interpolation = channel.sampler().interpolation();
            let entry = curves
                .entry(node.index())
                .or_insert_with(|| NodeCurves::new(NodeTransform::from(node.transform()).into()));
            match outputs {
                ReadOutputs::Translations(values) => {
                    let values = values.map(Vec3::from_array).collect();
                    entry.translation = Some(ChannelCurve::new(times, values, interpolation));
                }
                ReadOutputs::Rotations(values) => {
                    let values = values.into_f32().map(Quat::from_array).collect();
                    entry.rotation = Some(ChannelCurve::new(times, values, interpolation));
                }
                ReadOutputs::Scales(values) => {
                    let values = values.map(Vec3::from_array).collect();
                    entry.scale = Some(ChannelCurve::new(times, values, interpolation));
                }
                ReadOutputs::MorphTargetWeights(_) => {}
            }
        }

        let mut duration: f32 = 0.0;
        let mut node_indices: Vec<usize> = curves.keys().copied().collect();
        node_indices.sort_unstable();
        let mut tracks = Vec::with_capacity(node_indices.len());
        for node_index in node_indices {
            let curve = &curves[&node_index];
            let times = curve.times();
            if times.is_empty() {
                continue;
            }
            let bone = self.bone_by_node[&node_index];
            let keyframes: Vec<Keyframe> = times.iter().map(|time| curve.sample(*time)).collect();
            if let Some(last) = times.last() {
                duration = duration.max(*last);
            }
            tracks.push(AnimationTrack::new(bone, keyframes)?);
        }

        debug!(
            "Imported animation {} with {} tracks, {} seconds",
            name,
            tracks.len(),
            duration
        );
        Ok(AnimationClip::new(name, duration, 1.0, tracks)?)
    }

    fn load(mut self) -> Result<Model, GltfImportError> {
        self.data.materials = self.document.materials().map(Self::load_material).collect();
        self.load_skins()?;
        self.load_meshes()?;
        self.load_hierarchy()?;
        let clips = self
            .document
            .animations()
            .map(|animation| self.load_animation(animation))
            .collect::<Result<_, _>>()?;
        self.data.clips = clips;
        Ok(Model::new(self.data)?)
    }
}

fn import_document(
    document: &Document,
    buffers: &[buffer::Data],
    params: &ImportParams,
) -> Result<Model, GltfImportError> {
    GltfModelImporter::new(document, buffers, params).load()
}

/// Import a GLTF or GLB file, resolving external buffers relative to it.
pub fn import_gltf(
    path: impl AsRef<Path>,
    params: &ImportParams,
) -> Result<Model, GltfImportError> {
    let (document, buffers, _images) = gltf::import(path)?;
    import_document(&document, &buffers, params)
}

/// Import a self-contained GLTF or GLB file from memory.
pub fn import_gltf_slice(bytes: &[u8], params: &ImportParams) -> Result<Model, GltfImportError> {
    let (document, buffers, _images) = gltf::import_slice(bytes)?;
    import_document(&document, &buffers, params)
}
