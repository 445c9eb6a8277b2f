use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use glam::Mat4;
use log::warn;

use crate::{
    animation::AnimationClip,
    material::MaterialAsset,
    mesh::MeshAsset,
    node::{Bone, NodeId, SceneGraph, SceneGraphError, SceneNode},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    UnknownNode(NodeId),
    NotABone(NodeId),
    BadBoneIndex { expected: u32, actual: u32 },
    DuplicateBoneName(String),
    UnregisteredBone(String),
    UnknownTrackBone { clip: String, bone: u32 },
    BadMaterialIndex { mesh: String, material: u32 },
    BadBoneWeightIndex { mesh: String, bone: u32 },
    TooManyBones(usize),
    SceneGraph(SceneGraphError),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownNode(id) => write!(f, "Node {} not found in scene graph", id),
            ModelError::NotABone(id) => write!(f, "Node {} is registered as a bone but is not one", id),
            ModelError::BadBoneIndex { expected, actual } => write!(
                f,
                "Bad bone index: expected {}, but got {}",
                expected, actual
            ),
            ModelError::DuplicateBoneName(name) => write!(f, "Duplicate bone name {}", name),
            ModelError::UnregisteredBone(name) => {
                write!(f, "Bone {} is not registered in the bone list", name)
            }
            ModelError::UnknownTrackBone { clip, bone } => {
                write!(f, "Clip {} animates unknown bone #{}", clip, bone)
            }
            ModelError::BadMaterialIndex { mesh, material } => {
                write!(f, "Mesh {} uses unknown material #{}", mesh, material)
            }
            ModelError::BadBoneWeightIndex { mesh, bone } => {
                write!(f, "Mesh {} is weighted to unknown bone #{}", mesh, bone)
            }
            ModelError::TooManyBones(count) => write!(f, "Too many bones: {}", count),
            ModelError::SceneGraph(error) => Display::fmt(error, f),
        }
    }
}

impl From<SceneGraphError> for ModelError {
    fn from(value: SceneGraphError) -> Self {
        Self::SceneGraph(value)
    }
}

impl Error for ModelError {}

/// Unvalidated parts of a model, as assembled by an importer or a reader.
#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub materials: Vec<MaterialAsset>,
    pub meshes: Vec<MeshAsset>,
    pub scene_graph: SceneGraph,
    /// Bone nodes, indexed by bone index.
    pub bones: Vec<NodeId>,
    pub clips: Vec<AnimationClip>,
}

impl ModelData {
    /// Create a detached bone node with the next free bone index.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        transform: Mat4,
        offset_transform: Mat4,
    ) -> Result<u32, ModelError> {
        let index =
            u32::try_from(self.bones.len()).map_err(|_| ModelError::TooManyBones(self.bones.len()))?;
        let node = SceneNode::bone(name, transform, Bone::new(index, offset_transform));
        let id = self.scene_graph.add_node(node);
        self.bones.push(id);
        Ok(index)
    }
}

/// Skinned model: meshes, materials, the bone list, the node hierarchy and
/// the animation clips driving it.
///
/// A model is immutable once built and can be shared between players.
#[derive(Debug)]
pub struct Model {
    materials: Vec<MaterialAsset>,
    meshes: Vec<MeshAsset>,
    scene_graph: SceneGraph,
    bones: Vec<NodeId>,
    bone_index_by_name: HashMap<String, u32>,
    clips: Vec<Arc<AnimationClip>>,
    clips_by_name: HashMap<String, usize>,
}

impl Model {
    pub fn new(data: ModelData) -> Result<Self, ModelError> {
        let ModelData {
            materials,
            meshes,
            scene_graph,
            bones,
            clips,
        } = data;

        let mut bone_index_by_name = HashMap::with_capacity(bones.len());
        for (position, id) in bones.iter().enumerate() {
            let node = scene_graph.node(*id).ok_or(ModelError::UnknownNode(*id))?;
            let bone = node.as_bone().ok_or(ModelError::NotABone(*id))?;
            let expected =
                u32::try_from(position).map_err(|_| ModelError::TooManyBones(bones.len()))?;
            if bone.index() != expected {
                return Err(ModelError::BadBoneIndex {
                    expected,
                    actual: bone.index(),
                });
            }
            if bone_index_by_name
                .insert(node.name().to_string(), expected)
                .is_some()
            {
                return Err(ModelError::DuplicateBoneName(node.name().to_string()));
            }
        }

        for (id, node) in scene_graph.iter() {
            if let Some(bone) = node.as_bone() {
                if bones.get(bone.index() as usize) != Some(&id) {
                    return Err(ModelError::UnregisteredBone(node.name().to_string()));
                }
            }
        }

        let bone_count = bones.len();
        for mesh in &meshes {
            if mesh.material_index as usize >= materials.len() {
                return Err(ModelError::BadMaterialIndex {
                    mesh: mesh.name.clone(),
                    material: mesh.material_index,
                });
            }
            let bad_weight = mesh
                .bone_weights
                .iter()
                .flat_map(|weights| weights.weights())
                .find(|weight| weight.bone_index as usize >= bone_count);
            if let Some(weight) = bad_weight {
                return Err(ModelError::BadBoneWeightIndex {
                    mesh: mesh.name.clone(),
                    bone: weight.bone_index,
                });
            }
        }

        let mut clips_by_name = HashMap::with_capacity(clips.len());
        for (index, clip) in clips.iter().enumerate() {
            if let Some(track) = clip
                .tracks()
                .iter()
                .find(|track| track.bone() as usize >= bone_count)
            {
                return Err(ModelError::UnknownTrackBone {
                    clip: clip.name().to_string(),
                    bone: track.bone(),
                });
            }
            if clips_by_name.insert(clip.name().to_string(), index).is_some() {
                warn!("Duplicate clip name {}, the later clip shadows it", clip.name());
            }
        }

        Ok(Self {
            materials,
            meshes,
            scene_graph,
            bones,
            bone_index_by_name,
            clips: clips.into_iter().map(Arc::new).collect(),
            clips_by_name,
        })
    }

    pub fn materials(&self) -> &[MaterialAsset] {
        &self.materials
    }

    pub fn meshes(&self) -> &[MeshAsset] {
        &self.meshes
    }

    pub fn scene_graph(&self) -> &SceneGraph {
        &self.scene_graph
    }

    pub fn root(&self) -> Option<NodeId> {
        self.scene_graph.root()
    }

    /// Bones in index order.
    pub fn bones(&self) -> impl Iterator<Item = (NodeId, &SceneNode, &Bone)> {
        self.bones.iter().filter_map(|id| {
            let node = &self.scene_graph[*id];
            node.as_bone().map(|bone| (*id, node, bone))
        })
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bone_node(&self, index: u32) -> Option<NodeId> {
        self.bones.get(index as usize).copied()
    }

    pub fn bone(&self, index: u32) -> Option<(&SceneNode, &Bone)> {
        let node = self.scene_graph.node(self.bone_node(index)?)?;
        node.as_bone().map(|bone| (node, bone))
    }

    pub fn bone_index(&self, name: &str) -> Option<u32> {
        self.bone_index_by_name.get(name).copied()
    }

    pub fn clips(&self) -> &[Arc<AnimationClip>] {
        &self.clips
    }

    pub fn clip(&self, name: &str) -> Option<&Arc<AnimationClip>> {
        self.clips_by_name.get(name).map(|index| &self.clips[*index])
    }

    pub fn clip_at(&self, index: usize) -> Option<&Arc<AnimationClip>> {
        self.clips.get(index)
    }

    pub fn has_meshes(&self) -> bool {
        !self.meshes.is_empty()
    }

    pub fn has_materials(&self) -> bool {
        !self.materials.is_empty()
    }

    pub fn has_animations(&self) -> bool {
        !self.clips.is_empty()
    }

    pub fn has_skeleton(&self) -> bool {
        self.scene_graph.root().is_some()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use glam::{Mat4, Quat, Vec3};

    use crate::{
        animation::{AnimationClip, AnimationTrack, Keyframe},
        material::MaterialAsset,
        mesh::{BoneVertexWeights, MeshAsset},
        node::{SceneGraph, SceneNode},
    };

    use super::{Model, ModelData, ModelError};

    /// Root joint with bone A under it and bone B under A, plus a two-key
    /// clip moving A along X.
    pub(crate) fn arm_model_data() -> ModelData {
        let mut data = ModelData::default();
        data.materials.push(MaterialAsset::new("skin"));
        let a = data
            .add_bone(
                "A",
                Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
                Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
            )
            .unwrap();
        let b = data
            .add_bone(
                "B",
                Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
                Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0)),
            )
            .unwrap();
        let root = data
            .scene_graph
            .add_node(SceneNode::joint("root", Mat4::IDENTITY));
        data.scene_graph.add_child(root, data.bones[a as usize]).unwrap();
        data.scene_graph
            .add_child(data.bones[a as usize], data.bones[b as usize])
            .unwrap();
        data.scene_graph.set_root(root).unwrap();

        let mut weights = BoneVertexWeights::default();
        weights.add_weight(1.0, b).unwrap();
        data.meshes.push(MeshAsset {
            name: String::from("arm"),
            material_index: 0,
            positions: vec![[0.0, 2.0, 0.0]],
            face_count: 0,
            bone_weights: vec![weights],
            ..Default::default()
        });

        let track = AnimationTrack::new(
            a,
            vec![
                Keyframe::new(0.0, Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE),
                Keyframe::new(10.0, Vec3::new(10.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE),
            ],
        )
        .unwrap();
        data.clips
            .push(AnimationClip::new("slide", 10.0, 10.0, vec![track]).unwrap());
        data
    }

    #[test]
    fn test_model_lookups() {
        let model = Model::new(arm_model_data()).unwrap();
        assert_eq!(model.bone_count(), 2);
        assert_eq!(model.bone_index("B"), Some(1));
        assert_eq!(model.bone_index("root"), None);
        let (node, bone) = model.bone(1).unwrap();
        assert_eq!(node.name(), "B");
        assert_eq!(bone.index(), 1);
        let names: Vec<&str> = model.bones().map(|(_, node, _)| node.name()).collect();
        assert_eq!(names, ["A", "B"]);
        assert!(model.has_skeleton());
        assert!(model.has_animations());
        assert!(model.has_meshes());
        assert!(model.has_materials());
        assert_eq!(model.clip("slide").unwrap().name(), "slide");
        assert!(model.clip("missing").is_none());
        assert_eq!(model.clip_at(0).unwrap().keyframe_count(), 2);
    }

    #[test]
    fn test_reject_unregistered_bone() {
        let mut data = arm_model_data();
        data.bones.pop();
        assert_eq!(
            Model::new(data).unwrap_err(),
            ModelError::UnregisteredBone(String::from("B"))
        );
    }

    #[test]
    fn test_reject_bone_index_out_of_place() {
        let mut data = arm_model_data();
        data.bones.swap(0, 1);
        assert_eq!(
            Model::new(data).unwrap_err(),
            ModelError::BadBoneIndex {
                expected: 0,
                actual: 1
            }
        );
    }

    #[test]
    fn test_reject_duplicate_bone_name() {
        let mut data = ModelData::default();
        data.add_bone("A", Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        data.add_bone("A", Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        assert_eq!(
            Model::new(data).unwrap_err(),
            ModelError::DuplicateBoneName(String::from("A"))
        );
    }

    #[test]
    fn test_reject_bad_references() {
        let mut data = arm_model_data();
        data.meshes[0].material_index = 4;
        assert!(matches!(
            Model::new(data).unwrap_err(),
            ModelError::BadMaterialIndex { material: 4, .. }
        ));

        let mut data = arm_model_data();
        let track = AnimationTrack::new(
            5,
            vec![Keyframe::new(0.0, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)],
        )
        .unwrap();
        data.clips
            .push(AnimationClip::new("broken", 1.0, 1.0, vec![track]).unwrap());
        assert!(matches!(
            Model::new(data).unwrap_err(),
            ModelError::UnknownTrackBone { bone: 5, .. }
        ));
    }

    #[test]
    fn test_empty_model() {
        let model = Model::new(ModelData {
            scene_graph: SceneGraph::new(),
            ..Default::default()
        })
        .unwrap();
        assert!(!model.has_skeleton());
        assert!(!model.has_animations());
        assert_eq!(model.bone_count(), 0);
    }
}
