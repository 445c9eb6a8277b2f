use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

pub const MAX_BONE_WEIGHTS_PER_VERTEX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    pub weight: f32,
    pub bone_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    TooManyBoneWeights,
}

impl Display for MeshError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::TooManyBoneWeights => write!(
                f,
                "A vertex can have at most {} bone weights",
                MAX_BONE_WEIGHTS_PER_VERTEX
            ),
        }
    }
}

impl Error for MeshError {}

/// Bones influencing one vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneVertexWeights {
    weights: Vec<VertexWeight>,
}

impl BoneVertexWeights {
    pub fn weights(&self) -> &[VertexWeight] {
        &self.weights
    }

    pub fn add_weight(&mut self, weight: f32, bone_index: u32) -> Result<(), MeshError> {
        if self.weights.len() >= MAX_BONE_WEIGHTS_PER_VERTEX {
            return Err(MeshError::TooManyBoneWeights);
        }
        self.weights.push(VertexWeight { weight, bone_index });
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshAsset {
    pub name: String,
    pub material_index: u32,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 3]>,
    pub binormals: Vec<[f32; 3]>,
    /// One list per texture coordinate set.
    pub tex_coords: Vec<Vec<[f32; 3]>>,
    /// One list per vertex color set.
    pub colors: Vec<Vec<[f32; 4]>>,
    pub face_count: u32,
    pub indices: Vec<u32>,
    /// Empty for meshes that are not skinned, otherwise one entry per vertex.
    pub bone_weights: Vec<BoneVertexWeights>,
}

impl MeshAsset {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_skinned(&self) -> bool {
        !self.bone_weights.is_empty()
    }
}
