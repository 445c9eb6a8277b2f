/// GLTF and GLB importer with `gltf` crate.
#[cfg(feature = "gltf")]
pub mod gltf;

#[derive(Debug, Clone)]
pub struct ImportParams {
    /// Flip the V texture coordinate, so that V grows upwards.
    pub flip_uvs: bool,
}

impl Default for ImportParams {
    fn default() -> Self {
        Self { flip_uvs: true }
    }
}
