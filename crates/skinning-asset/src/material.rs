#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    Diffuse,
    SpecularMap,
    Ambient,
    Emissive,
    Heightmap,
    NormalMap,
    SpecularPowerMap,
    DisplacementMap,
    LightMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialTexture {
    pub usage: TextureUsage,
    /// Texture file path, relative to the model file.
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialAsset {
    pub name: String,
    pub textures: Vec<MaterialTexture>,
}

impl MaterialAsset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            textures: Vec::new(),
        }
    }
}
