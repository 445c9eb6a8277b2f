//! Provide skeletal animation assets for skinned models.
//!
//! This library provides a scene graph whose nodes are either plain joints
//! or bones, keyframed animation clips that drive the bones, and the
//! [`Model`](model::Model) aggregate tying meshes, bones, hierarchy and
//! clips together. Models are persisted with a compact binary format, and
//! can be imported once from GLTF files when the `gltf` feature is enabled.
//!
pub mod animation;
/// Binary model format.
pub mod format;
/// Model importers for third-party formats.
pub mod loader;
pub mod material;
pub mod mesh;
pub mod model;
pub mod node;
