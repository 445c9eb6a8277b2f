use glam::{Mat4, Quat, Vec3};

use crate::node::DecomposedTransform;

/// Bone pose at one instant of a track, in ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    time: f32,
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

impl Keyframe {
    pub fn new(time: f32, translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            time,
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_decomposed(time: f32, transform: DecomposedTransform) -> Self {
        Self::new(
            time,
            transform.translation,
            transform.rotation,
            transform.scale,
        )
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn decomposed(&self) -> DecomposedTransform {
        DecomposedTransform {
            translation: self.translation,
            rotation: self.rotation,
            scale: self.scale,
        }
    }

    /// Scale, then rotate, then translate.
    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Blend towards `other`, lerping translation and scale and taking the
    /// shortest-arc slerp of the rotation.
    pub fn blend(&self, other: &Keyframe, t: f32) -> DecomposedTransform {
        DecomposedTransform {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t).normalize(),
            scale: self.scale.lerp(other.scale, t),
        }
    }
}
