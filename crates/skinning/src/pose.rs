use glam::Mat4;
use skinning_asset::{animation::AnimationClip, node::SceneGraph};

/// Where bone nodes take their local transform from during a resolution.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PoseSource<'a> {
    /// Keyframe active at a clip time, without blending.
    Exact(&'a AnimationClip, f32),
    Interpolated(&'a AnimationClip, f32),
    Keyframe(&'a AnimationClip, usize),
    /// Static local transforms of the scene graph.
    Bind,
}

impl PoseSource<'_> {
    fn bone_transform(&self, bone: u32, static_transform: &Mat4) -> (Mat4, Option<usize>) {
        match *self {
            PoseSource::Exact(clip, time) => clip.transform(time, bone),
            PoseSource::Interpolated(clip, time) => (clip.interpolated_transform(time, bone), None),
            PoseSource::Keyframe(clip, keyframe) => {
                (clip.transform_at_keyframe(keyframe, bone), None)
            }
            PoseSource::Bind => (*static_transform, None),
        }
    }
}

/// Resolve skinning matrices with one pre-order pass, caching each node's
/// to-root transform so that children can reuse their parent's.
///
/// Returns the keyframe index reported by the last bone with a track, for
/// exact lookups.
pub(crate) fn resolve_top_down(
    graph: &SceneGraph,
    source: PoseSource,
    inverse_root_transform: &Mat4,
    to_root_transforms: &mut [Mat4],
    bone_transforms: &mut [Mat4],
) -> Option<usize> {
    let root = graph.root()?;
    let mut current_keyframe = None;
    for id in graph.depth_first(root) {
        let node = &graph[id];
        let local = match node.as_bone() {
            Some(bone) => {
                let (transform, keyframe) = source.bone_transform(bone.index(), node.transform());
                if keyframe.is_some() {
                    current_keyframe = keyframe;
                }
                transform
            }
            None => *node.transform(),
        };
        let to_root = match node.parent() {
            Some(parent) => to_root_transforms[parent.index()] * local,
            None => local,
        };
        to_root_transforms[id.index()] = to_root;

        if let Some(bone) = node.as_bone() {
            bone_transforms[bone.index() as usize] =
                *inverse_root_transform * to_root * *bone.offset_transform();
        }
    }
    current_keyframe
}

/// Resolve the bind pose by walking every node's parent chain up to the
/// root. Slower than [`resolve_top_down`], and used to cross-check it.
pub(crate) fn resolve_bottom_up(
    graph: &SceneGraph,
    inverse_root_transform: &Mat4,
    bone_transforms: &mut [Mat4],
) {
    let Some(root) = graph.root() else {
        return;
    };
    for id in graph.depth_first(root) {
        if let Some(bone) = graph[id].as_bone() {
            let to_root = graph.to_root_transform(id);
            bone_transforms[bone.index() as usize] =
                *inverse_root_transform * to_root * *bone.offset_transform();
        }
    }
}
