use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    sync::Arc,
    time::Duration,
};

use glam::Mat4;
use log::{debug, trace, warn};
use skinning_asset::{animation::AnimationClip, model::Model};

use crate::pose::{resolve_bottom_up, resolve_top_down, PoseSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No clip was ever started.
    #[default]
    Stopped,
    Playing,
    /// Paused by the caller, or stopped at the end of a clip that does not loop.
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    UnknownClip(String),
}

impl Display for PlayerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::UnknownClip(name) => write!(f, "Clip {} not found in model", name),
        }
    }
}

impl Error for PlayerError {}

/// Plays the clips of one shared [`Model`] and produces its skinning
/// matrices, one per bone in bone index order.
#[derive(Debug)]
pub struct AnimationPlayer {
    model: Arc<Model>,
    current_clip: Option<Arc<AnimationClip>>,
    current_time: f32,
    current_keyframe: usize,
    is_playing: bool,
    is_looping: bool,
    interpolation_enabled: bool,
    inverse_root_transform: Mat4,
    // Indexed by node id
    to_root_transforms: Vec<Mat4>,
    bone_transforms: Vec<Mat4>,
}

impl AnimationPlayer {
    pub fn new(model: Arc<Model>, interpolation_enabled: bool) -> Self {
        let node_count = model.scene_graph().len();
        let bone_count = model.bone_count();
        Self {
            model,
            current_clip: None,
            current_time: 0.0,
            current_keyframe: 0,
            is_playing: false,
            is_looping: true,
            interpolation_enabled,
            inverse_root_transform: Mat4::IDENTITY,
            to_root_transforms: vec![Mat4::IDENTITY; node_count],
            bone_transforms: vec![Mat4::IDENTITY; bone_count],
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn current_clip(&self) -> Option<&Arc<AnimationClip>> {
        self.current_clip.as_ref()
    }

    /// Clip time, in ticks.
    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn current_keyframe(&self) -> usize {
        self.current_keyframe
    }

    /// Skinning matrices from the latest resolution, indexed by bone index.
    pub fn bone_transforms(&self) -> &[Mat4] {
        &self.bone_transforms
    }

    /// [`Self::bone_transforms`] as raw bytes, ready for a buffer upload.
    pub fn bone_transforms_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bone_transforms)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.is_looping = looping;
    }

    pub fn interpolation_enabled(&self) -> bool {
        self.interpolation_enabled
    }

    pub fn set_interpolation_enabled(&mut self, enabled: bool) {
        self.interpolation_enabled = enabled;
    }

    pub fn state(&self) -> PlaybackState {
        match (&self.current_clip, self.is_playing) {
            (None, _) => PlaybackState::Stopped,
            (Some(_), true) => PlaybackState::Playing,
            (Some(_), false) => PlaybackState::Paused,
        }
    }

    pub fn start_clip(&mut self, clip: Arc<AnimationClip>) {
        debug!("Start clip {}", clip.name());
        self.current_clip = Some(clip);
        self.current_time = 0.0;
        self.current_keyframe = 0;
        self.is_playing = true;

        let graph = self.model.scene_graph();
        let Some(root) = graph.root() else {
            warn!("Model has no root node, skinning matrices stay at identity");
            return;
        };
        let root_transform = graph[root].transform();
        self.inverse_root_transform = if root_transform.determinant() != 0.0 {
            root_transform.inverse()
        } else {
            warn!("Root transform is not invertible, using identity");
            Mat4::IDENTITY
        };
        self.resolve_exact(0.0);
    }

    pub fn start_clip_by_name(&mut self, name: &str) -> Result<(), PlayerError> {
        let clip = self
            .model
            .clip(name)
            .cloned()
            .ok_or_else(|| PlayerError::UnknownClip(name.to_string()))?;
        self.start_clip(clip);
        Ok(())
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    pub fn resume(&mut self) {
        if self.current_clip.is_some() {
            self.is_playing = true;
        }
    }

    pub fn restart_clip(&mut self) {
        if let Some(clip) = self.current_clip.clone() {
            self.start_clip(clip);
        }
    }

    pub fn update(&mut self, elapsed: Duration) {
        self.advance(elapsed.as_secs_f32());
    }

    /// Move the playback forward by `elapsed_seconds` and resolve the pose.
    ///
    /// # Panics
    ///
    /// Panics if no clip was started.
    pub fn advance(&mut self, elapsed_seconds: f32) {
        let Some(clip) = self.current_clip.clone() else {
            panic!("Updating the player without a clip");
        };
        if !self.is_playing {
            return;
        }

        self.current_time += elapsed_seconds * clip.ticks_per_second();
        if self.current_time >= clip.duration() {
            if self.is_looping {
                self.current_time = 0.0;
            } else {
                self.is_playing = false;
                return;
            }
        }
        trace!("Animate time: {:#.03} ticks", self.current_time);

        if self.interpolation_enabled {
            self.resolve(PoseSource::Interpolated(&clip, self.current_time));
        } else {
            self.resolve_exact(self.current_time);
        }
    }

    /// Show the pose stored at `keyframe`, whatever the playback state.
    ///
    /// # Panics
    ///
    /// Panics if no clip was started.
    pub fn set_current_keyframe(&mut self, keyframe: usize) {
        let Some(clip) = self.current_clip.clone() else {
            panic!("Setting the current keyframe without a clip");
        };
        self.current_keyframe = keyframe;
        self.resolve(PoseSource::Keyframe(&clip, keyframe));
    }

    /// Resolve the skinning matrices of the static hierarchy.
    pub fn bind_pose(&mut self) {
        self.resolve(PoseSource::Bind);
    }

    /// Same result as [`Self::bind_pose`], computing each node's to-root
    /// transform from scratch instead of reusing its parent's.
    pub fn bind_pose_bottom_up(&mut self) {
        resolve_bottom_up(
            self.model.scene_graph(),
            &self.inverse_root_transform,
            &mut self.bone_transforms,
        );
    }

    fn resolve_exact(&mut self, time: f32) {
        let Some(clip) = self.current_clip.clone() else {
            return;
        };
        if let Some(keyframe) = self.resolve(PoseSource::Exact(&clip, time)) {
            self.current_keyframe = keyframe;
        }
    }

    fn resolve(&mut self, source: PoseSource) -> Option<usize> {
        resolve_top_down(
            self.model.scene_graph(),
            source,
            &self.inverse_root_transform,
            &mut self.to_root_transforms,
            &mut self.bone_transforms,
        )
    }
}
