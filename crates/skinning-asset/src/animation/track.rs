use glam::Mat4;

use super::{AnimationError, Keyframe};

/// Keyframes of a single bone within a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTrack {
    bone: u32,
    keyframes: Vec<Keyframe>,
}

impl AnimationTrack {
    /// Create a track for the bone at `bone` index.
    ///
    /// Keyframe times must be finite and non-decreasing, and the track must
    /// hold at least one keyframe.
    pub fn new(bone: u32, keyframes: Vec<Keyframe>) -> Result<Self, AnimationError> {
        if keyframes.is_empty() {
            return Err(AnimationError::EmptyTrack { bone });
        }
        if let Some(index) = keyframes.iter().position(|keyframe| !keyframe.time().is_finite()) {
            return Err(AnimationError::NonFiniteTime { bone, index });
        }
        if let Some(index) = keyframes
            .windows(2)
            .position(|pair| pair[1].time() < pair[0].time())
        {
            return Err(AnimationError::UnsortedKeyframes {
                bone,
                index: index + 1,
            });
        }
        Ok(Self { bone, keyframes })
    }

    pub fn bone(&self) -> u32 {
        self.bone
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    fn first(&self) -> &Keyframe {
        &self.keyframes[0]
    }

    fn last(&self) -> &Keyframe {
        &self.keyframes[self.keyframes.len() - 1]
    }

    pub fn start_time(&self) -> f32 {
        self.first().time()
    }

    pub fn end_time(&self) -> f32 {
        self.last().time()
    }

    /// Index of the keyframe that is active at `time`.
    ///
    /// Times before the first keyframe clamp to 0 and times after the last
    /// clamp to the last index. Otherwise this is the largest `i` with
    /// `keyframes[i].time <= time < keyframes[i + 1].time`.
    pub fn find_keyframe_index(&self, time: f32) -> usize {
        if time <= self.start_time() {
            return 0;
        }
        let last = self.keyframes.len() - 1;
        if time >= self.end_time() {
            return last;
        }
        let next = self
            .keyframes
            .partition_point(|keyframe| keyframe.time() <= time);
        next.saturating_sub(1).min(last)
    }

    /// Transform of the active keyframe, without interpolation.
    pub fn exact_transform(&self, time: f32) -> (Mat4, usize) {
        let index = self.find_keyframe_index(time);
        (self.keyframes[index].transform(), index)
    }

    /// Transform stored at keyframe `index`, clamped to the last keyframe.
    pub fn transform_at_keyframe(&self, index: usize) -> Mat4 {
        let index = index.min(self.keyframes.len() - 1);
        self.keyframes[index].transform()
    }

    /// Blended transform at `time`. A NaN time yields the first keyframe.
    pub fn interpolated_transform(&self, time: f32) -> Mat4 {
        let first = self.first();
        if time.is_nan() || time <= first.time() {
            return first.transform();
        }
        let last = self.last();
        if time >= last.time() {
            return last.transform();
        }

        let index = self.find_keyframe_index(time);
        let from = &self.keyframes[index];
        if time == from.time() {
            return from.transform();
        }
        let to = &self.keyframes[index + 1];
        let t = (time - from.time()) / (to.time() - from.time());
        from.blend(to, t).into()
    }
}
