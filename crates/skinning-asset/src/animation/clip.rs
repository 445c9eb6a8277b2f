use std::collections::HashMap;

use glam::Mat4;
use log::warn;

use super::{AnimationError, AnimationTrack};

/// Named animation made of one track per animated bone.
///
/// Durations and keyframe times are in ticks. `ticks_per_second` converts
/// playback seconds into ticks.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    name: String,
    duration: f32,
    ticks_per_second: f32,
    tracks: Vec<AnimationTrack>,
    tracks_by_bone: HashMap<u32, usize>,
    keyframe_count: usize,
}

impl AnimationClip {
    /// Create a clip. A non-positive `ticks_per_second` is replaced by 1.
    pub fn new(
        name: impl Into<String>,
        duration: f32,
        ticks_per_second: f32,
        tracks: Vec<AnimationTrack>,
    ) -> Result<Self, AnimationError> {
        let name = name.into();
        let ticks_per_second = if ticks_per_second > 0.0 {
            ticks_per_second
        } else {
            warn!(
                "Clip {} has invalid ticks per second {}, using 1",
                name, ticks_per_second
            );
            1.0
        };

        let mut tracks_by_bone = HashMap::with_capacity(tracks.len());
        for (index, track) in tracks.iter().enumerate() {
            if tracks_by_bone.insert(track.bone(), index).is_some() {
                return Err(AnimationError::DuplicateTrack {
                    clip: name,
                    bone: track.bone(),
                });
            }
        }
        let keyframe_count = tracks.iter().map(AnimationTrack::len).max().unwrap_or(0);

        Ok(Self {
            name,
            duration,
            ticks_per_second,
            tracks,
            tracks_by_bone,
            keyframe_count,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in ticks.
    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn ticks_per_second(&self) -> f32 {
        self.ticks_per_second
    }

    pub fn duration_seconds(&self) -> f32 {
        self.duration / self.ticks_per_second
    }

    pub fn tracks(&self) -> &[AnimationTrack] {
        &self.tracks
    }

    pub fn track(&self, bone: u32) -> Option<&AnimationTrack> {
        self.tracks_by_bone
            .get(&bone)
            .map(|index| &self.tracks[*index])
    }

    /// Keyframe count of the longest track.
    pub fn keyframe_count(&self) -> usize {
        self.keyframe_count
    }

    /// Exact transform of `bone` at `time`, with the keyframe index it came
    /// from. Bones without a track keep the identity and report no keyframe.
    pub fn transform(&self, time: f32, bone: u32) -> (Mat4, Option<usize>) {
        match self.track(bone) {
            Some(track) => {
                let (transform, index) = track.exact_transform(time);
                (transform, Some(index))
            }
            None => (Mat4::IDENTITY, None),
        }
    }

    pub fn transform_at_keyframe(&self, keyframe: usize, bone: u32) -> Mat4 {
        self.track(bone)
            .map(|track| track.transform_at_keyframe(keyframe))
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn interpolated_transform(&self, time: f32, bone: u32) -> Mat4 {
        self.track(bone)
            .map(|track| track.interpolated_transform(time))
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Write the exact transform of every track into `transforms`, indexed by
    /// bone. Returns the keyframe index of the last track sampled.
    pub fn transforms(&self, time: f32, transforms: &mut [Mat4]) -> Option<usize> {
        let mut keyframe = None;
        for track in &self.tracks {
            let (transform, index) = track.exact_transform(time);
            if let Some(slot) = transforms.get_mut(track.bone() as usize) {
                *slot = transform;
            }
            keyframe = Some(index);
        }
        keyframe
    }

    pub fn transforms_at_keyframe(&self, keyframe: usize, transforms: &mut [Mat4]) {
        for track in &self.tracks {
            if let Some(slot) = transforms.get_mut(track.bone() as usize) {
                *slot = track.transform_at_keyframe(keyframe);
            }
        }
    }

    pub fn interpolated_transforms(&self, time: f32, transforms: &mut [Mat4]) {
        for track in &self.tracks {
            if let Some(slot) = transforms.get_mut(track.bone() as usize) {
                *slot = track.interpolated_transform(time);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Quat, Vec3};

    use crate::animation::{AnimationError, AnimationTrack, Keyframe};

    use super::AnimationClip;

    fn track(bone: u32, times: &[f32]) -> AnimationTrack {
        let keyframes = times
            .iter()
            .map(|time| Keyframe::new(*time, Vec3::new(*time, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE))
            .collect();
        AnimationTrack::new(bone, keyframes).unwrap()
    }

    #[test]
    fn test_clip_properties() {
        let clip = AnimationClip::new(
            "walk",
            20.0,
            10.0,
            vec![track(0, &[0.0, 10.0, 20.0]), track(2, &[0.0, 20.0])],
        )
        .unwrap();
        assert_eq!(clip.name(), "walk");
        assert_eq!(clip.keyframe_count(), 3);
        assert_eq!(clip.duration_seconds(), 2.0);
        assert!(clip.track(2).is_some());
        assert!(clip.track(1).is_none());
    }

    #[test]
    fn test_invalid_ticks_per_second() {
        let clip = AnimationClip::new("still", 1.0, 0.0, Vec::new()).unwrap();
        assert_eq!(clip.ticks_per_second(), 1.0);
        assert_eq!(clip.keyframe_count(), 0);
        let clip = AnimationClip::new("still", 1.0, -24.0, Vec::new()).unwrap();
        assert_eq!(clip.ticks_per_second(), 1.0);
    }

    #[test]
    fn test_duplicate_track() {
        let result = AnimationClip::new("walk", 1.0, 1.0, vec![track(1, &[0.0]), track(1, &[0.0])]);
        assert_eq!(
            result.unwrap_err(),
            AnimationError::DuplicateTrack {
                clip: String::from("walk"),
                bone: 1
            }
        );
    }

    #[test]
    fn test_bone_without_track() {
        let clip = AnimationClip::new("walk", 20.0, 1.0, vec![track(0, &[0.0, 20.0])]).unwrap();
        assert_eq!(clip.transform(5.0, 7), (Mat4::IDENTITY, None));
        assert_eq!(clip.interpolated_transform(5.0, 7), Mat4::IDENTITY);
        assert_eq!(clip.transform_at_keyframe(0, 7), Mat4::IDENTITY);
        assert_eq!(clip.transform(5.0, 0).1, Some(0));
    }

    #[test]
    fn test_bulk_transforms() {
        let clip = AnimationClip::new(
            "walk",
            20.0,
            1.0,
            vec![track(0, &[0.0, 10.0, 20.0]), track(2, &[0.0, 20.0])],
        )
        .unwrap();
        let mut transforms = [Mat4::ZERO; 3];
        clip.interpolated_transforms(5.0, &mut transforms);
        let expected = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        assert!(transforms[0].abs_diff_eq(expected, 1e-5));
        assert!(transforms[2].abs_diff_eq(expected, 1e-5));
        assert_eq!(transforms[1], Mat4::ZERO);

        assert_eq!(clip.transforms(15.0, &mut transforms), Some(0));
        assert_eq!(
            transforms[0],
            Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))
        );

        clip.transforms_at_keyframe(2, &mut transforms);
        assert_eq!(
            transforms[0],
            Mat4::from_translation(Vec3::new(20.0, 0.0, 0.0))
        );
        assert_eq!(
            transforms[2],
            Mat4::from_translation(Vec3::new(20.0, 0.0, 0.0))
        );
    }
}
