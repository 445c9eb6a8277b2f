use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

mod clip;
mod keyframe;
mod track;

pub use clip::AnimationClip;
pub use keyframe::Keyframe;
pub use track::AnimationTrack;

#[derive(Debug, Clone, PartialEq)]
pub enum AnimationError {
    EmptyTrack { bone: u32 },
    UnsortedKeyframes { bone: u32, index: usize },
    NonFiniteTime { bone: u32, index: usize },
    DuplicateTrack { clip: String, bone: u32 },
}

impl Display for AnimationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AnimationError::EmptyTrack { bone } => {
                write!(f, "Track of bone #{} has no keyframes", bone)
            }
            AnimationError::UnsortedKeyframes { bone, index } => write!(
                f,
                "Keyframe {} of bone #{} is earlier than the previous keyframe",
                index, bone
            ),
            AnimationError::NonFiniteTime { bone, index } => {
                write!(f, "Keyframe {} of bone #{} has a non-finite time", index, bone)
            }
            AnimationError::DuplicateTrack { clip, bone } => {
                write!(f, "Clip {} has more than one track for bone #{}", clip, bone)
            }
        }
    }
}

impl Error for AnimationError {}
