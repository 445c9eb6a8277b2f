//! Skeletal animation playback over models from [`skinning_asset`].
//!
//! An [`AnimationPlayer`] advances one clip of a shared model and resolves
//! the skinning matrix of every bone after each step.

pub mod player;
mod pose;

pub use skinning_asset as asset;

pub use player::{AnimationPlayer, PlaybackState, PlayerError};
