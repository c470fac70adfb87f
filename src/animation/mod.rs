//! Avatar animation: a clip mixer, the blender state machine on top of it and
//! the joint palettes that carry the resulting pose to skinned meshes.

pub mod blender;
pub mod mixer;
pub mod skinning;

pub use blender::{AnimationBlender, BlendState};
pub use mixer::{BlendedChannel, Mixer};
pub use skinning::{MAX_JOINTS, SkinBinding};
