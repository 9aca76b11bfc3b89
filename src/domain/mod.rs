mod model;

pub use model::{FixedVolume, Sound, VolumeProvider};
