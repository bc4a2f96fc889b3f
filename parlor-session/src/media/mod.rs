mod source;
mod track;

pub use source::{AudioConstraints, AudioSource, SilenceSource};
pub use track::LocalAudioTrack;
