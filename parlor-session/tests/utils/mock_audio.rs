use async_trait::async_trait;
use parlor_session::{AudioConstraints, AudioSource, LocalAudioTrack, MediaError};

/// Audio source that always refuses, simulating a declined microphone
/// permission prompt.
pub struct DeniedAudioSource;

#[async_trait]
impl AudioSource for DeniedAudioSource {
    async fn open(&self, _constraints: &AudioConstraints) -> Result<LocalAudioTrack, MediaError> {
        Err(MediaError::PermissionDenied(
            "user declined the microphone prompt".to_string(),
        ))
    }
}
