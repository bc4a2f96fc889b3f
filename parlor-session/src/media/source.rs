use crate::error::MediaError;
use crate::media::track::LocalAudioTrack;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Processing hints passed to the capture backend, mirroring the standard
/// getUserMedia audio constraints. Voice chat wants all three on.
#[derive(Debug, Clone)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// The platform capture capability. Opening the source is where microphone
/// permission is resolved; a denial surfaces as
/// [`MediaError::PermissionDenied`] and fails the whole join attempt.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn open(&self, constraints: &AudioConstraints) -> Result<LocalAudioTrack, MediaError>;
}

/// Capture-less source: hands out an Opus track that never carries samples.
/// Useful for tests, demos, and listen-only participants; a real microphone
/// backend implements [`AudioSource`] and pumps samples through
/// [`LocalAudioTrack::write_sample`].
pub struct SilenceSource;

#[async_trait]
impl AudioSource for SilenceSource {
    async fn open(&self, constraints: &AudioConstraints) -> Result<LocalAudioTrack, MediaError> {
        debug!(?constraints, "opening silent audio source");
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            "audio".to_owned(),
            "parlor".to_owned(),
        ));
        Ok(LocalAudioTrack::new(track))
    }
}
