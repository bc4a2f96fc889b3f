use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use webrtc::media::Sample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// The one local audio track of a session, attached read-only to every peer
/// connection. Muting flips a flag checked on every sample write; no
/// renegotiation happens and remote peers simply receive silence.
#[derive(Clone)]
pub struct LocalAudioTrack {
    track: Arc<TrackLocalStaticSample>,
    enabled: Arc<AtomicBool>,
}

impl LocalAudioTrack {
    pub fn new(track: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            track,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn rtc_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.track.clone()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Forwards one captured sample to every bound connection. Samples are
    /// silently dropped while the track is disabled.
    pub async fn write_sample(&self, sample: &Sample) -> Result<(), webrtc::Error> {
        if !self.enabled() {
            return Ok(());
        }
        self.track.write_sample(sample).await
    }
}
