pub use parlor_core::{ParticipantId, RoomId, SessionState, VoiceSessionState};

pub mod model {
    pub use parlor_core::model::*;
}

pub mod session {
    pub use parlor_session::*;
}
