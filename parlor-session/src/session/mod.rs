mod session;

pub use session::{VoiceSession, VoiceSessionConfig, default_stun_servers};
