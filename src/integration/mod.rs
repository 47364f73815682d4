//! Voice pipeline wiring
//!
//! Connects the pieces into one owned component: reply text in, processed
//! WAV path out.

mod config;
mod pipeline;
mod session;

pub use config::{VoiceConfig, DEFAULT_TEMP_DIR_NAME};
pub use pipeline::VoicePipeline;
pub use session::VoiceSession;
