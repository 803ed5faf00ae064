pub mod tts;
pub use tts::{locate_clone_script, VoiceCloneSession};
