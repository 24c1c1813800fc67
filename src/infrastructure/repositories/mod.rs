pub mod speechkit_tts_repository;
pub mod tts_repository;

pub use speechkit_tts_repository::{classify_status, SpeechKitClient, DEFAULT_SPEECHKIT_TTS_URL};
pub use tts_repository::SynthesisClient;
