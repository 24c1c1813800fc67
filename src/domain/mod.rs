pub mod audio;
pub mod auth;
pub mod pipeline;
pub mod text;
pub mod tts;
