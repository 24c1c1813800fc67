#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("no synthesized audio to assemble")]
    NoAudio,
    #[error("audio missing for chunks {0:?}")]
    MissingChunks(Vec<usize>),
    #[error("synthesis failed for chunks {0:?}")]
    FailedChunks(Vec<usize>),
    #[error("audio for chunk {index} could not be decoded: {message}")]
    Decode { index: usize, message: String },
    #[error("failed to encode WAV: {0}")]
    Encode(String),
    #[error("transcoding to {format} failed: {message}")]
    Transcode { format: String, message: String },
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
}
