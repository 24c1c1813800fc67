#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentationError {
    #[error("max chunk size must be greater than zero")]
    InvalidMaxSize,
    #[error("document has no speakable text: {0}")]
    NotSpeakable(String),
}
