pub mod cleaning;
pub mod error;
pub mod model;
pub mod segmenter;

pub use cleaning::{
    clean_for_synthesis, estimate_chunk_count, estimate_duration_secs, validate_for_processing,
    MIN_SPEAKABLE_CHARS,
};
pub use error::SegmentationError;
pub use model::{Document, SourceFormat, TextChunk};
pub use segmenter::{normalize, segment, TextSegmenter, DEFAULT_MAX_CHUNK_SIZE};
