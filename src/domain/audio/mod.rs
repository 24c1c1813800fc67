pub mod assembler;
pub mod error;
pub mod format;
pub mod pcm;

pub use assembler::{AssembledAudio, AudioAssembler, ChunkAudio, FailurePolicy, DEFAULT_GAP_MARKER};
pub use error::AssemblyError;
pub use format::OutputFormat;
pub use pcm::{decode_segment, encode_wav, gap_marker, PcmBuffer};
