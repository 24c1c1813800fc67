pub mod dispatcher;
pub mod error;
pub mod model;
pub mod retry;

pub use dispatcher::{
    ChunkResult, DispatchOutcome, DispatchStats, DispatcherConfig, RetryingDispatcher, CANCELLED,
};
pub use error::{DispatchError, SynthesisError};
pub use model::{AudioCodec, AudioSegment, JobStatus, SynthesisJob, VoiceParams};
pub use retry::RetryPolicy;
