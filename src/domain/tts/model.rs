use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Encoding of a segment payload as returned by the synthesis service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// Raw signed 16-bit little-endian PCM
    Lpcm,
    Wav,
}

impl AudioCodec {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioCodec::Lpcm => "pcm",
            AudioCodec::Wav => "wav",
        }
    }
}

/// Voice settings sent with every synthesis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceParams {
    pub voice: String,
    pub role: String,
    pub language: String,
    pub sample_rate: u32,
}

/// Audio returned for one chunk
#[derive(Clone, PartialEq, Eq)]
pub struct AudioSegment {
    pub chunk_index: usize,
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub payload: Vec<u8>,
}

impl fmt::Debug for AudioSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSegment")
            .field("chunk_index", &self.chunk_index)
            .field("codec", &self.codec)
            .field("sample_rate", &self.sample_rate)
            .field("channel_count", &self.channel_count)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    InFlight,
    Succeeded,
    FailedRetryable,
    FailedPermanent,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::FailedPermanent)
    }
}

/// Per-chunk retry state, mutated only by the dispatcher's scheduler loop.
///
/// `attempt_count` counts attempts charged against the retry budget; attempts rejected
/// for an expired bearer token are tracked separately in `auth_retries`.
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub chunk_index: usize,
    pub status: JobStatus,
    pub attempt_count: u32,
    pub auth_retries: u32,
    pub last_error: Option<String>,
    pub retry_at: Option<Instant>,
}

impl SynthesisJob {
    pub fn new(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            status: JobStatus::Pending,
            attempt_count: 0,
            auth_retries: 0,
            last_error: None,
            retry_at: None,
        }
    }

    /// Pending -> InFlight
    pub fn start_attempt(&mut self) {
        debug_assert_eq!(self.status, JobStatus::Pending);
        self.status = JobStatus::InFlight;
        self.retry_at = None;
    }

    /// InFlight -> Succeeded
    pub fn succeed(&mut self) {
        self.attempt_count += 1;
        self.status = JobStatus::Succeeded;
        self.last_error = None;
    }

    /// InFlight -> FailedRetryable, waiting until `retry_at`
    pub fn schedule_retry(&mut self, retry_at: Instant, error: String) {
        self.attempt_count += 1;
        self.status = JobStatus::FailedRetryable;
        self.retry_at = Some(retry_at);
        self.last_error = Some(error);
    }

    /// FailedRetryable -> Pending once the backoff has elapsed
    pub fn release_retry(&mut self) {
        debug_assert_eq!(self.status, JobStatus::FailedRetryable);
        self.status = JobStatus::Pending;
        self.retry_at = None;
    }

    /// InFlight -> Pending without charging the retry budget
    pub fn requeue_after_auth(&mut self, error: String) {
        self.auth_retries += 1;
        self.status = JobStatus::Pending;
        self.last_error = Some(error);
    }

    /// Counted failure ending in FailedPermanent
    pub fn fail(&mut self, error: String) {
        self.attempt_count += 1;
        self.abandon(error);
    }

    /// Any non-terminal state -> FailedPermanent without charging an attempt
    pub fn abandon(&mut self, error: String) {
        self.status = JobStatus::FailedPermanent;
        self.retry_at = None;
        self.last_error = Some(error);
    }
}
