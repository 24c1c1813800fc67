use super::error::AssemblyError;
use super::format::OutputFormat;
use super::pcm::{convert, decode_segment, encode_wav, gap_marker, PcmBuffer};
use crate::domain::tts::AudioSegment;
use crate::infrastructure::transcode::Transcoder;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default length of the marker standing in for a failed chunk
pub const DEFAULT_GAP_MARKER: Duration = Duration::from_millis(1000);

/// What to do with chunks that never synthesized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Refuse to produce output
    #[default]
    Abort,
    /// Replace each failed chunk with an audible marker
    GapMarker,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "gap" | "gap-marker" | "gap_marker" => Ok(FailurePolicy::GapMarker),
            other => Err(format!("expected `abort` or `gap`, got `{}`", other)),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => f.write_str("abort"),
            FailurePolicy::GapMarker => f.write_str("gap"),
        }
    }
}

/// Per-chunk input to assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkAudio {
    Ready(AudioSegment),
    Failed { chunk_index: usize },
}

impl ChunkAudio {
    pub fn chunk_index(&self) -> usize {
        match self {
            ChunkAudio::Ready(segment) => segment.chunk_index,
            ChunkAudio::Failed { chunk_index } => *chunk_index,
        }
    }
}

/// Final encoded audio
pub struct AssembledAudio {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: Duration,
    /// Chunks replaced by a gap marker
    pub gaps: Vec<usize>,
}

impl fmt::Debug for AssembledAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssembledAudio")
            .field("byte_len", &self.bytes.len())
            .field("format", &self.format)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration", &self.duration)
            .field("gaps", &self.gaps)
            .finish()
    }
}

/// Joins per-chunk audio in document order and encodes it once
pub struct AudioAssembler {
    policy: FailurePolicy,
    gap_marker: Duration,
    transcoder: Arc<dyn Transcoder>,
}

impl AudioAssembler {
    pub fn new(policy: FailurePolicy, gap_marker: Duration, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            policy,
            gap_marker,
            transcoder,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Assemble chunks `0..expected` into one stream of `format`.
    ///
    /// Input order does not matter; output follows chunk index.
    pub async fn assemble(
        &self,
        mut chunks: Vec<ChunkAudio>,
        expected: usize,
        format: OutputFormat,
    ) -> Result<AssembledAudio, AssemblyError> {
        if expected == 0 {
            return Err(AssemblyError::NoAudio);
        }
        chunks.sort_by_key(ChunkAudio::chunk_index);
        chunks.dedup_by_key(|chunk| chunk.chunk_index());

        let missing: Vec<usize> = (0..expected)
            .filter(|index| {
                chunks
                    .binary_search_by_key(index, ChunkAudio::chunk_index)
                    .is_err()
            })
            .collect();
        if !missing.is_empty() {
            return Err(AssemblyError::MissingChunks(missing));
        }
        chunks.truncate(expected);

        let failed: Vec<usize> = chunks
            .iter()
            .filter(|chunk| matches!(chunk, ChunkAudio::Failed { .. }))
            .map(ChunkAudio::chunk_index)
            .collect();
        if !failed.is_empty() && self.policy == FailurePolicy::Abort {
            return Err(AssemblyError::FailedChunks(failed));
        }

        let stream = self.concatenate(&chunks)?;
        let duration = stream.duration();
        tracing::info!(
            chunk_count = expected,
            gap_count = failed.len(),
            sample_rate = stream.sample_rate,
            channels = stream.channels,
            duration_secs = duration.as_secs_f64(),
            "Audio concatenated"
        );

        let wav = encode_wav(&stream)?;
        let bytes = self.transcoder.transcode(wav, format).await?;

        Ok(AssembledAudio {
            bytes,
            format,
            sample_rate: stream.sample_rate,
            channels: stream.channels,
            duration,
            gaps: failed,
        })
    }

    /// Decode, canonicalize to the first successful segment's format, and join
    fn concatenate(&self, chunks: &[ChunkAudio]) -> Result<PcmBuffer, AssemblyError> {
        let mut stream: Option<PcmBuffer> = None;
        let mut pending_gaps = 0usize;

        for chunk in chunks {
            match chunk {
                ChunkAudio::Failed { .. } => match stream.as_mut() {
                    Some(stream) => {
                        let marker = gap_marker(stream.sample_rate, stream.channels, self.gap_marker);
                        stream.samples.extend(marker);
                    }
                    // canonical format not known yet
                    None => pending_gaps += 1,
                },
                ChunkAudio::Ready(segment) => {
                    let decoded = decode_segment(segment)?;
                    let stream = stream.get_or_insert_with(|| {
                        let mut canonical = PcmBuffer::empty(decoded.sample_rate, decoded.channels);
                        for _ in 0..pending_gaps {
                            canonical.samples.extend(gap_marker(
                                decoded.sample_rate,
                                decoded.channels,
                                self.gap_marker,
                            ));
                        }
                        canonical
                    });
                    let converted = convert(decoded, stream.sample_rate, stream.channels);
                    stream.samples.extend(converted.samples);
                }
            }
        }

        stream.ok_or(AssemblyError::NoAudio)
    }
}
