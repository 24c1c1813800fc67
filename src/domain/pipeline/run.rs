use crate::domain::audio::OutputFormat;
use crate::domain::text::TextChunk;
use crate::domain::tts::{DispatchStats, SynthesisJob};
use chrono::{DateTime, Utc};
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Segmenting,
    Dispatching,
    Assembling,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Segmenting => "segmenting",
            PipelineStage::Dispatching => "dispatching",
            PipelineStage::Assembling => "assembling",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State of a single invocation
#[derive(Debug)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub stage: PipelineStage,
    pub chunks: Vec<TextChunk>,
    pub jobs: Vec<SynthesisJob>,
    pub failures: Vec<FailedChunk>,
    pub started_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stage: PipelineStage::Segmenting,
            chunks: Vec::new(),
            jobs: Vec::new(),
            failures: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn advance(&mut self, stage: PipelineStage) {
        tracing::debug!(run_id = %self.run_id, from = %self.stage, to = %stage, "Pipeline stage changed");
        self.stage = stage;
    }

    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.started_at).to_std().unwrap_or_default()
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

/// A chunk that ended without audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedChunk {
    pub index: usize,
    pub char_range: Range<usize>,
    pub attempts: u32,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    PartialFailure,
    Cancelled,
}

/// Summary of a finished run, printed for the user
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub total_chunks: usize,
    pub succeeded: usize,
    /// Chunks restored from a previous run instead of synthesized
    pub resumed: usize,
    pub failed: Vec<FailedChunk>,
    pub gaps: Vec<usize>,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub audio_duration: Option<Duration>,
    /// Size of the written output file
    pub output_bytes: Option<u64>,
    pub elapsed: Duration,
    pub stats: DispatchStats,
    /// Run directory kept on disk for a later resume
    pub retained_temp_dir: Option<PathBuf>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            RunStatus::Completed => "completed",
            RunStatus::PartialFailure => "partial failure",
            RunStatus::Cancelled => "cancelled",
        };
        writeln!(f, "Run {}: {}", self.run_id, status)?;
        writeln!(
            f,
            "  chunks: {} total, {} succeeded ({} resumed), {} failed",
            self.total_chunks,
            self.succeeded,
            self.resumed,
            self.failed.len()
        )?;
        for failure in &self.failed {
            writeln!(
                f,
                "  chunk {} (chars {}..{}) failed after {} attempt(s): {}",
                failure.index,
                failure.char_range.start,
                failure.char_range.end,
                failure.attempts,
                failure.error
            )?;
        }
        if !self.gaps.is_empty() {
            writeln!(f, "  gap markers inserted for chunks {:?}", self.gaps)?;
        }
        writeln!(
            f,
            "  requests: {} attempts, {} succeeded, {} retryable failures, {} token refreshes",
            self.stats.attempts,
            self.stats.successes,
            self.stats.retryable_failures,
            self.stats.forced_refreshes
        )?;
        match &self.output {
            Some(path) => {
                write!(f, "  output: {} ({}", path.display(), self.format)?;
                if let Some(bytes) = self.output_bytes {
                    write!(f, ", {} bytes", bytes)?;
                }
                if let Some(duration) = self.audio_duration {
                    write!(f, ", {:.1}s of audio", duration.as_secs_f64())?;
                }
                writeln!(f, ")")?;
            }
            None => writeln!(f, "  output: none written")?,
        }
        if let Some(dir) = &self.retained_temp_dir {
            writeln!(f, "  intermediate audio kept in {}", dir.display())?;
        }
        write!(f, "  elapsed: {:.1}s", self.elapsed.as_secs_f64())
    }
}
