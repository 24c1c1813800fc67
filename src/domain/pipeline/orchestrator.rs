use super::error::PipelineError;
use super::run::{FailedChunk, PipelineRun, PipelineStage, RunReport, RunStatus};
use crate::domain::audio::{AudioAssembler, ChunkAudio, FailurePolicy, OutputFormat};
use crate::domain::text::{
    estimate_chunk_count, estimate_duration_secs, normalize, validate_for_processing, Document,
    SegmentationError, TextChunk, TextSegmenter, MIN_SPEAKABLE_CHARS,
};
use crate::domain::tts::{AudioSegment, ChunkResult, RetryingDispatcher};
use crate::infrastructure::storage::{run_key, ChunkStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Drives one document through segmentation, synthesis and assembly
pub struct PipelineOrchestrator {
    segmenter: TextSegmenter,
    dispatcher: RetryingDispatcher,
    assembler: AudioAssembler,
    temp_root: PathBuf,
}

impl PipelineOrchestrator {
    pub fn new(
        segmenter: TextSegmenter,
        dispatcher: RetryingDispatcher,
        assembler: AudioAssembler,
        temp_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            segmenter,
            dispatcher,
            assembler,
            temp_root: temp_root.into(),
        }
    }

    /// Convert `document` into `output`.
    ///
    /// Chunk failures do not make this return `Err`; they show up in the report.
    /// Errors are reserved for runs that cannot continue at all.
    pub async fn run(
        &self,
        document: &Document,
        output: &Path,
        format: OutputFormat,
        abort: watch::Receiver<bool>,
    ) -> Result<RunReport, PipelineError> {
        let mut run = PipelineRun::new();
        tracing::info!(
            run_id = %run.run_id,
            source_format = %document.source_format,
            output = %output.display(),
            format = %format,
            failure_policy = %self.assembler.policy(),
            "Pipeline run started"
        );

        match self.execute(&mut run, document, output, format, abort).await {
            Ok(report) => Ok(report),
            Err(e) => {
                let stage = run.stage;
                run.advance(PipelineStage::Failed);
                tracing::error!(run_id = %run.run_id, stage = %stage, error = %e, "Pipeline run failed");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run: &mut PipelineRun,
        document: &Document,
        output: &Path,
        format: OutputFormat,
        abort: watch::Receiver<bool>,
    ) -> Result<RunReport, PipelineError> {
        let normalized = normalize(&document.text);
        if !validate_for_processing(&normalized) {
            return Err(SegmentationError::NotSpeakable(format!(
                "need at least {} characters including a letter",
                MIN_SPEAKABLE_CHARS
            ))
            .into());
        }

        let max_chunk_size = self.segmenter.max_chunk_size();
        run.chunks = self.segmenter.segment(&normalized);
        let total_chunks = run.chunks.len();
        tracing::info!(
            run_id = %run.run_id,
            char_count = normalized.chars().count(),
            chunk_count = total_chunks,
            estimated_chunks = estimate_chunk_count(&normalized, max_chunk_size),
            estimated_duration_secs = estimate_duration_secs(&normalized),
            "Document segmented"
        );

        let key = run_key(&normalized, max_chunk_size, self.dispatcher.voice());
        let store = ChunkStore::open(&self.temp_root, &key)
            .await
            .map_err(|e| PipelineError::io(&self.temp_root, e))?;

        let mut segments = load_persisted(&store, &run.chunks).await;
        let resumed = segments.len();
        if resumed > 0 {
            tracing::info!(
                run_id = %run.run_id,
                resumed,
                remaining = total_chunks - resumed,
                path = %store.path().display(),
                "Resuming from persisted chunks"
            );
        }
        let pending: Vec<TextChunk> = run
            .chunks
            .iter()
            .filter(|chunk| !segments.contains_key(&chunk.index))
            .cloned()
            .collect();

        run.advance(PipelineStage::Dispatching);
        let store = Arc::new(store);
        let outcome = self
            .dispatcher
            .dispatch_with(&pending, Some(Arc::clone(&store)), abort)
            .await?;

        for (index, result) in outcome.results {
            match result {
                ChunkResult::Succeeded(segment) => {
                    segments.insert(index, segment);
                }
                ChunkResult::FailedPermanent { attempts, error } => {
                    let char_range = run
                        .chunks
                        .get(index)
                        .map(|chunk| chunk.char_range.clone())
                        .unwrap_or_default();
                    run.failures.push(FailedChunk {
                        index,
                        char_range,
                        attempts,
                        error,
                    });
                }
            }
        }
        run.jobs = outcome.jobs;

        let mut report = RunReport {
            run_id: run.run_id,
            status: RunStatus::Completed,
            total_chunks,
            succeeded: segments.len(),
            resumed,
            failed: run.failures.clone(),
            gaps: Vec::new(),
            output: None,
            format,
            audio_duration: None,
            output_bytes: None,
            elapsed: Duration::ZERO,
            stats: outcome.stats,
            retained_temp_dir: None,
        };

        if outcome.cancelled {
            tracing::warn!(run_id = %run.run_id, succeeded = report.succeeded, "Run cancelled, no output written");
            run.advance(PipelineStage::Failed);
            report.status = RunStatus::Cancelled;
            report.retained_temp_dir = Some(store.path().to_path_buf());
            report.elapsed = run.elapsed();
            return Ok(report);
        }

        if !run.failures.is_empty() && self.assembler.policy() == FailurePolicy::Abort {
            tracing::warn!(
                run_id = %run.run_id,
                failed = ?run.failures.iter().map(|f| f.index).collect::<Vec<_>>(),
                "Chunks failed, no output written"
            );
            run.advance(PipelineStage::Done);
            report.status = RunStatus::PartialFailure;
            report.retained_temp_dir = Some(store.path().to_path_buf());
            report.elapsed = run.elapsed();
            return Ok(report);
        }

        run.advance(PipelineStage::Assembling);
        let mut audio: Vec<ChunkAudio> = segments.into_values().map(ChunkAudio::Ready).collect();
        audio.extend(run.failures.iter().map(|failure| ChunkAudio::Failed {
            chunk_index: failure.index,
        }));
        let assembled = self.assembler.assemble(audio, total_chunks, format).await?;
        write_output(output, &assembled.bytes).await?;

        tracing::info!(
            run_id = %run.run_id,
            output = %output.display(),
            size = assembled.bytes.len(),
            duration_secs = assembled.duration.as_secs_f64(),
            "Audio written"
        );

        report.output = Some(output.to_path_buf());
        report.audio_duration = Some(assembled.duration);
        report.output_bytes = Some(assembled.bytes.len() as u64);
        report.gaps = assembled.gaps;
        run.advance(PipelineStage::Done);

        if run.failures.is_empty() {
            report.retained_temp_dir = release_store(store).await;
        } else {
            report.status = RunStatus::PartialFailure;
            report.retained_temp_dir = Some(store.path().to_path_buf());
        }
        report.elapsed = run.elapsed();
        Ok(report)
    }
}

async fn load_persisted(store: &ChunkStore, chunks: &[TextChunk]) -> BTreeMap<usize, AudioSegment> {
    let mut segments = BTreeMap::new();
    for chunk in chunks {
        match store.load(chunk.index).await {
            Ok(Some(segment)) => {
                segments.insert(chunk.index, segment);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(
                chunk_index = chunk.index,
                error = %e,
                "Could not read persisted chunk, synthesizing it again"
            ),
        }
    }
    segments
}

/// Delete the run directory; returns its path if it had to stay
async fn release_store(store: Arc<ChunkStore>) -> Option<PathBuf> {
    let path = store.path().to_path_buf();
    let Ok(store) = Arc::try_unwrap(store) else {
        tracing::warn!(path = %path.display(), "Run directory still in use, keeping it");
        return Some(path);
    };
    match store.release().await {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove run directory");
            Some(path)
        }
    }
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| PipelineError::io(path, e))
}
