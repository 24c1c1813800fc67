use super::error::{DispatchError, SynthesisError};
use super::model::{AudioSegment, SynthesisJob};
use super::retry::RetryPolicy;
use super::VoiceParams;
use crate::domain::auth::{AuthError, AuthToken, TokenProvider};
use crate::domain::text::TextChunk;
use crate::infrastructure::rate_limit::RateLimiter;
use crate::infrastructure::repositories::SynthesisClient;
use crate::infrastructure::storage::ChunkStore;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};

/// Error recorded for jobs left unfinished by an abort
pub const CANCELLED: &str = "cancelled";

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub max_concurrency: usize,
    pub requests_per_second: f64,
    pub rate_limit_burst: u32,
    pub retry: RetryPolicy,
    /// How long in-flight attempts may finish after an abort
    pub shutdown_grace: Duration,
}

impl DispatcherConfig {
    /// Worker pool size: never more workers than requests admitted per second
    pub fn effective_concurrency(&self) -> usize {
        let rate_ceiling = self.requests_per_second.ceil().max(1.0) as usize;
        self.max_concurrency.max(1).min(rate_ceiling)
    }
}

/// Terminal result for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResult {
    Succeeded(AudioSegment),
    FailedPermanent { attempts: u32, error: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub attempts: u32,
    pub successes: u32,
    pub retryable_failures: u32,
    pub permanent_failures: u32,
    pub auth_rejections: u32,
    pub forced_refreshes: u32,
}

#[derive(Debug)]
pub struct DispatchOutcome {
    /// Keyed by chunk index, independent of completion order
    pub results: BTreeMap<usize, ChunkResult>,
    pub jobs: Vec<SynthesisJob>,
    pub stats: DispatchStats,
    pub cancelled: bool,
}

impl DispatchOutcome {
    pub fn failed_indices(&self) -> Vec<usize> {
        self.results
            .iter()
            .filter(|(_, result)| matches!(result, ChunkResult::FailedPermanent { .. }))
            .map(|(index, _)| *index)
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.cancelled && self.failed_indices().is_empty()
    }
}

/// Drives chunks through rate-limited synthesis with bounded retries
pub struct RetryingDispatcher {
    client: Arc<dyn SynthesisClient>,
    tokens: Arc<dyn TokenProvider>,
    limiter: Arc<RateLimiter>,
    voice: Arc<VoiceParams>,
    config: DispatcherConfig,
}

impl RetryingDispatcher {
    pub fn new(
        client: Arc<dyn SynthesisClient>,
        tokens: Arc<dyn TokenProvider>,
        voice: VoiceParams,
        config: DispatcherConfig,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.requests_per_second,
            config.rate_limit_burst,
        ));
        Self {
            client,
            tokens,
            limiter,
            voice: Arc::new(voice),
            config,
        }
    }

    pub fn voice(&self) -> &VoiceParams {
        &self.voice
    }

    /// Synthesize every chunk, without persistence or an abort signal
    pub async fn dispatch(&self, chunks: &[TextChunk]) -> Result<DispatchOutcome, DispatchError> {
        let (_abort_tx, abort_rx) = watch::channel(false);
        self.dispatch_with(chunks, None, abort_rx).await
    }

    /// Synthesize every chunk, persisting successes to `store` and stopping early on `abort`
    pub async fn dispatch_with(
        &self,
        chunks: &[TextChunk],
        store: Option<Arc<ChunkStore>>,
        mut abort: watch::Receiver<bool>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let concurrency = self.config.effective_concurrency();
        let context = AttemptContext {
            client: Arc::clone(&self.client),
            tokens: Arc::clone(&self.tokens),
            limiter: Arc::clone(&self.limiter),
            voice: Arc::clone(&self.voice),
            store,
        };
        let mut scheduler = Scheduler::new(chunks, &self.config.retry, self.tokens.as_ref());
        let mut in_flight: JoinSet<AttemptReport> = JoinSet::new();
        let mut abort_open = true;
        let mut cancelled = *abort.borrow();

        tracing::info!(
            chunk_count = chunks.len(),
            concurrency,
            requests_per_second = self.limiter.requests_per_second(),
            burst = self.limiter.capacity(),
            max_retries = self.config.retry.max_retries,
            "Dispatching synthesis jobs"
        );

        while !cancelled {
            scheduler.release_due(Instant::now());
            while in_flight.len() < concurrency {
                let Some((position, chunk)) = scheduler.start_next() else {
                    break;
                };
                in_flight.spawn(context.clone().run(position, chunk));
            }

            if in_flight.is_empty() && !scheduler.has_waiting_jobs() {
                break;
            }
            let next_retry = scheduler.next_retry_at();

            tokio::select! {
                joined = in_flight.join_next(), if !in_flight.is_empty() => {
                    match joined {
                        Some(Ok(report)) => scheduler.record(report)?,
                        Some(Err(e)) => return Err(DispatchError::Worker(e.to_string())),
                        None => {}
                    }
                }
                _ = sleep_until(next_retry.unwrap_or_else(Instant::now)), if next_retry.is_some() => {}
                changed = abort.changed(), if abort_open => {
                    match changed {
                        Ok(()) => cancelled = *abort.borrow(),
                        Err(_) => abort_open = false,
                    }
                }
                else => break,
            }
        }

        if cancelled {
            tracing::warn!(
                in_flight = in_flight.len(),
                grace_ms = self.config.shutdown_grace.as_millis() as u64,
                "Abort requested, waiting for in-flight attempts"
            );
            let deadline = Instant::now() + self.config.shutdown_grace;
            while !in_flight.is_empty() {
                tokio::select! {
                    joined = in_flight.join_next() => {
                        if let Some(Ok(report)) = joined {
                            scheduler.record_after_abort(report);
                        }
                    }
                    _ = sleep_until(deadline) => {
                        tracing::warn!(abandoned = in_flight.len(), "Grace period over, abandoning attempts");
                        in_flight.abort_all();
                        break;
                    }
                }
            }
            scheduler.abandon_unfinished();
        }

        let outcome = scheduler.finish(cancelled);
        tracing::info!(
            attempts = outcome.stats.attempts,
            succeeded = outcome.stats.successes,
            failed = outcome.stats.permanent_failures,
            forced_refreshes = outcome.stats.forced_refreshes,
            cancelled,
            "Dispatch finished"
        );
        Ok(outcome)
    }
}

/// Chunks finished so far, with a linear estimate of the time left
#[derive(Debug, Clone)]
struct Progress {
    total: usize,
    completed: usize,
    started: Instant,
}

impl Progress {
    fn new(total: usize, started: Instant) -> Self {
        Self {
            total,
            completed: 0,
            started,
        }
    }

    fn complete_one(&mut self) {
        self.completed = (self.completed + 1).min(self.total);
    }

    fn eta(&self, now: Instant) -> Duration {
        if self.completed == 0 {
            return Duration::ZERO;
        }
        let remaining = (self.total - self.completed) as u32;
        let per_chunk = now.saturating_duration_since(self.started) / self.completed as u32;
        per_chunk * remaining
    }
}

/// Everything a worker needs for one attempt
#[derive(Clone)]
struct AttemptContext {
    client: Arc<dyn SynthesisClient>,
    tokens: Arc<dyn TokenProvider>,
    limiter: Arc<RateLimiter>,
    voice: Arc<VoiceParams>,
    store: Option<Arc<ChunkStore>>,
}

enum AttemptOutcome {
    Synthesized(AudioSegment),
    Failed {
        error: SynthesisError,
        token: AuthToken,
    },
    TokenUnavailable(AuthError),
}

struct AttemptReport {
    position: usize,
    outcome: AttemptOutcome,
}

impl AttemptContext {
    async fn run(self, position: usize, chunk: TextChunk) -> AttemptReport {
        self.limiter.acquire().await;

        let outcome = match self.tokens.get_token().await {
            Err(error) => AttemptOutcome::TokenUnavailable(error),
            Ok(token) => match self.client.synthesize(&chunk, &self.voice, &token).await {
                Ok(segment) => {
                    self.persist(&segment).await;
                    AttemptOutcome::Synthesized(segment)
                }
                Err(error) => AttemptOutcome::Failed { error, token },
            },
        };

        AttemptReport { position, outcome }
    }

    async fn persist(&self, segment: &AudioSegment) {
        let Some(store) = &self.store else {
            return;
        };
        // Losing a persisted copy only costs resumability
        if let Err(e) = store.persist(segment).await {
            tracing::warn!(
                chunk_index = segment.chunk_index,
                error = %e,
                "Failed to persist chunk audio"
            );
        }
    }
}

/// Job table and queues owned by the scheduler loop
struct Scheduler<'a> {
    chunks: &'a [TextChunk],
    jobs: Vec<SynthesisJob>,
    ready: VecDeque<usize>,
    backoff: BinaryHeap<Reverse<(Instant, usize)>>,
    results: BTreeMap<usize, ChunkResult>,
    stats: DispatchStats,
    progress: Progress,
    policy: &'a RetryPolicy,
    tokens: &'a dyn TokenProvider,
}

impl<'a> Scheduler<'a> {
    fn new(chunks: &'a [TextChunk], policy: &'a RetryPolicy, tokens: &'a dyn TokenProvider) -> Self {
        Self {
            chunks,
            jobs: chunks.iter().map(|c| SynthesisJob::new(c.index)).collect(),
            ready: (0..chunks.len()).collect(),
            backoff: BinaryHeap::new(),
            results: BTreeMap::new(),
            stats: DispatchStats::default(),
            progress: Progress::new(chunks.len(), Instant::now()),
            policy,
            tokens,
        }
    }

    fn has_waiting_jobs(&self) -> bool {
        !self.ready.is_empty() || !self.backoff.is_empty()
    }

    fn next_retry_at(&self) -> Option<Instant> {
        self.backoff.peek().map(|Reverse((at, _))| *at)
    }

    /// Move jobs whose backoff has elapsed back to the ready queue
    fn release_due(&mut self, now: Instant) {
        while let Some(Reverse((at, position))) = self.backoff.peek().copied() {
            if at > now {
                break;
            }
            self.backoff.pop();
            self.jobs[position].release_retry();
            self.ready.push_back(position);
        }
    }

    fn start_next(&mut self) -> Option<(usize, TextChunk)> {
        let position = self.ready.pop_front()?;
        self.jobs[position].start_attempt();
        self.stats.attempts += 1;
        Some((position, self.chunks[position].clone()))
    }

    fn record(&mut self, report: AttemptReport) -> Result<(), DispatchError> {
        let position = report.position;
        let chunk_index = self.jobs[position].chunk_index;

        match report.outcome {
            AttemptOutcome::Synthesized(segment) => self.record_success(position, segment),
            AttemptOutcome::TokenUnavailable(error) => {
                tracing::error!(chunk_index, error = %error, "Could not obtain bearer token");
                return Err(DispatchError::Auth(error));
            }
            AttemptOutcome::Failed {
                error: SynthesisError::AuthExpired(message),
                token,
            } => {
                self.stats.auth_rejections += 1;
                if self.tokens.invalidate(&token) {
                    self.stats.forced_refreshes += 1;
                }
                let job = &mut self.jobs[position];
                job.requeue_after_auth(message);

                let limit = self.policy.max_auth_refreshes;
                if self.stats.forced_refreshes > limit || job.auth_retries > limit {
                    tracing::error!(chunk_index, limit, "Bearer token keeps being rejected");
                    return Err(AuthError::RefreshLimitExceeded(limit).into());
                }
                tracing::warn!(chunk_index, "Bearer token rejected, retrying with a fresh one");
                self.ready.push_front(position);
            }
            AttemptOutcome::Failed { error, .. } if error.is_retryable() => {
                self.stats.retryable_failures += 1;
                let job = &mut self.jobs[position];
                let attempt = job.attempt_count + 1;

                if self.policy.allows_retry(attempt) {
                    let delay = self.policy.delay_for(attempt);
                    let retry_at = Instant::now() + delay;
                    job.schedule_retry(retry_at, error.to_string());
                    self.backoff.push(Reverse((retry_at, position)));
                    tracing::warn!(
                        chunk_index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Synthesis attempt failed, retrying"
                    );
                } else {
                    job.fail(error.to_string());
                    self.record_failure(position);
                }
            }
            AttemptOutcome::Failed { error, .. } => {
                self.jobs[position].fail(error.to_string());
                self.record_failure(position);
            }
        }
        Ok(())
    }

    /// Results arriving during the grace period: keep successes, drop everything else
    fn record_after_abort(&mut self, report: AttemptReport) {
        match report.outcome {
            AttemptOutcome::Synthesized(segment) => self.record_success(report.position, segment),
            _ => {
                self.jobs[report.position].abandon(CANCELLED.to_string());
                self.record_failure(report.position);
            }
        }
    }

    fn abandon_unfinished(&mut self) {
        self.ready.clear();
        self.backoff.clear();
        for position in 0..self.jobs.len() {
            if !self.jobs[position].status.is_terminal() {
                self.jobs[position].abandon(CANCELLED.to_string());
                self.record_failure(position);
            }
        }
    }

    fn record_success(&mut self, position: usize, segment: AudioSegment) {
        let job = &mut self.jobs[position];
        job.succeed();
        self.stats.successes += 1;
        tracing::debug!(
            chunk_index = job.chunk_index,
            attempts = job.attempt_count,
            audio_size = segment.payload.len(),
            "Chunk synthesized"
        );
        self.results
            .insert(job.chunk_index, ChunkResult::Succeeded(segment));
        self.report_progress();
    }

    fn record_failure(&mut self, position: usize) {
        let job = &self.jobs[position];
        let error = job.last_error.clone().unwrap_or_default();
        self.stats.permanent_failures += 1;
        tracing::error!(
            chunk_index = job.chunk_index,
            attempts = job.attempt_count,
            error = %error,
            "Chunk failed permanently"
        );
        self.results.insert(
            job.chunk_index,
            ChunkResult::FailedPermanent {
                attempts: job.attempt_count,
                error,
            },
        );
        self.report_progress();
    }

    fn report_progress(&mut self) {
        let now = Instant::now();
        self.progress.complete_one();
        let eta = self.progress.eta(now);
        tracing::info!(
            completed = self.progress.completed,
            total = self.progress.total,
            failed = self.stats.permanent_failures,
            eta_ms = eta.as_millis() as u64,
            "Synthesis progress"
        );
    }

    fn finish(self, cancelled: bool) -> DispatchOutcome {
        DispatchOutcome {
            results: self.results,
            jobs: self.jobs,
            stats: self.stats,
            cancelled,
        }
    }
}
