//! Parallel job execution.
//!
//! Stale files are chunked into jobs no larger than their converter's
//! batch size and pulled off a shared index by a bounded pool of worker
//! threads. Jobs are independent: no ordering is guaranteed between jobs
//! and correctness must not depend on conversion order. Results are
//! re-sorted into submission order after the pool drains.
//!
//! Cancellation is a first-class pool operation: a [`CancelToken`] flips
//! a shared flag, workers stop picking up new jobs within one iteration,
//! and `run` returns only once the pool is quiescent. Converters run
//! in-process on pool threads; one wrapping a non-reentrant native tool
//! should spawn its own subprocess. A hung converter hangs the build (the
//! core imposes no timeouts).

use crate::build::context::BuildContext;
use crate::build::pipeline::BuildError;
use crate::build::progress::{JobStatus, NullProgress, ProgressEvent, ProgressReporter};
use crate::converter::{ConversionRecord, Converter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Default worker count (available parallelism).
fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Shared flag for cancelling an in-progress build.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the build this token is attached to.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One scheduled unit of work: a converter invocation over a bounded
/// chunk of files drawn from a single stream.
#[derive(Debug, Clone)]
pub struct Job {
    /// Descriptive label for progress display
    pub label: String,
    converter: Converter,
    options: Arc<toml::Table>,
    files: Vec<PathBuf>,
}

impl Job {
    /// Chunk a stream's stale files into jobs of at most the converter's
    /// batch size, preserving file order.
    pub fn chunk(
        converter: &Converter,
        options: &toml::Table,
        files: &[PathBuf],
        src_dir: &Path,
    ) -> Vec<Job> {
        let options = Arc::new(options.clone());

        files
            .chunks(converter.batch_size())
            .map(|chunk| {
                let rels: Vec<String> = chunk
                    .iter()
                    .map(|f| {
                        f.strip_prefix(src_dir).unwrap_or(f).to_string_lossy().into_owned()
                    })
                    .collect();
                Job {
                    label: format!("{}: {}", converter.name(), rels.join(", ")),
                    converter: converter.clone(),
                    options: Arc::clone(&options),
                    files: chunk.to_vec(),
                }
            })
            .collect()
    }

    /// Number of files in this job.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the job carries no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Bounded worker pool executing conversion jobs.
pub struct JobScheduler {
    /// Number of pool workers
    workers: usize,
    /// Shared cancellation flag
    cancel: CancelToken,
    /// Progress sink
    reporter: Arc<dyn ProgressReporter>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl JobScheduler {
    /// Create a scheduler with the default worker count.
    pub fn new() -> Self {
        Self {
            workers: default_workers(),
            cancel: CancelToken::new(),
            reporter: Arc::new(NullProgress),
        }
    }

    /// Set the worker count; zero or negative selects the default.
    pub fn with_workers(mut self, workers: i64) -> Self {
        self.workers = if workers > 0 { workers as usize } else { default_workers() };
        self
    }

    /// Set the progress reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Attach an externally held cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get a token that cancels this scheduler's runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Get the worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run all jobs to completion and collect their conversion records in
    /// submission order.
    ///
    /// The first converter failure cancels the remaining jobs, drains the
    /// pool, and surfaces as [`BuildError::Conversion`]; an external
    /// cancellation surfaces as [`BuildError::Interrupted`]. Either way no
    /// partial results escape.
    pub fn run(
        &self,
        ctx: &BuildContext,
        jobs: &[Job],
    ) -> Result<Vec<ConversionRecord>, BuildError> {
        self.reporter.report(ProgressEvent::BuildStarted { total_jobs: jobs.len() });

        if jobs.is_empty() {
            return if self.cancel.is_cancelled() {
                Err(BuildError::Interrupted)
            } else {
                Ok(vec![])
            };
        }

        let config = ctx.config();
        let src_dir = ctx.asset_dir();
        let dst_dir = ctx.export_dir();

        let results: Mutex<Vec<(usize, Vec<ConversionRecord>)>> = Mutex::new(Vec::new());
        let first_failure: Mutex<Option<BuildError>> = Mutex::new(None);
        let next_idx = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..self.workers.min(jobs.len()) {
                s.spawn(|| loop {
                    if self.cancel.is_cancelled() {
                        break;
                    }

                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= jobs.len() {
                        break;
                    }

                    let job = &jobs[idx];
                    self.reporter.report(ProgressEvent::JobStarted { label: job.label.clone() });
                    let start = Instant::now();

                    let outcome = job.converter.convert(
                        config,
                        &job.options,
                        &src_dir,
                        &dst_dir,
                        &job.files,
                    );
                    let duration_ms = start.elapsed().as_millis() as u64;

                    match outcome {
                        Ok(records) => {
                            self.reporter.report(ProgressEvent::JobCompleted {
                                label: job.label.clone(),
                                status: JobStatus::Success,
                                duration_ms,
                            });
                            results.lock().unwrap().push((idx, records));
                        }
                        Err(e) => {
                            self.reporter.report(ProgressEvent::JobCompleted {
                                label: job.label.clone(),
                                status: JobStatus::Failed(e.to_string()),
                                duration_ms,
                            });
                            let mut failure = first_failure.lock().unwrap();
                            if failure.is_none() {
                                *failure = Some(BuildError::Conversion {
                                    job: job.label.clone(),
                                    message: e.to_string(),
                                });
                            }
                            self.cancel.cancel();
                        }
                    }
                });
            }
        });

        // Pool is quiescent from here on.
        if let Some(error) = first_failure.into_inner().unwrap_or(None) {
            return Err(error);
        }
        if self.cancel.is_cancelled() {
            return Err(BuildError::Interrupted);
        }

        let mut results = results.into_inner().unwrap_or_default();
        results.sort_by_key(|(idx, _)| *idx);
        Ok(results.into_iter().flat_map(|(_, records)| records).collect())
    }
}
