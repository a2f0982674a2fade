//! Concurrent translation with in-order display.
//!
//! Messages are numbered as they are submitted and translated on a bounded
//! set of workers. A single drain task shows results strictly in submission
//! order: it waits for the next number's result (up to a per-job timeout)
//! before moving on, so a slow translation delays later lines but never
//! reorders them.

mod error;
mod pending;

use std::{
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::{Notify, Semaphore},
    task::JoinHandle,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

pub use error::PipelineError;
pub use pending::{Sequence, TranslationJob};
use pending::PendingJobs;

use crate::{display::DisplaySink, metrics, translate::TranslationRouter};

/// Default number of concurrent translation jobs.
pub const DEFAULT_WORKERS: usize = 8;
/// Default time the drain waits for one job.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(10);
/// Default fallback wake-up interval of the drain.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Default time allowed for remaining jobs to display on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Tuning for [`OrderedPipeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Translation jobs allowed in flight; submitters wait beyond this.
    pub workers: usize,
    /// How long the drain waits for one job before skipping it.
    pub job_timeout: Duration,
    /// Drain wake-up interval when no submission notifies it.
    pub poll_interval: Duration,
    /// Time allowed for queued jobs to display during shutdown.
    pub shutdown_grace: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Counters reported by the drain when it finishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Lines handed to the display sink.
    pub displayed: u64,
    /// Jobs that produced nothing to show or whose task failed.
    pub skipped: u64,
    /// Jobs abandoned after the job timeout.
    pub timed_out: u64,
}

/// How [`OrderedPipeline::shutdown`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every submitted job was delivered or skipped.
    Drained(DrainStats),
    /// The grace period ran out with jobs still undelivered.
    GraceElapsed {
        /// Jobs that were never shown.
        abandoned: u64,
    },
    /// The drain task itself failed.
    Failed,
}

enum Delivery {
    Displayed,
    Skipped,
    TimedOut,
}

struct Shared {
    router: Arc<TranslationRouter>,
    pending: Mutex<PendingJobs>,
    wake: Notify,
    workers: Arc<Semaphore>,
    tracker: TaskTracker,
    /// Next sequence the drain will deliver.
    cursor: AtomicU64,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, PendingJobs> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable submission side of an [`OrderedPipeline`].
#[derive(Clone)]
pub struct PipelineHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}

impl PipelineHandle {
    /// Queue a message for translation and ordered display.
    ///
    /// Waits while every worker is busy. The sequence number is assigned and
    /// the job recorded under one lock, so the drain never observes a number
    /// without its job.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Closed`] once shutdown has begun.
    pub async fn submit(
        &self,
        sender_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Sequence, PipelineError> {
        let sender_name = sender_name.into();
        let text = text.into();
        let permit = Arc::clone(&self.shared.workers)
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::Closed)?;

        let sequence = {
            let mut pending = self.shared.pending();
            if pending.is_closed() {
                return Err(PipelineError::Closed);
            }
            let sequence = pending.assign();
            let router = Arc::clone(&self.shared.router);
            let result = self.shared.tracker.spawn(async move {
                let _permit = permit;
                router.translate(&text).await
            });
            pending.insert(TranslationJob {
                sequence,
                sender_name,
                result,
            });
            sequence
        };
        debug!(%sequence, "job submitted");
        self.shared.wake.notify_one();
        Ok(sequence)
    }

    /// Jobs recorded but not yet taken by the drain.
    #[must_use]
    pub fn pending_len(&self) -> usize { self.shared.pending().len() }
}

/// Running pipeline: a submission handle plus the drain task.
pub struct OrderedPipeline {
    handle: PipelineHandle,
    shutdown: CancellationToken,
    drain: JoinHandle<DrainStats>,
    config: PipelineConfig,
}

impl OrderedPipeline {
    /// Start the drain task. Must be called within a Tokio runtime.
    ///
    /// A worker count of zero is raised to one.
    #[must_use]
    pub fn spawn(
        router: Arc<TranslationRouter>,
        sink: Arc<dyn DisplaySink>,
        config: PipelineConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            router,
            pending: Mutex::new(PendingJobs::default()),
            wake: Notify::new(),
            workers: Arc::new(Semaphore::new(config.workers.max(1))),
            tracker: TaskTracker::new(),
            cursor: AtomicU64::new(0),
        });
        let shutdown = CancellationToken::new();
        let drain = tokio::spawn(drain(
            Arc::clone(&shared),
            sink,
            shutdown.clone(),
            config,
        ));
        Self {
            handle: PipelineHandle { shared },
            shutdown,
            drain,
            config,
        }
    }

    /// A handle for submitting messages.
    #[must_use]
    pub fn handle(&self) -> PipelineHandle { self.handle.clone() }

    /// Stop accepting work and let queued jobs display.
    ///
    /// Submissions fail from this point on. Jobs already queued are delivered
    /// in order within the configured grace; anything left after that is
    /// abandoned along with its translation task.
    pub async fn shutdown(self) -> ShutdownOutcome {
        let Self {
            handle,
            shutdown,
            mut drain,
            config,
        } = self;
        let shared = handle.shared;
        shared.pending().close();
        shared.workers.close();
        shared.tracker.close();
        shutdown.cancel();
        shared.wake.notify_one();

        match tokio::time::timeout(config.shutdown_grace, &mut drain).await {
            Ok(Ok(stats)) => {
                info!(
                    displayed = stats.displayed,
                    skipped = stats.skipped,
                    timed_out = stats.timed_out,
                    "pipeline drained"
                );
                ShutdownOutcome::Drained(stats)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "pipeline drain task failed");
                ShutdownOutcome::Failed
            }
            Err(_) => {
                drain.abort();
                let assigned = shared.pending().assigned();
                let abandoned = assigned.saturating_sub(shared.cursor.load(Ordering::Acquire));
                warn!(abandoned, grace = ?config.shutdown_grace, "shutdown grace elapsed");
                ShutdownOutcome::GraceElapsed { abandoned }
            }
        }
    }
}

/// Render one display line.
///
/// # Examples
///
/// ```
/// assert_eq!(chatlens::pipeline::format_line("Bob", "hi"), "Bob>>>hi");
/// ```
#[must_use]
pub fn format_line(sender_name: &str, text: &str) -> String { format!("{sender_name}>>>{text}") }

async fn drain(
    shared: Arc<Shared>,
    sink: Arc<dyn DisplaySink>,
    shutdown: CancellationToken,
    config: PipelineConfig,
) -> DrainStats {
    let mut next = Sequence::default();
    let mut stats = DrainStats::default();
    loop {
        let job = shared.pending().take(next);
        if let Some(job) = job {
            match deliver(job, sink.as_ref(), config.job_timeout).await {
                Delivery::Displayed => stats.displayed += 1,
                Delivery::Skipped => stats.skipped += 1,
                Delivery::TimedOut => stats.timed_out += 1,
            }
            next = next.next();
            shared.cursor.store(next.get(), Ordering::Release);
            continue;
        }
        // Closing happens before cancellation, so nothing new arrives once
        // the token is observed.
        if shutdown.is_cancelled() && shared.pending().is_empty() {
            break;
        }
        tokio::select! {
            () = shared.wake.notified() => {}
            () = tokio::time::sleep(config.poll_interval) => {}
            () = shutdown.cancelled(), if !shutdown.is_cancelled() => {}
        }
    }
    stats
}

async fn deliver(job: TranslationJob, sink: &dyn DisplaySink, timeout: Duration) -> Delivery {
    let TranslationJob {
        sequence,
        sender_name,
        result,
    } = job;
    match tokio::time::timeout(timeout, result).await {
        Ok(Ok(translated)) if !translated.is_empty() => {
            let line = format_line(&sender_name, &translated);
            if let Err(err) = sink.append(&line) {
                warn!(%sequence, error = %err, "display append failed");
                return Delivery::Skipped;
            }
            metrics::inc_lines_displayed();
            Delivery::Displayed
        }
        Ok(Ok(_)) => {
            debug!(%sequence, "empty translation; nothing displayed");
            Delivery::Skipped
        }
        Ok(Err(err)) => {
            warn!(%sequence, error = %err, "translation task failed");
            Delivery::Skipped
        }
        Err(_) => {
            debug!(%sequence, ?timeout, "translation timed out; skipping");
            Delivery::TimedOut
        }
    }
}

#[cfg(test)]
mod tests;
