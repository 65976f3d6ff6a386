// Bounded worker pool that drives one upload task per file.
//
// Tasks are queued on a crossbeam channel up front; each worker thread
// claims the next task, runs it to a terminal outcome (retrying transient
// timeouts according to the retry policy) and sends the result back. The
// calling thread collects results until the batch finishes or the join
// timeout fires, at which point the join policy decides whether the
// workers are cancelled or left running.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError};
use serde::Deserialize;

use crate::error::ApiError;
use crate::paths::{join_remote, map_path, PathError, RemoteTarget};
use crate::policy::{content_type, should_upload, Decision};
use crate::remote::Remote;

/// One file to transfer. Tasks share nothing but the remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub local_path: PathBuf,
    pub remote_dir: String,
    pub leaf: String,
    pub overwrite: bool,
}

impl UploadTask {
    pub fn new(local_path: impl Into<PathBuf>, target: RemoteTarget, overwrite: bool) -> Self {
        Self {
            local_path: local_path.into(),
            remote_dir: target.dir,
            leaf: target.leaf,
            overwrite,
        }
    }

    pub fn remote_path(&self) -> String {
        join_remote(&self.remote_dir, &self.leaf)
    }
}

/// Builds one task per file, mirroring `root` under `base`.
pub fn plan(
    root: &Path,
    base: &str,
    files: &[PathBuf],
    overwrite: bool,
) -> Result<Vec<UploadTask>, PathError> {
    files
        .iter()
        .map(|file| Ok(UploadTask::new(file, map_path(root, base, file)?, overwrite)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Remote file already has this many bytes.
    Identical { size: u64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Identical { size } => write!(f, "remote file has same size ({size} bytes)"),
        }
    }
}

#[derive(Debug)]
pub enum UploadOutcome {
    Uploaded,
    Skipped(SkipReason),
    Failed(ApiError),
}

impl UploadOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, UploadOutcome::Failed(_))
    }
}

/// Terminal state of one task.
#[derive(Debug)]
pub struct TaskResult {
    pub task: UploadTask,
    pub outcome: UploadOutcome,
    /// Number of times the task was tried, including the successful one.
    pub attempts: u32,
}

/// Upper bound for a single exponential backoff delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Delay inserted between retries of the same task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    #[default]
    None,
    Fixed(Duration),
    /// `base * 2^(n-1)` before the n-th retry, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Backoff of the given shape starting at `base`. A zero base means no
    /// delay at all.
    pub fn from_kind(kind: BackoffKind, base: Duration) -> Self {
        if base.is_zero() {
            return Backoff::None;
        }
        match kind {
            BackoffKind::Fixed => Backoff::Fixed(base),
            BackoffKind::Exponential => Backoff::Exponential {
                base,
                max: MAX_RETRY_DELAY.max(base),
            },
        }
    }

    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let shift = retry.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

/// Shape of the retry delay, as picked on the command line or in the
/// config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same pause before every retry.
    #[default]
    Fixed,
    /// Pause doubles with each retry of the same file.
    Exponential,
}

/// How often a task that hit a transient timeout is tried again.
///
/// The default retries forever with no delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// `None` means no limit.
    pub max_retries: Option<u32>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            backoff: Backoff::None,
        }
    }

    /// Delay before retry number `retry` (1-based), or `None` once the
    /// budget is spent.
    pub fn next_delay(&self, retry: u32) -> Option<Duration> {
        match self.max_retries {
            Some(max) if retry > max => None,
            _ => Some(self.backoff.delay(retry)),
        }
    }
}

/// What happens to running workers when the join timeout fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutAction {
    /// Return right away; workers keep draining the queue in the
    /// background and their results are not observed.
    #[default]
    Detach,
    /// Stop claiming new tasks and retrying, wait for in-flight requests to
    /// finish, then return.
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinPolicy {
    /// `None` waits for every task.
    pub timeout: Option<Duration>,
    pub on_timeout: TimeoutAction,
}

/// Structured result of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Resolved tasks, in submission order.
    pub results: Vec<TaskResult>,
    /// Tasks without an observed outcome when the batch returned.
    pub pending: Vec<UploadTask>,
    /// Transient failures that were retried, across all tasks.
    pub retries: u64,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Uploaded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(UploadOutcome::is_failed)
    }

    pub fn failed_paths(&self) -> Vec<PathBuf> {
        self.results
            .iter()
            .filter(|r| r.outcome.is_failed())
            .map(|r| r.task.local_path.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.is_complete() && self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&UploadOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Runs batches of upload tasks on a fixed-size pool of threads.
pub struct Scheduler<R: ?Sized> {
    remote: Arc<R>,
    concurrency: usize,
    retry: RetryPolicy,
    join: JoinPolicy,
}

impl<R: Remote + ?Sized + 'static> Scheduler<R> {
    /// Pool size defaults to the number of logical CPUs.
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            remote,
            concurrency: num_cpus::get().max(1),
            retry: RetryPolicy::default(),
            join: JoinPolicy::default(),
        }
    }

    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn join_policy(mut self, join: JoinPolicy) -> Self {
        self.join = join;
        self
    }

    pub fn run_batch(&self, tasks: Vec<UploadTask>) -> BatchReport {
        self.run_batch_with(tasks, |_| {})
    }

    /// Runs `tasks` and calls `observe` on the calling thread for each
    /// result as it arrives.
    pub fn run_batch_with<F>(&self, tasks: Vec<UploadTask>, mut observe: F) -> BatchReport
    where
        F: FnMut(&TaskResult),
    {
        let started = Instant::now();
        let total = tasks.len();
        if total == 0 {
            return BatchReport::default();
        }

        let (task_tx, task_rx) = unbounded::<(usize, UploadTask)>();
        for (index, task) in tasks.iter().cloned().enumerate() {
            let _ = task_tx.send((index, task));
        }
        drop(task_tx);

        let (result_tx, result_rx) = unbounded::<(usize, TaskResult)>();
        let cancel = Arc::new(AtomicBool::new(false));
        let retries = Arc::new(AtomicU64::new(0));

        let workers = self.concurrency.min(total);
        tracing::debug!(tasks = total, workers, "starting upload batch");
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let remote = Arc::clone(&self.remote);
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let cancel = Arc::clone(&cancel);
            let retries = Arc::clone(&retries);
            let retry = self.retry;
            let spawned = thread::Builder::new()
                .name(format!("upload-{id}"))
                .spawn(move || {
                    while !cancel.load(Ordering::SeqCst) {
                        let Ok((index, task)) = task_rx.recv() else {
                            break;
                        };
                        let result = execute(remote.as_ref(), task, &retry, &cancel, &retries);
                        // Nobody listens once a detached batch has returned.
                        let _ = result_tx.send((index, result));
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => tracing::error!(worker = id, error = %e, "failed to spawn upload worker"),
            }
        }
        drop(result_tx);

        let deadline = self.join.timeout.map(|t| started + t);
        let mut slots: Vec<Option<TaskResult>> = (0..total).map(|_| None).collect();
        let mut received = 0;
        let mut timed_out = false;
        while received < total {
            let next = match deadline {
                Some(deadline) => match result_rx.recv_deadline(deadline) {
                    Ok(next) => next,
                    Err(RecvTimeoutError::Timeout) => {
                        timed_out = true;
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match result_rx.recv() {
                    Ok(next) => next,
                    Err(_) => break,
                },
            };
            let (index, result) = next;
            observe(&result);
            slots[index] = Some(result);
            received += 1;
        }

        if timed_out && self.join.on_timeout == TimeoutAction::Detach {
            tracing::warn!(
                outstanding = total - received,
                "join timeout reached, leaving workers running"
            );
        } else {
            if timed_out {
                tracing::warn!(
                    outstanding = total - received,
                    "join timeout reached, cancelling remaining uploads"
                );
                cancel.store(true, Ordering::SeqCst);
            }
            for handle in handles {
                if handle.join().is_err() {
                    tracing::error!("upload worker panicked");
                }
            }
            for (index, result) in result_rx.try_iter() {
                observe(&result);
                slots[index] = Some(result);
            }
        }

        let mut results = Vec::with_capacity(total);
        let mut pending = Vec::new();
        for (slot, task) in slots.into_iter().zip(tasks) {
            match slot {
                Some(result) => results.push(result),
                None => pending.push(task),
            }
        }

        BatchReport {
            results,
            pending,
            retries: retries.load(Ordering::SeqCst),
            timed_out,
            elapsed: started.elapsed(),
        }
    }
}

fn execute<R: Remote + ?Sized>(
    remote: &R,
    task: UploadTask,
    retry: &RetryPolicy,
    cancel: &AtomicBool,
    retries: &AtomicU64,
) -> TaskResult {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let err = match attempt(remote, &task) {
            Ok(outcome) => {
                return TaskResult {
                    task,
                    outcome,
                    attempts,
                }
            }
            Err(err) => err,
        };

        if err.is_transient() && !cancel.load(Ordering::SeqCst) {
            if let Some(delay) = retry.next_delay(attempts) {
                retries.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(
                    path = %task.local_path.display(),
                    attempt = attempts,
                    error = %err,
                    "transient failure, retrying"
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                continue;
            }
        }

        let err = if err.is_transient() && cancel.load(Ordering::SeqCst) {
            ApiError::Cancelled
        } else {
            err
        };
        tracing::warn!(path = %task.local_path.display(), error = %err, "upload failed");
        return TaskResult {
            task,
            outcome: UploadOutcome::Failed(err),
            attempts,
        };
    }
}

fn attempt<R: Remote + ?Sized>(remote: &R, task: &UploadTask) -> Result<UploadOutcome, ApiError> {
    let remote_path = task.remote_path();
    match should_upload(remote, &task.local_path, &remote_path, task.overwrite)? {
        Decision::SkipIdentical { size } => Ok(UploadOutcome::Skipped(SkipReason::Identical { size })),
        Decision::Upload { replace } => {
            let bytes =
                std::fs::read(&task.local_path).map_err(|e| ApiError::io(&task.local_path, e))?;
            tracing::debug!(path = %remote_path, bytes = bytes.len(), replace, "uploading");
            remote.upload_bytes(&remote_path, bytes, content_type(&task.local_path), replace)?;
            Ok(UploadOutcome::Uploaded)
        }
    }
}
