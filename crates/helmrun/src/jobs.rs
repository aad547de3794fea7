//! # Async Job Subsystem
//!
//! Tracks slow management operations so callers can answer immediately with
//! a job id and poll for the outcome later.
//!
//! ## Invariants
//! - A job record is mutated only by its executing worker after submission.
//! - Terminal states (`Completed`, `Error`) are frozen; the history only
//!   ever appends.
//! - `get` on an unknown id is `None`, never an error.
//! - Records are retained for the process lifetime unless the host calls
//!   `evict_terminal_before`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Waiting,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// One entry of a job's ordered status history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: JobStatus,
    /// Millis since the Unix epoch.
    pub change_time: i64,
    pub message: Option<String>,
}

/// The live record behind a job id.
#[derive(Debug)]
struct Job {
    op_type: String,
    status: JobStatus,
    submit_time: i64,
    end_time: Option<i64>,
    error: Option<String>,
    history: Vec<StatusChange>,
}

impl Job {
    fn transition(&mut self, status: JobStatus, message: Option<String>) {
        let now = now_millis();
        self.status = status;
        if status.is_terminal() {
            self.end_time = Some(now);
        }
        if status == JobStatus::Error {
            self.error = message.clone();
        }
        self.history.push(StatusChange { status, change_time: now, message });
    }
}

/// A point-in-time copy of a job record, safe to hand to callers.
#[derive(Debug, Clone)]
pub struct JobView {
    pub id: JobId,
    pub op_type: String,
    pub status: JobStatus,
    pub submit_time: i64,
    pub end_time: Option<i64>,
    pub error: Option<String>,
    pub history: Vec<StatusChange>,
}

/// Resolves once the worker has finished updating the record.
pub struct JobHandle {
    joined: tokio::task::JoinHandle<()>,
}

impl JobHandle {
    /// Waits for the worker. The record is terminal once this returns.
    pub async fn wait(self) {
        let _ = self.joined.await;
    }
}

/// The concurrent table of all jobs submitted in this process.
#[derive(Default)]
pub struct JobTracker {
    jobs: Arc<DashMap<JobId, Arc<Mutex<Job>>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self { jobs: Arc::new(DashMap::new()) }
    }

    /// Submits `work` to the blocking worker pool and returns immediately.
    ///
    /// The record starts `Waiting` with its first history entry already
    /// written, so a poll racing the worker sees a consistent job.
    pub fn submit<F>(&self, op_type: impl Into<String>, work: F) -> (JobId, JobHandle)
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        let op_type = op_type.into();
        let id = JobId::new();
        let record = Arc::new(Mutex::new(new_record(&op_type, JobStatus::Waiting)));
        self.jobs.insert(id, record.clone());

        tracing::debug!(job = %id, op = %op_type, "job submitted");

        let joined = tokio::task::spawn_blocking(move || {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(work));
            let result = match outcome {
                Ok(r) => r,
                Err(_) => Err("worker panicked".to_string()),
            };

            // The worker is the only writer after submission.
            if let Ok(mut job) = record.lock() {
                match result {
                    Ok(()) => {
                        job.transition(JobStatus::Completed, None);
                        tracing::debug!(job = %id, "job completed");
                    }
                    Err(msg) => {
                        tracing::warn!(job = %id, error = %msg, "job failed");
                        job.transition(JobStatus::Error, Some(msg));
                    }
                }
            }
        });

        (id, JobHandle { joined })
    }

    /// Records a job born terminal, with no observable `Waiting` period.
    pub fn submit_completed(&self, op_type: impl Into<String>) -> JobId {
        let op_type = op_type.into();
        let id = JobId::new();
        let record = new_record(&op_type, JobStatus::Completed);
        self.jobs.insert(id, Arc::new(Mutex::new(record)));
        tracing::debug!(job = %id, op = %op_type, "job recorded as completed");
        id
    }

    /// A snapshot of one job. Unknown ids yield `None`.
    pub fn get(&self, id: JobId) -> Option<JobView> {
        let record = self.jobs.get(&id)?;
        let job = record.lock().ok()?;
        Some(JobView {
            id,
            op_type: job.op_type.clone(),
            status: job.status,
            submit_time: job.submit_time,
            end_time: job.end_time,
            error: job.error.clone(),
            history: job.history.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drops terminal jobs that ended before `cutoff` (millis since epoch).
    /// Returns how many were evicted. Nothing calls this unless the host
    /// opts in; retention is otherwise process-lifetime.
    pub fn evict_terminal_before(&self, cutoff: i64) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, record| match record.lock() {
            Ok(job) => match (job.status.is_terminal(), job.end_time) {
                (true, Some(end)) => end >= cutoff,
                _ => true,
            },
            Err(_) => true,
        });
        before - self.jobs.len()
    }
}

fn new_record(op_type: &str, status: JobStatus) -> Job {
    let now = now_millis();
    let terminal = status.is_terminal();
    Job {
        op_type: op_type.to_string(),
        status,
        submit_time: now,
        end_time: if terminal { Some(now) } else { None },
        error: None,
        history: vec![StatusChange { status, change_time: now, message: None }],
    }
}

/// Millis since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
