//! Background Jobs (submit-and-poll)
//!
//! `submit(work) -> id` returns immediately; the work runs on a worker task
//! and `status(id)` reports where it is. State only moves forward:
//! Pending → Running → Succeeded | Failed. Terminal jobs are frozen, so any
//! number of pollers see the same payload.

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{AnalysisResult, AppError, AppResult, ErrorCode};
use crate::utils::constants::JOB_RESULT_TTL;

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// State names the polling front end understands
    pub fn wire_state(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "STARTED",
            JobState::Succeeded => "SUCCESS",
            JobState::Failed => "FAILURE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub submitted_at: Instant,
    pub finished_at: Option<Instant>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: JobState::Pending,
            result: None,
            error: None,
            submitted_at: Instant::now(),
            finished_at: None,
        }
    }

    /// Move to `next`; refuses regressions and anything after a terminal state
    pub fn advance(&mut self, next: JobState) -> bool {
        if self.state.is_terminal() || next <= self.state {
            return false;
        }
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Instant::now());
        }
        true
    }

    pub fn succeed(&mut self, result: AnalysisResult) -> bool {
        if !self.advance(JobState::Succeeded) {
            return false;
        }
        self.result = Some(result);
        true
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.advance(JobState::Failed) {
            return false;
        }
        self.error = Some(error.into());
        true
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.finished_at.map(|t| t.elapsed() > ttl).unwrap_or(false)
    }
}

/// Unit of background work
pub type JobWork = BoxFuture<'static, AppResult<AnalysisResult>>;

/// Abstract work queue
pub trait JobQueue: Send + Sync {
    fn submit(&self, work: JobWork) -> AppResult<String>;

    /// Snapshot of the job, None for unknown ids
    fn status(&self, id: &str) -> Option<Job>;
}

/// Process-local queue: DashMap of jobs, semaphore-bounded workers
#[derive(Clone)]
pub struct InMemoryJobQueue {
    jobs: Arc<DashMap<String, Job>>,
    workers: Arc<Semaphore>,
    max_tracked: usize,
    ttl: Duration,
}

impl InMemoryJobQueue {
    pub fn new(max_running: usize, max_tracked: usize) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            workers: Arc::new(Semaphore::new(max_running.max(1))),
            max_tracked: max_tracked.max(1),
            ttl: JOB_RESULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Forget finished jobs older than the TTL
    pub fn cleanup_expired(&self) -> usize {
        let before = self.jobs.len();
        let ttl = self.ttl;
        self.jobs.retain(|_, job| !job.expired(ttl));
        let removed = before.saturating_sub(self.jobs.len());
        if removed > 0 {
            info!("🧹 Job cleanup: {} expired jobs removed", removed);
        }
        removed
    }

    fn transition(jobs: &DashMap<String, Job>, id: &str, apply: impl FnOnce(&mut Job) -> bool) {
        if let Some(mut job) = jobs.get_mut(id) {
            if !apply(job.value_mut()) {
                warn!("Job {} refused transition from {:?}", id, job.state);
            }
        }
    }
}

impl JobQueue for InMemoryJobQueue {
    fn submit(&self, work: JobWork) -> AppResult<String> {
        if self.jobs.len() >= self.max_tracked {
            self.cleanup_expired();
            if self.jobs.len() >= self.max_tracked {
                return Err(AppError::new(
                    ErrorCode::JobQueueFull,
                    format!("Job queue is full ({} jobs tracked)", self.max_tracked),
                ));
            }
        }

        let id = Uuid::new_v4().to_string();
        self.jobs.insert(id.clone(), Job::new(&id));

        let jobs = Arc::clone(&self.jobs);
        let workers = Arc::clone(&self.workers);
        let job_id = id.clone();

        tokio::spawn(async move {
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    Self::transition(&jobs, &job_id, |job| job.fail("Worker pool is shut down"));
                    return;
                }
            };

            Self::transition(&jobs, &job_id, |job| job.advance(JobState::Running));
            info!("⚙️ Job {} started", job_id);

            // Nested task so a panicking analysis still lands in Failed
            let outcome = match tokio::spawn(work).await {
                Ok(outcome) => outcome,
                Err(e) => Err(AppError::internal(format!("Analysis worker crashed: {}", e))),
            };

            match outcome {
                Ok(result) => {
                    info!("✅ Job {} succeeded: {}", job_id, result.summary_line());
                    Self::transition(&jobs, &job_id, |job| job.succeed(result));
                }
                Err(e) => {
                    warn!(code = e.code_str(), "❌ Job {} failed: {}", job_id, e);
                    let message = e.to_string();
                    Self::transition(&jobs, &job_id, |job| job.fail(message));
                }
            }
        });

        Ok(id)
    }

    fn status(&self, id: &str) -> Option<Job> {
        self.jobs.get(id).map(|job| job.clone())
    }
}
