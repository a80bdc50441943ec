//! In-process job queue for tests and single-process development setups.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;

use prodkit_core::error::AppError;
use prodkit_core::result::AppResult;

use super::{JobOutcome, JobSource, JobTransport, QueuedJob, ResultRetention, StoredJob};
use crate::request::{JobHandle, JobRequest};

/// Job queue held in memory.
///
/// Behaves like [`super::redis::RedisQueue`]: ids are deduplicated against
/// queued jobs and retained results, jobs are ordered by due time and then
/// by arrival. Every accepted request is also recorded and can be inspected
/// with [`MemoryQueue::dispatched`].
#[derive(Debug, Default)]
pub struct MemoryQueue {
    state: Mutex<MemoryState>,
    fail_after: Mutex<Option<usize>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    seq: u64,
    jobs: HashMap<String, StoredJob>,
    queues: HashMap<String, BTreeMap<(i64, u64), String>>,
    tries: HashMap<String, u32>,
    results: HashMap<String, (JobOutcome, Option<Instant>)>,
    dispatched: Vec<JobRequest>,
}

impl MemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every enqueue fail once `accepted` more requests have been
    /// accepted. Used to exercise partial dispatch.
    pub fn fail_after(&self, accepted: usize) {
        *lock(&self.fail_after) = Some(accepted);
    }

    /// Every request accepted so far, in acceptance order.
    pub fn dispatched(&self) -> Vec<JobRequest> {
        lock(&self.state).dispatched.clone()
    }

    /// Number of jobs waiting on `queue_name`.
    pub fn queued(&self, queue_name: &str) -> usize {
        lock(&self.state)
            .queues
            .get(queue_name)
            .map_or(0, BTreeMap::len)
    }
}

impl MemoryState {
    fn purge_expired_results(&mut self) {
        let now = Instant::now();
        self.results
            .retain(|_, (_, expires)| expires.is_none_or(|at| at > now));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl JobTransport for MemoryQueue {
    async fn enqueue(&self, request: &JobRequest) -> AppResult<Option<JobHandle>> {
        {
            let mut fail_after = lock(&self.fail_after);
            match fail_after.as_mut() {
                Some(0) => {
                    return Err(AppError::queue(format!(
                        "Queue unavailable, job '{}' rejected",
                        request.job_id
                    )));
                }
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }

        let mut state = lock(&self.state);
        let now = Utc::now();

        state.purge_expired_results();
        if state.jobs.contains_key(&request.job_id) || state.results.contains_key(&request.job_id) {
            return Ok(None);
        }

        let score = now.timestamp_millis();
        state.seq += 1;
        let seq = state.seq;
        state
            .jobs
            .insert(request.job_id.clone(), StoredJob::from_request(request, score));
        state
            .queues
            .entry(request.queue_name.clone())
            .or_default()
            .insert((score, seq), request.job_id.clone());
        state.dispatched.push(request.clone());

        Ok(Some(JobHandle {
            job_id: request.job_id.clone(),
            queue_name: request.queue_name.clone(),
            enqueue_time: now,
        }))
    }
}

#[async_trait]
impl JobSource for MemoryQueue {
    async fn dequeue(&self, queue_name: &str) -> AppResult<Option<QueuedJob>> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let now_ms = Utc::now().timestamp_millis();

        let Some(queue) = state.queues.get_mut(queue_name) else {
            return Ok(None);
        };
        // Entries whose job already finished are skipped.
        let (score, job_id) = loop {
            let Some(entry) = queue.first_entry() else {
                return Ok(None);
            };
            let (score, _) = *entry.key();
            if score > now_ms {
                return Ok(None);
            }
            let job_id = entry.remove();
            if state.jobs.contains_key(&job_id) {
                break (score, job_id);
            }
        };

        let Some(stored) = state.jobs.get(&job_id).cloned() else {
            return Ok(None);
        };
        let tries = state.tries.entry(job_id.clone()).or_insert(0);
        *tries += 1;
        let job_try = *tries;

        Ok(Some(stored.into_queued(job_id, score, job_try)))
    }

    async fn finish(
        &self,
        job: &QueuedJob,
        outcome: &JobOutcome,
        retention: ResultRetention,
    ) -> AppResult<()> {
        let mut state = lock(&self.state);
        state.jobs.remove(&job.job_id);
        state.tries.remove(&job.job_id);
        state.purge_expired_results();

        let expires = match retention {
            ResultRetention::Discard => return Ok(()),
            ResultRetention::For(keep) => Some(Instant::now() + keep),
            ResultRetention::Forever => None,
        };
        state
            .results
            .insert(job.job_id.clone(), (outcome.clone(), expires));
        Ok(())
    }

    async fn retry(&self, job: &QueuedJob, delay: Duration) -> AppResult<()> {
        let mut state = lock(&self.state);
        let due = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        state.seq += 1;
        let seq = state.seq;
        state
            .queues
            .entry(job.queue_name.clone())
            .or_default()
            .insert((due, seq), job.job_id.clone());
        Ok(())
    }

    async fn result(&self, job_id: &str) -> AppResult<Option<JobOutcome>> {
        let state = lock(&self.state);
        Ok(state
            .results
            .get(job_id)
            .filter(|(_, expires)| expires.is_none_or(|at| at > Instant::now()))
            .map(|(outcome, _)| outcome.clone()))
    }
}
