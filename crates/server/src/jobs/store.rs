// Job store.
//
// The in-memory store keeps insertion order next to the map so listing is
// stable. Finished jobs are evicted once older than the TTL, and the oldest
// finished jobs go first when the store is over capacity. Queued and running
// jobs are never evicted, so capacity is a soft bound while many jobs run.

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    pin::Pin,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{Job, SharedJob};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait JobStore: Send + Sync {
    /// Insert a job and return the shared handle its task will mutate.
    fn put<'a>(&'a self, job: Job) -> StoreFuture<'a, SharedJob>;

    fn get<'a>(&'a self, job_id: &'a str) -> StoreFuture<'a, Option<SharedJob>>;

    /// All jobs in creation order.
    fn list<'a>(&'a self) -> StoreFuture<'a, Vec<SharedJob>>;

    /// Drop finished jobs older than the retention period; returns how many.
    fn evict_expired<'a>(&'a self, now: DateTime<Utc>) -> StoreFuture<'a, usize>;
}

#[derive(Default)]
struct Entries {
    jobs: HashMap<String, SharedJob>,
    order: VecDeque<String>,
}

impl Entries {
    fn remove(&mut self, job_id: &str) {
        self.jobs.remove(job_id);
        self.order.retain(|id| id != job_id);
    }
}

pub struct InMemoryJobStore {
    entries: RwLock<Entries>,
    ttl: Duration,
    capacity: usize,
}

impl InMemoryJobStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { entries: RwLock::new(Entries::default()), ttl, capacity: capacity.max(1) }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.jobs.len()
    }

    async fn enforce_capacity(&self, entries: &mut Entries) {
        while entries.jobs.len() > self.capacity {
            let mut victim = None;
            for id in &entries.order {
                let finished = match entries.jobs.get(id) {
                    Some(job) => job.read().await.is_finished(),
                    None => true,
                };
                if finished {
                    victim = Some(id.clone());
                    break;
                }
            }

            match victim {
                Some(id) => {
                    debug!(job_id = %id, "evicting job over capacity");
                    entries.remove(&id);
                }
                None => {
                    warn!(
                        jobs = entries.jobs.len(),
                        capacity = self.capacity,
                        "job store over capacity with only active jobs"
                    );
                    break;
                }
            }
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(86_400), 1000)
    }
}

impl JobStore for InMemoryJobStore {
    fn put<'a>(&'a self, job: Job) -> StoreFuture<'a, SharedJob> {
        Box::pin(async move {
            let id = job.id.clone();
            let shared = Arc::new(RwLock::new(job));
            let mut entries = self.entries.write().await;
            if entries.jobs.insert(id.clone(), Arc::clone(&shared)).is_some() {
                entries.order.retain(|existing| existing != &id);
            }
            entries.order.push_back(id);
            self.enforce_capacity(&mut entries).await;
            shared
        })
    }

    fn get<'a>(&'a self, job_id: &'a str) -> StoreFuture<'a, Option<SharedJob>> {
        Box::pin(async move { self.entries.read().await.jobs.get(job_id).cloned() })
    }

    fn list<'a>(&'a self) -> StoreFuture<'a, Vec<SharedJob>> {
        Box::pin(async move {
            let entries = self.entries.read().await;
            entries.order.iter().filter_map(|id| entries.jobs.get(id).cloned()).collect()
        })
    }

    fn evict_expired<'a>(&'a self, now: DateTime<Utc>) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let ttl = chrono::Duration::from_std(self.ttl)
                .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
            let mut entries = self.entries.write().await;

            let mut expired = Vec::new();
            for (id, job) in &entries.jobs {
                let finished_at = job.read().await.finished_at;
                if finished_at.is_some_and(|at| now.signed_duration_since(at) >= ttl) {
                    expired.push(id.clone());
                }
            }

            for id in &expired {
                entries.remove(id);
            }
            if !expired.is_empty() {
                debug!(evicted = expired.len(), "evicted expired jobs");
            }
            expired.len()
        })
    }
}
