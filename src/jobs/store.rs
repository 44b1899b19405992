//! The `JobStore` seam and its in-memory backend
//!
//! Stores see whole records only: every write is a full upsert, so a
//! backend needs no more than a key-value map.

use async_trait::async_trait;
use dashmap::DashMap;

use super::types::{Job, JobFilter, JobId};
use crate::error::PersistenceError;

/// Persistence for job records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace the record with `job.id`
    async fn upsert(&self, job: &Job) -> Result<(), PersistenceError>;

    /// `Ok(None)` when the id is unknown
    async fn get(&self, id: &JobId) -> Result<Option<Job>, PersistenceError>;

    /// Matching jobs, newest first
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, PersistenceError>;
}

/// Process-local store; contents are lost on exit
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: DashMap<JobId, Job>,
}

impl MemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn upsert(&self, job: &Job) -> Result<(), PersistenceError> {
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, PersistenceError> {
        Ok(self.jobs.get(id).map(|entry| entry.value().clone()))
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, PersistenceError> {
        // Collect before sorting so no shard lock is held across the sort
        let jobs: Vec<Job> = self.jobs.iter().map(|entry| entry.value().clone()).collect();
        Ok(filter.apply(jobs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;

    #[tokio::test]
    async fn upsert_replaces_the_whole_record() {
        let store = MemoryJobStore::new();
        let mut job = Job::new("https://example.com/", Vec::new());
        store.upsert(&job).await.unwrap();

        job.status = JobStatus::Crawling;
        job.progress = 20;
        store.upsert(&job).await.unwrap();

        let stored = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Crawling);
        assert_eq!(stored.progress, 20);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_none() {
        let store = MemoryJobStore::new();
        assert!(store.get(&JobId::new()).await.unwrap().is_none());
        assert!(store.list(&JobFilter::default()).await.unwrap().is_empty());
    }
}
