//! JSON snapshot job store
//!
//! The whole job map lives in memory and is rewritten to a single JSON file
//! on every upsert using write-to-temp-then-rename, so a crash mid-write
//! leaves the previous snapshot intact.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::store::JobStore;
use super::types::{Job, JobFilter, JobId};
use crate::error::PersistenceError;

pub struct JsonFileJobStore {
    path: PathBuf,
    jobs: Mutex<BTreeMap<JobId, Job>>,
}

impl JsonFileJobStore {
    /// Open the snapshot at `path`, starting empty if it does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let jobs = if fs::try_exists(&path).await? {
            let contents = fs::read_to_string(&path).await?;
            let list: Vec<Job> = if contents.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&contents)?
            };
            info!(path = %path.display(), jobs = list.len(), "Loaded job snapshot");
            list.into_iter().map(|job| (job.id, job)).collect()
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            jobs: Mutex::new(jobs),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_snapshot(&self, jobs: &BTreeMap<JobId, Job>) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let list: Vec<&Job> = jobs.values().collect();
        let json = serde_json::to_vec_pretty(&list)?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        debug!(path = %self.path.display(), jobs = list.len(), "Job snapshot written");
        Ok(())
    }
}

#[async_trait]
impl JobStore for JsonFileJobStore {
    async fn upsert(&self, job: &Job) -> Result<(), PersistenceError> {
        // Held across the write so snapshots land in upsert order
        let mut jobs = self.jobs.lock().await;
        let previous = jobs.insert(job.id, job.clone());
        if let Err(e) = self.write_snapshot(&jobs).await {
            // Keep memory and disk in agreement
            match previous {
                Some(old) => jobs.insert(job.id, old),
                None => jobs.remove(&job.id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, PersistenceError> {
        Ok(self.jobs.lock().await.get(id).cloned())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, PersistenceError> {
        let jobs: Vec<Job> = self.jobs.lock().await.values().cloned().collect();
        Ok(filter.apply(jobs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("jobs.json");

        let mut job = Job::new("https://example.com/", vec!["technical-seo".into()]);
        {
            let store = JsonFileJobStore::open(&path).await.unwrap();
            store.upsert(&job).await.unwrap();
            job.status = JobStatus::Failed;
            job.error = Some("crawl failed: boom".into());
            store.upsert(&job).await.unwrap();
        }

        let reopened = JsonFileJobStore::open(&path).await.unwrap();
        let stored = reopened.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("crawl failed: boom"));
        assert_eq!(stored.prompt_ids, vec!["technical-seo".to_string()]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileJobStore::open(&path).await,
            Err(PersistenceError::Serialization(_))
        ));
    }
}
