//! Job store backends behave the same through the `JobStore` trait

use seo_audit::jobs::{Job, JobFilter, JobStatus, JobStore, JsonFileJobStore, MemoryJobStore};
use std::sync::Arc;
use tempfile::TempDir;

async fn exercise_listing(store: Arc<dyn JobStore>) {
    let mut jobs = Vec::new();
    for i in 0..6 {
        let mut job = Job::new(format!("https://site{i}.example/"), Vec::new());
        job.created_at -= chrono::Duration::seconds(60 - i);
        if i % 2 == 0 {
            job.status = JobStatus::Failed;
            job.error = Some(format!("crawl failed: site{i}"));
        }
        store.upsert(&job).await.unwrap();
        jobs.push(job);
    }

    let all = store.list(&JobFilter::default()).await.unwrap();
    assert_eq!(all.len(), 6);
    assert_eq!(all[0].id, jobs[5].id, "newest first");

    let failed = store
        .list(&JobFilter {
            status: Some(JobStatus::Failed),
            limit: Some(2),
        })
        .await
        .unwrap();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|j| j.status == JobStatus::Failed));
    assert_eq!(failed[0].id, jobs[4].id);
}

#[tokio::test]
async fn memory_store_lists_by_status() {
    exercise_listing(Arc::new(MemoryJobStore::new())).await;
}

#[tokio::test]
async fn file_store_lists_by_status() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileJobStore::open(dir.path().join("jobs.json")).await.unwrap();
    exercise_listing(Arc::new(store)).await;
}

#[tokio::test]
async fn concurrent_upserts_all_reach_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs.json");
    let store = Arc::new(JsonFileJobStore::open(&path).await.unwrap());

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let job = Job::new(format!("https://site{i}.example/"), Vec::new());
            store.upsert(&job).await.unwrap();
            job.id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    let reopened = JsonFileJobStore::open(&path).await.unwrap();
    for id in ids {
        assert!(reopened.get(&id).await.unwrap().is_some());
    }
}
