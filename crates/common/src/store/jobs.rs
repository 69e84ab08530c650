//! Video job store
//!
//! Shared map from job id to job record, plus a cancellation token per
//! live job so a caller-initiated abort (or the pipeline deadline) can stop
//! in-flight work instead of orphaning the record in `processing`. Status
//! transitions are guarded here: writes that would leave a terminal state
//! are dropped.

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::MemoryStore;
use crate::metrics;
use crate::models::{JobStatus, VideoJob, VideoSegment};

#[derive(Clone)]
pub struct JobStore {
    jobs: MemoryStore<VideoJob>,
    tokens: MemoryStore<CancellationToken>,
    ttl: ChronoDuration,
}

impl JobStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            jobs: MemoryStore::new(),
            tokens: MemoryStore::new(),
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::hours(1)),
        }
    }

    /// Register a freshly allocated queued job and its cancellation token
    pub async fn create(&self, job: VideoJob) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens.insert(job.id.clone(), token.clone()).await;
        tracing::info!(job_id = %job.id, segments_total = job.segments_total, "Job created");
        self.jobs.insert(job.id.clone(), job).await;
        metrics::set_jobs_live(self.jobs.len().await);
        token
    }

    pub async fn get(&self, id: &str) -> Option<VideoJob> {
        self.jobs.get(id).await
    }

    /// Move a queued job to processing
    pub async fn start(&self, id: &str) {
        self.mutate(id, |job| {
            if job.status == JobStatus::Queued {
                job.status = JobStatus::Processing;
                job.started_at = Some(Utc::now());
                job.stage = "starting".to_string();
            }
        })
        .await;
    }

    /// Update the stage label and progress of a running job
    pub async fn progress(&self, id: &str, stage: &str, percent: f64) {
        self.mutate(id, |job| {
            job.stage = stage.to_string();
            job.progress_percent = percent.clamp(0.0, 100.0);
        })
        .await;
    }

    /// Append a finished segment; segments are immutable once appended
    pub async fn push_segment(&self, id: &str, segment: VideoSegment) {
        self.mutate(id, |job| {
            job.total_duration_secs += segment.duration_secs;
            job.segments.push(segment);
        })
        .await;
    }

    pub async fn complete(&self, id: &str) {
        self.mutate(id, |job| {
            job.status = JobStatus::Completed;
            job.stage = "done".to_string();
            job.progress_percent = 100.0;
            job.completed_at = Some(Utc::now());
        })
        .await;
        self.tokens.remove(id).await;
    }

    pub async fn fail(&self, id: &str, error: &str) {
        self.mutate(id, |job| {
            job.status = JobStatus::Failed;
            job.stage = "failed".to_string();
            job.error = Some(error.to_string());
            job.completed_at = Some(Utc::now());
        })
        .await;
        self.tokens.remove(id).await;
    }

    /// Trip the cancellation token for a live job. Returns the job's
    /// current status, or None if the id is unknown.
    pub async fn cancel(&self, id: &str) -> Option<JobStatus> {
        let job = self.jobs.get(id).await?;
        if !job.status.is_terminal() {
            if let Some(token) = self.tokens.get(id).await {
                token.cancel();
                tracing::info!(job_id = %id, "Job cancellation requested");
            }
        }
        Some(job.status)
    }

    /// Guarded read-modify-write: terminal jobs are never mutated
    async fn mutate(&self, id: &str, f: impl FnOnce(&mut VideoJob)) {
        let applied = self
            .jobs
            .with_existing(id, |job| {
                if job.status.is_terminal() {
                    false
                } else {
                    f(job);
                    true
                }
            })
            .await;
        match applied {
            Some(true) => {}
            Some(false) => {
                tracing::debug!(job_id = %id, "Write to terminal job ignored");
            }
            None => {
                tracing::debug!(job_id = %id, "Write to unknown job ignored");
            }
        }
    }

    /// Drop jobs older than the TTL. Returns the number of survivors.
    pub async fn sweep(&self) -> usize {
        let ttl = self.ttl;
        let mut removed = Vec::new();
        let live = self
            .jobs
            .retain(|id, job| {
                let keep = job.age() < ttl;
                if !keep {
                    removed.push(id.to_string());
                }
                keep
            })
            .await;
        for id in &removed {
            self.tokens.remove(id).await;
        }
        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), live, "Swept stale jobs");
        }
        metrics::set_jobs_live(live);
        live
    }

    /// Spawn the background sweeper; stops when `shutdown` is cancelled
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: CancellationToken) {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.sweep().await;
                    }
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Job sweeper stopped");
                        break;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(segments_total: u32) -> VideoJob {
        VideoJob::new(segments_total, 0.40 * segments_total as f64)
    }

    fn segment(index: u32) -> VideoSegment {
        VideoSegment {
            index,
            start_offset_secs: index * 5,
            duration_secs: 5,
            keyframe: "data:image/png;base64,AAAA".into(),
            motion: "slow push through fog".into(),
            camera_moves: vec![],
            video_url: format!("https://cdn.example/clip{index}.mp4"),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let store = JobStore::new(Duration::from_secs(3600));
        let j = job(2);
        let id = j.id.clone();
        store.create(j).await;

        assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Queued);
        store.start(&id).await;
        assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Processing);
        store.push_segment(&id, segment(0)).await;
        store.complete(&id).await;

        let done = store.get(&id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.total_duration_secs, 5);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_no_transition_out_of_terminal() {
        let store = JobStore::new(Duration::from_secs(3600));
        let j = job(1);
        let id = j.id.clone();
        store.create(j).await;
        store.start(&id).await;
        store.fail(&id, "luma error").await;

        // Subsequent writes must not resurrect the job
        store.start(&id).await;
        store.progress(&id, "synthesizing", 50.0).await;
        store.complete(&id).await;

        let j = store.get(&id).await.unwrap();
        assert_eq!(j.status, JobStatus::Failed);
        assert_eq!(j.error.as_deref(), Some("luma error"));
        assert_eq!(j.stage, "failed");
    }

    #[tokio::test]
    async fn test_cancel_trips_token() {
        let store = JobStore::new(Duration::from_secs(3600));
        let j = job(4);
        let id = j.id.clone();
        let token = store.create(j).await;
        store.start(&id).await;

        assert!(!token.is_cancelled());
        let status = store.cancel(&id).await;
        assert_eq!(status, Some(JobStatus::Processing));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let store = JobStore::new(Duration::from_secs(3600));
        assert!(store.cancel("vj_nope").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_expired() {
        let store = JobStore::new(Duration::from_millis(0));
        let j = job(1);
        let id = j.id.clone();
        store.create(j).await;

        // TTL of zero means everything is immediately stale
        let live = store.sweep().await;
        assert_eq!(live, 0);
        assert!(store.get(&id).await.is_none());
    }
}
