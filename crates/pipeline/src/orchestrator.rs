//! Segment loop orchestration
//!
//! One run is a strict sequence per segment: keyframe, motion prediction,
//! synthesis, frame extraction. The loop is sequential by construction
//! (every segment's keyframe depends on the previous clip), so the only
//! concurrency here is the race between the work, the job's cancellation
//! token, and the run deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use reelsmith_common::config::PipelineConfig;
use reelsmith_common::errors::{AppError, Result};
use reelsmith_common::metrics;
use reelsmith_common::models::{SegmentLength, VideoJob, VideoSegment};
use reelsmith_common::store::JobStore;
use reelsmith_common::vendors::{ChatModel, ImageGenerator, MotionPlan, VideoSynthesizer};

use crate::frames::FrameExtractor;

/// One video generation request
#[derive(Clone, Debug)]
pub struct PipelineRequest {
    pub prompt: String,
    pub duration_secs: u32,
    pub style: String,
    pub segment_length: SegmentLength,
}

/// Outcome of a run; completed segments survive a failure
#[derive(Clone, Debug)]
pub struct PipelineResult {
    pub success: bool,
    pub job_id: String,
    pub segments: Vec<VideoSegment>,
    pub total_duration_secs: u32,
    pub cost_usd: f64,
    pub error: Option<String>,
}

pub struct Orchestrator {
    images: Arc<dyn ImageGenerator>,
    chat: Arc<dyn ChatModel>,
    video: Arc<dyn VideoSynthesizer>,
    frames: Arc<dyn FrameExtractor>,
    jobs: JobStore,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        images: Arc<dyn ImageGenerator>,
        chat: Arc<dyn ChatModel>,
        video: Arc<dyn VideoSynthesizer>,
        frames: Arc<dyn FrameExtractor>,
        jobs: JobStore,
        config: PipelineConfig,
    ) -> Self {
        Self {
            images,
            chat,
            video,
            frames,
            jobs,
            config,
        }
    }

    /// Number of segments needed to cover `duration_secs`
    pub fn segments_for(duration_secs: u32, length: SegmentLength) -> u32 {
        duration_secs.div_ceil(length.as_secs())
    }

    /// Static cost estimate for a run of `count` segments
    pub fn estimate_cost(&self, count: u32) -> f64 {
        self.config.segment_cost_usd * count as f64
    }

    /// Run the full pipeline. The returned result mirrors the final job
    /// record; poll the job store for progress while this is in flight.
    pub async fn run(&self, request: PipelineRequest) -> PipelineResult {
        let segments_total = Self::segments_for(request.duration_secs, request.segment_length);
        let cost = self.estimate_cost(segments_total);

        let job = VideoJob::new(segments_total, cost);
        let job_id = job.id.clone();
        let token = self.jobs.create(job).await;
        self.jobs.start(&job_id).await;

        tracing::info!(
            job_id = %job_id,
            duration_secs = request.duration_secs,
            segment_length = request.segment_length.as_str(),
            segments_total,
            "Pipeline run started"
        );

        let deadline = Duration::from_secs(self.config.deadline_secs);
        let outcome = tokio::select! {
            biased;
            run = tokio::time::timeout(
                deadline,
                self.run_segments(&job_id, &request, segments_total, &token),
            ) => {
                match run {
                    Ok(result) => result,
                    Err(_) => Err(AppError::Internal {
                        message: format!(
                            "Pipeline deadline of {}s exceeded",
                            self.config.deadline_secs
                        ),
                    }),
                }
            }
            _ = token.cancelled() => Err(AppError::Canceled),
        };

        match &outcome {
            Ok(()) => {
                self.jobs.complete(&job_id).await;
                metrics::record_pipeline_run("completed");
            }
            Err(e) => {
                self.jobs.fail(&job_id, &e.to_string()).await;
                let label = if matches!(e, AppError::Canceled) {
                    "canceled"
                } else {
                    "failed"
                };
                metrics::record_pipeline_run(label);
                tracing::warn!(job_id = %job_id, error = %e, "Pipeline run failed");
            }
        }

        match self.jobs.get(&job_id).await {
            Some(job) => PipelineResult {
                success: job.status == reelsmith_common::models::JobStatus::Completed,
                job_id,
                segments: job.segments,
                total_duration_secs: job.total_duration_secs,
                cost_usd: job.cost_usd,
                error: job.error,
            },
            // Swept mid-run; only possible with a pathological TTL
            None => PipelineResult {
                success: false,
                job_id,
                segments: Vec::new(),
                total_duration_secs: 0,
                cost_usd: cost,
                error: Some("Job record expired during the run".to_string()),
            },
        }
    }

    async fn run_segments(
        &self,
        job_id: &str,
        request: &PipelineRequest,
        segments_total: u32,
        token: &CancellationToken,
    ) -> Result<()> {
        let seg_secs = request.segment_length.as_secs();
        let step = 100.0 / segments_total as f64;
        let mut keyframe = String::new();

        for index in 0..segments_total {
            if token.is_cancelled() {
                return Err(AppError::Canceled);
            }
            let base = step * index as f64;
            let label = |stage: &str| format!("segment {}/{}: {}", index + 1, segments_total, stage);
            let started = Instant::now();

            // First keyframe comes from the prompt; every later one is the
            // previous clip's extracted final frame.
            if index == 0 {
                self.jobs.progress(job_id, &label("generating keyframe"), base).await;
                let prompt = if request.style.is_empty() {
                    request.prompt.clone()
                } else {
                    format!("{}. Style: {}", request.prompt, request.style)
                };
                let image = self.images.generate(&prompt, "1792x1024").await?;
                keyframe = to_image_ref(image);
            }

            self.jobs
                .progress(job_id, &label("predicting motion"), base + step * 0.25)
                .await;
            let plan = self.chat.describe_motion(&keyframe, &request.style).await?;

            self.jobs
                .progress(job_id, &label("synthesizing video"), base + step * 0.5)
                .await;
            let video_url = self
                .video
                .synthesize(&keyframe, &compose_prompt(&plan), seg_secs, token)
                .await?;

            let segment = VideoSegment {
                index,
                start_offset_secs: index * seg_secs,
                duration_secs: seg_secs,
                keyframe: keyframe.clone(),
                motion: plan.motion,
                camera_moves: plan.camera_moves,
                video_url: video_url.clone(),
            };
            self.jobs.push_segment(job_id, segment).await;
            metrics::record_segment(started.elapsed().as_secs_f64());

            // The last segment feeds nothing, so skip the extraction
            if index + 1 < segments_total {
                self.jobs
                    .progress(job_id, &label("extracting final frame"), base + step * 0.85)
                    .await;
                keyframe = self
                    .frames
                    .extract_final_frame(&video_url, job_id, index)
                    .await?;
            }
        }

        Ok(())
    }
}

/// Synthesis prompt: motion description plus the chosen camera moves
fn compose_prompt(plan: &MotionPlan) -> String {
    if plan.camera_moves.is_empty() {
        plan.motion.clone()
    } else {
        let moves: Vec<&str> = plan.camera_moves.iter().map(|m| m.as_str()).collect();
        format!("{}. Camera: {}", plan.motion, moves.join(", "))
    }
}

/// Image generators return either raw base64 or a URL; normalize to a
/// reference the downstream vendors accept.
fn to_image_ref(image: String) -> String {
    if image.starts_with("http") || image.starts_with("data:") {
        image
    } else {
        format!("data:image/png;base64,{}", image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelsmith_common::models::{CameraMove, JobStatus};
    use reelsmith_common::vendors::{
        MockChatModel, MockImageGenerator, MockVideoSynthesizer,
    };
    use crate::frames::MockFrameExtractor;

    fn orchestrator(video: MockVideoSynthesizer, config: PipelineConfig) -> Orchestrator {
        Orchestrator::new(
            Arc::new(MockImageGenerator::default()),
            Arc::new(MockChatModel::default()),
            Arc::new(video),
            Arc::new(MockFrameExtractor::default()),
            JobStore::new(Duration::from_secs(3600)),
            config,
        )
    }

    fn request(duration_secs: u32, length: SegmentLength) -> PipelineRequest {
        PipelineRequest {
            prompt: "a lighthouse in a storm".to_string(),
            duration_secs,
            style: "cinematic".to_string(),
            segment_length: length,
        }
    }

    #[test]
    fn test_segment_count_is_ceiling() {
        assert_eq!(Orchestrator::segments_for(30, SegmentLength::NineSeconds), 4);
        assert_eq!(Orchestrator::segments_for(30, SegmentLength::FiveSeconds), 6);
        assert_eq!(Orchestrator::segments_for(45, SegmentLength::NineSeconds), 5);
        assert_eq!(Orchestrator::segments_for(1, SegmentLength::FiveSeconds), 1);
    }

    #[tokio::test]
    async fn test_successful_run_covers_duration() {
        let orch = orchestrator(MockVideoSynthesizer::default(), PipelineConfig::default());
        let result = orch.run(request(30, SegmentLength::NineSeconds)).await;

        assert!(result.success);
        assert_eq!(result.segments.len(), 4);
        assert_eq!(result.total_duration_secs, 36);
        assert!(result.total_duration_secs >= 30);
        assert!((result.cost_usd - 1.60).abs() < 1e-9);
        assert!(result.error.is_none());

        // Offsets are contiguous 9s slots
        for (i, segment) in result.segments.iter().enumerate() {
            assert_eq!(segment.index as usize, i);
            assert_eq!(segment.start_offset_secs, i as u32 * 9);
            assert_eq!(segment.duration_secs, 9);
            assert_eq!(segment.camera_moves, vec![CameraMove::DollyIn]);
        }
    }

    #[tokio::test]
    async fn test_continuity_uses_extracted_frames() {
        let orch = orchestrator(MockVideoSynthesizer::default(), PipelineConfig::default());
        let result = orch.run(request(10, SegmentLength::FiveSeconds)).await;

        assert!(result.success);
        assert_eq!(result.segments.len(), 2);
        // First keyframe comes from the image generator
        assert!(result.segments[0].keyframe.starts_with("data:image/png;base64,"));
        // Second keyframe is the extracted final frame of segment 0
        assert_eq!(
            result.segments[1].keyframe,
            format!("data:image/jpeg;base64,bW9jay1mcmFtZS0{}", 0)
        );
    }

    #[tokio::test]
    async fn test_failure_preserves_completed_segments() {
        // Third synthesis call fails: segments 0 and 1 survive, no fourth
        // call is attempted.
        let video = Arc::new(MockVideoSynthesizer::failing_at(2));
        let orch = Orchestrator::new(
            Arc::new(MockImageGenerator::default()),
            Arc::new(MockChatModel::default()),
            video.clone(),
            Arc::new(MockFrameExtractor::default()),
            JobStore::new(Duration::from_secs(3600)),
            PipelineConfig::default(),
        );
        let result = orch.run(request(30, SegmentLength::NineSeconds)).await;

        assert!(!result.success);
        assert_eq!(result.segments.len(), 2);
        let error = result.error.unwrap();
        assert!(error.contains("mock synthesis failure"), "got: {}", error);

        let job = orch.jobs.get(&result.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        // 3 attempts total: 0 and 1 succeeded, 2 failed, 3 never tried
        assert_eq!(video.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_fails_job_not_orphaned() {
        // A synthesizer that trips the job's own cancellation token: the
        // loop aborts before the next segment and the job lands in Failed,
        // never stuck in Processing.
        struct SelfCancellingSynth;
        #[async_trait]
        impl VideoSynthesizer for SelfCancellingSynth {
            async fn synthesize(
                &self,
                _keyframe: &str,
                _prompt: &str,
                _duration_secs: u32,
                cancel: &CancellationToken,
            ) -> reelsmith_common::errors::Result<String> {
                cancel.cancel();
                Ok("https://cdn.example/clip.mp4".to_string())
            }
        }

        let orch = Orchestrator::new(
            Arc::new(MockImageGenerator::default()),
            Arc::new(MockChatModel::default()),
            Arc::new(SelfCancellingSynth),
            Arc::new(MockFrameExtractor::default()),
            JobStore::new(Duration::from_secs(3600)),
            PipelineConfig::default(),
        );
        let result = orch.run(request(10, SegmentLength::FiveSeconds)).await;

        assert!(!result.success);
        let job = orch.jobs.get(&result.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.is_some());
    }

    #[tokio::test]
    async fn test_deadline_fails_job() {
        struct SlowSynth;
        #[async_trait]
        impl VideoSynthesizer for SlowSynth {
            async fn synthesize(
                &self,
                _keyframe: &str,
                _prompt: &str,
                _duration_secs: u32,
                _cancel: &CancellationToken,
            ) -> reelsmith_common::errors::Result<String> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok("https://cdn.example/slow.mp4".to_string())
            }
        }

        let config = PipelineConfig {
            deadline_secs: 0,
            ..PipelineConfig::default()
        };
        let orch = Orchestrator::new(
            Arc::new(MockImageGenerator::default()),
            Arc::new(MockChatModel::default()),
            Arc::new(SlowSynth),
            Arc::new(MockFrameExtractor::default()),
            JobStore::new(Duration::from_secs(3600)),
            config,
        );
        let result = orch.run(request(5, SegmentLength::FiveSeconds)).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("deadline"));
        let job = orch.jobs.get(&result.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_compose_prompt() {
        let with_moves = MotionPlan {
            motion: "waves build".to_string(),
            camera_moves: vec![CameraMove::PanLeft, CameraMove::ZoomIn],
        };
        assert_eq!(compose_prompt(&with_moves), "waves build. Camera: pan_left, zoom_in");

        let bare = MotionPlan {
            motion: "stillness".to_string(),
            camera_moves: vec![],
        };
        assert_eq!(compose_prompt(&bare), "stillness");
    }

    #[test]
    fn test_to_image_ref() {
        assert_eq!(to_image_ref("data:image/png;base64,AA".into()), "data:image/png;base64,AA");
        assert_eq!(to_image_ref("https://x/y.png".into()), "https://x/y.png");
        assert_eq!(to_image_ref("AAAA".into()), "data:image/png;base64,AAAA");
    }
}
