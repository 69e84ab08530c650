//! Final-frame extraction
//!
//! The synthesis vendor's clips rarely land exactly on the requested
//! duration, so the continuity keyframe for the next segment is taken from
//! the downloaded clip itself: ffmpeg seeks near the end of the file and
//! emits the last decodable frame.

use async_trait::async_trait;
use base64::Engine;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use reelsmith_common::errors::{AppError, Result};

/// Trait for extracting the final frame of a rendered clip
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Returns the frame as a `data:image/jpeg;base64,...` URL
    async fn extract_final_frame(&self, video_url: &str, job_id: &str, index: u32) -> Result<String>;

    /// Whether the extractor's tooling is usable; feeds the readiness probe
    async fn probe(&self) -> bool {
        true
    }
}

/// ffmpeg-backed extractor; downloads the clip into a scratch directory
pub struct FfmpegFrameExtractor {
    client: reqwest::Client,
    ffmpeg_bin: String,
    work_dir: PathBuf,
}

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg_bin: String, work_dir: impl Into<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            ffmpeg_bin,
            work_dir: work_dir.into(),
        }
    }

    async fn download_clip(&self, video_url: &str, dest: &PathBuf) -> Result<()> {
        let response = self.client.get(video_url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::FrameExtraction {
                message: format!(
                    "Clip download failed with status {}",
                    response.status().as_u16()
                ),
            });
        }
        let bytes = response.bytes().await.map_err(|e| AppError::FrameExtraction {
            message: format!("Clip download failed: {}", e),
        })?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    /// Check the binary is invocable
    async fn probe(&self) -> bool {
        tokio::process::Command::new(&self.ffmpeg_bin)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn extract_final_frame(&self, video_url: &str, job_id: &str, index: u32) -> Result<String> {
        let dir = self.work_dir.join(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        let clip_path = dir.join(format!("segment-{}.mp4", index));
        let frame_path = dir.join(format!("frame-{}.jpg", index));

        self.download_clip(video_url, &clip_path).await?;

        // Seek to just before EOF and emit one frame
        let output = tokio::process::Command::new(&self.ffmpeg_bin)
            .args([
                "-y",
                "-sseof",
                "-0.5",
                "-i",
                clip_path.to_string_lossy().as_ref(),
                "-frames:v",
                "1",
                "-q:v",
                "2",
                frame_path.to_string_lossy().as_ref(),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AppError::FrameExtraction {
                message: format!("Failed to launch {}: {}", self.ffmpeg_bin, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(AppError::FrameExtraction {
                message: format!("ffmpeg exited with {}: {}", output.status, tail),
            });
        }

        let frame = tokio::fs::read(&frame_path).await.map_err(|e| {
            AppError::FrameExtraction {
                message: format!("ffmpeg produced no frame: {}", e),
            }
        })?;

        // The clip is no longer needed once the frame exists
        let _ = tokio::fs::remove_file(&clip_path).await;

        let encoded = base64::engine::general_purpose::STANDARD.encode(&frame);
        Ok(format!("data:image/jpeg;base64,{}", encoded))
    }
}

/// Mock extractor for tests; returns a distinct frame per call
#[derive(Default)]
pub struct MockFrameExtractor {
    pub calls: std::sync::atomic::AtomicU32,
}

#[async_trait]
impl FrameExtractor for MockFrameExtractor {
    async fn extract_final_frame(&self, _video_url: &str, _job_id: &str, index: u32) -> Result<String> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(format!("data:image/jpeg;base64,bW9jay1mcmFtZS0{}", index))
    }
}
