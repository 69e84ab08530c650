//! Luma Dream Machine video synthesis client
//!
//! Creating a generation is asynchronous on the vendor side: the client
//! polls the generation until it completes, fails, or the poll budget runs
//! out. The poll loop honors a cancellation token so an aborted job stops
//! waiting instead of holding the task until the vendor finishes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::errors::{AppError, Result};
use crate::metrics;

/// Trait for keyframe-anchored video synthesis
#[async_trait]
pub trait VideoSynthesizer: Send + Sync {
    /// Render a clip of `duration_secs` anchored on `keyframe`, returning
    /// the clip URL
    async fn synthesize(
        &self,
        keyframe: &str,
        prompt: &str,
        duration_secs: u32,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    duration: String,
    keyframes: Keyframes<'a>,
}

#[derive(Serialize)]
struct Keyframes<'a> {
    frame0: FrameRef<'a>,
}

#[derive(Serialize)]
struct FrameRef<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    url: &'a str,
}

#[derive(Deserialize)]
struct Generation {
    id: String,
    state: String,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    assets: Option<Assets>,
}

#[derive(Deserialize)]
struct Assets {
    video: Option<String>,
}

/// Luma API client
pub struct LumaClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl LumaClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key,
            base_url,
            model,
            poll_interval: Duration::from_secs(5),
            max_polls: 120,
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    async fn create_generation(
        &self,
        keyframe: &str,
        prompt: &str,
        duration_secs: u32,
    ) -> Result<String> {
        let url = format!("{}/dream-machine/v1/generations", self.base_url);
        let request = GenerationRequest {
            prompt,
            model: &self.model,
            duration: format!("{}s", duration_secs),
            keyframes: Keyframes {
                frame0: FrameRef {
                    kind: "image",
                    url: keyframe,
                },
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = super::error_body(response).await;
            return Err(AppError::Vendor {
                vendor: "luma",
                status,
                message: body,
            });
        }

        let generation: Generation = response.json().await.map_err(|e| AppError::Vendor {
            vendor: "luma",
            status: 200,
            message: format!("Failed to parse generation response: {}", e),
        })?;
        Ok(generation.id)
    }

    async fn poll_generation(&self, id: &str) -> Result<Generation> {
        let url = format!("{}/dream-machine/v1/generations/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = super::error_body(response).await;
            return Err(AppError::Vendor {
                vendor: "luma",
                status,
                message: body,
            });
        }

        response.json().await.map_err(|e| {
            AppError::Vendor {
                vendor: "luma",
                status: 200,
                message: format!("Failed to parse generation state: {}", e),
            }
        })
    }
}

#[async_trait]
impl VideoSynthesizer for LumaClient {
    async fn synthesize(
        &self,
        keyframe: &str,
        prompt: &str,
        duration_secs: u32,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let start = Instant::now();
        let id = match self.create_generation(keyframe, prompt, duration_secs).await {
            Ok(id) => id,
            Err(e) => {
                metrics::record_vendor_call("luma", "synthesize", start.elapsed().as_secs_f64(), false);
                return Err(e);
            }
        };
        tracing::debug!(generation_id = %id, "Luma generation created");

        for _ in 0..self.max_polls {
            tokio::select! {
                _ = cancel.cancelled() => {
                    metrics::record_vendor_call("luma", "synthesize", start.elapsed().as_secs_f64(), false);
                    return Err(AppError::Canceled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            let generation = self.poll_generation(&id).await?;
            match generation.state.as_str() {
                "completed" => {
                    metrics::record_vendor_call("luma", "synthesize", start.elapsed().as_secs_f64(), true);
                    return generation
                        .assets
                        .and_then(|a| a.video)
                        .ok_or(AppError::Vendor {
                            vendor: "luma",
                            status: 200,
                            message: "Completed generation carried no video asset".to_string(),
                        });
                }
                "failed" => {
                    metrics::record_vendor_call("luma", "synthesize", start.elapsed().as_secs_f64(), false);
                    return Err(AppError::Vendor {
                        vendor: "luma",
                        status: 200,
                        message: generation
                            .failure_reason
                            .unwrap_or_else(|| "Generation failed without a reason".to_string()),
                    });
                }
                state => {
                    tracing::trace!(generation_id = %id, state, "Luma generation pending");
                }
            }
        }

        metrics::record_vendor_call("luma", "synthesize", start.elapsed().as_secs_f64(), false);
        Err(AppError::Vendor {
            vendor: "luma",
            status: 200,
            message: format!("Generation {} still pending after poll budget", id),
        })
    }
}

/// Mock synthesizer for tests; optionally fails at a chosen call index
pub struct MockVideoSynthesizer {
    pub calls: std::sync::atomic::AtomicU32,
    pub fail_at_call: Option<u32>,
}

impl Default for MockVideoSynthesizer {
    fn default() -> Self {
        Self {
            calls: std::sync::atomic::AtomicU32::new(0),
            fail_at_call: None,
        }
    }
}

impl MockVideoSynthesizer {
    pub fn failing_at(call: u32) -> Self {
        Self {
            calls: std::sync::atomic::AtomicU32::new(0),
            fail_at_call: Some(call),
        }
    }
}

#[async_trait]
impl VideoSynthesizer for MockVideoSynthesizer {
    async fn synthesize(
        &self,
        _keyframe: &str,
        _prompt: &str,
        _duration_secs: u32,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(AppError::Canceled);
        }
        let call = self
            .calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail_at_call == Some(call) {
            return Err(AppError::Vendor {
                vendor: "luma",
                status: 500,
                message: "mock synthesis failure".to_string(),
            });
        }
        Ok(format!("https://cdn.example/mock-clip-{}.mp4", call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_polling_overrides_defaults() {
        let client = LumaClient::new(
            "key".into(),
            "https://api.lumalabs.ai".into(),
            "ray-2".into(),
        )
        .with_polling(Duration::from_secs(2), 7);
        assert_eq!(client.poll_interval, Duration::from_secs(2));
        assert_eq!(client.max_polls, 7);
    }

    #[tokio::test]
    async fn test_mock_fails_at_configured_call() {
        let mock = MockVideoSynthesizer::failing_at(1);
        let cancel = CancellationToken::new();
        assert!(mock.synthesize("kf", "p", 5, &cancel).await.is_ok());
        assert!(mock.synthesize("kf", "p", 5, &cancel).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_honors_cancellation() {
        let mock = MockVideoSynthesizer::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            mock.synthesize("kf", "p", 5, &cancel).await,
            Err(AppError::Canceled)
        ));
    }
}
