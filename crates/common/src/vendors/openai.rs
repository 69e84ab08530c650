//! OpenAI image generation client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::errors::{AppError, Result};
use crate::metrics;

/// Trait for keyframe image generation
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image from a prompt, returned as base64 PNG
    async fn generate(&self, prompt: &str, size: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI images API client
pub struct OpenAiImageClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

impl OpenAiImageClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate(&self, prompt: &str, size: &str) -> Result<String> {
        let url = format!("{}/images/generations", self.base_url);
        let request = ImageRequest {
            model: &self.model,
            prompt,
            n: 1,
            size,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await;
        let elapsed = start.elapsed().as_secs_f64();

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                metrics::record_vendor_call("openai", "image", elapsed, false);
                return Err(e.into());
            }
        };

        if !response.status().is_success() {
            metrics::record_vendor_call("openai", "image", elapsed, false);
            let (status, body) = super::error_body(response).await;
            return Err(AppError::Vendor {
                vendor: "openai",
                status,
                message: body,
            });
        }
        metrics::record_vendor_call("openai", "image", elapsed, true);

        let result: ImageResponse = response.json().await.map_err(|e| AppError::Vendor {
            vendor: "openai",
            status: 200,
            message: format!("Failed to parse image response: {}", e),
        })?;

        let datum = result.data.into_iter().next().ok_or(AppError::Vendor {
            vendor: "openai",
            status: 200,
            message: "Empty image response".to_string(),
        })?;

        // gpt-image-1 returns base64; dall-e style responses may return a URL
        datum
            .b64_json
            .or(datum.url)
            .ok_or(AppError::Vendor {
                vendor: "openai",
                status: 200,
                message: "Image response carried neither b64_json nor url".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock image generator for tests
#[derive(Default)]
pub struct MockImageGenerator {
    pub calls: std::sync::atomic::AtomicU32,
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, prompt: &str, _size: &str) -> Result<String> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(format!("bW9jay1rZXlmcmFtZTp7{}", prompt.len()))
    }

    fn model_name(&self) -> &str {
        "mock-image"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_generates_and_counts() {
        let mock = MockImageGenerator::default();
        let image = mock.generate("a foggy harbor at dawn", "1024x1024").await.unwrap();
        assert!(!image.is_empty());
        assert_eq!(mock.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
