//! ElevenLabs text-to-speech client

use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::errors::{AppError, Result};
use crate::metrics;

/// Trait for speech synthesis
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the given voice, returning audio/mpeg bytes
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// ElevenLabs API client
pub struct ElevenLabsClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, voice_id);
        let request = SpeechRequest {
            text,
            model_id: "eleven_multilingual_v2",
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await;
        let elapsed = start.elapsed().as_secs_f64();

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                metrics::record_vendor_call("elevenlabs", "speech", elapsed, false);
                return Err(e.into());
            }
        };

        if !response.status().is_success() {
            metrics::record_vendor_call("elevenlabs", "speech", elapsed, false);
            let (status, body) = super::error_body(response).await;
            return Err(AppError::Vendor {
                vendor: "elevenlabs",
                status,
                message: body,
            });
        }
        metrics::record_vendor_call("elevenlabs", "speech", elapsed, true);

        let bytes = response.bytes().await.map_err(|e| AppError::Vendor {
            vendor: "elevenlabs",
            status: 200,
            message: format!("Failed to read audio body: {}", e),
        })?;
        Ok(bytes.to_vec())
    }
}

/// Mock speech synthesizer for tests
#[derive(Default)]
pub struct MockSpeechSynthesizer;

#[async_trait]
impl SpeechSynthesizer for MockSpeechSynthesizer {
    async fn synthesize(&self, text: &str, _voice_id: &str) -> Result<Vec<u8>> {
        // A recognizable fake MP3 header followed by the text length
        let mut audio = vec![0xFF, 0xFB, 0x90, 0x00];
        audio.extend_from_slice(&(text.len() as u32).to_be_bytes());
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_audio_bytes() {
        let mock = MockSpeechSynthesizer;
        let audio = mock.synthesize("hello", "voice-1").await.unwrap();
        assert_eq!(&audio[..2], &[0xFF, 0xFB]);
    }
}
