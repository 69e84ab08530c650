//! Vendor client abstractions
//!
//! Each external AI vendor sits behind a trait with a reqwest
//! implementation and a mock for tests. Calls are single-attempt: a failed
//! vendor call aborts the enclosing operation, and a non-2xx response
//! surfaces as a vendor error with the raw body text attached for
//! diagnostics.

mod elevenlabs;
mod luma;
mod openai;
mod xai;

pub use elevenlabs::{ElevenLabsClient, MockSpeechSynthesizer, SpeechSynthesizer};
pub use luma::{LumaClient, MockVideoSynthesizer, VideoSynthesizer};
pub use openai::{ImageGenerator, MockImageGenerator, OpenAiImageClient};
pub use xai::{ChatModel, DeltaStream, MockChatModel, MotionPlan, XaiClient};

use std::sync::Arc;
use std::time::Duration;

use crate::config::{PipelineConfig, VendorsConfig};
use crate::errors::{AppError, Result};

/// The vendor clients the gateway holds; each is present only when its
/// API key is configured, so an unconfigured vendor degrades the routes
/// that need it rather than crashing startup.
#[derive(Clone, Default)]
pub struct VendorClients {
    pub images: Option<Arc<dyn ImageGenerator>>,
    pub chat: Option<Arc<dyn ChatModel>>,
    pub video: Option<Arc<dyn VideoSynthesizer>>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl VendorClients {
    /// Build clients for every vendor with a configured key. The pipeline
    /// config supplies the synthesis poll cadence.
    pub fn from_config(config: &VendorsConfig, pipeline: &PipelineConfig) -> Self {
        let images = config.openai.api_key.as_ref().map(|key| {
            Arc::new(OpenAiImageClient::new(
                key.clone(),
                config.openai.api_base.clone(),
                config.openai.image_model.clone(),
            )) as Arc<dyn ImageGenerator>
        });
        let chat = config.xai.api_key.as_ref().map(|key| {
            Arc::new(XaiClient::new(
                key.clone(),
                config.xai.api_base.clone(),
                config.xai.chat_model.clone(),
                config.xai.vision_model.clone(),
            )) as Arc<dyn ChatModel>
        });
        let video = config.luma.api_key.as_ref().map(|key| {
            let client = LumaClient::new(
                key.clone(),
                config.luma.api_base.clone(),
                config.luma.model.clone(),
            )
            .with_polling(
                Duration::from_secs(pipeline.poll_interval_secs),
                pipeline.max_polls,
            );
            Arc::new(client) as Arc<dyn VideoSynthesizer>
        });
        let speech = config.elevenlabs.api_key.as_ref().map(|key| {
            Arc::new(ElevenLabsClient::new(
                key.clone(),
                config.elevenlabs.api_base.clone(),
            )) as Arc<dyn SpeechSynthesizer>
        });

        for (name, configured) in [
            ("openai", images.is_some()),
            ("xai", chat.is_some()),
            ("luma", video.is_some()),
            ("elevenlabs", speech.is_some()),
        ] {
            if !configured {
                tracing::warn!(vendor = name, "Vendor not configured; dependent routes degraded");
            }
        }

        Self {
            images,
            chat,
            video,
            speech,
        }
    }

    pub fn images(&self) -> Result<&Arc<dyn ImageGenerator>> {
        self.images
            .as_ref()
            .ok_or(AppError::VendorUnconfigured { vendor: "openai" })
    }

    pub fn chat(&self) -> Result<&Arc<dyn ChatModel>> {
        self.chat
            .as_ref()
            .ok_or(AppError::VendorUnconfigured { vendor: "xai" })
    }

    pub fn video(&self) -> Result<&Arc<dyn VideoSynthesizer>> {
        self.video
            .as_ref()
            .ok_or(AppError::VendorUnconfigured { vendor: "luma" })
    }

    pub fn speech(&self) -> Result<&Arc<dyn SpeechSynthesizer>> {
        self.speech
            .as_ref()
            .ok_or(AppError::VendorUnconfigured { vendor: "elevenlabs" })
    }
}

/// Read a response body as text for error reporting, swallowing read errors
pub(crate) async fn error_body(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, VendorsConfig};

    #[test]
    fn test_unconfigured_vendors_are_none() {
        let clients =
            VendorClients::from_config(&VendorsConfig::default(), &PipelineConfig::default());
        assert!(clients.images.is_none());
        assert!(matches!(
            clients.video(),
            Err(AppError::VendorUnconfigured { vendor: "luma" })
        ));
    }

    #[test]
    fn test_configured_vendor_is_present() {
        let mut config = VendorsConfig::default();
        config.luma.api_key = Some("luma-test-key".into());
        let clients = VendorClients::from_config(&config, &PipelineConfig::default());
        assert!(clients.video().is_ok());
        assert!(clients.chat().is_err());
    }
}
