//! xAI chat client
//!
//! Two roles: SSE-streamed agent chat (grok text models) and vision-based
//! motion prediction for the video pipeline (grok vision models).

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::{Duration, Instant};

use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::CameraMove;

/// Stream of content deltas from a chat completion
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// What the vision model predicts should happen next in the scene
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotionPlan {
    /// Short textual motion/action description
    pub motion: String,
    /// Discrete camera-movement tags
    pub camera_moves: Vec<CameraMove>,
}

/// Trait for chat completion and motion prediction
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Stream a chat completion as content deltas
    async fn stream(
        &self,
        system_prompt: &str,
        user_message: &str,
        model: &str,
        temperature: f32,
    ) -> Result<DeltaStream>;

    /// Ask the vision model how the scene in `image` should evolve
    async fn describe_motion(&self, image_data_url: &str, style: &str) -> Result<MotionPlan>;
}

const MOTION_PROMPT: &str = "You are a cinematography assistant. Given a keyframe \
image, describe in one or two sentences the motion and action that should unfold \
over the next few seconds, then pick up to three camera movements from: static, \
pan_left, pan_right, zoom_in, zoom_out, tilt_up, tilt_down, orbit_left, \
orbit_right, dolly_in, crane_up. Respond as JSON: \
{\"motion\": \"...\", \"camera_moves\": [\"...\"]}";

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ChatMessage {
    Text { role: &'static str, content: String },
    Multi { role: &'static str, content: Vec<ContentPart> },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Shape the vision model is asked to reply in
#[derive(Deserialize)]
struct MotionReply {
    motion: String,
    #[serde(default)]
    camera_moves: Vec<String>,
}

/// xAI API client
pub struct XaiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    vision_model: String,
}

impl XaiClient {
    pub fn new(api_key: String, base_url: String, chat_model: String, vision_model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key,
            base_url,
            chat_model,
            vision_model,
        }
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = super::error_body(response).await;
            return Err(AppError::Vendor {
                vendor: "xai",
                status,
                message: body,
            });
        }
        Ok(response)
    }
}

/// Parse the vision reply; a plain-text answer becomes the motion
/// description with no camera tags rather than an error.
fn parse_motion_reply(content: &str) -> MotionPlan {
    // Models sometimes wrap JSON in a code fence
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str::<MotionReply>(trimmed) {
        Ok(reply) => MotionPlan {
            motion: reply.motion,
            camera_moves: reply
                .camera_moves
                .iter()
                .filter_map(|tag| CameraMove::parse(tag))
                .collect(),
        },
        Err(_) => MotionPlan {
            motion: trimmed.to_string(),
            camera_moves: Vec::new(),
        },
    }
}

#[async_trait]
impl ChatModel for XaiClient {
    async fn stream(
        &self,
        system_prompt: &str,
        user_message: &str,
        model: &str,
        temperature: f32,
    ) -> Result<DeltaStream> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage::Text {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage::Text {
                    role: "user",
                    content: user_message.to_string(),
                },
            ],
            temperature,
            stream: true,
        };

        let start = Instant::now();
        let response = self.post_chat(&request).await;
        metrics::record_vendor_call("xai", "chat_stream", start.elapsed().as_secs_f64(), response.is_ok());
        let response = response?;

        let deltas = response
            .bytes_stream()
            .eventsource()
            .map(|event| -> Result<Option<String>> {
                let event = event.map_err(|e| AppError::Vendor {
                    vendor: "xai",
                    status: 200,
                    message: format!("Stream read error: {}", e),
                })?;
                let data = event.data.trim();
                if data == "[DONE]" {
                    return Ok(None);
                }
                match serde_json::from_str::<StreamChunk>(data) {
                    Ok(chunk) => Ok(chunk
                        .choices
                        .first()
                        .and_then(|c| c.delta.content.clone())),
                    // Keep-alive comments and pings are not chunks; skip them
                    Err(_) => Ok(None),
                }
            })
            .filter_map(|result| async move {
                match result {
                    Ok(Some(content)) => Some(Ok(content)),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Box::pin(deltas))
    }

    async fn describe_motion(&self, image_data_url: &str, style: &str) -> Result<MotionPlan> {
        let user_text = if style.is_empty() {
            "Predict the motion for this keyframe.".to_string()
        } else {
            format!("Predict the motion for this keyframe. Style: {}", style)
        };

        let request = ChatRequest {
            model: self.vision_model.clone(),
            messages: vec![
                ChatMessage::Text {
                    role: "system",
                    content: MOTION_PROMPT.to_string(),
                },
                ChatMessage::Multi {
                    role: "user",
                    content: vec![
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image_data_url.to_string(),
                            },
                        },
                        ContentPart::Text { text: user_text },
                    ],
                },
            ],
            temperature: 0.4,
            stream: false,
        };

        let start = Instant::now();
        let response = self.post_chat(&request).await;
        metrics::record_vendor_call("xai", "motion", start.elapsed().as_secs_f64(), response.is_ok());
        let response = response?;

        let parsed: ChatResponse = response.json().await.map_err(|e| AppError::Vendor {
            vendor: "xai",
            status: 200,
            message: format!("Failed to parse chat response: {}", e),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AppError::Vendor {
                vendor: "xai",
                status: 200,
                message: "Chat response carried no content".to_string(),
            })?;

        Ok(parse_motion_reply(&content))
    }
}

/// Mock chat model for tests: streams a fixed reply and returns a fixed
/// motion plan.
pub struct MockChatModel {
    pub reply: Vec<String>,
    pub motion: MotionPlan,
    pub motion_calls: std::sync::atomic::AtomicU32,
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self {
            reply: vec!["Hello".to_string(), ", world".to_string()],
            motion: MotionPlan {
                motion: "the fog drifts across the harbor".to_string(),
                camera_moves: vec![CameraMove::DollyIn],
            },
            motion_calls: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn stream(
        &self,
        _system_prompt: &str,
        _user_message: &str,
        _model: &str,
        _temperature: f32,
    ) -> Result<DeltaStream> {
        let chunks: Vec<Result<String>> = self.reply.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn describe_motion(&self, _image_data_url: &str, _style: &str) -> Result<MotionPlan> {
        self.motion_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.motion.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_motion_reply_json() {
        let plan = parse_motion_reply(
            r#"{"motion": "waves crash against the pier", "camera_moves": ["pan_left", "zoom_in"]}"#,
        );
        assert_eq!(plan.motion, "waves crash against the pier");
        assert_eq!(plan.camera_moves, vec![CameraMove::PanLeft, CameraMove::ZoomIn]);
    }

    #[test]
    fn test_parse_motion_reply_fenced_json() {
        let plan = parse_motion_reply(
            "```json\n{\"motion\": \"slow drift\", \"camera_moves\": [\"static\"]}\n```",
        );
        assert_eq!(plan.motion, "slow drift");
        assert_eq!(plan.camera_moves, vec![CameraMove::Static]);
    }

    #[test]
    fn test_parse_motion_reply_plain_text_fallback() {
        let plan = parse_motion_reply("The camera lingers on the empty street.");
        assert_eq!(plan.motion, "The camera lingers on the empty street.");
        assert!(plan.camera_moves.is_empty());
    }

    #[test]
    fn test_parse_motion_reply_drops_unknown_tags() {
        let plan = parse_motion_reply(
            r#"{"motion": "m", "camera_moves": ["zoom_in", "barrel_roll"]}"#,
        );
        assert_eq!(plan.camera_moves, vec![CameraMove::ZoomIn]);
    }

    #[tokio::test]
    async fn test_mock_stream_yields_reply() {
        let mock = MockChatModel::default();
        let mut stream = mock.stream("sys", "hi", "mock", 0.7).await.unwrap();
        let mut collected = String::new();
        while let Some(delta) = stream.next().await {
            collected.push_str(&delta.unwrap());
        }
        assert_eq!(collected, "Hello, world");
    }
}
