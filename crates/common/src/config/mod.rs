//! Configuration management for Reelsmith services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml)
//! - Conventional vendor key variables (OPENAI_API_KEY etc.)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Global request rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Free-tier usage quotas
    #[serde(default)]
    pub usage: UsageConfig,

    /// Agent config store
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Video pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Feed aggregator settings
    #[serde(default)]
    pub feeds: FeedsConfig,

    /// Vendor API credentials and endpoints
    #[serde(default)]
    pub vendors: VendorsConfig,

    /// Stripe billing settings
    #[serde(default)]
    pub stripe: StripeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Session cookie max age in seconds (one year)
    #[serde(default = "default_cookie_max_age")]
    pub session_cookie_max_age_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable the Prometheus exporter)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UsageConfig {
    /// Free agent chat calls per session per month
    #[serde(default = "default_free_agent_calls")]
    pub free_agent_calls: u64,

    /// Free video generations per session per month
    #[serde(default = "default_free_video_generations")]
    pub free_video_generations: u64,

    /// Free speech syntheses per session per month
    #[serde(default = "default_free_speech_syntheses")]
    pub free_speech_syntheses: u64,

    /// Free standalone image generations per session per month
    #[serde(default = "default_free_image_generations")]
    pub free_image_generations: u64,

    /// Where quota-exhausted clients are sent
    #[serde(default = "default_upgrade_url")]
    pub upgrade_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentsConfig {
    /// Directory holding one JSON file per agent
    #[serde(default = "default_agents_dir")]
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Default target duration in seconds
    #[serde(default = "default_target_duration")]
    pub default_duration_secs: u32,

    /// Flat cost estimate per rendered segment in USD
    #[serde(default = "default_segment_cost")]
    pub segment_cost_usd: f64,

    /// Upper bound on a whole pipeline run in seconds
    #[serde(default = "default_pipeline_deadline")]
    pub deadline_secs: u64,

    /// Luma generation poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum polls before a generation is declared stuck
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Job retention before the sweeper removes it, in seconds
    #[serde(default = "default_job_ttl")]
    pub job_ttl_secs: u64,

    /// Sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// ffmpeg binary for final-frame extraction
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,

    /// Scratch directory for downloaded clips and extracted frames
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedsConfig {
    /// Feed URLs to aggregate
    #[serde(default = "default_feed_sources")]
    pub sources: Vec<String>,

    /// Newest items kept per source before merging
    #[serde(default = "default_items_per_source")]
    pub items_per_source: usize,

    /// Per-source fetch timeout in seconds
    #[serde(default = "default_feed_timeout")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VendorsConfig {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub xai: XaiConfig,
    #[serde(default)]
    pub luma: LumaConfig,
    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiConfig {
    /// API key; absent key degrades image routes to 503
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base")]
    pub api_base: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct XaiConfig {
    pub api_key: Option<String>,

    #[serde(default = "default_xai_base")]
    pub api_base: String,

    /// Text chat model for agent runs
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Vision model for motion prediction
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LumaConfig {
    pub api_key: Option<String>,

    #[serde(default = "default_luma_base")]
    pub api_base: String,

    #[serde(default = "default_luma_model")]
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ElevenLabsConfig {
    pub api_key: Option<String>,

    #[serde(default = "default_elevenlabs_base")]
    pub api_base: String,

    #[serde(default = "default_voice_id")]
    pub default_voice: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeConfig {
    /// Secret API key (unused for webhook-only deployments)
    pub secret_key: Option<String>,

    /// Shared secret for webhook signature verification
    pub webhook_secret: Option<String>,

    /// Accepted clock skew for signed webhooks, in seconds
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: u64,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_cookie_max_age() -> u64 { 365 * 24 * 60 * 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "reelsmith".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }
fn default_free_agent_calls() -> u64 { 3 }
fn default_free_video_generations() -> u64 { 2 }
fn default_free_speech_syntheses() -> u64 { 5 }
fn default_free_image_generations() -> u64 { 5 }
fn default_upgrade_url() -> String { "https://reelsmith.dev/upgrade".to_string() }
fn default_agents_dir() -> String { "data/agents".to_string() }
fn default_target_duration() -> u32 { 30 }
fn default_segment_cost() -> f64 { 0.40 }
fn default_pipeline_deadline() -> u64 { 900 }
fn default_poll_interval() -> u64 { 5 }
fn default_max_polls() -> u32 { 120 }
fn default_job_ttl() -> u64 { 3600 }
fn default_sweep_interval() -> u64 { 300 }
fn default_ffmpeg_bin() -> String { "ffmpeg".to_string() }
fn default_work_dir() -> String { "data/work".to_string() }
fn default_items_per_source() -> usize { 10 }
fn default_feed_timeout() -> u64 { 10 }
fn default_feed_sources() -> Vec<String> {
    vec![
        "https://blog.google/technology/ai/rss/".to_string(),
        "https://openai.com/news/rss.xml".to_string(),
        "https://huggingface.co/blog/feed.xml".to_string(),
    ]
}
fn default_openai_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_image_model() -> String { "gpt-image-1".to_string() }
fn default_xai_base() -> String { "https://api.x.ai/v1".to_string() }
fn default_chat_model() -> String { "grok-3-mini".to_string() }
fn default_vision_model() -> String { "grok-2-vision-latest".to_string() }
fn default_luma_base() -> String { "https://api.lumalabs.ai".to_string() }
fn default_luma_model() -> String { "ray-2".to_string() }
fn default_elevenlabs_base() -> String { "https://api.elevenlabs.io".to_string() }
fn default_voice_id() -> String { "21m00Tcm4TlvDq8ikWAM".to_string() }
fn default_signature_tolerance() -> u64 { 300 }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: Self = config.try_deserialize()?;
        loaded.apply_conventional_env();
        Ok(loaded)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: Self = config.try_deserialize()?;
        loaded.apply_conventional_env();
        Ok(loaded)
    }

    /// Fill vendor keys from their conventional variable names when the
    /// APP__-prefixed form was not provided.
    fn apply_conventional_env(&mut self) {
        fn fill(slot: &mut Option<String>, var: &str) {
            if slot.is_none() {
                if let Ok(value) = std::env::var(var) {
                    if !value.is_empty() {
                        *slot = Some(value);
                    }
                }
            }
        }
        fill(&mut self.vendors.openai.api_key, "OPENAI_API_KEY");
        fill(&mut self.vendors.xai.api_key, "XAI_API_KEY");
        fill(&mut self.vendors.luma.api_key, "LUMA_API_KEY");
        fill(&mut self.vendors.elevenlabs.api_key, "ELEVENLABS_API_KEY");
        fill(&mut self.stripe.secret_key, "STRIPE_SECRET_KEY");
        fill(&mut self.stripe.webhook_secret, "STRIPE_WEBHOOK_SECRET");
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Free-tier limit for one action kind
    pub fn free_limit(&self, kind: crate::models::ActionKind) -> u64 {
        use crate::models::ActionKind;
        match kind {
            ActionKind::AgentCall => self.usage.free_agent_calls,
            ActionKind::VideoGeneration => self.usage.free_video_generations,
            ActionKind::SpeechSynthesis => self.usage.free_speech_syntheses,
            ActionKind::ImageGeneration => self.usage.free_image_generations,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            session_cookie_max_age_secs: default_cookie_max_age(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            free_agent_calls: default_free_agent_calls(),
            free_video_generations: default_free_video_generations(),
            free_speech_syntheses: default_free_speech_syntheses(),
            free_image_generations: default_free_image_generations(),
            upgrade_url: default_upgrade_url(),
        }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            dir: default_agents_dir(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: default_target_duration(),
            segment_cost_usd: default_segment_cost(),
            deadline_secs: default_pipeline_deadline(),
            poll_interval_secs: default_poll_interval(),
            max_polls: default_max_polls(),
            job_ttl_secs: default_job_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            ffmpeg_bin: default_ffmpeg_bin(),
            work_dir: default_work_dir(),
        }
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            sources: default_feed_sources(),
            items_per_source: default_items_per_source(),
            fetch_timeout_secs: default_feed_timeout(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_openai_base(),
            image_model: default_image_model(),
        }
    }
}

impl Default for XaiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_xai_base(),
            chat_model: default_chat_model(),
            vision_model: default_vision_model(),
        }
    }
}

impl Default for LumaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_luma_base(),
            model: default_luma_model(),
        }
    }
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_elevenlabs_base(),
            default_voice: default_voice_id(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            usage: UsageConfig::default(),
            agents: AgentsConfig::default(),
            pipeline: PipelineConfig::default(),
            feeds: FeedsConfig::default(),
            vendors: VendorsConfig::default(),
            stripe: StripeConfig::default(),
        }
    }
}
