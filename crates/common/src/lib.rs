//! Reelsmith Common Library
//!
//! Shared code for the Reelsmith services including:
//! - Domain models (jobs, segments, agents, usage records)
//! - In-memory keyed stores with lifecycle management
//! - Vendor client abstractions (image, chat, video, speech)
//! - Error types and handling
//! - Configuration management
//! - Webhook signature verification
//! - Feed aggregation
//! - Metrics and observability

pub mod agents;
pub mod billing;
pub mod config;
pub mod errors;
pub mod feeds;
pub mod metrics;
pub mod models;
pub mod store;
pub mod vendors;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::{ActionKind, JobStatus, SegmentLength, VideoJob, VideoSegment};
pub use store::{JobStore, UsageStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the anonymous session cookie
pub const SESSION_COOKIE: &str = "anon_session";
