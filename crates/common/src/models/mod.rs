//! Domain models shared across the Reelsmith services

pub mod agent;
pub mod job;
pub mod usage;

pub use agent::AgentConfig;
pub use job::{CameraMove, JobStatus, SegmentLength, VideoJob, VideoSegment};
pub use usage::{ActionKind, UsageDecision, UsageRecord};
