//! Reelsmith video pipeline
//!
//! Turns one text prompt into an ordered sequence of rendered video
//! segments covering a requested duration, preserving visual continuity
//! across segment boundaries: each segment is anchored on a keyframe, and
//! every keyframe after the first is the previous clip's true final frame,
//! extracted locally with ffmpeg rather than trusted from the synthesis
//! vendor.

mod frames;
mod orchestrator;

pub use frames::{FfmpegFrameExtractor, FrameExtractor, MockFrameExtractor};
pub use orchestrator::{Orchestrator, PipelineRequest, PipelineResult};
