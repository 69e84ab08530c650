//! Video generation job and segment entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job status enum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Check if the status is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Queued,
        }
    }
}

/// Fixed per-segment clip length offered by the synthesis vendor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentLength {
    #[serde(rename = "5s")]
    FiveSeconds,
    #[serde(rename = "9s")]
    NineSeconds,
}

impl SegmentLength {
    pub fn as_secs(&self) -> u32 {
        match self {
            SegmentLength::FiveSeconds => 5,
            SegmentLength::NineSeconds => 9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentLength::FiveSeconds => "5s",
            SegmentLength::NineSeconds => "9s",
        }
    }

    /// Parse the wire form ("5s" / "9s")
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "5s" => Some(SegmentLength::FiveSeconds),
            "9s" => Some(SegmentLength::NineSeconds),
            _ => None,
        }
    }
}

/// Discrete camera movement tags produced by the motion predictor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMove {
    Static,
    PanLeft,
    PanRight,
    ZoomIn,
    ZoomOut,
    TiltUp,
    TiltDown,
    OrbitLeft,
    OrbitRight,
    DollyIn,
    CraneUp,
}

impl CameraMove {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraMove::Static => "static",
            CameraMove::PanLeft => "pan_left",
            CameraMove::PanRight => "pan_right",
            CameraMove::ZoomIn => "zoom_in",
            CameraMove::ZoomOut => "zoom_out",
            CameraMove::TiltUp => "tilt_up",
            CameraMove::TiltDown => "tilt_down",
            CameraMove::OrbitLeft => "orbit_left",
            CameraMove::OrbitRight => "orbit_right",
            CameraMove::DollyIn => "dolly_in",
            CameraMove::CraneUp => "crane_up",
        }
    }

    /// Lenient parse of model output; unknown tags return None and are dropped
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "static" => Some(CameraMove::Static),
            "pan_left" => Some(CameraMove::PanLeft),
            "pan_right" => Some(CameraMove::PanRight),
            "zoom_in" => Some(CameraMove::ZoomIn),
            "zoom_out" => Some(CameraMove::ZoomOut),
            "tilt_up" => Some(CameraMove::TiltUp),
            "tilt_down" => Some(CameraMove::TiltDown),
            "orbit_left" => Some(CameraMove::OrbitLeft),
            "orbit_right" => Some(CameraMove::OrbitRight),
            "dolly_in" => Some(CameraMove::DollyIn),
            "crane_up" => Some(CameraMove::CraneUp),
            _ => None,
        }
    }
}

/// One rendered clip within a job; immutable once appended
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoSegment {
    pub index: u32,
    pub start_offset_secs: u32,
    pub duration_secs: u32,
    /// Keyframe the segment was synthesized from (data URL or vendor URL)
    pub keyframe: String,
    /// Motion/action description fed to the synthesis call
    pub motion: String,
    /// Camera-movement tags chosen by the vision model
    pub camera_moves: Vec<CameraMove>,
    /// Rendered clip URL returned by the synthesis vendor
    pub video_url: String,
}

/// One multi-segment video request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoJob {
    pub id: String,
    pub status: JobStatus,
    /// Human-readable pipeline stage label
    pub stage: String,
    pub progress_percent: f64,
    pub segments: Vec<VideoSegment>,
    pub segments_total: u32,
    pub total_duration_secs: u32,
    pub cost_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl VideoJob {
    /// Allocate a new queued job. The id embeds the creation time and
    /// random bits so ids sort roughly by age and stay unguessable.
    pub fn new(segments_total: u32, cost_usd: f64) -> Self {
        let now = Utc::now();
        let id = format!(
            "vj_{}_{}",
            now.timestamp_millis(),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        Self {
            id,
            status: JobStatus::Queued,
            stage: "queued".to_string(),
            progress_percent: 0.0,
            segments: Vec::new(),
            segments_total,
            total_duration_secs: 0,
            cost_usd,
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Age of the job, used by the sweeper
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}
