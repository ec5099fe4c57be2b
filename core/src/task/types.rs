use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a generation task.
///
/// Tasks start Pending and end in exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(format!("unsupported media type: {other}")),
        }
    }
}

/// Per-media generation parameters as a closed union.
///
/// Each variant carries only the fields its media type understands, so a
/// task can never accumulate untyped extension fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "media_type", rename_all = "snake_case")]
pub enum MediaParams {
    Image {
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        style: Option<String>,
    },
    Video {
        #[serde(default)]
        duration_secs: Option<u32>,
        #[serde(default)]
        resolution: Option<String>,
    },
    Audio {
        #[serde(default)]
        duration_secs: Option<u32>,
        #[serde(default)]
        voice: Option<String>,
    },
}

impl MediaParams {
    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Image { .. } => MediaType::Image,
            Self::Video { .. } => MediaType::Video,
            Self::Audio { .. } => MediaType::Audio,
        }
    }

    /// Bare params for a media type, all knobs unset.
    pub fn defaults_for(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Image => Self::Image {
                aspect_ratio: None,
                style: None,
            },
            MediaType::Video => Self::Video {
                duration_secs: None,
                resolution: None,
            },
            MediaType::Audio => Self::Audio {
                duration_secs: None,
                voice: None,
            },
        }
    }
}

/// One tracked generation request.
///
/// `prompt`, `model` and `media` are immutable after creation; everything
/// else is mutated through [`crate::task::TaskStore::update_task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: String,
    pub status: TaskStatus,
    /// 0..=100, non-decreasing except on explicit reset.
    pub progress: u8,
    /// Present only once the task completed.
    pub media_url: Option<String>,
    /// Present only once the task failed.
    pub error: Option<String>,
    pub prompt: String,
    pub model: String,
    pub media: MediaParams,
    pub created_at: DateTime<Utc>,
    /// Stamp of the last applied mutation; older stamps are dropped.
    pub seq: u64,
}

impl GenerationTask {
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        model: impl Into<String>,
        media: MediaParams,
    ) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            progress: 0,
            media_url: None,
            error: None,
            prompt: prompt.into(),
            model: model.into(),
            media,
            created_at: Utc::now(),
            seq: 0,
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.media.media_type()
    }
}

/// Partial update merged into an existing task by the store.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub media_url: Option<String>,
    pub error: Option<String>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn completed(media_url: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            progress: Some(100),
            media_url: Some(media_url.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            progress: None,
            media_url: None,
            error: Some(error.into()),
        }
    }
}

/// Store change notification, consumed by whatever renders task state.
#[derive(Debug, Clone, Serialize)]
pub enum TaskEvent {
    Registered {
        task_id: String,
        timestamp: DateTime<Utc>,
    },
    Updated {
        task_id: String,
        status: TaskStatus,
        progress: u8,
        timestamp: DateTime<Utc>,
    },
    Cleared {
        timestamp: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Registered { task_id, .. } | Self::Updated { task_id, .. } => Some(task_id),
            Self::Cleared { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
    }

    #[test]
    fn media_params_round_trip_keeps_tag() {
        let params = MediaParams::Video {
            duration_secs: Some(8),
            resolution: Some("720p".to_string()),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["media_type"], "video");
        let back: MediaParams = serde_json::from_value(json).unwrap();
        assert_eq!(back.media_type(), MediaType::Video);
    }

    #[test]
    fn media_type_parses_case_insensitively() {
        assert_eq!("Image".parse::<MediaType>().unwrap(), MediaType::Image);
        assert!("gif".parse::<MediaType>().is_err());
    }
}
