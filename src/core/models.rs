//! Core data models for the music player application

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single search result: one playable/downloadable track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub title: String,

    pub identifier: String,

    /// Watch-page URL handed to the media fetcher
    pub reference: String,
}

impl TrackDescriptor {
    pub fn new(
        title: impl Into<String>,
        identifier: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            identifier: identifier.into(),
            reference: reference.into(),
        }
    }
}

/// Target format for a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    /// Best audio stream, extracted and converted to mp3
    Mp3,

    /// Best video+audio combination, normalized into an mp4 container
    Mp4,
}

impl MediaFormat {
    /// File extension of the finished download
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Mp4 => "mp4",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MediaFormat {
    type Err = AppError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(MediaFormat::Mp3),
            "mp4" => Ok(MediaFormat::Mp4),
            other => Err(AppError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Phase of an in-flight download tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    Downloading,

    /// Post-processing (audio extraction, container remux)
    Finishing,

    Error,
}

/// Normalized download progress tick, display-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,

    pub percent: Option<String>,

    pub speed: Option<String>,

    pub eta: Option<String>,

    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn downloading(
        percent: Option<String>,
        speed: Option<String>,
        eta: Option<String>,
    ) -> Self {
        Self {
            phase: ProgressPhase::Downloading,
            percent,
            speed,
            eta,
            message: None,
        }
    }

    pub fn finishing(message: impl Into<String>) -> Self {
        Self {
            phase: ProgressPhase::Finishing,
            percent: None,
            speed: None,
            eta: None,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            phase: ProgressPhase::Error,
            percent: None,
            speed: None,
            eta: None,
            message: Some(message.into()),
        }
    }
}

/// Which kind of session a duplicate start request collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    Playback,

    Download,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Playback => f.write_str("playback"),
            SessionKind::Download => f.write_str("download"),
        }
    }
}

/// Playback session state machine: Idle -> Starting -> Running -> Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,

    /// Stream resolution / player spawn in flight
    Starting,

    Running,
}

/// Download session state machine: Idle -> Running -> Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    Idle,

    Running,
}

/// Application error types

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Player executable '{0}' not found. Please install mpv and make sure it is on PATH")]
    PlayerNotFound(String),

    #[error("No playable stream found: {0}")]
    NoStreamFound(String),

    #[error("A {0} session is already active")]
    AlreadyActive(SessionKind),

    #[error("Nothing is currently playing")]
    NothingPlaying,

    #[error("Unsupported format '{0}'. Please choose 'mp3' or 'mp4'")]
    UnsupportedFormat(String),

    #[error("Download failed: {0}")]
    Download(String),
}

/// Result type alias for application operations

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_format_parsing() {
        assert_eq!("mp3".parse::<MediaFormat>().unwrap(), MediaFormat::Mp3);
        assert_eq!("mp4".parse::<MediaFormat>().unwrap(), MediaFormat::Mp4);
        assert_eq!(" MP3 ".parse::<MediaFormat>().unwrap(), MediaFormat::Mp3);

        assert!(matches!(
            "flac".parse::<MediaFormat>(),
            Err(AppError::UnsupportedFormat(token)) if token == "flac"
        ));
        assert!("".parse::<MediaFormat>().is_err());
        assert!("mp5".parse::<MediaFormat>().is_err());
    }

    #[test]
    fn test_media_format_extension() {
        assert_eq!(MediaFormat::Mp3.extension(), "mp3");
        assert_eq!(MediaFormat::Mp4.extension(), "mp4");
        assert_eq!(MediaFormat::Mp4.to_string(), "mp4");
    }

    #[test]
    fn test_progress_event_constructors() {
        let tick = ProgressEvent::downloading(
            Some("45.2%".to_string()),
            Some("1.20MiB/s".to_string()),
            Some("00:31".to_string()),
        );
        assert_eq!(tick.phase, ProgressPhase::Downloading);
        assert!(tick.message.is_none());

        let done = ProgressEvent::finishing("Converting to mp3");
        assert_eq!(done.phase, ProgressPhase::Finishing);
        assert_eq!(done.message.as_deref(), Some("Converting to mp3"));

        let err = ProgressEvent::error("network unreachable");
        assert_eq!(err.phase, ProgressPhase::Error);
    }

    #[test]
    fn test_error_messages_are_user_facing() {
        assert_eq!(
            AppError::AlreadyActive(SessionKind::Download).to_string(),
            "A download session is already active"
        );
        assert!(AppError::UnsupportedFormat("wav".into())
            .to_string()
            .contains("'wav'"));
    }
}
