//! Collaborator boundary for search and media fetching
//!
//! The supervisor and the console never talk to yt-dlp directly; they go
//! through the `MediaProvider` trait so tests can swap in a stub that records
//! its calls.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::models::{MediaFormat, ProgressEvent, TrackDescriptor};

/// Progress callback handed to a running download
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Everything the fetcher needs to know about one download
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub title: String,

    /// Watch-page URL of the track
    pub reference: String,

    pub format: MediaFormat,

    pub output_dir: PathBuf,
}

/// Errors surfaced by the external search/extraction tool
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {detail}")]
    Failed {
        tool: String,
        status: String,
        detail: String,
    },

    #[error("unreadable {tool} output: {detail}")]
    Parse { tool: String, detail: String },
}

/// External search / stream-resolution / media-fetch capability
///
/// The production implementation shells out to yt-dlp; everything here is a
/// blocking round trip from the caller's point of view and must therefore run
/// off the UI task.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Free-text search returning an ordered list of track descriptors.
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError>;

    /// Resolve a directly playable stream URL (audio-only preference).
    /// `Ok(None)` means the reference has nothing playable.
    async fn resolve_stream(&self, reference: &str) -> Result<Option<String>, ProviderError>;

    /// Fetch and convert one track into `request.output_dir`, emitting
    /// progress ticks through `progress` in the order they occur. Returns
    /// the destination path when the tool reported one.
    async fn download(
        &self,
        request: DownloadRequest,
        progress: ProgressSink,
    ) -> Result<Option<PathBuf>, ProviderError>;
}
