//! Tunedeck - Core Library
//!
//! Terminal YouTube music player and downloader: catalog search, playback
//! through an external player process and downloads through an external
//! extraction tool, coordinated by a small process supervisor.

pub mod core;
pub mod ui;

// Re-export commonly used types
pub use self::core::{
    config::AppConfig,
    models::{AppError, AppResult, MediaFormat, ProgressEvent, TrackDescriptor},
    player::MpvPlayer,
    provider::MediaProvider,
    supervisor::{ProcessSupervisor, SupervisorEvent},
    ytdlp::YtDlpProvider,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize the tracing subscriber with default settings
pub fn init() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "tunedeck=info");
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok(); // 忽略重复初始化错误

    tracing::info!("🎵 {} v{} initialized", NAME, VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!NAME.is_empty());
    }
}
