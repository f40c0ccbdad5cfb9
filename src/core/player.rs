//! External audio player process boundary
//!
//! Playback is delegated to mpv launched as a child process with audio-only
//! flags; the only channel back is the exit status. The trait seam exists so
//! the supervisor tests can run against a fake process instead of mpv.

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::core::config::PlayerConfig;

/// How a player process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerExit {
    /// Process exited with status zero
    Clean,

    /// Process exited abnormally (non-zero status or killed)
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("player executable '{0}' not found")]
    NotFound(String),

    #[error("failed to launch player: {0}")]
    Io(#[from] std::io::Error),
}

/// A running playback child process, exclusively owned by its waiter
#[async_trait]
pub trait PlayerProcess: Send {
    /// Block until the process exits.
    async fn wait(&mut self) -> std::io::Result<PlayerExit>;

    /// Request termination without waiting for the exit.
    fn terminate(&mut self) -> std::io::Result<()>;
}

/// Launches playback processes for a resolved stream URL
#[async_trait]
pub trait PlayerBackend: Send + Sync {
    async fn spawn(&self, stream_url: &str) -> Result<Box<dyn PlayerProcess>, PlayerError>;
}

/// mpv-based player: audio only, no window, stdio silenced
pub struct MpvPlayer {
    config: PlayerConfig,
}

impl MpvPlayer {
    pub fn new(config: PlayerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PlayerBackend for MpvPlayer {
    async fn spawn(&self, stream_url: &str) -> Result<Box<dyn PlayerProcess>, PlayerError> {
        debug!(binary = %self.config.binary, "Launching player process");

        let child = Command::new(&self.config.binary)
            .arg("--no-video")
            .arg("--force-window=no")
            .args(&self.config.extra_args)
            .arg(stream_url)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PlayerError::NotFound(self.config.binary.clone())
                } else {
                    PlayerError::Io(e)
                }
            })?;

        Ok(Box::new(MpvProcess { child }))
    }
}

struct MpvProcess {
    child: Child,
}

#[async_trait]
impl PlayerProcess for MpvProcess {
    async fn wait(&mut self) -> std::io::Result<PlayerExit> {
        let status = self.child.wait().await?;
        if status.success() {
            Ok(PlayerExit::Clean)
        } else {
            Ok(PlayerExit::Error(format!("player exited with {}", status)))
        }
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_player_binary_maps_to_not_found() {
        let player = MpvPlayer::new(PlayerConfig {
            binary: "definitely-not-an-installed-player".to_string(),
            extra_args: vec![],
        });

        let err = match player.spawn("https://example.com/stream").await {
            Ok(_) => panic!("expected spawn to fail for missing binary"),
            Err(e) => e,
        };
        assert!(matches!(
            err,
            PlayerError::NotFound(binary) if binary == "definitely-not-an-installed-player"
        ));
    }
}
