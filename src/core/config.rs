//! Application configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub player: PlayerConfig,
    pub download: DownloadConfig,
    pub ytdlp: YtDlpConfig,
}

/// Search-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum number of results fetched per query
    pub max_results: usize,
}

/// External player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Player executable, resolved via PATH
    pub binary: String,
    /// Extra arguments appended after the audio-only flags
    pub extra_args: Vec<String>,
}

/// Download output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory downloaded files land in, created on demand
    pub output_directory: PathBuf,
}

/// Extraction tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpConfig {
    /// Extractor executable, resolved via PATH
    pub binary: String,
    /// Target bitrate for audio extraction, e.g. "192K"
    pub audio_bitrate: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            player: PlayerConfig::default(),
            download: DownloadConfig::default(),
            ytdlp: YtDlpConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results: 10 }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: "mpv".to_string(),
            extra_args: vec![],
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("downloads"),
        }
    }
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            audio_bitrate: "192K".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file, creating default if not exists
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: AppConfig =
                serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;

            tracing::info!("Loaded configuration from: {:?}", config_path);
            Ok(config)
        } else {
            let config = Self::default();
            config.save()?;
            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved configuration to: {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "tunedeck", "tunedeck")
            .with_context(|| "Failed to get project directories")?;

        let config_dir = project_dirs.config_dir();
        Ok(config_dir.join("config.json"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.search.max_results == 0 {
            anyhow::bail!("search.max_results must be greater than 0");
        }
        if self.player.binary.trim().is_empty() {
            anyhow::bail!("player.binary must not be empty");
        }
        if self.ytdlp.binary.trim().is_empty() {
            anyhow::bail!("ytdlp.binary must not be empty");
        }
        if self.ytdlp.audio_bitrate.trim().is_empty() {
            anyhow::bail!("ytdlp.audio_bitrate must not be empty");
        }
        if self.download.output_directory.as_os_str().is_empty() {
            anyhow::bail!("download.output_directory must not be empty");
        }
        Ok(())
    }

    /// Load configuration, falling back to defaults on any problem
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => {
                if let Err(err) = cfg.validate() {
                    tracing::warn!(
                        "Invalid configuration detected ({}), falling back to defaults",
                        err
                    );
                    Self::default()
                } else {
                    cfg
                }
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to load configuration from disk: {}. Using defaults",
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.player.binary, "mpv");
        assert_eq!(config.ytdlp.binary, "yt-dlp");
        assert_eq!(config.download.output_directory, PathBuf::from("downloads"));
    }

    #[test]
    fn test_validate_rejects_zero_results() {
        let mut config = AppConfig::default();
        config.search.max_results = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_binaries() {
        let mut config = AppConfig::default();
        config.player.binary = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ytdlp.binary = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.search.max_results, config.search.max_results);
        assert_eq!(parsed.ytdlp.audio_bitrate, config.ytdlp.audio_bitrate);
    }
}
