//! yt-dlp backed media provider
//!
//! Shells out to the yt-dlp binary for search, stream resolution and
//! downloading. Downloads stream their stdout line by line; a fixed
//! `--progress-template` makes the progress lines machine-parseable and
//! post-processor lines reveal the destination path.

use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::config::YtDlpConfig;
use crate::core::models::{MediaFormat, ProgressEvent, TrackDescriptor};
use crate::core::provider::{DownloadRequest, MediaProvider, ProgressSink, ProviderError};

/// Marker prepended by our progress template so progress lines cannot be
/// confused with ordinary yt-dlp output
const PROGRESS_MARKER: &str = "tunedeck|";

/// Template yielding `tunedeck|<percent>|<speed>|<eta>` per tick
const PROGRESS_TEMPLATE: &str =
    "download:tunedeck|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s";

/// How many trailing stderr lines are kept for error reports
const STDERR_TAIL: usize = 5;

pub struct YtDlpProvider {
    config: YtDlpConfig,
    destination_re: Regex,
    merger_re: Regex,
}

impl YtDlpProvider {
    pub fn new(config: YtDlpConfig) -> Self {
        Self {
            config,
            // "[download] Destination: ..." and post-processor variants
            destination_re: Regex::new(
                r#"^\[(?:download|ExtractAudio|VideoConvertor)\] Destination: (.+)$"#,
            )
            .expect("destination regex is valid"),
            merger_re: Regex::new(r#"^\[Merger\] Merging formats into "(.+)"$"#)
                .expect("merger regex is valid"),
        }
    }

    fn launch_error(&self, source: std::io::Error) -> ProviderError {
        ProviderError::Launch {
            tool: self.config.binary.clone(),
            source,
        }
    }

    fn failure(&self, status: String, detail: String) -> ProviderError {
        ProviderError::Failed {
            tool: self.config.binary.clone(),
            status,
            detail,
        }
    }

    /// Parse one progress-template line; `None` for anything else
    fn parse_progress_line(&self, line: &str) -> Option<ProgressEvent> {
        let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
        let mut fields = rest.split('|');
        let percent = clean_field(fields.next());
        let speed = clean_field(fields.next());
        let eta = clean_field(fields.next());
        Some(ProgressEvent::downloading(percent, speed, eta))
    }

    /// Extract a destination path from download/post-processor lines
    fn parse_destination(&self, line: &str) -> Option<PathBuf> {
        let line = line.trim();
        if let Some(caps) = self.destination_re.captures(line) {
            return Some(PathBuf::from(caps.get(1)?.as_str()));
        }
        if let Some(caps) = self.merger_re.captures(line) {
            return Some(PathBuf::from(caps.get(1)?.as_str()));
        }
        None
    }

    /// Post-processing has begun once one of these stages reports
    fn is_postprocess_line(&self, line: &str) -> bool {
        let line = line.trim();
        line.starts_with("[ExtractAudio]")
            || line.starts_with("[VideoConvertor]")
            || line.starts_with("[Merger]")
    }

    /// Format-specific yt-dlp arguments (original player semantics:
    /// mp3 = best audio + extraction at a fixed bitrate, mp4 = best
    /// video+audio normalized into an mp4 container)
    fn format_args(&self, format: MediaFormat) -> Vec<String> {
        match format {
            MediaFormat::Mp3 => vec![
                "-f".into(),
                "bestaudio/best".into(),
                "--extract-audio".into(),
                "--audio-format".into(),
                "mp3".into(),
                "--audio-quality".into(),
                self.config.audio_bitrate.clone(),
            ],
            MediaFormat::Mp4 => vec![
                "-f".into(),
                "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".into(),
                "--recode-video".into(),
                "mp4".into(),
            ],
        }
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ProviderError> {
        let target = format!("ytsearch{}:{}", limit, query);
        debug!(%target, "Running search");

        let output = Command::new(&self.config.binary)
            .args(["--dump-json", "--flat-playlist", "--no-warnings"])
            .arg(&target)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(
                output.status.to_string(),
                stderr.trim().lines().last().unwrap_or("no output").to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut tracks = Vec::new();
        for line in stdout.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(json) => {
                    if let Some(track) = parse_search_entry(&json) {
                        tracks.push(track);
                    }
                }
                Err(e) => warn!("Skipping unparseable search entry: {}", e),
            }
        }

        debug!("Search returned {} results", tracks.len());
        Ok(tracks)
    }

    async fn resolve_stream(&self, reference: &str) -> Result<Option<String>, ProviderError> {
        debug!(%reference, "Resolving direct stream URL");

        let output = Command::new(&self.config.binary)
            .args(["--get-url", "-f", "bestaudio/best", "--no-playlist", "--no-warnings"])
            .arg(reference)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(
                output.status.to_string(),
                stderr.trim().lines().last().unwrap_or("no output").to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string))
    }

    async fn download(
        &self,
        request: DownloadRequest,
        progress: ProgressSink,
    ) -> Result<Option<PathBuf>, ProviderError> {
        let output_template = request
            .output_dir
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned();

        let mut command = Command::new(&self.config.binary);
        command
            .args(self.format_args(request.format))
            .args(["--newline", "--no-playlist", "--no-warnings"])
            .args(["--progress-template", PROGRESS_TEMPLATE])
            .arg("-o")
            .arg(&output_template)
            .arg(&request.reference)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(reference = %request.reference, format = %request.format, "Starting fetch");

        let mut child = command.spawn().map_err(|e| self.launch_error(e))?;

        let stdout = child.stdout.take().ok_or_else(|| ProviderError::Parse {
            tool: self.config.binary.clone(),
            detail: "child stdout was not captured".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ProviderError::Parse {
            tool: self.config.binary.clone(),
            detail: "child stderr was not captured".to_string(),
        })?;

        // Drain stderr concurrently so the child cannot block on a full pipe;
        // keep only the tail for the error report.
        let stderr_task = tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "tunedeck::ytdlp", "stderr: {}", line);
                if tail.len() == STDERR_TAIL {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail
        });

        let mut destination: Option<PathBuf> = None;
        let mut postprocessing = false;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await.map_err(|e| ProviderError::Parse {
            tool: self.config.binary.clone(),
            detail: format!("failed to read output: {}", e),
        })? {
            if let Some(tick) = self.parse_progress_line(&line) {
                progress(tick);
                continue;
            }
            if let Some(path) = self.parse_destination(&line) {
                destination = Some(path);
            }
            if self.is_postprocess_line(&line) && !postprocessing {
                postprocessing = true;
                progress(ProgressEvent::finishing("Processing download..."));
            }
        }

        let status = child.wait().await.map_err(|e| ProviderError::Parse {
            tool: self.config.binary.clone(),
            detail: format!("failed to observe exit: {}", e),
        })?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            progress(ProgressEvent::finishing("Download complete"));
            Ok(destination)
        } else {
            let detail = if stderr_tail.is_empty() {
                "no error output".to_string()
            } else {
                stderr_tail.join("; ")
            };
            Err(self.failure(status.to_string(), detail))
        }
    }
}

/// Empty / placeholder values from the progress template become `None`
fn clean_field(field: Option<&str>) -> Option<String> {
    let value = field?.trim();
    if value.is_empty() || value == "N/A" || value == "NA" || value == "Unknown" {
        None
    } else {
        Some(value.to_string())
    }
}

/// One `--dump-json --flat-playlist` line becomes a track descriptor
fn parse_search_entry(json: &serde_json::Value) -> Option<TrackDescriptor> {
    let id = json["id"].as_str()?;
    let title = json["title"].as_str().unwrap_or("Unknown Title");
    Some(TrackDescriptor::new(
        title,
        id,
        format!("https://www.youtube.com/watch?v={}", id),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ProgressPhase;

    fn provider() -> YtDlpProvider {
        YtDlpProvider::new(YtDlpConfig::default())
    }

    #[test]
    fn test_parse_progress_line_valid() {
        let tick = provider()
            .parse_progress_line("tunedeck|  45.2%|  1.20MiB/s|00:31")
            .unwrap();
        assert_eq!(tick.phase, ProgressPhase::Downloading);
        assert_eq!(tick.percent.as_deref(), Some("45.2%"));
        assert_eq!(tick.speed.as_deref(), Some("1.20MiB/s"));
        assert_eq!(tick.eta.as_deref(), Some("00:31"));
    }

    #[test]
    fn test_parse_progress_line_placeholders() {
        let tick = provider()
            .parse_progress_line("tunedeck|100.0%|Unknown|N/A")
            .unwrap();
        assert_eq!(tick.percent.as_deref(), Some("100.0%"));
        assert!(tick.speed.is_none());
        assert!(tick.eta.is_none());
    }

    #[test]
    fn test_parse_progress_line_rejects_other_output() {
        assert!(provider()
            .parse_progress_line("[download] Destination: downloads/Song.webm")
            .is_none());
        assert!(provider().parse_progress_line("").is_none());
    }

    #[test]
    fn test_parse_destination_variants() {
        let p = provider();
        assert_eq!(
            p.parse_destination("[download] Destination: downloads/Song.webm"),
            Some(PathBuf::from("downloads/Song.webm"))
        );
        assert_eq!(
            p.parse_destination("[ExtractAudio] Destination: downloads/Song.mp3"),
            Some(PathBuf::from("downloads/Song.mp3"))
        );
        assert_eq!(
            p.parse_destination(r#"[Merger] Merging formats into "downloads/Video.mp4""#),
            Some(PathBuf::from("downloads/Video.mp4"))
        );
        assert_eq!(p.parse_destination("[download]  12.3% of 4MiB"), None);
    }

    #[test]
    fn test_postprocess_detection() {
        let p = provider();
        assert!(p.is_postprocess_line("[ExtractAudio] Destination: x.mp3"));
        assert!(p.is_postprocess_line(r#"[Merger] Merging formats into "x.mp4""#));
        assert!(!p.is_postprocess_line("[download] Destination: x.webm"));
    }

    #[test]
    fn test_format_args_mp3() {
        let args = provider().format_args(MediaFormat::Mp3);
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"mp3".to_string()));
        assert!(args.contains(&"192K".to_string()));
    }

    #[test]
    fn test_format_args_mp4() {
        let args = provider().format_args(MediaFormat::Mp4);
        assert!(args.contains(&"--recode-video".to_string()));
        assert!(args
            .iter()
            .any(|a| a.starts_with("bestvideo[ext=mp4]")));
    }

    #[test]
    fn test_parse_search_entry() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"id": "dQw4w9WgXcQ", "title": "Test Song", "duration": 212}"#,
        )
        .unwrap();
        let track = parse_search_entry(&json).unwrap();
        assert_eq!(track.title, "Test Song");
        assert_eq!(track.identifier, "dQw4w9WgXcQ");
        assert_eq!(
            track.reference,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_parse_search_entry_requires_id() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"title": "No id here"}"#).unwrap();
        assert!(parse_search_entry(&json).is_none());

        let json: serde_json::Value =
            serde_json::from_str(r#"{"id": "abc123"}"#).unwrap();
        assert_eq!(parse_search_entry(&json).unwrap().title, "Unknown Title");
    }
}
