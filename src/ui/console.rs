//! Interactive console front end
//!
//! A line-oriented loop: free-text search, numbered results, then selection
//! tokens of the form `<index>[p|d]` (play is the default action), `s` to
//! stop playback, `b` to go back to the search prompt and `q` to quit.
//! While the loop waits for input it drains the supervisor's event channel,
//! so playback and download status lines appear as they happen.

use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use crate::core::models::{AppError, AppResult, ProgressPhase, TrackDescriptor};
use crate::core::provider::MediaProvider;
use crate::core::supervisor::{ProcessSupervisor, SupervisorEvent};

const SELECTION_PROMPT: &str =
    "Enter the number of the song to (p)lay or (d)ownload, 's' to stop playback, 'b' to go back, or 'q' to quit: ";

const INVALID_INPUT: &str =
    "Invalid input. Please enter a number followed by 'p' or 'd', 'b' to go back, or 'q' to quit.";

/// What one selection token asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    Play(usize),
    Download(usize),
    StopPlayback,
    Back,
    Quit,
}

pub struct ConsoleUi {
    supervisor: ProcessSupervisor,
    provider: Arc<dyn MediaProvider>,
    events: UnboundedReceiver<SupervisorEvent>,
    max_results: usize,
}

impl ConsoleUi {
    pub fn new(
        supervisor: ProcessSupervisor,
        provider: Arc<dyn MediaProvider>,
        events: UnboundedReceiver<SupervisorEvent>,
        max_results: usize,
    ) -> Self {
        Self {
            supervisor,
            provider,
            events,
            max_results,
        }
    }

    pub async fn run(mut self) -> AppResult<()> {
        print_banner();
        let mut input = BufReader::new(tokio::io::stdin()).lines();

        'search: loop {
            prompt("\nEnter your music search query (or 'q' to quit): ");
            let Some(line) = self.next_line(&mut input).await? else {
                break;
            };
            let query = line.trim().to_string();
            if query.is_empty() {
                continue;
            }
            if query.eq_ignore_ascii_case("q") {
                break;
            }

            println!("Searching for '{}'...", query);
            let tracks = search_or_empty(self.provider.as_ref(), &query, self.max_results).await;
            if tracks.is_empty() {
                println!("No music found for your query. Please try a different search term.");
                continue;
            }
            render_results(&tracks);

            loop {
                prompt(SELECTION_PROMPT);
                let Some(line) = self.next_line(&mut input).await? else {
                    break 'search;
                };
                match parse_selection(&line, tracks.len()) {
                    Err(message) => println!("{}", message),
                    Ok(Selection::Quit) => break 'search,
                    Ok(Selection::Back) => {
                        println!("Going back to search.");
                        continue 'search;
                    }
                    Ok(Selection::StopPlayback) => {
                        if let Err(e) = self.supervisor.stop_playback() {
                            println!("{}", e);
                        }
                    }
                    Ok(Selection::Play(index)) => {
                        let track = &tracks[index];
                        match self.supervisor.start_playback(track).await {
                            Ok(_) => println!("Playing: {}", track.title),
                            Err(e) => println!("{}", e),
                        }
                    }
                    Ok(Selection::Download(index)) => {
                        prompt("Download format (mp3/mp4) [mp3]: ");
                        let Some(line) = self.next_line(&mut input).await? else {
                            break 'search;
                        };
                        let token = match line.trim() {
                            "" => "mp3".to_string(),
                            other => other.to_string(),
                        };
                        let track = &tracks[index];
                        match self.supervisor.start_download(track, &token).await {
                            Ok(_) => println!("Downloading {}: {}", token, track.title),
                            Err(e) => println!("{}", e),
                        }
                    }
                }
            }
        }

        println!("Exiting {}. Goodbye!", crate::NAME);
        Ok(())
    }

    /// Wait for the next input line, rendering supervisor events meanwhile
    async fn next_line(
        &mut self,
        input: &mut Lines<BufReader<Stdin>>,
    ) -> AppResult<Option<String>> {
        loop {
            tokio::select! {
                line = input.next_line() => return Ok(line?),
                event = self.events.recv() => match event {
                    Some(event) => render_event(&event),
                    // Channel closed: fall back to plain input handling.
                    None => return Ok(input.next_line().await?),
                },
            }
        }
    }
}

/// Run a search, reporting failures and treating them as zero results
pub(crate) async fn search_or_empty(
    provider: &dyn MediaProvider,
    query: &str,
    limit: usize,
) -> Vec<TrackDescriptor> {
    match provider.search(query, limit).await {
        Ok(tracks) => tracks,
        Err(e) => {
            let err = AppError::Search(e.to_string());
            warn!("{}", err);
            println!("{}", err);
            Vec::new()
        }
    }
}

/// Parse one selection token against the displayed result count
pub(crate) fn parse_selection(input: &str, result_count: usize) -> Result<Selection, String> {
    let token = input.trim().to_ascii_lowercase();
    match token.as_str() {
        "" => return Err("Please enter a selection.".to_string()),
        "q" => return Ok(Selection::Quit),
        "b" => return Ok(Selection::Back),
        "s" => return Ok(Selection::StopPlayback),
        _ => {}
    }

    let (number, download) = if let Some(rest) = token.strip_suffix('p') {
        (rest, false)
    } else if let Some(rest) = token.strip_suffix('d') {
        (rest, true)
    } else {
        (token.as_str(), false)
    };

    let index: usize = number
        .trim()
        .parse()
        .map_err(|_| INVALID_INPUT.to_string())?;
    if index < 1 || index > result_count {
        return Err(format!(
            "Invalid choice. Please enter a number between 1 and {}, or 'b'/'q'.",
            result_count
        ));
    }

    Ok(if download {
        Selection::Download(index - 1)
    } else {
        Selection::Play(index - 1)
    })
}

fn print_banner() {
    println!("Welcome to {} v{}!", crate::NAME, crate::VERSION);
    println!("---------------------------------------");
    println!("Note: playback requires 'mpv' and search/download require 'yt-dlp'.");
    println!("      FFmpeg is needed for mp3/mp4 conversion during download.");
    println!("---------------------------------------");
}

fn render_results(tracks: &[TrackDescriptor]) {
    println!("\n--- Search Results ---");
    for (i, track) in tracks.iter().enumerate() {
        println!("{}. {}", i + 1, track.title);
    }
    println!("----------------------");
}

fn render_event(event: &SupervisorEvent) {
    match event {
        SupervisorEvent::PlaybackStarted { .. } | SupervisorEvent::DownloadStarted { .. } => {
            // The command handler already announced these.
        }
        SupervisorEvent::PlaybackFinished { .. } => println!("\nPlayback finished."),
        SupervisorEvent::PlaybackStopped { .. } => println!("\nPlayback stopped."),
        SupervisorEvent::PlaybackFailed { error, .. } => {
            println!("\nPlayback failed: {}", error)
        }
        SupervisorEvent::DownloadProgress { progress, .. } => match progress.phase {
            ProgressPhase::Downloading => println!(
                "Progress: {}, Speed: {}, ETA: {}",
                progress.percent.as_deref().unwrap_or("N/A"),
                progress.speed.as_deref().unwrap_or("N/A"),
                progress.eta.as_deref().unwrap_or("N/A"),
            ),
            ProgressPhase::Finishing => println!(
                "{}",
                progress.message.as_deref().unwrap_or("Processing download...")
            ),
            ProgressPhase::Error => println!(
                "Download error: {}",
                progress.message.as_deref().unwrap_or("unknown error")
            ),
        },
        SupervisorEvent::DownloadFinished { file_path, .. } => match file_path {
            Some(path) => println!("Download complete! Saved to {}", path.display()),
            None => println!("Download complete! Check your downloads directory."),
        },
        // The supervisor's error string is already a full user-facing message.
        SupervisorEvent::DownloadFailed { error, .. } => println!("\n{}", error),
    }
}

fn prompt(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::{DownloadRequest, ProgressSink, ProviderError};
    use async_trait::async_trait;
    use std::path::PathBuf;

    #[test]
    fn test_parse_selection_defaults_to_play() {
        assert_eq!(parse_selection("2", 3), Ok(Selection::Play(1)));
        assert_eq!(parse_selection(" 1 ", 3), Ok(Selection::Play(0)));
    }

    #[test]
    fn test_parse_selection_explicit_actions() {
        assert_eq!(parse_selection("2p", 3), Ok(Selection::Play(1)));
        assert_eq!(parse_selection("3d", 3), Ok(Selection::Download(2)));
        assert_eq!(parse_selection("1D", 3), Ok(Selection::Download(0)));
    }

    #[test]
    fn test_parse_selection_control_tokens() {
        assert_eq!(parse_selection("b", 3), Ok(Selection::Back));
        assert_eq!(parse_selection("q", 3), Ok(Selection::Quit));
        assert_eq!(parse_selection("s", 3), Ok(Selection::StopPlayback));
        assert_eq!(parse_selection("B", 3), Ok(Selection::Back));
    }

    #[test]
    fn test_parse_selection_out_of_range() {
        assert!(parse_selection("0", 3).is_err());
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("4d", 3).is_err());
    }

    #[test]
    fn test_parse_selection_garbage() {
        assert!(parse_selection("", 3).is_err());
        assert!(parse_selection("xp", 3).is_err());
        assert!(parse_selection("p", 3).is_err());
        assert!(parse_selection("play 2", 3).is_err());
    }

    struct FailingProvider;

    #[async_trait]
    impl MediaProvider for FailingProvider {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<TrackDescriptor>, ProviderError> {
            Err(ProviderError::Failed {
                tool: "stub".to_string(),
                status: "exit 1".to_string(),
                detail: "network unreachable".to_string(),
            })
        }

        async fn resolve_stream(
            &self,
            _reference: &str,
        ) -> Result<Option<String>, ProviderError> {
            Ok(None)
        }

        async fn download(
            &self,
            _request: DownloadRequest,
            _progress: ProgressSink,
        ) -> Result<Option<PathBuf>, ProviderError> {
            Err(ProviderError::Failed {
                tool: "stub".to_string(),
                status: "exit 1".to_string(),
                detail: "not implemented".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_search_failure_becomes_zero_results() {
        let results = search_or_empty(&FailingProvider, "lofi beats", 10).await;
        assert!(results.is_empty());
    }
}
