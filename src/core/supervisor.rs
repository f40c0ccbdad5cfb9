//! Process supervisor — core lifecycle logic for playback and downloads
//!
//! Owns at most one playback session and one download session per application
//! instance, launches and observes the external player and extraction
//! processes, and relays lifecycle/progress transitions to the presentation
//! layer through a single event channel. Presentation code never touches a
//! process handle directly.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::config::DownloadConfig;
use crate::core::models::{
    AppError, AppResult, DownloadState, MediaFormat, PlaybackState, ProgressEvent, SessionKind,
    TrackDescriptor,
};
use crate::core::player::{PlayerBackend, PlayerError, PlayerExit};
use crate::core::provider::{DownloadRequest, MediaProvider, ProgressSink, ProviderError};

/// Events emitted by the supervisor, drained by the presentation layer
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum SupervisorEvent {
    PlaybackStarted {
        session: u64,
        title: String,
    },
    PlaybackFinished {
        session: u64,
    },
    PlaybackStopped {
        session: u64,
    },
    PlaybackFailed {
        session: u64,
        error: String,
    },
    DownloadStarted {
        session: Uuid,
        title: String,
        format: MediaFormat,
    },
    DownloadProgress {
        session: Uuid,
        progress: ProgressEvent,
    },
    DownloadFinished {
        session: Uuid,
        file_path: Option<PathBuf>,
    },
    DownloadFailed {
        session: Uuid,
        error: String,
    },
}

/// The single playback slot. `session` is a generation id: exit
/// notifications carrying a generation that matches neither the active
/// session nor the recorded stopped one are discarded, so a late exit can
/// never be misattributed to a newer session.
struct PlaybackSlot {
    state: PlaybackState,
    session: u64,
    started_at: Option<DateTime<Utc>>,
    stop_tx: Option<oneshot::Sender<()>>,
    stopping: Option<u64>,
}

impl PlaybackSlot {
    fn reset(&mut self) {
        self.state = PlaybackState::Idle;
        self.started_at = None;
        self.stop_tx = None;
    }
}

/// The single download slot
struct DownloadSlot {
    state: DownloadState,
    session: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    last_progress: Option<ProgressEvent>,
}

impl DownloadSlot {
    fn reset(&mut self) {
        self.state = DownloadState::Idle;
        self.session = None;
        self.started_at = None;
        self.last_progress = None;
    }
}

struct SupervisorState {
    playback: PlaybackSlot,
    download: DownloadSlot,
    next_session: u64,
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self {
            playback: PlaybackSlot {
                state: PlaybackState::Idle,
                session: 0,
                started_at: None,
                stop_tx: None,
                stopping: None,
            },
            download: DownloadSlot {
                state: DownloadState::Idle,
                session: None,
                started_at: None,
                last_progress: None,
            },
            next_session: 0,
        }
    }
}

/// Supervises the external playback and download processes
#[derive(Clone)]
pub struct ProcessSupervisor {
    provider: Arc<dyn MediaProvider>,
    player: Arc<dyn PlayerBackend>,
    download_config: DownloadConfig,
    state: Arc<Mutex<SupervisorState>>,
    events: mpsc::UnboundedSender<SupervisorEvent>,
}

impl ProcessSupervisor {
    /// Create a supervisor and the event receiver its presentation layer
    /// will drain
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        player: Arc<dyn PlayerBackend>,
        download_config: DownloadConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SupervisorEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let supervisor = Self {
            provider,
            player,
            download_config,
            state: Arc::new(Mutex::new(SupervisorState::default())),
            events,
        };
        (supervisor, receiver)
    }

    /// Resolve a playable stream for the track and launch the player.
    ///
    /// Rejected with `AlreadyActive` while a playback session is starting or
    /// running. On success the returned session id identifies the playback
    /// generation in subsequent events.
    pub async fn start_playback(&self, track: &TrackDescriptor) -> AppResult<u64> {
        let session = {
            let mut st = self.state.lock();
            if matches!(
                st.playback.state,
                PlaybackState::Starting | PlaybackState::Running
            ) {
                return Err(AppError::AlreadyActive(SessionKind::Playback));
            }
            st.next_session += 1;
            st.playback.state = PlaybackState::Starting;
            st.playback.session = st.next_session;
            st.playback.started_at = Some(Utc::now());
            st.playback.session
        };

        info!(session, title = %track.title, "Starting playback");

        let stream_url = match self.provider.resolve_stream(&track.reference).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                self.abort_playback_start(session);
                return Err(AppError::NoStreamFound(track.title.clone()));
            }
            Err(e) => {
                self.abort_playback_start(session);
                return Err(AppError::NoStreamFound(format!("{}: {}", track.title, e)));
            }
        };

        let mut process = match self.player.spawn(&stream_url).await {
            Ok(process) => process,
            Err(PlayerError::NotFound(binary)) => {
                self.abort_playback_start(session);
                return Err(AppError::PlayerNotFound(binary));
            }
            Err(PlayerError::Io(e)) => {
                self.abort_playback_start(session);
                return Err(AppError::Io(e));
            }
        };

        let (stop_tx, mut stop_rx) = oneshot::channel();
        {
            let mut st = self.state.lock();
            st.playback.state = PlaybackState::Running;
            st.playback.stop_tx = Some(stop_tx);
        }
        self.emit(SupervisorEvent::PlaybackStarted {
            session,
            title: track.title.clone(),
        });

        // waitPlayback runs off the presentation context so the interface
        // stays responsive; the child handle is owned by this task alone.
        let supervisor = self.clone();
        tokio::spawn(async move {
            let exit = tokio::select! {
                exit = process.wait() => exit,
                stop = &mut stop_rx => {
                    if stop.is_ok() {
                        if let Err(e) = process.terminate() {
                            warn!(session, "Failed to signal player process: {}", e);
                        }
                    }
                    process.wait().await
                }
            };
            supervisor.finish_playback(session, exit);
        });

        Ok(session)
    }

    /// Request termination of the running player process.
    ///
    /// Handle ownership is released immediately; the waiter observes the
    /// actual exit asynchronously and emits `PlaybackStopped`.
    pub fn stop_playback(&self) -> AppResult<()> {
        let (session, stop_tx) = {
            let mut st = self.state.lock();
            if st.playback.state != PlaybackState::Running {
                return Err(AppError::NothingPlaying);
            }
            let session = st.playback.session;
            let stop_tx = st.playback.stop_tx.take();
            st.playback.reset();
            st.playback.stopping = Some(session);
            (session, stop_tx)
        };

        info!(session, "Stopping playback");
        if let Some(tx) = stop_tx {
            let _ = tx.send(());
        }
        Ok(())
    }

    /// Fetch one track into the output directory in the requested format.
    ///
    /// The format token is validated before the collaborator is touched;
    /// rejected with `AlreadyActive` while a download is running. Progress
    /// and the terminal outcome arrive on the event channel; downloads are
    /// not cancellable.
    pub async fn start_download(
        &self,
        track: &TrackDescriptor,
        format_token: &str,
    ) -> AppResult<Uuid> {
        let format: MediaFormat = format_token.parse()?;

        let session = {
            let mut st = self.state.lock();
            if st.download.state == DownloadState::Running {
                return Err(AppError::AlreadyActive(SessionKind::Download));
            }
            let session = Uuid::new_v4();
            st.download.state = DownloadState::Running;
            st.download.session = Some(session);
            st.download.started_at = Some(Utc::now());
            st.download.last_progress = None;
            session
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.download_config.output_directory).await {
            self.reset_download(session);
            return Err(AppError::Io(e));
        }

        info!(%session, title = %track.title, %format, "Starting download");
        self.emit(SupervisorEvent::DownloadStarted {
            session,
            title: track.title.clone(),
            format,
        });

        let request = DownloadRequest {
            title: track.title.clone(),
            reference: track.reference.clone(),
            format,
            output_dir: self.download_config.output_directory.clone(),
        };

        let supervisor = self.clone();
        tokio::spawn(async move {
            let sink: ProgressSink = {
                let supervisor = supervisor.clone();
                Arc::new(move |tick: ProgressEvent| {
                    supervisor.record_download_progress(session, tick)
                })
            };
            let result = supervisor.provider.download(request, sink).await;
            supervisor.finish_download(session, result);
        });

        Ok(session)
    }

    /// Whether a playback session is starting or running
    pub fn is_playing(&self) -> bool {
        matches!(
            self.state.lock().playback.state,
            PlaybackState::Starting | PlaybackState::Running
        )
    }

    /// Whether a download session is running
    pub fn is_downloading(&self) -> bool {
        self.state.lock().download.state == DownloadState::Running
    }

    /// Last progress tick of the active download session, if any
    pub fn last_download_progress(&self) -> Option<ProgressEvent> {
        self.state.lock().download.last_progress.clone()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.state.lock().playback.state
    }

    pub fn download_state(&self) -> DownloadState {
        self.state.lock().download.state
    }

    /// When the current playback session was started, if one is active
    pub fn playback_started_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().playback.started_at
    }

    /// When the current download session was started, if one is active
    pub fn download_started_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().download.started_at
    }

    fn abort_playback_start(&self, session: u64) {
        let mut st = self.state.lock();
        if st.playback.state == PlaybackState::Starting && st.playback.session == session {
            st.playback.reset();
        }
    }

    /// Exit notification from the waiter task. Generations that match
    /// neither the active session nor the recorded stopped one are stale
    /// and must be discarded.
    fn finish_playback(&self, session: u64, exit: std::io::Result<PlayerExit>) {
        let mut st = self.state.lock();

        if st.playback.stopping == Some(session) {
            st.playback.stopping = None;
            drop(st);
            info!(session, "Playback stopped");
            self.emit(SupervisorEvent::PlaybackStopped { session });
            return;
        }

        if st.playback.state == PlaybackState::Running && st.playback.session == session {
            st.playback.reset();
            drop(st);
            match exit {
                Ok(PlayerExit::Clean) => {
                    info!(session, "Playback finished");
                    self.emit(SupervisorEvent::PlaybackFinished { session });
                }
                Ok(PlayerExit::Error(reason)) => {
                    warn!(session, "Playback failed: {}", reason);
                    self.emit(SupervisorEvent::PlaybackFailed {
                        session,
                        error: reason,
                    });
                }
                Err(e) => {
                    error!(session, "Failed to observe player exit: {}", e);
                    self.emit(SupervisorEvent::PlaybackFailed {
                        session,
                        error: e.to_string(),
                    });
                }
            }
            return;
        }

        debug!(session, "Discarding exit notification for stale playback session");
    }

    fn record_download_progress(&self, session: Uuid, tick: ProgressEvent) {
        let mut st = self.state.lock();
        if st.download.state == DownloadState::Running && st.download.session == Some(session) {
            st.download.last_progress = Some(tick.clone());
            drop(st);
            self.emit(SupervisorEvent::DownloadProgress {
                session,
                progress: tick,
            });
        }
    }

    fn finish_download(&self, session: Uuid, result: Result<Option<PathBuf>, ProviderError>) {
        self.reset_download(session);
        match result {
            Ok(file_path) => {
                info!(%session, ?file_path, "Download finished");
                self.emit(SupervisorEvent::DownloadFinished { session, file_path });
            }
            Err(e) => {
                let err = AppError::Download(e.to_string());
                warn!(%session, "{}", err);
                self.emit(SupervisorEvent::DownloadFailed {
                    session,
                    error: err.to_string(),
                });
            }
        }
    }

    fn reset_download(&self, session: Uuid) {
        let mut st = self.state.lock();
        if st.download.session == Some(session) {
            st.download.reset();
        }
    }

    fn emit(&self, event: SupervisorEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver gone; dropping supervisor event");
        }
    }
}
