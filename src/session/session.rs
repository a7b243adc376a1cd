use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::machine::{SessionAction, SessionStateMachine};
use super::state::SessionSnapshot;
use crate::audio::{AudioCapture, AudioCaptureFactory, AudioFrame, CaptureConfig};
use crate::config::Config;
use crate::history::{HistoryRecord, HistoryStore};
use crate::protocol::{ControlMessage, Language};
use crate::transport::{SessionTransport, TransportEvent};

/// One transcription session end to end: capture, transport, state machine
/// and history, with snapshots published for the presentation layer.
///
/// Two executions coexist while streaming: the capture thread producing
/// frames, and the control tasks here that own all externally visible
/// state. Frames cross over through a non-blocking channel.
pub struct Session {
    server_url: String,

    /// Capture backend; exclusive owner of the audio device handle.
    capture: Arc<Mutex<Box<dyn AudioCapture>>>,

    /// Transport for the active session, if connected.
    transport: Arc<Mutex<Option<Arc<SessionTransport>>>>,

    /// Protocol state machine; sole writer of transcript/entity/status state.
    machine: Arc<Mutex<SessionStateMachine>>,

    /// Durable bounded history of completed sessions.
    history: Arc<Mutex<HistoryStore>>,

    /// Gate for the frame forwarding task. Cleared on stop so frames
    /// already buffered in flight are discarded, not sent.
    forwarding: Arc<AtomicBool>,

    snapshot_tx: watch::Sender<SessionSnapshot>,

    forward_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    event_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self> {
        let capture_config = CaptureConfig {
            sample_rate: config.audio.sample_rate,
            channels: config.audio.channels,
            echo_cancellation: config.audio.echo_cancellation,
            noise_suppression: config.audio.noise_suppression,
        };

        let capture = AudioCaptureFactory::create(capture_config)
            .context("Failed to create capture backend")?;

        let history =
            HistoryStore::open(&config.history.path).context("Failed to open history store")?;

        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());

        Ok(Self {
            server_url: config.server.url.trim_end_matches('/').to_string(),
            capture: Arc::new(Mutex::new(capture)),
            transport: Arc::new(Mutex::new(None)),
            machine: Arc::new(Mutex::new(SessionStateMachine::new())),
            history: Arc::new(Mutex::new(history)),
            forwarding: Arc::new(AtomicBool::new(false)),
            snapshot_tx,
            forward_task: Arc::new(Mutex::new(None)),
            event_task: Arc::new(Mutex::new(None)),
        })
    }

    /// Subscribe to state snapshots. The receiver always holds the latest
    /// view; intermediate states may be skipped under load.
    pub fn snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Start a session: connect, then bring the capture device live, then
    /// stream. A no-op while a session is already active.
    pub async fn start(&self, language: Language) -> Result<()> {
        {
            let mut machine = self.machine.lock().await;
            if !machine.start(language) {
                return Ok(());
            }
            self.snapshot_tx.send_replace(machine.snapshot());
        }

        self.reap_tasks().await;

        let url = format!("{}/speech/{}", self.server_url, language.as_str());
        info!("Starting session for language '{}'", language);

        let (transport, events) = match SessionTransport::connect(&url).await {
            Ok(pair) => pair,
            Err(e) => {
                error!("Session connect failed: {:#}", e);
                let mut machine = self.machine.lock().await;
                machine.on_transport_error(&e.to_string());
                self.snapshot_tx.send_replace(machine.snapshot());
                return Ok(());
            }
        };

        let transport = Arc::new(transport);
        *self.transport.lock().await = Some(Arc::clone(&transport));

        {
            let mut machine = self.machine.lock().await;
            machine.on_connected();
            self.snapshot_tx.send_replace(machine.snapshot());
        }

        // The device must be live before any frame is sent.
        let frame_rx = match self.capture.lock().await.start().await {
            Ok(rx) => rx,
            Err(e) => {
                error!("Capture start failed: {:#}", e);
                let actions = {
                    let mut machine = self.machine.lock().await;
                    let actions = machine.on_device_error(&e.to_string());
                    self.snapshot_tx.send_replace(machine.snapshot());
                    actions
                };
                execute_actions(
                    actions,
                    &self.capture,
                    &transport,
                    &self.history,
                    &self.forwarding,
                )
                .await;
                return Ok(());
            }
        };

        self.forwarding.store(true, Ordering::SeqCst);

        self.spawn_forward_task(frame_rx, Arc::clone(&transport))
            .await;
        self.spawn_event_task(events, transport).await;

        info!("Session streaming");

        Ok(())
    }

    /// Stop the active session. Capture is released immediately, buffered
    /// frames are discarded, and the end-of-stream signal is sent over the
    /// still-open transport. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        let actions = {
            let mut machine = self.machine.lock().await;
            let actions = machine.stop();
            self.snapshot_tx.send_replace(machine.snapshot());
            actions
        };

        if actions.is_empty() {
            debug!("Stop requested with no active stream");
            return Ok(());
        }

        info!("Stopping session");

        let transport = self.transport.lock().await.clone();
        if let Some(transport) = transport {
            execute_actions(
                actions,
                &self.capture,
                &transport,
                &self.history,
                &self.forwarding,
            )
            .await;
        }

        Ok(())
    }

    /// Local-only entity edit: append a term post-completion.
    pub async fn add_term(&self, category: &str, value: &str) {
        let mut machine = self.machine.lock().await;
        machine.add_term(category, value);
        self.snapshot_tx.send_replace(machine.snapshot());
    }

    /// Local-only entity edit: remove the first matching term post-completion.
    pub async fn remove_term(&self, category: &str, value: &str) {
        let mut machine = self.machine.lock().await;
        machine.remove_term(category, value);
        self.snapshot_tx.send_replace(machine.snapshot());
    }

    /// Completed sessions, newest first.
    pub async fn history_records(&self) -> Vec<HistoryRecord> {
        self.history.lock().await.records().to_vec()
    }

    /// Delete one history record by id.
    pub async fn remove_history_record(&self, id: &str) -> Result<()> {
        self.history.lock().await.remove(id)
    }

    /// Delete all history records.
    pub async fn clear_history(&self) -> Result<()> {
        self.history.lock().await.clear()
    }

    async fn spawn_forward_task(
        &self,
        frame_rx: mpsc::Receiver<AudioFrame>,
        transport: Arc<SessionTransport>,
    ) {
        let forwarding = Arc::clone(&self.forwarding);

        let task = tokio::spawn(async move {
            debug!("Frame forwarding task started");
            forward_frames(frame_rx, forwarding, move |samples| {
                transport.send_frame(samples);
            })
            .await;
            debug!("Frame forwarding task stopped");
        });

        *self.forward_task.lock().await = Some(task);
    }

    async fn spawn_event_task(
        &self,
        mut events: mpsc::Receiver<TransportEvent>,
        transport: Arc<SessionTransport>,
    ) {
        let machine = Arc::clone(&self.machine);
        let capture = Arc::clone(&self.capture);
        let history = Arc::clone(&self.history);
        let forwarding = Arc::clone(&self.forwarding);
        let snapshot_tx = self.snapshot_tx.clone();

        let task = tokio::spawn(async move {
            debug!("Transport event task started");
            while let Some(event) = events.recv().await {
                let actions = {
                    let mut machine = machine.lock().await;
                    let actions = match event {
                        TransportEvent::Message(raw) => machine.on_raw_message(&raw),
                        TransportEvent::Error(e) => machine.on_transport_error(&e),
                        TransportEvent::Closed => machine.on_transport_closed(),
                    };
                    snapshot_tx.send_replace(machine.snapshot());
                    actions
                };

                execute_actions(actions, &capture, &transport, &history, &forwarding).await;
            }
            debug!("Transport event task stopped");
        });

        *self.event_task.lock().await = Some(task);
    }

    /// Clear out tasks and transport left over from a previous cycle.
    async fn reap_tasks(&self) {
        for slot in [&self.forward_task, &self.event_task] {
            if let Some(task) = slot.lock().await.take() {
                task.abort();
            }
        }
        *self.transport.lock().await = None;
    }
}

/// Forward captured frames until the gate clears or the capture channel
/// closes. The gate is checked per frame, so frames already buffered when
/// it clears are discarded rather than sent.
pub async fn forward_frames(
    mut frame_rx: mpsc::Receiver<AudioFrame>,
    forwarding: Arc<AtomicBool>,
    mut send: impl FnMut(&[i16]),
) {
    while let Some(frame) = frame_rx.recv().await {
        if !forwarding.load(Ordering::SeqCst) {
            break;
        }
        send(&frame.samples);
    }
}

/// Apply the side effects requested by a state transition. Device release
/// comes first so microphone access is never held longer than needed; every
/// step tolerates being invoked twice.
async fn execute_actions(
    actions: Vec<SessionAction>,
    capture: &Arc<Mutex<Box<dyn AudioCapture>>>,
    transport: &Arc<SessionTransport>,
    history: &Arc<Mutex<HistoryStore>>,
    forwarding: &Arc<AtomicBool>,
) {
    for action in actions {
        match action {
            SessionAction::StopCapture => {
                forwarding.store(false, Ordering::SeqCst);
                if let Err(e) = capture.lock().await.stop().await {
                    error!("Failed to stop capture: {:#}", e);
                }
            }
            SessionAction::SendEndStream => {
                if let Err(e) = transport.send_control(&ControlMessage::EndStream).await {
                    warn!("Failed to send end-of-stream: {:#}", e);
                }
            }
            SessionAction::CloseTransport => {
                transport.close().await;
            }
            SessionAction::Persist(record) => {
                if let Err(e) = history.lock().await.append(record) {
                    error!("Failed to persist session history: {:#}", e);
                }
            }
        }
    }
}
