// Session transport: owns exactly one WebSocket connection per session.
//
// Binary frames are raw little-endian 16-bit PCM; message boundaries are
// frame boundaries. Control messages are JSON text. Incoming events are
// forwarded to the session in arrival order -- the state machine relies on
// that ordering for the partial/final transcript contract.

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::audio::encoder;
use crate::protocol::ControlMessage;

/// Events surfaced to the session, in arrival order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A complete text message from the server (raw JSON).
    Message(String),
    /// Transport-level failure; the connection is no longer usable.
    Error(String),
    /// The server closed the connection.
    Closed,
}

enum Outbound {
    Frame(Vec<u8>),
    Control(String),
    Close,
}

/// One bidirectional streaming connection.
///
/// A successful [`SessionTransport::connect`] is the "opened" event; after
/// that the writer task owns the sink and the reader task forwards server
/// messages until error or close.
pub struct SessionTransport {
    outbound: mpsc::Sender<Outbound>,
    open: Arc<AtomicBool>,
}

impl SessionTransport {
    /// Connect to the recognizer. Returns the transport plus the ordered
    /// event stream for this session.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        info!("Connecting to {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .context("Failed to connect to transcription server")?;

        info!("Connected successfully");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let open = Arc::new(AtomicBool::new(true));
        let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(256);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(256);

        // Writer task: sole owner of the sink.
        let open_writer = Arc::clone(&open);
        tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                match outbound {
                    Outbound::Frame(bytes) => {
                        if !open_writer.load(Ordering::SeqCst) {
                            continue;
                        }
                        if ws_tx.send(Message::Binary(bytes.into())).await.is_err() {
                            open_writer.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                    Outbound::Control(text) => {
                        if !open_writer.load(Ordering::SeqCst) {
                            continue;
                        }
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            open_writer.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                    Outbound::Close => {
                        open_writer.store(false, Ordering::SeqCst);
                        let _ = ws_tx.close().await;
                        break;
                    }
                }
            }
            debug!("Transport writer task finished");
        });

        // Reader task: forwards server messages in arrival order.
        let open_reader = Arc::clone(&open);
        tokio::spawn(async move {
            while let Some(incoming) = ws_rx.next().await {
                match incoming {
                    Ok(Message::Text(text)) => {
                        if event_tx
                            .send(TransportEvent::Message(text.to_string()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        if let Some(frame) = frame {
                            info!("Server closed connection: {} {}", frame.code, frame.reason);
                        } else {
                            info!("Server closed connection");
                        }
                        open_reader.store(false, Ordering::SeqCst);
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        return;
                    }
                    Ok(_) => continue, // ping/pong/binary: nothing to dispatch
                    Err(e) => {
                        warn!("Transport error: {}", e);
                        open_reader.store(false, Ordering::SeqCst);
                        let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                        return;
                    }
                }
            }
            // Stream ended without a close frame.
            open_reader.store(false, Ordering::SeqCst);
            let _ = event_tx.send(TransportEvent::Closed).await;
            debug!("Transport reader task finished");
        });

        Ok((
            Self {
                outbound: out_tx,
                open,
            },
            event_rx,
        ))
    }

    /// Send one PCM frame as a binary message. Silently dropped when the
    /// connection is not open -- stale audio is never queued.
    pub fn send_frame(&self, samples: &[i16]) {
        if !self.open.load(Ordering::SeqCst) {
            return;
        }
        let bytes = encoder::frame_to_le_bytes(samples);
        if self.outbound.try_send(Outbound::Frame(bytes)).is_err() {
            debug!("Outbound channel saturated, dropped a frame");
        }
    }

    /// Send a control message. Delivered exactly once, in order with any
    /// frames already queued.
    pub async fn send_control(&self, message: &ControlMessage) -> Result<()> {
        let text = serde_json::to_string(message).context("Failed to encode control message")?;
        self.outbound
            .send(Outbound::Control(text))
            .await
            .context("Transport is closed")?;
        Ok(())
    }

    /// Close the connection. Safe to call more than once.
    pub async fn close(&self) {
        let _ = self.outbound.send(Outbound::Close).await;
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
