//! Connection lifecycle: one persistent channel to the relay with automatic
//! reconnection and a boolean connectivity signal.
//!
//! The front end gates prompt submission on that signal; sending while
//! disconnected fails loudly rather than queueing silently.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use chat_types::event::{ClientEvent, ServerEvent};
use chat_types::{ChatError, Result};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct ConnectionHandle {
    pub(crate) connected: watch::Receiver<bool>,
    pub(crate) events: mpsc::UnboundedReceiver<ServerEvent>,
    outbound: mpsc::UnboundedSender<ClientEvent>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Establish the channel. Returns immediately; the background task keeps
    /// reconnecting until [`shutdown`](Self::shutdown).
    pub fn connect(server_url: &str) -> Result<Self> {
        let url = Url::parse(server_url)
            .map_err(|e| ChatError::Config(format!("invalid server url {server_url}: {e}")))?;

        let (connected_tx, connected) = watch::channel(false);
        let (events_tx, events) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_loop(url, connected_tx, events_tx, outbound_rx));

        Ok(Self {
            connected,
            events,
            outbound,
            task,
        })
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Send an event over the channel. Fails if the channel is not currently
    /// established — a submission attempt while disconnected is a caller
    /// bug, not a condition to absorb.
    pub fn send(&self, event: ClientEvent) -> Result<()> {
        if !self.is_connected() {
            return Err(ChatError::NotConnected);
        }
        self.outbound
            .send(event)
            .map_err(|_| ChatError::Transport("connection task has exited".to_string()))
    }

    /// Tear down the channel. No further events are delivered afterward.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn run_loop(
    url: Url,
    connected_tx: watch::Sender<bool>,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientEvent>,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        let (ws, _) = match connect_async(url.as_str()).await {
            Ok(value) => value,
            Err(err) => {
                log::warn!("connect error: {err}");
                let _ = connected_tx.send(false);
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
                continue;
            }
        };
        backoff = INITIAL_BACKOFF;
        let _ = connected_tx.send(true);
        log::info!("connected to {url}");

        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                out = outbound_rx.recv() => match out {
                    Some(event) => {
                        let text = match serde_json::to_string(&event) {
                            Ok(text) => text,
                            Err(e) => {
                                log::error!("failed to encode event: {e}");
                                continue;
                            }
                        };
                        if sink.send(WsMessage::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // The handle was dropped; close and stop for good.
                    None => {
                        let _ = sink.close().await;
                        let _ = connected_tx.send(false);
                        return;
                    }
                },
                msg = stream.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                if events_tx.send(event).is_err() {
                                    let _ = connected_tx.send(false);
                                    return;
                                }
                            }
                            Err(e) => log::warn!("undecodable frame: {e}"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }

        let _ = connected_tx.send(false);
        log::info!("disconnected from {url}, reconnecting");
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
