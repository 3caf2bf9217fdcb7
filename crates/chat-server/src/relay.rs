//! The streaming relay: one persistent WebSocket per client, prompts in,
//! delta/complete/error events out.
//!
//! The service is an explicitly constructed object handed to the router as
//! shared state, so there is no initialize-once global to guard.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedSender};

use chat_core::ports::{CompletionEvent, CompletionPort};
use chat_types::event::{ClientEvent, ServerEvent};

use crate::rooms::RoomRegistry;

pub struct RelayService {
    completions: Arc<dyn CompletionPort>,
    rooms: RoomRegistry,
}

pub type SharedRelay = Arc<RelayService>;

impl RelayService {
    pub fn new(completions: Arc<dyn CompletionPort>) -> Self {
        Self {
            completions,
            rooms: RoomRegistry::new(),
        }
    }

    pub async fn handle_socket(self: Arc<Self>, socket: WebSocket) {
        let client_id = uuid::Uuid::new_v4().to_string();
        tracing::info!("client connected: {client_id}");

        let (mut ws_sender, mut ws_receiver) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
        self.rooms.register(&client_id, tx.clone());

        // All outbound traffic for this socket funnels through one writer.
        let writer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("failed to encode event: {e}");
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => self.handle_event(&client_id, &text, &tx),
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }

        self.rooms.unregister(&client_id);
        writer.abort();
        tracing::info!("client disconnected: {client_id}");
    }

    fn handle_event(&self, client_id: &str, text: &str, tx: &UnboundedSender<ServerEvent>) {
        let event: ClientEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("undecodable frame from {client_id}: {e}");
                return;
            }
        };

        match event {
            ClientEvent::SubmitPrompt { prompt } => {
                tracing::info!("prompt from {client_id} ({} chars)", prompt.len());
                // Overlapping prompts on one channel each get their own
                // upstream call and accumulator. Not serialized, not
                // rejected; a known limitation of the protocol.
                let completions = self.completions.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    run_prompt(completions, prompt, tx).await;
                });
            }
            ClientEvent::JoinRoom { room_id } => {
                tracing::debug!("{client_id} joined room {room_id}");
                self.rooms.join(&room_id, client_id);
            }
            ClientEvent::LeaveRoom { room_id } => {
                tracing::debug!("{client_id} left room {room_id}");
                self.rooms.leave(&room_id, client_id);
            }
            ClientEvent::RoomMessage { room_id, message } => {
                self.rooms.send_to_room(&room_id, client_id, message);
            }
            ClientEvent::Broadcast { data } => {
                self.rooms.broadcast(ServerEvent::Broadcast { data });
            }
        }
    }
}

/// Bridge one upstream streaming call onto the channel: every delta is
/// forwarded as it arrives and appended to an accumulator local to this
/// call; exactly one terminal event follows — `Complete` with the join of
/// all deltas, or `Error` if the upstream failed.
///
/// A disconnected client only stops delivery; the upstream call still runs
/// to completion or failure.
async fn run_prompt(
    completions: Arc<dyn CompletionPort>,
    prompt: String,
    tx: UnboundedSender<ServerEvent>,
) {
    let mut stream = completions.stream_completion(&prompt);
    let mut full_response = String::new();

    while let Some(event) = stream.next().await {
        match event {
            CompletionEvent::Delta(content) => {
                full_response.push_str(&content);
                let _ = tx.send(ServerEvent::Delta { content });
            }
            CompletionEvent::Done => {
                let _ = tx.send(ServerEvent::Complete { full_response });
                return;
            }
            CompletionEvent::Error(error) => {
                tracing::error!("completion failed: {error}");
                let _ = tx.send(ServerEvent::Error { error });
                return;
            }
        }
    }

    // Upstream ended without an explicit terminal marker.
    let _ = tx.send(ServerEvent::Complete { full_response });
}

pub async fn ws_handler(
    State(relay): State<SharedRelay>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| relay.handle_socket(socket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::ports::CompletionStream;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Scripted upstream: the prompt picks the scenario.
    struct MockCompletions;

    impl CompletionPort for MockCompletions {
        fn stream_completion(&self, prompt: &str) -> CompletionStream {
            let prompt = prompt.to_string();
            Box::pin(async_stream::stream! {
                match prompt.as_str() {
                    "alpha" => {
                        for (delta, delay_ms) in [("A1", 1u64), ("A2", 30)] {
                            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                            yield CompletionEvent::Delta(delta.to_string());
                        }
                        yield CompletionEvent::Done;
                    }
                    "beta" => {
                        for (delta, delay_ms) in [("B1", 10u64), ("B2", 30)] {
                            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                            yield CompletionEvent::Delta(delta.to_string());
                        }
                        yield CompletionEvent::Done;
                    }
                    "fail-first" => {
                        yield CompletionEvent::Error("upstream exploded".to_string());
                    }
                    "fail-mid" => {
                        yield CompletionEvent::Delta("par".to_string());
                        yield CompletionEvent::Delta("tial".to_string());
                        yield CompletionEvent::Error("cut off".to_string());
                    }
                    _ => {
                        yield CompletionEvent::Done;
                    }
                }
            })
        }
    }

    async fn collect_until_terminal(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let terminal = matches!(
                event,
                ServerEvent::Complete { .. } | ServerEvent::Error { .. }
            );
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn test_deltas_then_single_complete() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_prompt(Arc::new(MockCompletions), "alpha".to_string(), tx).await;

        let events = collect_until_terminal(&mut rx).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], ServerEvent::Delta { content } if content == "A1"));
        assert!(matches!(&events[1], ServerEvent::Delta { content } if content == "A2"));
        assert!(
            matches!(&events[2], ServerEvent::Complete { full_response } if full_response == "A1A2")
        );
        // Exactly one terminal event per call.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_on_first_unit_emits_only_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_prompt(Arc::new(MockCompletions), "fail-first".to_string(), tx).await;

        let events = collect_until_terminal(&mut rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ServerEvent::Error { error } if error == "upstream exploded"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_mid_stream_no_complete() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_prompt(Arc::new(MockCompletions), "fail-mid".to_string(), tx).await;

        let events = collect_until_terminal(&mut rx).await;
        // Deltas already seen are forwarded; then one Error, no Complete.
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], ServerEvent::Delta { content } if content == "par"));
        assert!(matches!(&events[1], ServerEvent::Delta { content } if content == "tial"));
        assert!(matches!(&events[2], ServerEvent::Error { error } if error == "cut off"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_stream_completes_with_empty_text() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_prompt(Arc::new(MockCompletions), "empty".to_string(), tx).await;

        let events = collect_until_terminal(&mut rx).await;
        assert_eq!(events.len(), 1);
        assert!(
            matches!(&events[0], ServerEvent::Complete { full_response } if full_response.is_empty())
        );
    }

    #[tokio::test]
    async fn test_overlapping_prompts_do_not_cross_contaminate() {
        let completions: Arc<dyn CompletionPort> = Arc::new(MockCompletions);
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Two concurrent calls on the same channel, deltas interleaved
        // by their scripted delays.
        let a = tokio::spawn(run_prompt(completions.clone(), "alpha".to_string(), tx.clone()));
        let b = tokio::spawn(run_prompt(completions.clone(), "beta".to_string(), tx.clone()));
        let (ra, rb) = tokio::join!(a, b);
        ra.unwrap();
        rb.unwrap();
        drop(tx);

        let mut completes = Vec::new();
        let mut deltas = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                ServerEvent::Complete { full_response } => completes.push(full_response),
                ServerEvent::Delta { content } => deltas.push(content),
                other => panic!("unexpected event: {other:?}"),
            }
        }

        // Each call terminates with its own complete, and each
        // concatenation contains only its own deltas.
        completes.sort();
        assert_eq!(completes, vec!["A1A2".to_string(), "B1B2".to_string()]);
        assert_eq!(deltas.len(), 4);
    }
}
