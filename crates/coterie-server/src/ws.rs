//! WebSocket gateway.
//!
//! One task per connection: inbound events are handled to completion in
//! arrival order; outbound events arrive over the room's broadcast channel
//! (merged through an mpsc so the room can be switched atomically) and the
//! global channel for deletion notices. Invalid realtime traffic is
//! dropped silently - the sender cannot distinguish "dropped" from
//! "ignored".

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::handlers::AppState;
use crate::metrics::{self, ConnectionMetricsGuard};
use coterie_core::{sanitize_message, Envelope, UserIdentity};
use coterie_protocol::{codec, ChatMessage, ClientEvent, ServerEvent};

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = Uuid::new_v4().to_string();
    debug!(connection = %connection_id, "WebSocket connected");

    let mut global_rx = state.registry.connect(&connection_id);

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // The current room's broadcast receiver feeds this channel through a
    // forward task that is replaced on every room switch.
    let (room_tx, mut room_rx) = mpsc::unbounded_channel::<Arc<Envelope>>();
    let mut room_task: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            biased;

            // Events every client must see, regardless of room
            result = global_rx.recv() => {
                match result {
                    Ok(envelope) => {
                        if send_event(&mut sender, &envelope.event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }

            // Events from the subscribed room (via mpsc)
            Some(envelope) = room_rx.recv() => {
                if envelope.is_from(&connection_id) {
                    continue;
                }
                if send_event(&mut sender, &envelope.event).await.is_err() {
                    break;
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let start = Instant::now();
                        metrics::record_message(text.len(), "inbound");

                        match codec::decode(&text) {
                            Ok(event) => {
                                if let Err(e) = handle_event(
                                    event,
                                    &connection_id,
                                    &state,
                                    &mut sender,
                                    &mut room_task,
                                    &room_tx,
                                ).await {
                                    debug!(connection = %connection_id, error = %e, "Send failed");
                                    break;
                                }
                            }
                            Err(e) => {
                                debug!(connection = %connection_id, error = %e, "Dropped frame");
                                metrics::record_error("protocol");
                            }
                        }

                        metrics::record_latency(start.elapsed().as_secs_f64());
                    }
                    Some(Ok(Message::Binary(_))) => {
                        // The protocol is JSON text; binary frames are ignored
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: stop forwarding and discard the subscription
    if let Some(task) = room_task {
        task.abort();
    }
    state.registry.disconnect(&connection_id);
    metrics::set_active_rooms(state.registry.stats().room_count);

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Handle a decoded client event.
///
/// Only transport failures are returned as errors; every policy or lookup
/// failure is a silent no-op.
async fn handle_event(
    event: ClientEvent,
    connection_id: &str,
    state: &Arc<AppState>,
    sender: &mut SplitSink<WebSocket, Message>,
    room_task: &mut Option<JoinHandle<()>>,
    room_tx: &mpsc::UnboundedSender<Arc<Envelope>>,
) -> Result<()> {
    match event {
        ClientEvent::Hello {
            id,
            display_name,
            is_admin,
        } => {
            let user = UserIdentity::new(
                id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                display_name.as_deref().unwrap_or(""),
                is_admin,
            );
            if state.registry.identify(connection_id, user).is_err() {
                return Ok(());
            }

            let rooms = match state.store.list_rooms().await {
                Ok(rooms) => rooms,
                Err(e) => {
                    error!(connection = %connection_id, error = %e, "Room list failed");
                    return Ok(());
                }
            };
            send_event(sender, &ServerEvent::rooms(rooms)).await?;
        }

        ClientEvent::JoinRoom { slug } => {
            let Some(user) = state.registry.identity(connection_id) else {
                return Ok(());
            };

            let history = match history_event(state, &user, &slug).await {
                Some(history) => history,
                None => {
                    debug!(connection = %connection_id, room = %slug, "Join for unknown room");
                    return Ok(());
                }
            };

            // Stop forwarding the old room before the registry switches
            if let Some(task) = room_task.take() {
                task.abort();
            }
            let rx = match state.registry.subscribe(connection_id, &slug) {
                Ok(rx) => rx,
                Err(e) => {
                    debug!(connection = %connection_id, error = %e, "Subscribe failed");
                    return Ok(());
                }
            };
            *room_task = Some(spawn_room_forward(rx, room_tx.clone()));

            metrics::record_subscription();
            metrics::set_active_rooms(state.registry.stats().room_count);

            send_event(sender, &history).await?;
        }

        ClientEvent::NewMessage { slug, text } => {
            let Some(user) = state.registry.identity(connection_id) else {
                return Ok(());
            };

            if let Some(message) = post_message(state, &user, &slug, &text).await {
                let count = state.registry.publish(&slug, ServerEvent::message(message));
                metrics::record_message(text.len(), "broadcast");
                debug!(
                    connection = %connection_id,
                    room = %slug,
                    recipients = count,
                    "Message published"
                );
            }
        }

        ClientEvent::Typing { slug, is_typing } => {
            let Some(user) = state.registry.identity(connection_id) else {
                return Ok(());
            };
            // Everyone else in the room; the sender's own loop filters by source
            state.registry.publish_from(
                &slug,
                connection_id,
                ServerEvent::typing(user.display_name, is_typing),
            );
        }
    }

    Ok(())
}

/// Build the history event for a room join, or `None` if the slug does
/// not resolve.
async fn history_event(
    state: &AppState,
    user: &UserIdentity,
    slug: &str,
) -> Option<ServerEvent> {
    let room = match state.store.room_by_slug(slug).await {
        Ok(room) => room?,
        Err(e) => {
            error!(room = %slug, error = %e, "Room lookup failed");
            return None;
        }
    };

    let messages = match state
        .store
        .list_messages(&room.id, state.config.history_limit)
        .await
    {
        Ok(messages) => messages,
        Err(e) => {
            error!(room = %slug, error = %e, "History fetch failed");
            return None;
        }
    };

    let readonly = state.readonly.is_read_only_for(slug, user);
    Some(ServerEvent::history(slug, messages, readonly))
}

/// Sanitize, authorize, and persist a message.
///
/// Returns the stored message if it was accepted; `None` means the send
/// was dropped (empty text, unknown room, read-only room, or store
/// failure).
async fn post_message(
    state: &AppState,
    user: &UserIdentity,
    slug: &str,
    text: &str,
) -> Option<ChatMessage> {
    let clean = sanitize_message(text)?;

    let room = match state.store.room_by_slug(slug).await {
        Ok(room) => room?,
        Err(e) => {
            error!(room = %slug, error = %e, "Room lookup failed");
            return None;
        }
    };

    if state.readonly.is_read_only_for(slug, user) {
        debug!(room = %slug, user = %user.display_name, "Write to read-only room dropped");
        return None;
    }

    match state
        .store
        .create_message(&room.id, &user.display_name, &clean)
        .await
    {
        Ok(message) => Some(message),
        Err(e) => {
            error!(room = %slug, error = %e, "Message persist failed");
            None
        }
    }
}

/// Forward room broadcast envelopes into the connection's outbound mpsc.
fn spawn_room_forward(
    mut rx: broadcast::Receiver<Arc<Envelope>>,
    tx: mpsc::UnboundedSender<Arc<Envelope>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if tx.send(envelope).is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    })
}

/// Send an event to the WebSocket.
async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<()> {
    let text = codec::encode(event)?;
    metrics::record_message(text.len(), "outbound");
    sender.send(Message::Text(text)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use coterie_core::MAX_MESSAGE_LEN;
    use coterie_store::Store;

    async fn test_state() -> Arc<AppState> {
        let mut config = Config::default();
        config.session_secret = "test-secret".to_string();
        config.readonly_rooms = vec!["announcements".to_string()];

        let store = Store::in_memory().await.unwrap();
        store.seed_default_rooms().await.unwrap();
        Arc::new(AppState::new(config, store))
    }

    #[tokio::test]
    async fn test_history_for_empty_room() {
        let state = test_state().await;
        let user = UserIdentity::new("u1", "Alice", false);

        let event = history_event(&state, &user, "general").await.unwrap();
        assert_eq!(
            event,
            ServerEvent::history("general", vec![], false)
        );
    }

    #[tokio::test]
    async fn test_history_unknown_room() {
        let state = test_state().await;
        let user = UserIdentity::new("u1", "Alice", false);

        assert!(history_event(&state, &user, "nope").await.is_none());
    }

    #[tokio::test]
    async fn test_history_readonly_flag_by_role() {
        let state = test_state().await;
        let member = UserIdentity::new("u1", "Alice", false);
        let admin = UserIdentity::new("u2", "Bob", true);

        match history_event(&state, &member, "announcements").await.unwrap() {
            ServerEvent::History { readonly, .. } => assert!(readonly),
            other => panic!("Expected History, got {:?}", other),
        }
        match history_event(&state, &admin, "announcements").await.unwrap() {
            ServerEvent::History { readonly, .. } => assert!(!readonly),
            other => panic!("Expected History, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_post_message_persists() {
        let state = test_state().await;
        let user = UserIdentity::new("u1", "Alice", false);

        let message = post_message(&state, &user, "general", "  hi  ").await.unwrap();
        assert_eq!(message.text, "hi");
        assert_eq!(message.user_name, "Alice");

        let room = state.store.room_by_slug("general").await.unwrap().unwrap();
        let history = state.store.list_messages(&room.id, 200).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "hi");
    }

    #[tokio::test]
    async fn test_post_message_drops_empty_and_unknown() {
        let state = test_state().await;
        let user = UserIdentity::new("u1", "Alice", false);

        assert!(post_message(&state, &user, "general", "   ").await.is_none());
        assert!(post_message(&state, &user, "nope", "hi").await.is_none());
    }

    #[tokio::test]
    async fn test_post_message_truncates_long_text() {
        let state = test_state().await;
        let user = UserIdentity::new("u1", "Alice", false);

        let long = "a".repeat(MAX_MESSAGE_LEN + 500);
        let message = post_message(&state, &user, "general", &long).await.unwrap();
        assert_eq!(message.text.chars().count(), MAX_MESSAGE_LEN);
    }

    #[tokio::test]
    async fn test_readonly_room_blocks_member_not_admin() {
        let state = test_state().await;
        let member = UserIdentity::new("u1", "Alice", false);
        let admin = UserIdentity::new("u2", "Bob", true);

        // Member write never persists
        assert!(post_message(&state, &member, "announcements", "hi").await.is_none());
        let room = state
            .store
            .room_by_slug("announcements")
            .await
            .unwrap()
            .unwrap();
        assert!(state.store.list_messages(&room.id, 200).await.unwrap().is_empty());

        // The same call as admin persists
        let message = post_message(&state, &admin, "announcements", "hi").await.unwrap();
        assert_eq!(message.text, "hi");
        assert_eq!(state.store.list_messages(&room.id, 200).await.unwrap().len(), 1);
    }
}
