use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use parley_types::events::ClientEvent;
use parley_types::models::Identity;

use crate::router::{EventError, EventRouter};

/// Drive one admitted WebSocket connection. The token was already verified
/// at the HTTP upgrade, so the identity is trusted for the connection's
/// whole lifetime.
pub async fn handle_connection(socket: WebSocket, router: EventRouter, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut events_rx) = router
        .dispatcher()
        .register_connection(identity.user_id)
        .await;

    router.on_connected(&identity, conn_id).await;

    // Outbound: everything the dispatcher routes here goes to the client
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to serialize {}: {}", event.name(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound: parse against the closed event union and dispatch
    let recv_router = router.clone();
    let recv_identity = identity.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        recv_router.handle_event(&recv_identity, event).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) malformed event: {} -- raw: {}",
                            recv_identity.username,
                            recv_identity.user_id,
                            e,
                            truncate_for_log(&text, 200)
                        );
                        recv_router
                            .reject(&recv_identity, EventError::Validation)
                            .await;
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    if router
        .dispatcher()
        .unregister_connection(identity.user_id, conn_id)
        .await
    {
        router.on_disconnected(&identity, conn_id).await;
    }
    info!("{} ({}) connection closed", identity.username, identity.user_id);
}

/// Truncate a frame for logging without cutting through a multibyte
/// character; a byte slice at a fixed index would panic mid-character.
fn truncate_for_log(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::truncate_for_log;
    use parley_types::events::ClientEvent;

    #[test]
    fn truncation_respects_multibyte_boundaries() {
        // Byte 200 lands inside the euro sign; a raw slice would panic
        let frame = format!("{}€ definitely not json", "a".repeat(199));
        assert!(serde_json::from_str::<ClientEvent>(&frame).is_err());

        let truncated = truncate_for_log(&frame, 200);
        assert_eq!(truncated, "a".repeat(199));
        assert!(truncated.len() <= 200);
    }

    #[test]
    fn short_frames_are_untouched() {
        assert_eq!(truncate_for_log("not json", 200), "not json");
        assert_eq!(truncate_for_log("日本語", 200), "日本語");
    }

    #[test]
    fn truncation_at_exact_boundary_keeps_whole_chars() {
        // "日" is 3 bytes; max of 4 must fall back to the first char
        let text = "日本語";
        assert_eq!(truncate_for_log(text, 4), "日");
        assert_eq!(truncate_for_log(text, 6), "日本");
    }
}
