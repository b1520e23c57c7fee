//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! applying subscription commands and forwarding filtered events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{MarketEvent, ProviderId};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads subscription commands from the client.
/// - Forwards events of followed providers from the [`broadcast::Receiver`].
pub async fn run_connection(socket: WebSocket, mut event_rx: broadcast::Receiver<MarketEvent>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs);
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(market_event) => {
                        if let Some(json) = render_event(&market_event, &subs)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Serializes an event for this connection, or `None` if filtered out.
fn render_event(event: &MarketEvent, subs: &SubscriptionManager) -> Option<String> {
    if !subs.matches(event.provider_id()) {
        return None;
    }
    let payload = serde_json::to_value(event).ok()?;
    let msg = WsMessage::new(
        uuid::Uuid::new_v4().to_string(),
        WsMessageType::Event,
        payload,
    );
    serde_json::to_string(&msg).ok()
}

/// Splits raw id strings into parsed provider ids and the wildcard flag.
/// Unparsable ids are skipped.
fn parse_ids(raw: &[String]) -> (Vec<ProviderId>, bool) {
    let mut wildcard = false;
    let mut ids = Vec::with_capacity(raw.len());
    for s in raw {
        if s == "*" {
            wildcard = true;
        } else if let Ok(id) = s.parse::<ProviderId>() {
            ids.push(id);
        }
    }
    (ids, wildcard)
}

/// Handles a text message from the client, returning an optional JSON response.
fn handle_text_message(text: &str, subs: &mut SubscriptionManager) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error("", 400, "malformed JSON")).ok();
    };
    if msg.msg_type != WsMessageType::Command {
        return serde_json::to_string(&WsMessage::error(msg.id, 400, "expected a command"))
            .ok();
    }

    let reply = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(WsCommand::Subscribe { provider_ids }) => {
            let (ids, wildcard) = parse_ids(&provider_ids);
            subs.subscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        Ok(WsCommand::Unsubscribe { provider_ids }) => {
            let (ids, wildcard) = parse_ids(&provider_ids);
            subs.unsubscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        Err(_) => WsMessage::error(msg.id, 404, "unknown command"),
    };
    serde_json::to_string(&reply).ok()
}
