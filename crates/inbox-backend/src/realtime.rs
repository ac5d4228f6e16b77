//! Client for the hosted realtime socket (Phoenix channel protocol, v1 JSON
//! frames). Each subscription owns one socket joined to one topic.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use inbox_types::models::Message;

use crate::{BackendError, Subscription};

/// The server drops channels that stay silent for 30 seconds.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_REF: &str = "1";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixFrame {
    pub topic: String,
    pub event: String,
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Socket endpoint derived from the REST base URL.
pub fn socket_url(base_url: &str, api_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/realtime/v1/websocket?apikey={}&vsn=1.0.0", ws_base, api_key)
}

pub fn topic_for(user_id: &str) -> String {
    format!("realtime:messages:{}", user_id)
}

pub fn join_frame(topic: &str, user_id: &str, access_token: &str) -> PhoenixFrame {
    PhoenixFrame {
        topic: topic.to_string(),
        event: "phx_join".into(),
        payload: json!({
            "config": {
                "postgres_changes": [{
                    "event": "INSERT",
                    "schema": "public",
                    "table": "messages",
                    "filter": format!("user_id=eq.{}", user_id),
                }]
            },
            "access_token": access_token,
        }),
        reference: Some(JOIN_REF.into()),
    }
}

pub fn heartbeat_frame(reference: u64) -> PhoenixFrame {
    PhoenixFrame {
        topic: "phoenix".into(),
        event: "heartbeat".into(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

pub fn leave_frame(topic: &str, reference: u64) -> PhoenixFrame {
    PhoenixFrame {
        topic: topic.to_string(),
        event: "phx_leave".into(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Outcome of a `phx_reply` to the frame sent with `reference`.
/// `None` when the frame is something else.
pub fn reply_status(frame: &PhoenixFrame, reference: &str) -> Option<Result<(), String>> {
    if frame.event != "phx_reply" || frame.reference.as_deref() != Some(reference) {
        return None;
    }
    match frame.payload.get("status").and_then(Value::as_str) {
        Some("ok") => Some(Ok(())),
        _ => Some(Err(frame.payload.get("response").map(Value::to_string).unwrap_or_default())),
    }
}

/// Extracts the inserted row from a change notification. Handles both the
/// `postgres_changes` envelope and the older bare `INSERT` event.
pub fn decode_insert(frame: &PhoenixFrame) -> Option<Result<Message, serde_json::Error>> {
    let record = match frame.event.as_str() {
        "postgres_changes" => {
            let data = frame.payload.get("data")?;
            if data.get("type").and_then(Value::as_str) != Some("INSERT") {
                return None;
            }
            data.get("record")?
        }
        "INSERT" => frame.payload.get("record")?,
        _ => return None,
    };
    Some(serde_json::from_value(record.clone()))
}

fn encode(frame: &PhoenixFrame) -> Result<WsMessage, BackendError> {
    Ok(WsMessage::Text(serde_json::to_string(frame)?.into()))
}

/// Opens a socket, joins the conversation topic and returns once the server
/// acknowledged the join.
pub async fn subscribe(url: &str, user_id: &str, access_token: &str) -> Result<Subscription, BackendError> {
    let (socket, _) = tokio_tungstenite::connect_async(url).await?;
    let (mut sink, mut stream) = socket.split();

    let topic = topic_for(user_id);
    sink.send(encode(&join_frame(&topic, user_id, access_token))?).await?;

    tokio::time::timeout(JOIN_TIMEOUT, await_join(&mut stream))
        .await
        .map_err(|_| BackendError::Realtime(format!("join of {} timed out", topic)))??;

    info!("Realtime channel {} joined", topic);

    let (tx, rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let task = tokio::spawn(run_channel(sink, stream, topic, user_id.to_string(), tx, cancel_rx));

    Ok(Subscription::new(user_id, rx, move || {
        Box::pin(async move {
            let _ = cancel_tx.send(());
            let _ = task.await;
        })
    }))
}

async fn await_join(stream: &mut SplitStream<Socket>) -> Result<(), BackendError> {
    while let Some(msg) = stream.next().await {
        let WsMessage::Text(text) = msg? else {
            continue;
        };
        let frame: PhoenixFrame = serde_json::from_str(text.as_str())?;
        if let Some(status) = reply_status(&frame, JOIN_REF) {
            return status.map_err(|reason| BackendError::Realtime(format!("join rejected: {}", reason)));
        }
    }
    Err(BackendError::Realtime("socket closed before join reply".into()))
}

async fn run_channel(
    mut sink: SplitSink<Socket, WsMessage>,
    mut stream: SplitStream<Socket>,
    topic: String,
    user_id: String,
    tx: mpsc::UnboundedSender<Message>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = &mut cancel_rx => {
                if let Ok(leave) = encode(&leave_frame(&topic, next_ref)) {
                    let _ = sink.send(leave).await;
                }
                let _ = sink.close().await;
                debug!("Realtime channel {} left", topic);
                break;
            }
            _ = heartbeat.tick() => {
                let sent = match encode(&heartbeat_frame(next_ref)) {
                    Ok(frame) => sink.send(frame).await.is_ok(),
                    Err(_) => false,
                };
                next_ref += 1;
                if !sent {
                    warn!("Realtime heartbeat failed on {}, closing channel", topic);
                    break;
                }
            }
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => {
                        warn!("Realtime socket for {} closed by server", topic);
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Realtime socket error on {}: {}", topic, e);
                        break;
                    }
                };

                let frame: PhoenixFrame = match serde_json::from_str(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Malformed realtime frame on {}: {}", topic, e);
                        continue;
                    }
                };

                match decode_insert(&frame) {
                    Some(Ok(message)) if message.user_id == user_id => {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Some(Ok(message)) => {
                        warn!("Dropping row {} for user {} pushed on {}", message.id, message.user_id, topic);
                    }
                    Some(Err(e)) => warn!("Undecodable row on {}: {}", topic, e),
                    None => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_switches_scheme() {
        assert_eq!(
            socket_url("https://abc.example.co/", "key"),
            "wss://abc.example.co/realtime/v1/websocket?apikey=key&vsn=1.0.0"
        );
        assert_eq!(
            socket_url("http://localhost:54321", "k"),
            "ws://localhost:54321/realtime/v1/websocket?apikey=k&vsn=1.0.0"
        );
    }

    #[test]
    fn join_filters_on_conversation() {
        let frame = join_frame("realtime:messages:u1", "u1", "tok");
        assert_eq!(frame.event, "phx_join");
        let change = &frame.payload["config"]["postgres_changes"][0];
        assert_eq!(change["filter"], "user_id=eq.u1");
        assert_eq!(change["table"], "messages");
        assert_eq!(frame.payload["access_token"], "tok");
    }

    #[test]
    fn reply_status_matches_reference() {
        let ok: PhoenixFrame = serde_json::from_value(json!({
            "topic": "realtime:messages:u1",
            "event": "phx_reply",
            "payload": {"status": "ok", "response": {}},
            "ref": "1"
        }))
        .unwrap();
        assert_eq!(reply_status(&ok, "1"), Some(Ok(())));
        assert_eq!(reply_status(&ok, "2"), None);

        let rejected = PhoenixFrame {
            payload: json!({"status": "error", "response": {"reason": "unauthorized"}}),
            ..ok
        };
        assert!(matches!(reply_status(&rejected, "1"), Some(Err(reason)) if reason.contains("unauthorized")));
    }

    #[test]
    fn decodes_postgres_changes_insert() {
        let frame: PhoenixFrame = serde_json::from_value(json!({
            "topic": "realtime:messages:u1",
            "event": "postgres_changes",
            "payload": {
                "ids": [12],
                "data": {
                    "type": "INSERT",
                    "table": "messages",
                    "record": {
                        "id": 42,
                        "user_id": "u1",
                        "text": "thanks",
                        "created_at": "2024-05-01T10:33:00.123456+00:00",
                        "is_founder": true,
                        "read_at": null
                    }
                }
            },
            "ref": null
        }))
        .unwrap();

        let message = decode_insert(&frame).unwrap().unwrap();
        assert_eq!(message.id, 42);
        assert_eq!(message.text, "thanks");
        assert!(message.is_founder);
        assert!(message.read_at.is_none());
    }

    #[test]
    fn ignores_non_insert_frames() {
        let presence = PhoenixFrame {
            topic: "realtime:messages:u1".into(),
            event: "presence_state".into(),
            payload: json!({}),
            reference: None,
        };
        assert!(decode_insert(&presence).is_none());

        let update = PhoenixFrame {
            event: "postgres_changes".into(),
            payload: json!({"data": {"type": "UPDATE", "record": {}}}),
            ..presence
        };
        assert!(decode_insert(&update).is_none());
    }
}
