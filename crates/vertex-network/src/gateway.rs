//! The push layer (spec.md §4.11): one long-lived WS connection per external subscriber, a
//! connection-owned outbound queue, subscribe/unsubscribe to bus topics by name, ping/pong
//! heartbeat, idle timeout, and `SubscriptionHandle`-drop teardown on disconnect.

use std::{
    collections::HashMap,
    sync::{atomic::{AtomicU64, Ordering}, Arc},
    time::Duration,
};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::StreamExt;
use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vertex_common::MessageBus;
use vertex_model::Topic;

use crate::protocol::{ClientCommand, ServerFrame, TopicDataFrame};
use crate::state::AppState;

/// Bound of one connection's outbound queue (spec.md §4.11: "default 256").
const OUTBOUND_CAPACITY: usize = 256;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state.bus))
}

/// Forwards one subscribed topic's bus messages into the connection's outbound queue until the
/// subscription itself is dropped (e.g. by this function returning when its `JoinHandle` is
/// aborted on disconnect or explicit unsubscribe).
async fn forward_topic(bus: Arc<MessageBus>, topic: Topic, outbound: mpsc::Sender<String>, dropped: Arc<AtomicU64>) {
    let Ok(mut subscription) = bus.subscribe(topic, None) else { return };
    while let Some(msg) = subscription.next().await {
        let data = serde_json::from_slice(&msg.payload).unwrap_or(serde_json::Value::Null);
        let frame = TopicDataFrame { topic: topic.as_str().to_string(), data };
        let Ok(text) = serde_json::to_string(&frame) else { continue };
        if outbound.try_send(text).is_err() {
            dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

async fn handle_connection(socket: WebSocket, bus: Arc<MessageBus>) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let mut forwarders: HashMap<String, JoinHandle<()>> = HashMap::new();
    let dropped = Arc::new(AtomicU64::new(0));

    send_frame(&outbound_tx, &ServerFrame::Connection { status: "ok", message: "connected".to_string() });

    let mut ping_ticker = tokio::time::interval(PING_INTERVAL);
    let mut idle_deadline = Box::pin(tokio::time::sleep(IDLE_TIMEOUT));

    loop {
        tokio::select! {
            text = outbound_rx.recv() => {
                match text {
                    Some(text) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping_ticker.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            () = &mut idle_deadline => {
                debug!("gateway connection idle timeout");
                break;
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        idle_deadline.as_mut().reset(tokio::time::Instant::now() + IDLE_TIMEOUT);
                        handle_command(text.as_str(), &bus, &outbound_tx, &mut forwarders, &dropped);
                    }
                    Some(Ok(Message::Pong(_))) => {
                        idle_deadline.as_mut().reset(tokio::time::Instant::now() + IDLE_TIMEOUT);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "gateway connection read error");
                        break;
                    }
                }
            }
        }
    }

    for (_, handle) in forwarders.drain() {
        handle.abort();
    }
}

fn send_frame(outbound: &mpsc::Sender<String>, frame: &ServerFrame) {
    if let Ok(text) = serde_json::to_string(frame) {
        let _ = outbound.try_send(text);
    }
}

fn handle_command(
    raw: &str,
    bus: &Arc<MessageBus>,
    outbound: &mpsc::Sender<String>,
    forwarders: &mut HashMap<String, JoinHandle<()>>,
    dropped: &Arc<AtomicU64>,
) {
    let Ok(command) = serde_json::from_str::<ClientCommand>(raw) else {
        return;
    };
    match command {
        ClientCommand::Subscribe { topics } => {
            for raw_topic in &topics {
                if forwarders.contains_key(raw_topic) {
                    continue;
                }
                let topic = Topic::from_raw(raw_topic);
                let handle = tokio::spawn(forward_topic(bus.clone(), topic, outbound.clone(), dropped.clone()));
                forwarders.insert(raw_topic.clone(), handle);
            }
            send_frame(outbound, &ServerFrame::Subscription { status: "ok", topics });
        }
        ClientCommand::Unsubscribe { topics } => {
            for raw_topic in &topics {
                if let Some(handle) = forwarders.remove(raw_topic) {
                    handle.abort();
                }
            }
            send_frame(outbound, &ServerFrame::Subscription { status: "ok", topics });
        }
        ClientCommand::Ping => {
            send_frame(outbound, &ServerFrame::Pong);
        }
        ClientCommand::ListTopics => {
            let topics: Vec<String> = bus.list_topics().iter().map(|t| t.as_str().to_string()).collect();
            let count = topics.len();
            send_frame(outbound, &ServerFrame::Topics { topics, count });
        }
        ClientCommand::MySubscriptions => {
            let topics: Vec<String> = forwarders.keys().cloned().collect();
            let count = topics.len();
            send_frame(outbound, &ServerFrame::Subscriptions { topics, count });
        }
    }
}
