//! Push event channel.
//!
//! `EventHub` is a registry of named handlers; `EventChannel` owns the
//! WebSocket connection and feeds decoded frames into a hub. Frames are
//! JSON text messages shaped `{"event": NAME, "data": PAYLOAD}`. When the
//! socket ends, `disconnection` is dispatched once with an optional reason.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::types::EVT_DISCONNECTION;

type Handler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

#[derive(Default)]
struct HubState {
    handlers: HashMap<String, Vec<Handler>>,
    /// Set once `disconnection` was dispatched; holds its reason.
    disconnected: Option<Option<String>>,
}

/// Named-event handler registry. Cheap to clone; clones share handlers.
///
/// A disconnection is sticky: `on_disconnect` handlers registered after the
/// channel dropped are called right away with the recorded reason.
#[derive(Clone, Default)]
pub struct EventHub {
    state: Arc<Mutex<HubState>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Register a handler whose payload is decoded into `T`.
    /// Payloads that fail to decode are logged and dropped.
    pub fn on<T, F>(&self, event: &str, handler: F)
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let wrapped = wrap(event, handler);
        self.lock()
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(wrapped);
    }

    /// Register the disconnection handler; it receives the close reason, if any.
    /// Runs immediately when the channel is already gone.
    pub fn on_disconnect<F>(&self, handler: F)
    where
        F: Fn(Option<String>) + Send + Sync + 'static,
    {
        let wrapped = wrap::<Option<String>, _>(EVT_DISCONNECTION, handler);
        let replay = {
            let mut state = self.lock();
            state
                .handlers
                .entry(EVT_DISCONNECTION.to_string())
                .or_default()
                .push(wrapped.clone());
            state.disconnected.clone()
        };
        if let Some(reason) = replay {
            tracing::debug!(?reason, "replaying earlier disconnection");
            wrapped(reason.map_or(serde_json::Value::Null, serde_json::Value::String));
        }
    }

    /// Invoke every handler registered for `event`. Returns how many ran.
    pub fn dispatch(&self, event: &str, data: serde_json::Value) -> usize {
        // Snapshot so handlers may register further handlers without deadlocking.
        let handlers: Vec<Handler> = {
            let mut state = self.lock();
            if event == EVT_DISCONNECTION && state.disconnected.is_none() {
                state.disconnected = Some(data.as_str().map(str::to_string));
            }
            state.handlers.get(event).cloned().unwrap_or_default()
        };
        if handlers.is_empty() {
            tracing::trace!(%event, "no handler for event");
        }
        for h in &handlers {
            h(data.clone());
        }
        handlers.len()
    }

    #[cfg(test)]
    pub fn has_handlers(&self, event: &str) -> bool {
        self.lock()
            .handlers
            .get(event)
            .is_some_and(|v| !v.is_empty())
    }
}

fn wrap<T, F>(event: &str, handler: F) -> Handler
where
    T: DeserializeOwned,
    F: Fn(T) + Send + Sync + 'static,
{
    let name = event.to_string();
    Arc::new(move |data| match serde_json::from_value::<T>(data) {
        Ok(payload) => handler(payload),
        Err(e) => tracing::warn!(event = %name, error = %e, "undecodable event payload"),
    })
}

#[derive(Debug, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode one text frame and hand it to the hub.
fn route_text(hub: &EventHub, text: &str) {
    match serde_json::from_str::<Frame>(text) {
        Ok(frame) => {
            tracing::trace!(event = %frame.event, "event received");
            hub.dispatch(&frame.event, frame.data);
        }
        Err(e) => tracing::debug!(error = %e, "ignoring malformed event frame"),
    }
}

/// Live WebSocket connection to the agent.
pub struct EventChannel {
    sid: String,
    task: JoinHandle<()>,
}

impl EventChannel {
    /// Connect and start dispatching into `hub`. Handlers may be registered
    /// before or after this call; frames only arrive once the agent knows
    /// what to send, which happens through later HTTP requests.
    pub async fn connect(url: Url, sid: impl Into<String>, hub: EventHub) -> Result<Self> {
        let sid = sid.into();
        tracing::debug!(%url, "connecting event channel");
        let (mut ws, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect event channel at {url}"))?;

        let task = tokio::spawn(async move {
            let reason = loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => route_text(&hub, &text),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => route_text(&hub, text),
                        Err(_) => tracing::debug!("ignoring non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws.send(Message::Pong(data)).await {
                            break Some(e.to_string());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            };
            tracing::debug!(?reason, "event channel closed");
            hub.dispatch(
                EVT_DISCONNECTION,
                reason.map_or(serde_json::Value::Null, serde_json::Value::String),
            );
        });

        Ok(Self { sid, task })
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Fresh session id for a new channel.
pub fn new_sid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::{EXEC_OUT_EVENT, ExecOutMsg};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn typed_handler_receives_payload() {
        let hub = EventHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hub.on(EXEC_OUT_EVENT, move |ev: ExecOutMsg| {
            sink.lock().unwrap().push(ev.stdout);
        });

        let ran = hub.dispatch(
            EXEC_OUT_EVENT,
            serde_json::json!({"cmdID": "1", "stdout": "hello\n"}),
        );
        assert_eq!(ran, 1);
        assert_eq!(seen.lock().unwrap().as_slice(), ["hello\n"]);
    }

    #[test]
    fn undecodable_payload_is_dropped() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        hub.on("num", move |_: u32| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        hub.dispatch("num", serde_json::json!("not a number"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disconnect_reason_optional() {
        let hub = EventHub::new();
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let r = reasons.clone();
        hub.on_disconnect(move |reason| r.lock().unwrap().push(reason));
        hub.dispatch(EVT_DISCONNECTION, serde_json::Value::Null);
        hub.dispatch(EVT_DISCONNECTION, serde_json::json!("reset"));
        assert_eq!(
            reasons.lock().unwrap().as_slice(),
            [None, Some("reset".to_string())]
        );
    }

    #[test]
    fn frames_route_by_name() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        hub.on("ping", move |_: serde_json::Value| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        route_text(&hub, r#"{"event":"ping","data":{}}"#);
        route_text(&hub, r#"{"event":"other"}"#);
        route_text(&hub, "garbage");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(hub.dispatch("other", serde_json::Value::Null), 0);
    }

    #[test]
    fn late_disconnect_handler_gets_replay() {
        let hub = EventHub::new();
        assert_eq!(hub.dispatch(EVT_DISCONNECTION, serde_json::json!("gone")), 0);

        let reasons = Arc::new(Mutex::new(Vec::new()));
        let r = reasons.clone();
        hub.on_disconnect(move |reason| r.lock().unwrap().push(reason));
        assert_eq!(reasons.lock().unwrap().as_slice(), [Some("gone".to_string())]);
    }

    #[test]
    fn no_replay_without_disconnection() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        hub.on_disconnect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
        hub.dispatch(EVT_DISCONNECTION, serde_json::Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    mod transport {
        use super::*;
        use std::time::Duration;
        use tokio::net::TcpListener;
        use tokio::sync::mpsc;
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

        /// Local WebSocket server running `script` on the first connection.
        async fn serve<F, Fut>(script: F) -> Url
        where
            F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
                + Send
                + 'static,
            Fut: std::future::Future<Output = ()> + Send,
        {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (tcp, _) = listener.accept().await.unwrap();
                let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                script(ws).await;
            });
            Url::parse(&format!("ws://{addr}/api/v1/events/ws?sid=t")).unwrap()
        }

        fn watch_disconnects(hub: &EventHub) -> mpsc::UnboundedReceiver<Option<String>> {
            let (tx, rx) = mpsc::unbounded_channel();
            hub.on_disconnect(move |reason| {
                let _ = tx.send(reason);
            });
            rx
        }

        #[tokio::test]
        async fn frames_routed_and_close_reason_reported_once() {
            let (pong_tx, mut pong_rx) = mpsc::unbounded_channel();
            let url = serve(move |mut ws| async move {
                ws.send(Message::Text(
                    r#"{"event":"exec:output","data":{"stdout":"text\n"}}"#.into(),
                ))
                .await
                .unwrap();
                ws.send(Message::Binary(
                    br#"{"event":"exec:output","data":{"stdout":"bin\n"}}"#.to_vec(),
                ))
                .await
                .unwrap();
                ws.send(Message::Ping(b"hb".to_vec())).await.unwrap();
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Pong(data) = msg {
                        let _ = pong_tx.send(data);
                        break;
                    }
                }
                ws.close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "bye".into(),
                }))
                .await
                .unwrap();
            })
            .await;

            let hub = EventHub::new();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            hub.on(EXEC_OUT_EVENT, move |ev: ExecOutMsg| {
                sink.lock().unwrap().push(ev.stdout);
            });
            let mut disconnects = watch_disconnects(&hub);

            let channel = EventChannel::connect(url, "t", hub.clone()).await.unwrap();
            assert_eq!(channel.sid(), "t");

            let pong = tokio::time::timeout(Duration::from_secs(3), pong_rx.recv())
                .await
                .expect("no pong received");
            assert_eq!(pong, Some(b"hb".to_vec()));

            let reason = tokio::time::timeout(Duration::from_secs(3), disconnects.recv())
                .await
                .expect("no disconnection dispatched");
            assert_eq!(reason, Some(Some("bye".to_string())));
            assert_eq!(seen.lock().unwrap().as_slice(), ["text\n", "bin\n"]);

            tokio::time::sleep(Duration::from_millis(100)).await;
            assert!(disconnects.try_recv().is_err(), "disconnection dispatched twice");
        }

        #[tokio::test]
        async fn early_close_reaches_late_handler() {
            let url = serve(|ws| async move { drop(ws) }).await;
            let hub = EventHub::new();
            let _channel = EventChannel::connect(url, "t", hub.clone()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;

            let mut disconnects = watch_disconnects(&hub);
            let reason = tokio::time::timeout(Duration::from_secs(3), disconnects.recv())
                .await
                .expect("disconnection lost before handler registration");
            assert!(reason.is_some());
            assert!(disconnects.try_recv().is_err());
        }
    }
}
