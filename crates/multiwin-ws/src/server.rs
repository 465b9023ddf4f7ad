/*!
WebSocket server implementation.

One connection per window (or per external observer). Every connection
receives a `sync:init` snapshot on connect, then a stream of instance
events. A connection that registers itself as a window additionally
becomes the delivery target for that window's state broadcast channel:
the bridge's endpoint feeds this connection's outbound queue.
*/

use crate::channel::WsChannel;
use axum::{
  extract::{
    ws::{Message, WebSocket, WebSocketUpgrade},
    State,
  },
  response::Response,
  routing::get,
  Router,
};
use log::error;
use multiwin::{Event, Multiwin, WindowId};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::{Any, CorsLayer};

/// Default WebSocket server port.
pub const DEFAULT_WS_PORT: u16 = 3030;
const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Handler for app-specific RPC methods.
pub type CustomRpcHandler = Arc<dyn Fn(&str, &Value) -> Option<Value> + Send + Sync>;

/// WebSocket state.
#[derive(Clone)]
pub struct WebSocketState {
  multiwin: Multiwin,
  json_sender: Arc<broadcast::Sender<String>>,
  custom_handler: Option<CustomRpcHandler>,
  port: u16,
}

impl std::fmt::Debug for WebSocketState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WebSocketState")
      .field("port", &self.port)
      .finish_non_exhaustive()
  }
}

impl WebSocketState {
  /// Create with default port.
  pub fn new(multiwin: Multiwin) -> Self {
    Self::with_port(multiwin, DEFAULT_WS_PORT)
  }

  /// Create with custom port.
  pub fn with_port(multiwin: Multiwin, port: u16) -> Self {
    let (json_tx, _) = broadcast::channel::<String>(DEFAULT_CHANNEL_CAPACITY);
    Self {
      multiwin,
      json_sender: Arc::new(json_tx),
      custom_handler: None,
      port,
    }
  }

  /// Add a custom RPC handler.
  #[must_use]
  pub fn with_custom_handler(mut self, handler: CustomRpcHandler) -> Self {
    self.custom_handler = Some(handler);
    self
  }
}

/// Start the WebSocket server.
pub async fn start_server(ws_state: WebSocketState) {
  let port = ws_state.port;
  let sender = ws_state.json_sender.clone();
  let mut rx = ws_state.multiwin.subscribe();
  tokio::spawn(async move {
    loop {
      match rx.recv().await {
        Ok(event) => {
          if let Ok(json) = serde_json::to_string(&event) {
            drop(sender.send(json));
          }
        }
        Err(async_broadcast::RecvError::Overflowed(n)) => {
          log::warn!("[ws] Event forwarder lagged, dropped {n} events");
        }
        Err(async_broadcast::RecvError::Closed) => break,
      }
    }
  });

  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods(Any)
    .allow_headers(Any);

  let app = Router::new()
    .route("/ws", get(websocket_handler))
    .layer(cors)
    .with_state(ws_state);

  let addr = format!("127.0.0.1:{port}");
  let listener = match tokio::net::TcpListener::bind(&addr).await {
    Ok(l) => l,
    Err(e) => {
      error!("Failed to bind WebSocket server to {addr}: {e}");
      std::process::exit(1);
    }
  };

  println!("WebSocket server: ws://{addr}/ws");

  if let Err(e) = axum::serve(listener, app).await {
    error!("WebSocket server failed: {e}");
    std::process::exit(1);
  }
}

async fn websocket_handler(
  ws: WebSocketUpgrade,
  State(ws_state): State<WebSocketState>,
) -> Response {
  ws.on_upgrade(|socket| handle_websocket(socket, ws_state))
}

async fn handle_websocket(mut socket: WebSocket, ws_state: WebSocketState) {
  let mut events_rx = ws_state.json_sender.subscribe();
  // Outbound queue for this connection's broadcast channel endpoint.
  // The sender half stays alive for the whole connection, so `recv`
  // never yields `None` inside the loop.
  let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
  let mut binding: Option<ChannelBinding> = None;

  let init = Event::SyncInit(ws_state.multiwin.snapshot());
  if let Ok(msg) = serde_json::to_string(&init) {
    if socket.send(Message::Text(msg)).await.is_err() {
      return;
    }
  }

  loop {
    tokio::select! {
        msg = socket.recv() => {
            match msg {
                Some(Ok(Message::Text(text))) => {
                    let response = handle_request(
                        &text,
                        &ws_state,
                        &out_tx,
                        &mut binding,
                    ).await;
                    // Flush changes the request caused before acking it.
                    while let Ok(payload) = out_rx.try_recv() {
                        drop(socket.send(Message::Text(payload)).await);
                    }
                    while let Ok(event_json) = events_rx.try_recv() {
                        drop(socket.send(Message::Text(event_json)).await);
                    }
                    drop(socket.send(Message::Text(response)).await);
                }
                Some(Ok(Message::Close(_))) => {
                    println!("[client] closed connection");
                    break;
                }
                Some(Err(e)) => {
                    eprintln!("WebSocket error: {e}");
                    break;
                }
                None => {
                    println!("[client] disconnected");
                    break;
                }
                _ => {}
            }
        }

        payload = out_rx.recv() => {
            match payload {
                Some(payload) => {
                    if socket.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                None => break,
            }
        }

        broadcast = events_rx.recv() => {
            match broadcast {
                Ok(event_json) => {
                    if socket.send(Message::Text(event_json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("[ws] Client lagged, dropped {n} events - consider increasing event_channel_capacity or client needs resync");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
  }

  release_binding(&ws_state, binding);
}

/// This connection's claim on a window's broadcast channel.
#[derive(Debug)]
struct ChannelBinding {
  window_id: WindowId,
  /// Clone of the endpoint handed to the bridge. Once the bridge closes
  /// it, the binding belongs to someone else.
  channel: WsChannel,
}

impl ChannelBinding {
  fn owns_channel(&self) -> bool {
    !self.channel.is_closed()
  }
}

/// Disconnect cleanup. A reloading window re-registers from its new
/// connection before the old one disconnects; the bridge closed the old
/// endpoint at that point, and tearing the id down here would kill the
/// replacement. Only unregister a binding this connection still owns.
fn release_binding(ws_state: &WebSocketState, binding: Option<ChannelBinding>) {
  if let Some(binding) = binding {
    if binding.owns_channel() {
      ws_state.multiwin.unregister_channel(binding.window_id);
    }
  }
}

#[derive(Debug, Deserialize)]
struct RegisterChannelArgs {
  window_id: WindowId,
}

async fn handle_request(
  request: &str,
  ws_state: &WebSocketState,
  out_tx: &mpsc::UnboundedSender<String>,
  binding: &mut Option<ChannelBinding>,
) -> String {
  let parsed: Result<Value, _> = serde_json::from_str(request);

  let req = match parsed {
    Ok(v) => v,
    Err(e) => return json!({ "error": format!("Invalid JSON: {}", e) }).to_string(),
  };

  let id = req.get("id").cloned().unwrap_or(Value::Null);
  let name = req
    .get("name")
    .and_then(Value::as_str)
    .unwrap_or("")
    .to_string();
  let data = req.get("data").cloned().unwrap_or(Value::Null);

  if let Some(ref handler) = ws_state.custom_handler {
    if let Some(mut response) = handler(&name, &data) {
      if let Some(obj) = response.as_object_mut() {
        obj.insert("id".to_string(), id);
      }
      return response.to_string();
    }
  }

  // Channel registration binds to this connection's outbound queue, so
  // it cannot live in the connection-free rpc surface.
  let mut response = match name.as_str() {
    "register_channel" => register_channel(ws_state, &data, out_tx, binding),
    "unregister_channel" => unregister_channel(ws_state, binding),
    _ => crate::rpc::dispatch_json(&ws_state.multiwin, &name, &data).await,
  };

  if let Some(obj) = response.as_object_mut() {
    obj.insert("id".to_string(), id);
  }
  response.to_string()
}

/// Attach this connection as `window_id`'s broadcast channel target.
/// Re-registering (same or different window) replaces the old binding.
fn register_channel(
  ws_state: &WebSocketState,
  data: &Value,
  out_tx: &mpsc::UnboundedSender<String>,
  binding: &mut Option<ChannelBinding>,
) -> Value {
  let args = match serde_json::from_value::<RegisterChannelArgs>(data.clone()) {
    Ok(args) => args,
    Err(e) => {
      log::warn!("[ws] Invalid register_channel request: {e}");
      return json!({ "error": format!("Invalid request: {}", e) });
    }
  };

  if let Some(old) = binding.take() {
    if old.window_id != args.window_id && old.owns_channel() {
      ws_state.multiwin.unregister_channel(old.window_id);
    }
  }

  let channel = WsChannel::new(out_tx.clone());
  let endpoint = channel.clone();
  ws_state
    .multiwin
    .register_channel(args.window_id, move || Box::new(endpoint));
  *binding = Some(ChannelBinding {
    window_id: args.window_id,
    channel,
  });
  json!({ "result": Value::Null })
}

fn unregister_channel(ws_state: &WebSocketState, binding: &mut Option<ChannelBinding>) -> Value {
  release_binding(ws_state, binding.take());
  json!({ "result": Value::Null })
}

#[cfg(test)]
mod tests {
  use super::*;
  use multiwin::host::mock::{MockFactory, MockRuntime};
  use serde_json::json;

  fn state() -> WebSocketState {
    let multiwin = Multiwin::new(MockRuntime::new(), MockFactory::new());
    WebSocketState::new(multiwin)
  }

  fn bound_window(binding: &Option<ChannelBinding>) -> Option<WindowId> {
    binding.as_ref().map(|b| b.window_id)
  }

  mod requests {
    use super::*;

    #[tokio::test]
    async fn responses_echo_the_request_id() {
      let ws_state = state();
      let (out_tx, _out_rx) = mpsc::unbounded_channel();
      let mut registered = None;

      let response = handle_request(
        &json!({ "id": 7, "name": "windows" }).to_string(),
        &ws_state,
        &out_tx,
        &mut registered,
      )
      .await;

      let value: Value = serde_json::from_str(&response).unwrap();
      assert_eq!(value["id"], json!(7));
      assert_eq!(value["result"], json!([]));
    }

    #[tokio::test]
    async fn invalid_json_is_reported() {
      let ws_state = state();
      let (out_tx, _out_rx) = mpsc::unbounded_channel();
      let mut registered = None;

      let response =
        handle_request("{not json", &ws_state, &out_tx, &mut registered).await;
      let value: Value = serde_json::from_str(&response).unwrap();
      assert!(value["error"].as_str().unwrap().starts_with("Invalid JSON"));
    }

    #[tokio::test]
    async fn custom_handler_takes_precedence() {
      let ws_state = state().with_custom_handler(Arc::new(|name, _data| {
        (name == "app_version").then(|| json!({ "result": "1.2.3" }))
      }));
      let (out_tx, _out_rx) = mpsc::unbounded_channel();
      let mut registered = None;

      let response = handle_request(
        &json!({ "id": 1, "name": "app_version" }).to_string(),
        &ws_state,
        &out_tx,
        &mut registered,
      )
      .await;

      let value: Value = serde_json::from_str(&response).unwrap();
      assert_eq!(value["result"], json!("1.2.3"));
    }
  }

  mod channels {
    use super::*;

    #[tokio::test]
    async fn registered_connection_receives_state_changes() {
      let ws_state = state();
      let (out_tx, mut out_rx) = mpsc::unbounded_channel();
      let mut registered = None;

      handle_request(
        &json!({ "name": "register_channel", "data": { "window_id": 1 } }).to_string(),
        &ws_state,
        &out_tx,
        &mut registered,
      )
      .await;
      assert_eq!(bound_window(&registered), Some(WindowId(1)));

      // A change originating elsewhere lands in this window's queue.
      ws_state
        .multiwin
        .state_set("theme", json!("dark"), Some(WindowId(2)), None)
        .unwrap();

      let payload: Value = serde_json::from_str(&out_rx.recv().await.unwrap()).unwrap();
      assert_eq!(payload["kind"], json!("set"));
      assert_eq!(payload["key"], json!("theme"));
      assert_eq!(payload["new_value"], json!("dark"));
    }

    #[tokio::test]
    async fn own_changes_are_not_echoed_back() {
      let ws_state = state();
      let (out_tx, mut out_rx) = mpsc::unbounded_channel();
      let mut registered = None;

      handle_request(
        &json!({ "name": "register_channel", "data": { "window_id": 1 } }).to_string(),
        &ws_state,
        &out_tx,
        &mut registered,
      )
      .await;

      handle_request(
        &json!({ "name": "set", "data": { "key": "k", "value": 1, "origin_window_id": 1 } })
          .to_string(),
        &ws_state,
        &out_tx,
        &mut registered,
      )
      .await;

      assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn switching_windows_drops_the_old_binding() {
      let ws_state = state();
      let (out_tx, mut out_rx) = mpsc::unbounded_channel();
      let mut registered = None;

      for window_id in [1, 2] {
        handle_request(
          &json!({ "name": "register_channel", "data": { "window_id": window_id } }).to_string(),
          &ws_state,
          &out_tx,
          &mut registered,
        )
        .await;
      }
      assert_eq!(bound_window(&registered), Some(WindowId(2)));

      // Window 1 no longer has a channel: a change from window 2 has
      // nowhere to go.
      ws_state
        .multiwin
        .state_set("k", json!(1), Some(WindowId(2)), None)
        .unwrap();
      assert!(out_rx.try_recv().is_err());

      // But a change from window 1 reaches the connection as window 2.
      ws_state
        .multiwin
        .state_set("k", json!(2), Some(WindowId(1)), None)
        .unwrap();
      assert!(out_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unregister_detaches_the_connection() {
      let ws_state = state();
      let (out_tx, mut out_rx) = mpsc::unbounded_channel();
      let mut registered = None;

      handle_request(
        &json!({ "name": "register_channel", "data": { "window_id": 1 } }).to_string(),
        &ws_state,
        &out_tx,
        &mut registered,
      )
      .await;
      handle_request(
        &json!({ "name": "unregister_channel" }).to_string(),
        &ws_state,
        &out_tx,
        &mut registered,
      )
      .await;

      assert!(registered.is_none());
      ws_state.multiwin.state_set("k", json!(1), None, None).unwrap();
      assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn register_channel_requires_a_window_id() {
      let ws_state = state();
      let (out_tx, _out_rx) = mpsc::unbounded_channel();
      let mut registered = None;

      let response = handle_request(
        &json!({ "name": "register_channel", "data": {} }).to_string(),
        &ws_state,
        &out_tx,
        &mut registered,
      )
      .await;

      let value: Value = serde_json::from_str(&response).unwrap();
      assert!(value["error"].as_str().unwrap().starts_with("Invalid request"));
      assert!(registered.is_none());
    }

    #[tokio::test]
    async fn stale_disconnect_keeps_the_replacement_channel() {
      let ws_state = state();

      let (old_tx, _old_rx) = mpsc::unbounded_channel();
      let mut old_binding = None;
      handle_request(
        &json!({ "name": "register_channel", "data": { "window_id": 1 } }).to_string(),
        &ws_state,
        &old_tx,
        &mut old_binding,
      )
      .await;

      // The window reloads: its new connection takes over the same id
      // before the old connection goes away.
      let (new_tx, mut new_rx) = mpsc::unbounded_channel();
      let mut new_binding = None;
      handle_request(
        &json!({ "name": "register_channel", "data": { "window_id": 1 } }).to_string(),
        &ws_state,
        &new_tx,
        &mut new_binding,
      )
      .await;

      // The old connection's teardown runs after the takeover.
      release_binding(&ws_state, old_binding);

      ws_state
        .multiwin
        .state_set("k", json!(1), Some(WindowId(2)), None)
        .unwrap();
      assert!(new_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn stale_unregister_keeps_the_replacement_channel() {
      let ws_state = state();

      let (old_tx, _old_rx) = mpsc::unbounded_channel();
      let mut old_binding = None;
      handle_request(
        &json!({ "name": "register_channel", "data": { "window_id": 1 } }).to_string(),
        &ws_state,
        &old_tx,
        &mut old_binding,
      )
      .await;

      let (new_tx, mut new_rx) = mpsc::unbounded_channel();
      let mut new_binding = None;
      handle_request(
        &json!({ "name": "register_channel", "data": { "window_id": 1 } }).to_string(),
        &ws_state,
        &new_tx,
        &mut new_binding,
      )
      .await;

      // An explicit unregister from the superseded connection.
      handle_request(
        &json!({ "name": "unregister_channel" }).to_string(),
        &ws_state,
        &old_tx,
        &mut old_binding,
      )
      .await;

      ws_state
        .multiwin
        .state_set("k", json!(1), Some(WindowId(2)), None)
        .unwrap();
      assert!(new_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn owned_binding_is_released_on_disconnect() {
      let ws_state = state();
      let (out_tx, mut out_rx) = mpsc::unbounded_channel();
      let mut registered = None;

      handle_request(
        &json!({ "name": "register_channel", "data": { "window_id": 1 } }).to_string(),
        &ws_state,
        &out_tx,
        &mut registered,
      )
      .await;

      release_binding(&ws_state, registered.take());

      ws_state.multiwin.state_set("k", json!(1), None, None).unwrap();
      assert!(out_rx.try_recv().is_err());
    }
  }
}
