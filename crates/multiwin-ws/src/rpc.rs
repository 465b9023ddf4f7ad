/*!
RPC request/response types and dispatch.

Window and lifecycle methods are the transport's own vocabulary, typed
out below. The shared-state operations (`get`, `set`, `delete`,
`set_permission`) are not re-declared here: their `{name, data}` requests
are routed straight into the bridge's dispatch surface, which also
answers names nobody owns with a warning and a `null` result.
*/

#![allow(missing_docs)]

use multiwin::{Bounds, CreateOutcome, CreateRequest, Multiwin, Snapshot, WindowId, WindowInfo};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use ts_rs::TS;

/// RPC request.
///
/// Window-selector fields accept an id token, a name, or nothing at all
/// (focused window, else main) - the registry's resolution rules.
#[derive(Debug, Deserialize, TS)]
#[serde(tag = "name", content = "data", rename_all = "snake_case")]
#[ts(export)]
pub enum RpcRequest {
  /// Get a snapshot of windows, main window, and shared state.
  Snapshot {},
  /// List live windows.
  Windows {},
  /// Create a window, or reveal the live one registered under `id`.
  CreateWindow {
    #[serde(default)]
    id: Option<WindowId>,
    #[serde(default)]
    name: Option<String>,
    /// Host window options, passed through to the factory untouched.
    #[serde(default)]
    #[ts(type = "unknown")]
    options: JsonValue,
  },
  /// Make a window visible.
  Show {
    #[serde(default)]
    window: Option<String>,
  },
  /// Hide a window without closing it.
  Hide {
    #[serde(default)]
    window: Option<String>,
  },
  /// Minimize a window.
  Minimize {
    #[serde(default)]
    window: Option<String>,
  },
  /// Maximize a window.
  Maximize {
    #[serde(default)]
    window: Option<String>,
  },
  /// Undo a maximize.
  Unmaximize {
    #[serde(default)]
    window: Option<String>,
  },
  /// Restore a window from the minimized state.
  Restore {
    #[serde(default)]
    window: Option<String>,
  },
  /// Give a window input focus.
  Focus {
    #[serde(default)]
    window: Option<String>,
  },
  /// Flip a window in or out of fullscreen.
  ToggleFullscreen {
    #[serde(default)]
    window: Option<String>,
  },
  /// Exclude or include a window in the taskbar/dock.
  SetSkipTaskbar {
    #[serde(default)]
    window: Option<String>,
    skip: bool,
  },
  /// Allow or prevent the user moving a window.
  SetMovable {
    #[serde(default)]
    window: Option<String>,
    movable: bool,
  },
  /// Close a window and drop its registration.
  CloseWindow {
    #[serde(default)]
    window: Option<String>,
  },
  /// Rename a live window.
  Rename { window_id: WindowId, name: String },
  /// Usable bounds of the primary display.
  WorkArea {},
}

/// RPC response.
#[derive(Debug, Serialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum RpcResponse {
  /// Full snapshot.
  Snapshot(Box<Snapshot>),
  /// Live window list.
  Windows(Vec<WindowInfo>),
  /// What `create_window` did.
  Created(CreateOutcome),
  /// Primary display work area.
  WorkArea(Bounds),
  /// No data.
  Null,
}

/// Whether the transport surface owns this request name.
fn is_transport_method(name: &str) -> bool {
  matches!(
    name,
    "snapshot"
      | "windows"
      | "create_window"
      | "show"
      | "hide"
      | "minimize"
      | "maximize"
      | "unmaximize"
      | "restore"
      | "focus"
      | "toggle_fullscreen"
      | "set_skip_taskbar"
      | "set_movable"
      | "close_window"
      | "rename"
      | "work_area"
  )
}

pub async fn dispatch_json(multiwin: &Multiwin, name: &str, data: &JsonValue) -> JsonValue {
  let data = if data.is_null() {
    json!({})
  } else {
    data.clone()
  };

  if !is_transport_method(name) {
    return json!({ "result": multiwin.dispatch_state(name, &data) });
  }

  match serde_json::from_value::<RpcRequest>(json!({ "name": name, "data": data })) {
    Ok(request) => match dispatch(multiwin, request).await {
      Ok(response) => json!({ "result": response }),
      Err(e) => {
        log::warn!("[rpc] {name} failed: {e}");
        json!({ "error": e })
      }
    },
    Err(e) => {
      log::warn!("[rpc] Invalid request for {name}: {e}");
      json!({ "error": format!("Invalid request: {}", e) })
    }
  }
}

pub async fn dispatch(multiwin: &Multiwin, request: RpcRequest) -> Result<RpcResponse, String> {
  match request {
    RpcRequest::Snapshot {} => Ok(RpcResponse::Snapshot(Box::new(multiwin.snapshot()))),

    RpcRequest::Windows {} => Ok(RpcResponse::Windows(multiwin.windows())),

    RpcRequest::CreateWindow { id, name, options } => {
      let outcome = multiwin
        .create_and_show(CreateRequest { id, name, options })
        .await
        .map_err(|e| e.to_string())?;
      Ok(RpcResponse::Created(outcome))
    }

    RpcRequest::Show { window } => {
      multiwin.operations().show(window.as_deref());
      Ok(RpcResponse::Null)
    }

    RpcRequest::Hide { window } => {
      multiwin.operations().hide(window.as_deref());
      Ok(RpcResponse::Null)
    }

    RpcRequest::Minimize { window } => {
      multiwin.operations().minimize(window.as_deref());
      Ok(RpcResponse::Null)
    }

    RpcRequest::Maximize { window } => {
      multiwin.operations().maximize(window.as_deref());
      Ok(RpcResponse::Null)
    }

    RpcRequest::Unmaximize { window } => {
      multiwin.operations().unmaximize(window.as_deref());
      Ok(RpcResponse::Null)
    }

    RpcRequest::Restore { window } => {
      multiwin.operations().restore(window.as_deref());
      Ok(RpcResponse::Null)
    }

    RpcRequest::Focus { window } => {
      multiwin.operations().focus(window.as_deref());
      Ok(RpcResponse::Null)
    }

    RpcRequest::ToggleFullscreen { window } => {
      multiwin.operations().toggle_fullscreen(window.as_deref());
      Ok(RpcResponse::Null)
    }

    RpcRequest::SetSkipTaskbar { window, skip } => {
      multiwin.operations().set_skip_taskbar(window.as_deref(), skip);
      Ok(RpcResponse::Null)
    }

    RpcRequest::SetMovable { window, movable } => {
      multiwin.operations().set_movable(window.as_deref(), movable);
      Ok(RpcResponse::Null)
    }

    RpcRequest::CloseWindow { window } => {
      multiwin.operations().close(window.as_deref());
      Ok(RpcResponse::Null)
    }

    RpcRequest::Rename { window_id, name } => {
      multiwin.rename(window_id, &name).map_err(|e| e.to_string())?;
      Ok(RpcResponse::Null)
    }

    RpcRequest::WorkArea {} => Ok(RpcResponse::WorkArea(multiwin.work_area())),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use multiwin::host::mock::{MockFactory, MockRuntime, MockWindow};
  use multiwin::host::HostWindow;
  use multiwin::RegisterOptions;
  use std::sync::Arc;

  fn instance() -> (Multiwin, Arc<MockRuntime>, Arc<MockFactory>) {
    let host = MockRuntime::new();
    let factory = MockFactory::new();
    let multiwin = Multiwin::new(host.clone(), factory.clone());
    (multiwin, host, factory)
  }

  fn register_named(multiwin: &Multiwin, host_id: u64, name: &str) -> WindowId {
    multiwin
      .register(
        MockWindow::alive(host_id),
        RegisterOptions {
          id: None,
          name: Some(name.to_owned()),
        },
      )
      .unwrap()
  }

  mod window_methods {
    use super::*;

    #[tokio::test]
    async fn snapshot_carries_windows_and_state() {
      let (multiwin, _host, _factory) = instance();
      let id = register_named(&multiwin, 1, "main");
      multiwin.state_set("theme", json!("dark"), None, None).unwrap();

      let result = dispatch_json(&multiwin, "snapshot", &JsonValue::Null).await;
      assert_eq!(result["result"]["main"], json!(id));
      assert_eq!(result["result"]["windows"][0]["name"], json!("main"));
      assert_eq!(result["result"]["state"]["theme"], json!("dark"));
    }

    #[tokio::test]
    async fn create_window_reports_the_outcome() {
      let (multiwin, _host, factory) = instance();

      let result = dispatch_json(
        &multiwin,
        "create_window",
        &json!({ "name": "editor", "options": { "width": 800 } }),
      )
      .await;

      assert_eq!(result["result"]["is_new"], json!(true));
      assert_eq!(factory.created_count(), 1);
      let id = result["result"]["id"].as_u64().unwrap();
      assert_eq!(multiwin.resolve(Some("editor")), Some(WindowId(u32::try_from(id).unwrap())));
    }

    #[tokio::test]
    async fn selector_ops_reach_the_window() {
      let (multiwin, _host, _factory) = instance();
      let window = MockWindow::alive(1);
      multiwin
        .register(
          window.clone(),
          RegisterOptions {
            id: None,
            name: Some("editor".to_owned()),
          },
        )
        .unwrap();

      dispatch_json(&multiwin, "maximize", &json!({ "window": "editor" })).await;
      dispatch_json(&multiwin, "toggle_fullscreen", &json!({ "window": "editor" })).await;
      dispatch_json(
        &multiwin,
        "set_skip_taskbar",
        &json!({ "window": "editor", "skip": true }),
      )
      .await;

      assert_eq!(window.call_count("maximize"), 1);
      assert!(window.is_fullscreen());
      assert_eq!(window.skip_taskbar(), Some(true));
    }

    #[tokio::test]
    async fn close_window_drops_the_registration() {
      let (multiwin, host, _factory) = instance();
      register_named(&multiwin, 1, "only");

      let result = dispatch_json(&multiwin, "close_window", &json!({ "window": "only" })).await;
      assert_eq!(result["result"], JsonValue::Null);
      assert_eq!(multiwin.window_count(), 0);
      assert_eq!(host.quit_count(), 1);
    }

    #[tokio::test]
    async fn show_with_no_data_targets_the_main_window() {
      let (multiwin, _host, _factory) = instance();
      let window = MockWindow::alive(1);
      multiwin.register(window.clone(), RegisterOptions::default()).unwrap();

      dispatch_json(&multiwin, "show", &JsonValue::Null).await;
      assert_eq!(window.call_count("show"), 1);
    }

    #[tokio::test]
    async fn rename_conflicts_surface_as_errors() {
      let (multiwin, _host, _factory) = instance();
      let a = register_named(&multiwin, 1, "editor");
      register_named(&multiwin, 2, "preview");

      let result = dispatch_json(
        &multiwin,
        "rename",
        &json!({ "window_id": a, "name": "preview" }),
      )
      .await;
      assert!(result["error"].as_str().unwrap().contains("preview"));
      assert_eq!(multiwin.resolve(Some("editor")), Some(a));
    }

    #[tokio::test]
    async fn work_area_reports_the_display_bounds() {
      let (multiwin, _host, _factory) = instance();
      let result = dispatch_json(&multiwin, "work_area", &JsonValue::Null).await;
      assert_eq!(result["result"]["w"], json!(1920.0));
    }
  }

  mod state_fallthrough {
    use super::*;

    #[tokio::test]
    async fn state_operations_reach_the_bridge() {
      let (multiwin, _host, _factory) = instance();

      let set = dispatch_json(&multiwin, "set", &json!({ "key": "theme", "value": "dark" })).await;
      assert_eq!(set["result"]["success"], json!(true));

      let get = dispatch_json(&multiwin, "get", &json!({ "key": "theme" })).await;
      assert_eq!(get["result"], json!("dark"));
    }

    #[tokio::test]
    async fn permission_denials_stay_in_band() {
      let (multiwin, _host, _factory) = instance();
      dispatch_json(
        &multiwin,
        "set_permission",
        &json!({ "key": "locked", "permission": { "readonly": true } }),
      )
      .await;

      let denied = dispatch_json(
        &multiwin,
        "set",
        &json!({ "key": "locked", "value": 1, "origin_window_id": 2 }),
      )
      .await;
      assert_eq!(denied["result"]["success"], json!(false));
    }

    #[tokio::test]
    async fn unknown_names_answer_with_null() {
      let (multiwin, _host, _factory) = instance();
      let result = dispatch_json(&multiwin, "frobnicate", &json!({ "key": "x" })).await;
      assert_eq!(result, json!({ "result": null }));
    }
  }

  mod malformed {
    use super::*;

    #[tokio::test]
    async fn bad_payload_for_a_window_method_is_an_error() {
      let (multiwin, _host, _factory) = instance();
      // `rename` without a name.
      let result = dispatch_json(&multiwin, "rename", &json!({ "window_id": 1 })).await;
      assert!(result["error"].as_str().unwrap().starts_with("Invalid request"));
    }

    #[tokio::test]
    async fn every_window_method_name_is_owned_by_the_transport() {
      for name in [
        "snapshot",
        "windows",
        "create_window",
        "show",
        "hide",
        "minimize",
        "maximize",
        "unmaximize",
        "restore",
        "focus",
        "toggle_fullscreen",
        "set_skip_taskbar",
        "set_movable",
        "close_window",
        "rename",
        "work_area",
      ] {
        assert!(is_transport_method(name), "{name} fell through to state dispatch");
      }
      for name in ["get", "set", "delete", "set_permission"] {
        assert!(!is_transport_method(name), "{name} was shadowed by the transport");
      }
    }
  }
}
