/*!
Operation dispatch for the `{name, data}` request shape.

Transports hand incoming requests to [`dispatch_json`] without knowing
the operation set; the store operations (`get`, `set`, `delete`,
`set_permission`) are pre-wired. Results come back without suspension, so
the surface works from synchronous request/response channels. Unknown or
malformed names are logged and answered with an empty result rather than
failing the caller.
*/

use super::StateBridge;
use crate::types::{MultiwinResult, Permission, WindowId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use ts_rs::TS;

/// A state operation addressed by name.
#[derive(Debug, Deserialize, TS)]
#[serde(tag = "name", content = "data", rename_all = "snake_case")]
#[ts(export)]
pub enum StateRequest {
  /// Read one key, or the whole value snapshot when `key` is absent.
  Get {
    #[serde(default)]
    key: Option<String>,
  },
  /// Write one key, subject to its permission metadata.
  Set {
    key: String,
    #[ts(type = "unknown")]
    value: Value,
    #[serde(default)]
    origin_window_id: Option<WindowId>,
    #[serde(default)]
    event_name: Option<String>,
  },
  /// Remove one key's value, subject to its permission metadata.
  Delete {
    key: String,
    #[serde(default)]
    origin_window_id: Option<WindowId>,
    #[serde(default)]
    event_name: Option<String>,
  },
  /// Upsert permission metadata without touching the value.
  SetPermission { key: String, permission: Permission },
}

/// What a dispatched operation produced.
#[derive(Debug, Serialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum StateResponse {
  /// Whole-store snapshot (`get` with no key).
  Snapshot(#[ts(type = "Record<string, unknown>")] serde_json::Map<String, Value>),
  /// Single value; `null` when the key holds none.
  Value(#[ts(type = "unknown")] Value),
  /// Mutation outcome.
  Outcome(WriteOutcome),
}

/// Outcome of a mutation, reported as data rather than a transport
/// failure so remote callers can show the denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WriteOutcome {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl WriteOutcome {
  fn from_result(result: MultiwinResult<()>) -> Self {
    match result {
      Ok(()) => Self {
        success: true,
        error: None,
      },
      Err(e) => Self {
        success: false,
        error: Some(e.to_string()),
      },
    }
  }
}

/// Run one state operation against the bridge.
pub fn dispatch(bridge: &mut StateBridge, request: StateRequest) -> StateResponse {
  match request {
    StateRequest::Get { key } => match key {
      Some(key) => StateResponse::Value(bridge.get(&key).unwrap_or(Value::Null)),
      None => StateResponse::Snapshot(bridge.snapshot()),
    },
    StateRequest::Set {
      key,
      value,
      origin_window_id,
      event_name,
    } => StateResponse::Outcome(WriteOutcome::from_result(bridge.set(
      &key,
      value,
      origin_window_id,
      event_name.as_deref(),
    ))),
    StateRequest::Delete {
      key,
      origin_window_id,
      event_name,
    } => StateResponse::Outcome(WriteOutcome::from_result(bridge.delete(
      &key,
      origin_window_id,
      event_name.as_deref(),
    ))),
    StateRequest::SetPermission { key, permission } => {
      bridge.set_permission(&key, permission);
      StateResponse::Outcome(WriteOutcome::from_result(Ok(())))
    }
  }
}

/// Route a raw `{name, data}` request to the store.
///
/// Unknown names (and payloads that don't fit the named operation) warn
/// and produce `null`.
pub fn dispatch_json(bridge: &mut StateBridge, name: &str, data: &Value) -> Value {
  let data = if data.is_null() {
    json!({})
  } else {
    data.clone()
  };
  match serde_json::from_value::<StateRequest>(json!({ "name": name, "data": data })) {
    Ok(request) => {
      serde_json::to_value(dispatch(bridge, request)).unwrap_or_else(|e| {
        log::error!("Failed to serialize state response: {e}");
        Value::Null
      })
    }
    Err(e) => {
      log::warn!("Unknown state operation {name:?}: {e}");
      Value::Null
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bridge() -> StateBridge {
    let (tx, _rx) = async_broadcast::broadcast(64);
    StateBridge::new(tx)
  }

  mod get {
    use super::*;

    #[test]
    fn single_key_returns_its_value() {
      let mut bridge = bridge();
      bridge.set("theme", json!("dark"), None, None).unwrap();

      let result = dispatch_json(&mut bridge, "get", &json!({ "key": "theme" }));
      assert_eq!(result, json!("dark"));
    }

    #[test]
    fn missing_key_returns_null() {
      let mut bridge = bridge();
      let result = dispatch_json(&mut bridge, "get", &json!({ "key": "missing" }));
      assert_eq!(result, Value::Null);
    }

    #[test]
    fn no_key_returns_the_snapshot() {
      let mut bridge = bridge();
      bridge.set("a", json!(1), None, None).unwrap();
      bridge.set("b", json!(2), None, None).unwrap();

      let result = dispatch_json(&mut bridge, "get", &Value::Null);
      assert_eq!(result, json!({ "a": 1, "b": 2 }));
    }
  }

  mod mutations {
    use super::*;

    #[test]
    fn set_writes_and_reports_success() {
      let mut bridge = bridge();
      let result = dispatch_json(
        &mut bridge,
        "set",
        &json!({ "key": "theme", "value": "dark", "origin_window_id": 3 }),
      );
      assert_eq!(result, json!({ "success": true }));
      assert_eq!(bridge.get("theme"), Some(json!("dark")));
    }

    #[test]
    fn denied_set_reports_the_denial_in_band() {
      let mut bridge = bridge();
      dispatch_json(
        &mut bridge,
        "set_permission",
        &json!({ "key": "locked", "permission": { "readonly": true } }),
      );

      let result = dispatch_json(
        &mut bridge,
        "set",
        &json!({ "key": "locked", "value": 1, "origin_window_id": 2 }),
      );
      assert_eq!(result["success"], json!(false));
      assert!(result["error"].as_str().unwrap().contains("readonly"));
    }

    #[test]
    fn delete_removes_the_value() {
      let mut bridge = bridge();
      bridge.set("tmp", json!(1), None, None).unwrap();

      let result = dispatch_json(&mut bridge, "delete", &json!({ "key": "tmp" }));
      assert_eq!(result, json!({ "success": true }));
      assert_eq!(bridge.get("tmp"), None);
    }

    #[test]
    fn set_permission_installs_the_allow_list() {
      let mut bridge = bridge();
      dispatch_json(
        &mut bridge,
        "set_permission",
        &json!({ "key": "cursor", "permission": { "allowed_windows": [1, 2] } }),
      );

      let denied = dispatch_json(
        &mut bridge,
        "set",
        &json!({ "key": "cursor", "value": 5, "origin_window_id": 9 }),
      );
      assert_eq!(denied["success"], json!(false));

      let allowed = dispatch_json(
        &mut bridge,
        "set",
        &json!({ "key": "cursor", "value": 5, "origin_window_id": 1 }),
      );
      assert_eq!(allowed, json!({ "success": true }));
    }
  }

  mod unknown {
    use super::*;

    #[test]
    fn unknown_names_answer_with_null() {
      let mut bridge = bridge();
      let result = dispatch_json(&mut bridge, "frobnicate", &json!({ "key": "x" }));
      assert_eq!(result, Value::Null);
    }

    #[test]
    fn malformed_payloads_answer_with_null() {
      let mut bridge = bridge();
      // `set` without a key.
      let result = dispatch_json(&mut bridge, "set", &json!({ "value": 1 }));
      assert_eq!(result, Value::Null);
      assert!(bridge.snapshot().is_empty());
    }
  }
}
