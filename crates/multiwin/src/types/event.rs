/*!
Event types for window lifecycle and shared-state changes.

Events are broadcast on the instance-wide channel; transports serialize
them as tagged JSON (`{"event": "...", "data": ...}`).
*/

use super::{ChangeEvent, WindowId, WindowInfo};
use serde::Serialize;
use serde_json::{Map, Value};
use ts_rs::TS;

/// Events emitted when windows or shared state change.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export)]
pub enum Event {
  /// Initial state sent to a transport when it connects.
  #[serde(rename = "sync:init")]
  SyncInit(Snapshot),

  /// A window was registered.
  #[serde(rename = "window:registered")]
  WindowRegistered {
    /// The new registration.
    window: WindowInfo,
  },

  /// A window's name changed.
  #[serde(rename = "window:renamed")]
  WindowRenamed {
    /// Renamed window.
    window_id: WindowId,
    /// Name it now goes by.
    name: String,
  },

  /// A window was removed from the registry.
  #[serde(rename = "window:removed")]
  WindowRemoved {
    /// Removed window.
    window_id: WindowId,
  },

  /// A shared-state mutation went through.
  #[serde(rename = "state:changed")]
  StateChanged {
    /// Notification name the mutation was published under.
    name: String,
    /// What changed.
    change: ChangeEvent,
  },
}

/// Complete picture of an instance at one point in time.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct Snapshot {
  /// Live windows, ordered by id.
  pub windows: Vec<WindowInfo>,
  /// Current main window, if any.
  pub main: Option<WindowId>,
  /// Shared-state keys that currently hold a value.
  #[ts(type = "Record<string, unknown>")]
  pub state: Map<String, Value>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn events_serialize_with_tag_and_data() {
    let event = Event::WindowRemoved {
      window_id: WindowId(3),
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(
      value,
      json!({ "event": "window:removed", "data": { "window_id": 3 } })
    );
  }

  #[test]
  fn sync_init_carries_full_snapshot() {
    let event = Event::SyncInit(Snapshot {
      windows: vec![WindowInfo {
        id: WindowId(1),
        name: "main".to_owned(),
      }],
      main: Some(WindowId(1)),
      state: Map::new(),
    });
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["event"], "sync:init");
    assert_eq!(value["data"]["main"], 1);
    assert_eq!(value["data"]["windows"][0]["name"], "main");
  }
}
