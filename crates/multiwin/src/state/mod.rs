/*!
State bridge - shared state with permissions and cross-window fan-out.

- `mod.rs` - `StateBridge`: mutations, per-window broadcast, local events
- `store.rs` - `DataStore`: entries and permission checks
- `dispatch.rs` - the `{name, data}` operation surface for transports

Every successful mutation produces a [`ChangeEvent`] that is posted to
every attached window channel except the mutation's origin (the origin
already knows), then emitted locally as [`Event::StateChanged`].
Broadcast is best effort: each endpoint either delivers in FIFO order or
fails on its own, and one window's dead channel never blocks the rest.
*/

mod dispatch;
mod store;

pub use dispatch::{dispatch, dispatch_json, StateRequest, StateResponse, WriteOutcome};

use crate::host::ChannelEndpoint;
use crate::types::{ChangeEvent, ChangeKind, Event, MultiwinResult, Permission, WindowId};
use async_broadcast::Sender;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use store::DataStore;

/// Notification name used when a mutation does not specify one.
pub const DEFAULT_STATE_EVENT: &str = "state:changed";

/// Permissioned shared state, broadcast to attached windows.
pub struct StateBridge {
  store: DataStore,
  channels: HashMap<WindowId, Box<dyn ChannelEndpoint>>,
  events_tx: Sender<Event>,
  event_name: String,
}

impl StateBridge {
  /// Bridge publishing local notifications under [`DEFAULT_STATE_EVENT`].
  pub fn new(events_tx: Sender<Event>) -> Self {
    Self::with_event_name(events_tx, DEFAULT_STATE_EVENT)
  }

  /// Bridge with a custom default notification name.
  pub fn with_event_name(events_tx: Sender<Event>, event_name: impl Into<String>) -> Self {
    Self {
      store: DataStore::new(),
      channels: HashMap::new(),
      events_tx,
      event_name: event_name.into(),
    }
  }

  /// Current value of a key.
  pub fn get(&self, key: &str) -> Option<Value> {
    self.store.get(key).cloned()
  }

  /// Every key currently holding a value.
  pub fn snapshot(&self) -> Map<String, Value> {
    self.store.snapshot()
  }

  /// Permission metadata for a key.
  pub fn permission(&self, key: &str) -> Option<Permission> {
    self.store.permission(key).cloned()
  }

  /// Write a key, subject to its permission metadata.
  pub fn set(
    &mut self,
    key: &str,
    value: Value,
    origin: Option<WindowId>,
    event_name: Option<&str>,
  ) -> MultiwinResult<()> {
    let old = self.store.set(key, value.clone(), origin)?;
    self.publish(
      ChangeEvent {
        kind: ChangeKind::Set,
        key: Some(key.to_owned()),
        new_value: Some(value),
        old_value: old,
        origin_window_id: origin,
        timestamp: now_millis(),
      },
      event_name,
    );
    Ok(())
  }

  /// Remove a key's value, subject to its permission metadata.
  ///
  /// Deleting a key with no value is a successful no-op and notifies
  /// nobody.
  pub fn delete(
    &mut self,
    key: &str,
    origin: Option<WindowId>,
    event_name: Option<&str>,
  ) -> MultiwinResult<()> {
    let Some(old) = self.store.delete(key, origin)? else {
      return Ok(());
    };
    self.publish(
      ChangeEvent {
        kind: ChangeKind::Delete,
        key: Some(key.to_owned()),
        new_value: None,
        old_value: Some(old),
        origin_window_id: origin,
        timestamp: now_millis(),
      },
      event_name,
    );
    Ok(())
  }

  /// Wipe every value, keeping permission metadata. One `clear` change
  /// is published for the whole wipe.
  pub fn clear(&mut self, origin: Option<WindowId>, event_name: Option<&str>) {
    self.store.clear();
    self.publish(
      ChangeEvent {
        kind: ChangeKind::Clear,
        key: None,
        new_value: None,
        old_value: None,
        origin_window_id: origin,
        timestamp: now_millis(),
      },
      event_name,
    );
  }

  /// Upsert a key's permission metadata without touching its value.
  pub fn set_permission(&mut self, key: &str, permission: Permission) {
    self.store.set_permission(key, permission);
  }

  /// Attach a window's broadcast channel, replacing (and closing) any
  /// previous one before the new endpoint is built.
  pub fn register_channel<F>(&mut self, window_id: WindowId, make_endpoint: F)
  where
    F: FnOnce() -> Box<dyn ChannelEndpoint>,
  {
    if let Some(old) = self.channels.remove(&window_id) {
      log::debug!("Replacing broadcast channel for window {window_id}");
      old.close();
    }
    self.channels.insert(window_id, make_endpoint());
  }

  /// Detach and close a window's broadcast channel.
  pub fn unregister_channel(&mut self, window_id: WindowId) {
    if let Some(channel) = self.channels.remove(&window_id) {
      channel.close();
    }
  }

  /// Number of attached window channels.
  pub fn channel_count(&self) -> usize {
    self.channels.len()
  }

  fn publish(&self, change: ChangeEvent, event_name: Option<&str>) {
    self.broadcast(&change);
    let name = event_name.unwrap_or(&self.event_name).to_owned();
    self.emit(Event::StateChanged { name, change });
  }

  /// Fan a change out to every attached window except its origin.
  fn broadcast(&self, change: &ChangeEvent) {
    let payload = match serde_json::to_string(change) {
      Ok(payload) => payload,
      Err(e) => {
        log::error!("Failed to serialize state change: {e}");
        return;
      }
    };
    for (window_id, channel) in &self.channels {
      if change.origin_window_id == Some(*window_id) {
        continue;
      }
      if let Err(e) = channel.post_message(&payload) {
        log::warn!("State broadcast to window {window_id} failed: {e}");
      }
    }
  }

  fn emit(&self, event: Event) {
    if let Err(e) = self.events_tx.try_broadcast(event) {
      if e.is_full() {
        log::error!("Event channel overflow - events are being dropped.");
      }
    }
  }
}

impl Drop for StateBridge {
  fn drop(&mut self) {
    for (_, channel) in self.channels.drain() {
      channel.close();
    }
  }
}

impl fmt::Debug for StateBridge {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StateBridge")
      .field("channels", &self.channels.len())
      .field("event_name", &self.event_name)
      .finish_non_exhaustive()
  }
}

fn now_millis() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    .unwrap_or(0)
}
