/*!
Multiwin instance - composition root for registry, operations, creator
and state bridge.

# Example

```ignore
use multiwin::{CreateRequest, Multiwin};

let multiwin = Multiwin::new(host, factory);

let outcome = multiwin.create_and_show(CreateRequest::default()).await?;
multiwin.state_set("theme", serde_json::json!("dark"), None, None)?;

let mut events = multiwin.subscribe();
while let Ok(event) = events.recv().await {
    // handle event
}
```
*/

use crate::creator::{CreateOutcome, CreateRequest, RetryPolicy, WindowCreator};
use crate::host::{ChannelEndpoint, HostRuntime, HostWindow, WindowFactory};
use crate::operations::WindowOperations;
use crate::registry::{RegisterOptions, WindowRegistry, DEFAULT_MAX_WINDOWS};
use crate::state::{self, StateBridge, DEFAULT_STATE_EVENT};
use crate::types::{
  Bounds, Event, MultiwinResult, Permission, Snapshot, WindowId, WindowInfo,
};
use async_broadcast::{InactiveReceiver, Sender};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;

const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main multiwin instance - owns window state, shared state, and event
/// broadcasting.
///
/// Clone is cheap (Arc bumps) - share freely across threads. Multiple
/// independent instances can coexist in one process; nothing here is
/// global.
pub struct Multiwin {
  registry: Arc<RwLock<WindowRegistry>>,
  bridge: Arc<RwLock<StateBridge>>,
  operations: Arc<WindowOperations>,
  creator: Arc<WindowCreator>,
  host: Arc<dyn HostRuntime>,
  events_tx: Sender<Event>,
  events_keepalive: InactiveReceiver<Event>,
}

impl Clone for Multiwin {
  fn clone(&self) -> Self {
    Self {
      registry: Arc::clone(&self.registry),
      bridge: Arc::clone(&self.bridge),
      operations: Arc::clone(&self.operations),
      creator: Arc::clone(&self.creator),
      host: Arc::clone(&self.host),
      events_tx: self.events_tx.clone(),
      events_keepalive: self.events_keepalive.clone(),
    }
  }
}

impl std::fmt::Debug for Multiwin {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Multiwin").finish_non_exhaustive()
  }
}

/// Builder for configuring a [`Multiwin`] instance.
///
/// # Example
///
/// ```ignore
/// let multiwin = Multiwin::builder()
///     .max_windows(10)
///     .quit_on_close(false)
///     .strict_create(true)
///     .build(host, factory);
/// ```
#[derive(Debug, Clone)]
#[must_use = "Builder does nothing until .build() is called"]
pub struct MultiwinBuilder {
  max_windows: usize,
  event_name: String,
  retry: RetryPolicy,
  strict_create: bool,
  quit_on_close: bool,
}

impl Default for MultiwinBuilder {
  fn default() -> Self {
    Self {
      max_windows: DEFAULT_MAX_WINDOWS,
      event_name: DEFAULT_STATE_EVENT.to_owned(),
      retry: RetryPolicy::default(),
      strict_create: false,
      quit_on_close: true,
    }
  }
}

impl MultiwinBuilder {
  /// Cap on concurrently registered windows. Default: 50.
  pub const fn max_windows(mut self, max: usize) -> Self {
    self.max_windows = max;
    self
  }

  /// Default notification name for state changes.
  pub fn event_name(mut self, name: impl Into<String>) -> Self {
    self.event_name = name.into();
    self
  }

  /// Recovery policy for `create_and_show`. Default: 3 retries, 500ms
  /// backoff.
  pub const fn retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Report an exhausted creation recovery loop as an error instead of
  /// logging it. Default: false.
  pub const fn strict_create(mut self, strict: bool) -> Self {
    self.strict_create = strict;
    self
  }

  /// Ask the host application to quit when a window is closed through
  /// the operations layer. Default: true.
  pub const fn quit_on_close(mut self, quit: bool) -> Self {
    self.quit_on_close = quit;
    self
  }

  /// Build the instance against a host runtime and window factory.
  pub fn build(self, host: Arc<dyn HostRuntime>, factory: Arc<dyn WindowFactory>) -> Multiwin {
    let (mut tx, rx) = async_broadcast::broadcast(EVENT_CHANNEL_CAPACITY);
    tx.set_overflow(true); // Drop oldest messages when full

    // Registry and bridge each own a clone of the sender for emission.
    let registry = Arc::new(RwLock::new(WindowRegistry::with_capacity(
      Arc::clone(&host),
      tx.clone(),
      self.max_windows,
    )));
    let bridge = Arc::new(RwLock::new(StateBridge::with_event_name(
      tx.clone(),
      self.event_name,
    )));
    let operations = Arc::new(WindowOperations::new(
      Arc::clone(&registry),
      Arc::clone(&host),
      self.quit_on_close,
    ));
    let creator = Arc::new(WindowCreator::new(
      Arc::clone(&registry),
      factory,
      self.retry,
      self.strict_create,
    ));

    Multiwin {
      registry,
      bridge,
      operations,
      creator,
      host,
      events_tx: tx,
      events_keepalive: rx.deactivate(),
    }
  }
}

impl Multiwin {
  /// Instance with default options.
  pub fn new(host: Arc<dyn HostRuntime>, factory: Arc<dyn WindowFactory>) -> Self {
    Self::builder().build(host, factory)
  }

  /// Builder for a configured instance.
  pub fn builder() -> MultiwinBuilder {
    MultiwinBuilder::default()
  }

  /// Subscribe to events from this instance.
  pub fn subscribe(&self) -> async_broadcast::Receiver<Event> {
    self.events_keepalive.activate_cloned()
  }

  /// Read window state. Never call host functions inside the closure.
  #[inline]
  fn read<R>(&self, f: impl FnOnce(&WindowRegistry) -> R) -> R {
    f(&self.registry.read())
  }

  /// Write window state. Never call host functions inside the closure.
  #[inline]
  fn write<R>(&self, f: impl FnOnce(&mut WindowRegistry) -> R) -> R {
    f(&mut self.registry.write())
  }

  /// Read shared state. Never call host functions inside the closure.
  #[inline]
  fn state<R>(&self, f: impl FnOnce(&StateBridge) -> R) -> R {
    f(&self.bridge.read())
  }

  /// Write shared state. Never call host functions inside the closure.
  #[inline]
  fn state_mut<R>(&self, f: impl FnOnce(&mut StateBridge) -> R) -> R {
    f(&mut self.bridge.write())
  }

  // ---- Windows ----

  /// Register an existing host window.
  pub fn register(
    &self,
    handle: Arc<dyn HostWindow>,
    options: RegisterOptions,
  ) -> MultiwinResult<WindowId> {
    self.write(|registry| registry.register(handle, options))
  }

  /// Remove a window and destroy its handle. Unknown ids are a no-op.
  pub fn remove(&self, id: WindowId) {
    let detached = self.write(|registry| registry.detach(id));
    if let Some(handle) = detached {
      if let Err(e) = handle.destroy() {
        log::warn!("Failed to destroy window {id}: {e}");
      }
    }
  }

  /// Rename a live window.
  pub fn rename(&self, id: WindowId, new_name: &str) -> MultiwinResult<()> {
    self.write(|registry| registry.rename(id, new_name))
  }

  /// Resolve a selector (id token, name, or nothing for focused/main).
  pub fn resolve(&self, selector: Option<&str>) -> Option<WindowId> {
    self.read(|registry| registry.resolve(selector))
  }

  /// The registered window that currently has host focus.
  pub fn focused(&self) -> Option<WindowId> {
    self.read(WindowRegistry::focused)
  }

  /// Live windows, ordered by id.
  pub fn windows(&self) -> Vec<WindowInfo> {
    self.read(WindowRegistry::windows)
  }

  /// Number of live windows.
  pub fn window_count(&self) -> usize {
    self.read(WindowRegistry::count)
  }

  /// Current main window.
  pub fn main_window(&self) -> Option<WindowId> {
    self.read(WindowRegistry::main)
  }

  /// Selector-addressed window operations.
  pub fn operations(&self) -> &WindowOperations {
    &self.operations
  }

  /// Reuse or create the requested window, then reveal it.
  ///
  /// See [`WindowCreator::create_and_show`].
  pub async fn create_and_show(&self, request: CreateRequest) -> MultiwinResult<CreateOutcome> {
    self.creator.create_and_show(request).await
  }

  /// Usable bounds of the primary display.
  pub fn work_area(&self) -> Bounds {
    self.host.work_area()
  }

  // ---- Shared state ----

  /// Current value of a state key.
  pub fn state_get(&self, key: &str) -> Option<Value> {
    self.state(|bridge| bridge.get(key))
  }

  /// Every state key currently holding a value.
  pub fn state_snapshot(&self) -> Map<String, Value> {
    self.state(StateBridge::snapshot)
  }

  /// Write a state key, subject to its permission metadata.
  pub fn state_set(
    &self,
    key: &str,
    value: Value,
    origin: Option<WindowId>,
    event_name: Option<&str>,
  ) -> MultiwinResult<()> {
    self.state_mut(|bridge| bridge.set(key, value, origin, event_name))
  }

  /// Remove a state key's value, subject to its permission metadata.
  pub fn state_delete(
    &self,
    key: &str,
    origin: Option<WindowId>,
    event_name: Option<&str>,
  ) -> MultiwinResult<()> {
    self.state_mut(|bridge| bridge.delete(key, origin, event_name))
  }

  /// Wipe every state value, keeping permission metadata.
  pub fn state_clear(&self, origin: Option<WindowId>, event_name: Option<&str>) {
    self.state_mut(|bridge| bridge.clear(origin, event_name));
  }

  /// Permission metadata for a state key.
  pub fn state_permission(&self, key: &str) -> Option<Permission> {
    self.state(|bridge| bridge.permission(key))
  }

  /// Upsert permission metadata for a state key.
  pub fn set_permission(&self, key: &str, permission: Permission) {
    self.state_mut(|bridge| bridge.set_permission(key, permission));
  }

  /// Attach a window's broadcast channel, replacing any previous one.
  pub fn register_channel<F>(&self, window_id: WindowId, make_endpoint: F)
  where
    F: FnOnce() -> Box<dyn ChannelEndpoint>,
  {
    self.state_mut(|bridge| bridge.register_channel(window_id, make_endpoint));
  }

  /// Detach and close a window's broadcast channel.
  pub fn unregister_channel(&self, window_id: WindowId) {
    self.state_mut(|bridge| bridge.unregister_channel(window_id));
  }

  /// Route a raw `{name, data}` state operation to the store.
  pub fn dispatch_state(&self, name: &str, data: &Value) -> Value {
    self.state_mut(|bridge| state::dispatch_json(bridge, name, data))
  }

  /// Complete picture of this instance: windows, main window, state.
  pub fn snapshot(&self) -> Snapshot {
    let (windows, main) = self.read(|registry| (registry.windows(), registry.main()));
    Snapshot {
      windows,
      main,
      state: self.state_snapshot(),
    }
  }
}
