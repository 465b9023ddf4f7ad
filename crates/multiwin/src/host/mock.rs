/*!
In-memory host doubles.

Deterministic stand-ins for the host traits, used by this crate's own
tests and exported behind the `mock` feature for embedder test suites.
Windows record the operations applied to them; readiness is fired
manually so tests control exactly when deferred reveals run.
*/

use super::{ChannelEndpoint, CreateSpec, HostRuntime, HostWindow, ReadyCallback, WindowFactory};
use crate::types::{Bounds, HandleId, MultiwinError, MultiwinResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock [`HostRuntime`] with scriptable focus and a fixed work area.
#[derive(Debug)]
pub struct MockRuntime {
  focused: Mutex<Option<HandleId>>,
  work_area: Bounds,
  quit_calls: AtomicUsize,
}

impl MockRuntime {
  /// Runtime with no focused window and a 1920x1080 work area.
  pub fn new() -> Arc<Self> {
    Self::with_work_area(Bounds::new(0.0, 0.0, 1920.0, 1080.0))
  }

  /// Runtime reporting the given work area.
  pub fn with_work_area(work_area: Bounds) -> Arc<Self> {
    Arc::new(Self {
      focused: Mutex::new(None),
      work_area,
      quit_calls: AtomicUsize::new(0),
    })
  }

  /// Script which host window currently has focus.
  pub fn set_focused(&self, handle: Option<HandleId>) {
    *self.focused.lock() = handle;
  }

  /// How many times `quit` was called.
  pub fn quit_count(&self) -> usize {
    self.quit_calls.load(Ordering::SeqCst)
  }
}

impl HostRuntime for MockRuntime {
  fn focused_window(&self) -> Option<HandleId> {
    *self.focused.lock()
  }

  fn work_area(&self) -> Bounds {
    self.work_area
  }

  fn quit(&self) {
    self.quit_calls.fetch_add(1, Ordering::SeqCst);
  }
}

/// Mock [`HostWindow`] that records every operation applied to it.
pub struct MockWindow {
  host_id: HandleId,
  destroyed: AtomicBool,
  fullscreen: AtomicBool,
  fail_close: AtomicBool,
  fail_destroy: AtomicBool,
  calls: Mutex<Vec<String>>,
  skip_taskbar: Mutex<Option<bool>>,
  movable: Mutex<Option<bool>>,
  ready_callbacks: Mutex<Vec<ReadyCallback>>,
  sent: Mutex<Vec<(String, Value)>>,
}

impl MockWindow {
  /// A live window with the given host id.
  pub fn alive(host_id: u64) -> Arc<Self> {
    Arc::new(Self {
      host_id: HandleId(host_id),
      destroyed: AtomicBool::new(false),
      fullscreen: AtomicBool::new(false),
      fail_close: AtomicBool::new(false),
      fail_destroy: AtomicBool::new(false),
      calls: Mutex::new(Vec::new()),
      skip_taskbar: Mutex::new(None),
      movable: Mutex::new(None),
      ready_callbacks: Mutex::new(Vec::new()),
      sent: Mutex::new(Vec::new()),
    })
  }

  /// A window that reports itself destroyed from the start.
  pub fn dead(host_id: u64) -> Arc<Self> {
    let window = Self::alive(host_id);
    window.destroyed.store(true, Ordering::SeqCst);
    window
  }

  /// Flip the window to destroyed, as if the host tore it down.
  pub fn mark_destroyed(&self) {
    self.destroyed.store(true, Ordering::SeqCst);
    self.ready_callbacks.lock().clear();
  }

  /// Make subsequent `close` calls fail.
  pub fn fail_close(&self) {
    self.fail_close.store(true, Ordering::SeqCst);
  }

  /// Make subsequent `destroy` calls fail.
  pub fn fail_destroy(&self) {
    self.fail_destroy.store(true, Ordering::SeqCst);
  }

  /// Fire all pending readiness callbacks, in registration order.
  pub fn fire_ready(&self) {
    let callbacks: Vec<ReadyCallback> = std::mem::take(&mut *self.ready_callbacks.lock());
    for callback in callbacks {
      callback();
    }
  }

  /// Readiness callbacks registered but not yet fired.
  pub fn pending_ready(&self) -> usize {
    self.ready_callbacks.lock().len()
  }

  /// Every recorded operation, in call order.
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().clone()
  }

  /// How many times the named operation ran.
  pub fn call_count(&self, op: &str) -> usize {
    self.calls.lock().iter().filter(|c| *c == op).count()
  }

  /// Last value passed to `set_skip_taskbar`.
  pub fn skip_taskbar(&self) -> Option<bool> {
    *self.skip_taskbar.lock()
  }

  /// Last value passed to `set_movable`.
  pub fn movable(&self) -> Option<bool> {
    *self.movable.lock()
  }

  /// Payloads delivered via `send`, as `(channel, payload)` pairs.
  pub fn sent(&self) -> Vec<(String, Value)> {
    self.sent.lock().clone()
  }

  fn record(&self, op: &str) {
    self.calls.lock().push(op.to_owned());
  }
}

impl fmt::Debug for MockWindow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MockWindow")
      .field("host_id", &self.host_id)
      .field("destroyed", &self.destroyed)
      .finish_non_exhaustive()
  }
}

impl HostWindow for MockWindow {
  fn host_id(&self) -> HandleId {
    self.host_id
  }

  fn is_destroyed(&self) -> bool {
    self.destroyed.load(Ordering::SeqCst)
  }

  fn show(&self) {
    self.record("show");
  }

  fn hide(&self) {
    self.record("hide");
  }

  fn minimize(&self) {
    self.record("minimize");
  }

  fn maximize(&self) {
    self.record("maximize");
  }

  fn unmaximize(&self) {
    self.record("unmaximize");
  }

  fn restore(&self) {
    self.record("restore");
  }

  fn focus(&self) {
    self.record("focus");
  }

  fn set_fullscreen(&self, fullscreen: bool) {
    self.record("set_fullscreen");
    self.fullscreen.store(fullscreen, Ordering::SeqCst);
  }

  fn is_fullscreen(&self) -> bool {
    self.fullscreen.load(Ordering::SeqCst)
  }

  fn set_skip_taskbar(&self, skip: bool) {
    self.record("set_skip_taskbar");
    *self.skip_taskbar.lock() = Some(skip);
  }

  fn set_movable(&self, movable: bool) {
    self.record("set_movable");
    *self.movable.lock() = Some(movable);
  }

  fn close(&self) -> MultiwinResult<()> {
    self.record("close");
    if self.fail_close.load(Ordering::SeqCst) {
      return Err(MultiwinError::Host("close refused".to_owned()));
    }
    Ok(())
  }

  fn destroy(&self) -> MultiwinResult<()> {
    self.record("destroy");
    if self.fail_destroy.load(Ordering::SeqCst) {
      return Err(MultiwinError::Host("destroy refused".to_owned()));
    }
    self.destroyed.store(true, Ordering::SeqCst);
    Ok(())
  }

  fn on_ready_to_show(&self, callback: ReadyCallback) {
    if self.is_destroyed() {
      return;
    }
    self.ready_callbacks.lock().push(callback);
  }

  fn send(&self, channel: &str, payload: &Value) -> MultiwinResult<()> {
    if self.is_destroyed() {
      return Err(MultiwinError::Host("window is destroyed".to_owned()));
    }
    self.sent.lock().push((channel.to_owned(), payload.clone()));
    Ok(())
  }
}

/// Mock [`WindowFactory`] that hands out [`MockWindow`]s.
pub struct MockFactory {
  make_dead: AtomicBool,
  next_host_id: AtomicU64,
  created: Mutex<Vec<Arc<MockWindow>>>,
  specs: Mutex<Vec<CreateSpec>>,
}

impl MockFactory {
  /// Factory producing live windows, host ids counting up from 1000.
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      make_dead: AtomicBool::new(false),
      next_host_id: AtomicU64::new(1000),
      created: Mutex::new(Vec::new()),
      specs: Mutex::new(Vec::new()),
    })
  }

  /// Factory whose every window reports itself destroyed on arrival.
  pub fn always_dead() -> Arc<Self> {
    let factory = Self::new();
    factory.make_dead.store(true, Ordering::SeqCst);
    factory
  }

  /// How many windows have been created.
  pub fn created_count(&self) -> usize {
    self.created.lock().len()
  }

  /// Every window this factory has produced, in creation order.
  pub fn created(&self) -> Vec<Arc<MockWindow>> {
    self.created.lock().clone()
  }

  /// The most recently created window.
  pub fn last_created(&self) -> Option<Arc<MockWindow>> {
    self.created.lock().last().cloned()
  }

  /// The specs passed to `create`, in call order.
  pub fn specs(&self) -> Vec<CreateSpec> {
    self.specs.lock().clone()
  }
}

impl fmt::Debug for MockFactory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MockFactory")
      .field("created", &self.created_count())
      .finish_non_exhaustive()
  }
}

impl WindowFactory for MockFactory {
  fn create(&self, spec: &CreateSpec) -> MultiwinResult<Arc<dyn HostWindow>> {
    self.specs.lock().push(spec.clone());
    let host_id = self.next_host_id.fetch_add(1, Ordering::SeqCst);
    let window = if self.make_dead.load(Ordering::SeqCst) {
      MockWindow::dead(host_id)
    } else {
      MockWindow::alive(host_id)
    };
    self.created.lock().push(Arc::clone(&window));
    Ok(window)
  }
}

/// Mock [`ChannelEndpoint`] collecting posted payloads.
///
/// Clones share storage, so tests can keep one clone and hand the other
/// to the bridge.
#[derive(Debug, Clone, Default)]
pub struct MockChannel {
  inner: Arc<ChannelState>,
}

#[derive(Debug, Default)]
struct ChannelState {
  messages: Mutex<Vec<String>>,
  close_calls: AtomicUsize,
  fail: AtomicBool,
}

impl MockChannel {
  /// A working channel.
  pub fn new() -> Self {
    Self::default()
  }

  /// A channel whose every post fails.
  pub fn failing() -> Self {
    let channel = Self::default();
    channel.inner.fail.store(true, Ordering::SeqCst);
    channel
  }

  /// Payloads posted so far, in order.
  pub fn messages(&self) -> Vec<String> {
    self.inner.messages.lock().clone()
  }

  /// How many times `close` was called.
  pub fn close_count(&self) -> usize {
    self.inner.close_calls.load(Ordering::SeqCst)
  }
}

impl ChannelEndpoint for MockChannel {
  fn post_message(&self, payload: &str) -> MultiwinResult<()> {
    if self.inner.fail.load(Ordering::SeqCst) {
      return Err(MultiwinError::Channel("mock channel failure".to_owned()));
    }
    self.inner.messages.lock().push(payload.to_owned());
    Ok(())
  }

  fn close(&self) {
    self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
  }
}
