/*!
Host capability traits.

The contract between multiwin and the embedding window runtime. Core code
never talks to the host through anything wider than these traits, which
keeps the whole crate testable against in-memory doubles and keeps host
details from leaking into registry or state logic.
*/

use crate::types::{Bounds, HandleId, MultiwinResult, WindowId};
use serde_json::Value;
use std::sync::Arc;

/// One-shot callback fired when a window is ready to be shown.
pub type ReadyCallback = Box<dyn FnOnce() + Send>;

/// A host window handle.
///
/// Handles are shared (`Arc`) and may outlive the underlying window:
/// every method must tolerate being called after destruction. Getters
/// (`host_id`, `is_destroyed`, `is_fullscreen`) are called with registry
/// locks held, so implementations must keep them cheap and must not call
/// back into multiwin from them.
pub trait HostWindow: Send + Sync {
  /// Host-side identity of the window. Stable for the handle's lifetime.
  fn host_id(&self) -> HandleId;

  /// Whether the host has destroyed the underlying window.
  fn is_destroyed(&self) -> bool;

  /// Make the window visible.
  fn show(&self);

  /// Hide the window without destroying it.
  fn hide(&self);

  /// Minimize the window.
  fn minimize(&self);

  /// Maximize the window.
  fn maximize(&self);

  /// Undo a maximize.
  fn unmaximize(&self);

  /// Restore from the minimized state.
  fn restore(&self);

  /// Give the window input focus.
  fn focus(&self);

  /// Enter or leave fullscreen.
  fn set_fullscreen(&self, fullscreen: bool);

  /// Whether the window is currently fullscreen.
  fn is_fullscreen(&self) -> bool;

  /// Exclude or include the window in the taskbar/dock.
  fn set_skip_taskbar(&self, skip: bool);

  /// Allow or prevent the user moving the window.
  fn set_movable(&self, movable: bool);

  /// Ask the window to close gracefully.
  fn close(&self) -> MultiwinResult<()>;

  /// Tear the window down immediately.
  fn destroy(&self) -> MultiwinResult<()>;

  /// Register a one-shot callback for the window's first-paint signal.
  ///
  /// Fires immediately if the window is already paintable. Callbacks for
  /// windows that get destroyed first are dropped, never fired.
  fn on_ready_to_show(&self, callback: ReadyCallback);

  /// Deliver a named payload to the window's content layer.
  fn send(&self, channel: &str, payload: &Value) -> MultiwinResult<()>;
}

/// Process-wide host operations.
pub trait HostRuntime: Send + Sync {
  /// Host identity of the currently focused window, if any window of this
  /// process has focus.
  fn focused_window(&self) -> Option<HandleId>;

  /// Usable bounds of the primary display, excluding taskbars and docks.
  fn work_area(&self) -> Bounds;

  /// Ask the host application to quit.
  fn quit(&self);
}

/// Constructs host windows on behalf of [`WindowCreator`].
///
/// [`WindowCreator`]: crate::WindowCreator
pub trait WindowFactory: Send + Sync {
  /// Create a new host window.
  fn create(&self, spec: &CreateSpec) -> MultiwinResult<Arc<dyn HostWindow>>;
}

/// Everything a [`WindowFactory`] gets to see about a creation request.
#[derive(Debug, Clone, Default)]
pub struct CreateSpec {
  /// Logical id the window will be registered under, when already known
  /// (always known on recovery retries).
  pub id: Option<WindowId>,
  /// Requested registry name, if the caller supplied one.
  pub name: Option<String>,
  /// Host window options, passed through opaquely.
  pub options: Value,
}

/// Sending half of a per-window broadcast channel.
///
/// Endpoints queue payloads in FIFO order towards one window. Delivery is
/// best effort; a failed or closed endpoint reports an error and the
/// caller decides what to do about it.
pub trait ChannelEndpoint: Send + Sync {
  /// Queue one serialized payload towards the window.
  fn post_message(&self, payload: &str) -> MultiwinResult<()>;

  /// Close the channel. Idempotent; posting afterwards fails.
  fn close(&self);
}
