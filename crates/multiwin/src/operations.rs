/*!
Window operations - selector-addressed control of live windows.

Every operation resolves its target through the registry, so callers can
address windows by id token, by name, or with no selector at all (focused
window, else main). Operations come in two strictnesses:

- basic visibility ops (`show`, `hide`, `minimize`, `close`,
  `set_skip_taskbar`, `set_movable`) silently no-op when the selector
  resolves to nothing;
- state-dependent ops (`maximize`, `unmaximize`, `restore`, `focus`,
  `toggle_fullscreen`) additionally skip, with a log line, windows whose
  handle the host has already destroyed.

`close` is the one coupled operation: it also removes the window from the
registry and, unless configured otherwise, asks the host application to
quit.
*/

use crate::host::{HostRuntime, HostWindow};
use crate::registry::WindowRegistry;
use crate::types::WindowId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Selector-addressed window operations.
pub struct WindowOperations {
  registry: Arc<RwLock<WindowRegistry>>,
  host: Arc<dyn HostRuntime>,
  quit_on_close: bool,
}

impl WindowOperations {
  /// Operations over `registry`, quitting via `host` on close when
  /// `quit_on_close` is set.
  pub fn new(
    registry: Arc<RwLock<WindowRegistry>>,
    host: Arc<dyn HostRuntime>,
    quit_on_close: bool,
  ) -> Self {
    Self {
      registry,
      host,
      quit_on_close,
    }
  }

  /// Resolve a selector to a live registration. Returns with the
  /// registry lock released, so host calls on the handle are lock-free.
  fn target(&self, selector: Option<&str>) -> Option<(WindowId, Arc<dyn HostWindow>)> {
    let registry = self.registry.read();
    let id = registry.resolve(selector)?;
    let handle = registry.handle(id)?;
    Some((id, handle))
  }

  /// Like `target`, but skips windows the host has already torn down.
  fn live_target(
    &self,
    selector: Option<&str>,
    op: &str,
  ) -> Option<(WindowId, Arc<dyn HostWindow>)> {
    let (id, handle) = self.target(selector)?;
    if handle.is_destroyed() {
      log::warn!("{op}: window {id} is destroyed, skipping");
      return None;
    }
    Some((id, handle))
  }

  /// Make the target visible.
  pub fn show(&self, selector: Option<&str>) {
    if let Some((_, handle)) = self.target(selector) {
      handle.show();
    }
  }

  /// Hide the target without closing it.
  pub fn hide(&self, selector: Option<&str>) {
    if let Some((_, handle)) = self.target(selector) {
      handle.hide();
    }
  }

  /// Minimize the target.
  pub fn minimize(&self, selector: Option<&str>) {
    if let Some((_, handle)) = self.target(selector) {
      handle.minimize();
    }
  }

  /// Maximize the target.
  pub fn maximize(&self, selector: Option<&str>) {
    if let Some((_, handle)) = self.live_target(selector, "maximize") {
      handle.maximize();
    }
  }

  /// Undo a maximize on the target.
  pub fn unmaximize(&self, selector: Option<&str>) {
    if let Some((_, handle)) = self.live_target(selector, "unmaximize") {
      handle.unmaximize();
    }
  }

  /// Restore the target from the minimized state.
  pub fn restore(&self, selector: Option<&str>) {
    if let Some((_, handle)) = self.live_target(selector, "restore") {
      handle.restore();
    }
  }

  /// Focus the target.
  pub fn focus(&self, selector: Option<&str>) {
    if let Some((_, handle)) = self.live_target(selector, "focus") {
      handle.focus();
    }
  }

  /// Flip the target in or out of fullscreen.
  pub fn toggle_fullscreen(&self, selector: Option<&str>) {
    if let Some((_, handle)) = self.live_target(selector, "toggle_fullscreen") {
      handle.set_fullscreen(!handle.is_fullscreen());
    }
  }

  /// Include or exclude the target from the taskbar/dock.
  pub fn set_skip_taskbar(&self, selector: Option<&str>, skip: bool) {
    if let Some((_, handle)) = self.target(selector) {
      handle.set_skip_taskbar(skip);
    }
  }

  /// Allow or prevent the user moving the target.
  pub fn set_movable(&self, selector: Option<&str>, movable: bool) {
    if let Some((_, handle)) = self.target(selector) {
      handle.set_movable(movable);
    }
  }

  /// Close the target, drop its registration, and (when configured)
  /// quit the application.
  ///
  /// An unresolvable selector is a silent no-op and never quits.
  pub fn close(&self, selector: Option<&str>) {
    let Some((id, handle)) = self.target(selector) else {
      return;
    };

    if let Err(e) = handle.close() {
      log::warn!("Close request for window {id} failed: {e}");
    }

    let detached = self.registry.write().detach(id);
    if let Some(detached) = detached {
      if let Err(e) = detached.destroy() {
        log::warn!("Failed to destroy window {id}: {e}");
      }
    }

    if self.quit_on_close {
      self.host.quit();
    }
  }
}

impl fmt::Debug for WindowOperations {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WindowOperations")
      .field("quit_on_close", &self.quit_on_close)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::host::mock::{MockRuntime, MockWindow};
  use crate::registry::RegisterOptions;
  use crate::types::HandleId;

  struct Fixture {
    ops: WindowOperations,
    registry: Arc<RwLock<WindowRegistry>>,
    host: Arc<MockRuntime>,
    window: Arc<MockWindow>,
    id: WindowId,
  }

  fn fixture(quit_on_close: bool) -> Fixture {
    let host = MockRuntime::new();
    let (tx, _rx) = async_broadcast::broadcast(64);
    let registry = Arc::new(RwLock::new(WindowRegistry::new(host.clone(), tx)));

    let window = MockWindow::alive(1);
    let id = registry
      .write()
      .register(
        window.clone(),
        RegisterOptions {
          id: None,
          name: Some("editor".to_owned()),
        },
      )
      .unwrap();

    let ops = WindowOperations::new(registry.clone(), host.clone(), quit_on_close);
    Fixture {
      ops,
      registry,
      host,
      window,
      id,
    }
  }

  mod targeting {
    use super::*;

    #[test]
    fn addresses_by_name() {
      let f = fixture(true);
      f.ops.show(Some("editor"));
      assert_eq!(f.window.call_count("show"), 1);
    }

    #[test]
    fn addresses_by_id_token() {
      let f = fixture(true);
      f.ops.hide(Some(&f.id.to_string()));
      assert_eq!(f.window.call_count("hide"), 1);
    }

    #[test]
    fn no_selector_uses_focused_window() {
      let f = fixture(true);
      let other = MockWindow::alive(2);
      f.registry
        .write()
        .register(
          other.clone(),
          RegisterOptions {
            id: None,
            name: Some("preview".to_owned()),
          },
        )
        .unwrap();

      f.host.set_focused(Some(HandleId(2)));
      f.ops.minimize(None);
      assert_eq!(other.call_count("minimize"), 1);
      assert_eq!(f.window.call_count("minimize"), 0);
    }

    #[test]
    fn no_selector_falls_back_to_main() {
      let f = fixture(true);
      f.ops.show(None);
      assert_eq!(f.window.call_count("show"), 1);
    }

    #[test]
    fn unresolvable_selector_is_a_silent_noop() {
      let f = fixture(true);
      f.ops.show(Some("missing"));
      f.ops.maximize(Some("missing"));
      assert!(f.window.calls().is_empty());
    }
  }

  mod state_dependent_ops {
    use super::*;

    #[test]
    fn skip_destroyed_windows() {
      let f = fixture(true);
      f.window.mark_destroyed();

      f.ops.maximize(Some("editor"));
      f.ops.focus(Some("editor"));
      f.ops.restore(Some("editor"));
      assert_eq!(f.window.call_count("maximize"), 0);
      assert_eq!(f.window.call_count("focus"), 0);
      assert_eq!(f.window.call_count("restore"), 0);
    }

    #[test]
    fn basic_ops_still_reach_destroyed_windows() {
      let f = fixture(true);
      f.window.mark_destroyed();

      f.ops.hide(Some("editor"));
      assert_eq!(f.window.call_count("hide"), 1);
    }

    #[test]
    fn toggle_fullscreen_flips_state() {
      let f = fixture(true);
      f.ops.toggle_fullscreen(Some("editor"));
      assert!(f.window.is_fullscreen());
      f.ops.toggle_fullscreen(Some("editor"));
      assert!(!f.window.is_fullscreen());
    }
  }

  mod value_ops {
    use super::*;

    #[test]
    fn set_skip_taskbar_passes_the_value_through() {
      let f = fixture(true);
      f.ops.set_skip_taskbar(Some("editor"), true);
      assert_eq!(f.window.skip_taskbar(), Some(true));
      f.ops.set_skip_taskbar(Some("editor"), false);
      assert_eq!(f.window.skip_taskbar(), Some(false));
    }

    #[test]
    fn set_movable_passes_the_value_through() {
      let f = fixture(true);
      f.ops.set_movable(Some("editor"), false);
      assert_eq!(f.window.movable(), Some(false));
    }
  }

  mod close {
    use super::*;

    #[test]
    fn closes_removes_and_quits() {
      let f = fixture(true);
      f.ops.close(Some("editor"));

      assert_eq!(f.window.call_count("close"), 1);
      assert!(!f.registry.read().contains(f.id));
      assert_eq!(f.registry.read().count(), 0);
      assert_eq!(f.host.quit_count(), 1);
    }

    #[test]
    fn quit_can_be_left_to_the_host() {
      let f = fixture(false);
      f.ops.close(Some("editor"));

      assert!(!f.registry.read().contains(f.id));
      assert_eq!(f.host.quit_count(), 0);
    }

    #[test]
    fn unresolvable_close_never_quits() {
      let f = fixture(true);
      f.ops.close(Some("missing"));

      assert_eq!(f.registry.read().count(), 1);
      assert_eq!(f.host.quit_count(), 0);
    }

    #[test]
    fn close_failure_still_removes_and_quits() {
      let f = fixture(true);
      f.window.fail_close();
      f.ops.close(Some("editor"));

      assert!(!f.registry.read().contains(f.id));
      assert_eq!(f.host.quit_count(), 1);
    }

    #[test]
    fn freed_name_is_immediately_reusable() {
      let f = fixture(false);
      f.ops.close(Some("editor"));

      let id = f
        .registry
        .write()
        .register(
          MockWindow::alive(9),
          RegisterOptions {
            id: None,
            name: Some("editor".to_owned()),
          },
        )
        .unwrap();
      assert_eq!(f.registry.read().name_of(id), Some("editor"));
    }
  }
}
