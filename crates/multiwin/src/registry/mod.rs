/*!
Window registry - the single source of truth for window identity.

- `mod.rs` - `WindowRegistry`: records, capacity, main-window tracking,
  selector resolution
- `names.rs` - bidirectional id <-> name index

The registry tracks live windows only: a removed window's id and name
are immediately free for reuse. Handles are destroyed through the
registry so bookkeeping can never outlive the window it describes.
*/

mod names;

use crate::host::{HostRuntime, HostWindow};
use crate::types::{Event, HandleId, MultiwinError, MultiwinResult, WindowId, WindowInfo};
use async_broadcast::Sender;
use names::NameIndex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Default cap on concurrently registered windows.
pub const DEFAULT_MAX_WINDOWS: usize = 50;

/// Caller-supplied options for [`WindowRegistry::register`].
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
  /// Logical id to register under. Generated when absent.
  pub id: Option<WindowId>,
  /// Requested name. Derived from the id when absent; deduplicated with
  /// a numeric suffix when taken.
  pub name: Option<String>,
}

/// Registry of live windows: id and name indexes, reverse handle lookup,
/// main-window tracking.
pub struct WindowRegistry {
  host: Arc<dyn HostRuntime>,
  events_tx: Sender<Event>,
  windows: HashMap<WindowId, Arc<dyn HostWindow>>,
  names: NameIndex,
  handle_index: HashMap<HandleId, WindowId>,
  main: Option<WindowId>,
  max_windows: usize,
  next_id: u32,
}

impl WindowRegistry {
  /// Registry with the default window cap.
  pub fn new(host: Arc<dyn HostRuntime>, events_tx: Sender<Event>) -> Self {
    Self::with_capacity(host, events_tx, DEFAULT_MAX_WINDOWS)
  }

  /// Registry holding at most `max_windows` live windows.
  pub fn with_capacity(
    host: Arc<dyn HostRuntime>,
    events_tx: Sender<Event>,
    max_windows: usize,
  ) -> Self {
    Self {
      host,
      events_tx,
      windows: HashMap::new(),
      names: NameIndex::new(),
      handle_index: HashMap::new(),
      main: None,
      max_windows,
      next_id: 1,
    }
  }

  /// Register a window, assigning it an id and a unique name.
  ///
  /// The first registration becomes the main window. Fails when the
  /// registry is at capacity or when an explicitly requested id is
  /// already held by a live window.
  pub fn register(
    &mut self,
    handle: Arc<dyn HostWindow>,
    options: RegisterOptions,
  ) -> MultiwinResult<WindowId> {
    if self.windows.len() >= self.max_windows {
      return Err(MultiwinError::CapacityExceeded {
        max: self.max_windows,
      });
    }

    let id = match options.id {
      Some(id) => {
        if self.windows.contains_key(&id) {
          return Err(MultiwinError::IdInUse(id));
        }
        // Keep generated ids ahead of explicit ones.
        if id.0 >= self.next_id {
          self.next_id = id.0.checked_add(1).unwrap_or(1);
        }
        id
      }
      None => self.alloc_id(),
    };

    let name = self.claim_name(id, options.name);
    self.handle_index.insert(handle.host_id(), id);
    self.windows.insert(id, handle);
    self.names.insert(id, name.clone());
    debug_assert_eq!(self.windows.len(), self.names.len());

    if self.main.is_none() {
      self.main = Some(id);
    }

    self.emit(Event::WindowRegistered {
      window: WindowInfo { id, name },
    });
    Ok(id)
  }

  /// Remove a window and destroy its handle. Unknown ids are a no-op.
  pub fn remove(&mut self, id: WindowId) {
    if let Some(handle) = self.detach(id) {
      if let Err(e) = handle.destroy() {
        log::warn!("Failed to destroy window {id}: {e}");
      }
    }
  }

  /// Remove a window from all indexes without destroying the handle.
  ///
  /// The caller takes over destruction. Exists so lock-holding callers
  /// can release the registry before making host calls; everyone else
  /// wants [`WindowRegistry::remove`].
  pub fn detach(&mut self, id: WindowId) -> Option<Arc<dyn HostWindow>> {
    let handle = self.windows.remove(&id)?;
    self.names.remove(id);
    self.handle_index.remove(&handle.host_id());
    debug_assert_eq!(self.windows.len(), self.names.len());

    // Main is not reassigned; the next registration claims it.
    if self.main == Some(id) {
      self.main = None;
    }

    self.emit(Event::WindowRemoved { window_id: id });
    Some(handle)
  }

  /// Rename a live window.
  ///
  /// Renaming to the current name is a no-op; a name owned by another
  /// live window is rejected rather than suffixed, since an explicit
  /// rename losing letters silently would be surprising.
  pub fn rename(&mut self, id: WindowId, new_name: &str) -> MultiwinResult<()> {
    if !self.windows.contains_key(&id) {
      return Err(MultiwinError::WindowNotFound(id));
    }
    if self.names.name_of(id) == Some(new_name) {
      return Ok(());
    }
    if self.names.contains_name(new_name) {
      return Err(MultiwinError::NameTaken(new_name.to_owned()));
    }

    self.names.rename(id, new_name.to_owned());
    self.emit(Event::WindowRenamed {
      window_id: id,
      name: new_name.to_owned(),
    });
    Ok(())
  }

  /// Resolve a selector to a live window.
  ///
  /// With a selector: a token matching a live id wins, otherwise the
  /// token is tried as a name. Without one: the focused window if the
  /// host reports one of ours focused, otherwise the main window.
  pub fn resolve(&self, selector: Option<&str>) -> Option<WindowId> {
    let Some(token) = selector else {
      return self.focused().or(self.main);
    };
    if let Ok(n) = token.parse::<u32>() {
      let id = WindowId(n);
      if self.windows.contains_key(&id) {
        return Some(id);
      }
    }
    self.names.id_for(token)
  }

  /// The registered window that currently has host focus, if any.
  pub fn focused(&self) -> Option<WindowId> {
    let handle_id = self.host.focused_window()?;
    self.handle_index.get(&handle_id).copied()
  }

  /// Handle of a live window.
  pub fn handle(&self, id: WindowId) -> Option<Arc<dyn HostWindow>> {
    self.windows.get(&id).cloned()
  }

  /// Whether a live window holds this id.
  pub fn contains(&self, id: WindowId) -> bool {
    self.windows.contains_key(&id)
  }

  /// Name of a live window.
  pub fn name_of(&self, id: WindowId) -> Option<&str> {
    self.names.name_of(id)
  }

  /// Id registered for a host handle.
  pub fn id_for_handle(&self, handle_id: HandleId) -> Option<WindowId> {
    self.handle_index.get(&handle_id).copied()
  }

  /// Live window ids, ascending.
  pub fn ids(&self) -> Vec<WindowId> {
    let mut ids: Vec<WindowId> = self.windows.keys().copied().collect();
    ids.sort_unstable();
    ids
  }

  /// Handles of every live window, ordered by id. The registry keeps
  /// ownership of destruction; these are shared references.
  pub fn handles(&self) -> Vec<Arc<dyn HostWindow>> {
    self
      .ids()
      .into_iter()
      .filter_map(|id| self.handle(id))
      .collect()
  }

  /// Live windows with their names, ordered by id.
  pub fn windows(&self) -> Vec<WindowInfo> {
    let mut windows: Vec<WindowInfo> = self
      .windows
      .keys()
      .filter_map(|id| {
        self.names.name_of(*id).map(|name| WindowInfo {
          id: *id,
          name: name.to_owned(),
        })
      })
      .collect();
    windows.sort_by_key(|w| w.id);
    windows
  }

  /// Number of live windows.
  pub fn count(&self) -> usize {
    self.windows.len()
  }

  /// Configured window cap.
  pub const fn capacity(&self) -> usize {
    self.max_windows
  }

  /// Current main window.
  pub const fn main(&self) -> Option<WindowId> {
    self.main
  }

  fn alloc_id(&mut self) -> WindowId {
    loop {
      let id = WindowId(self.next_id);
      self.next_id = self.next_id.checked_add(1).unwrap_or(1);
      if !self.windows.contains_key(&id) {
        return id;
      }
    }
  }

  /// Pick the final name for a registration: the requested name, or one
  /// derived from the id, suffixed until unique.
  fn claim_name(&self, id: WindowId, requested: Option<String>) -> String {
    let base = requested.unwrap_or_else(|| format!("window-{id}"));
    if !self.names.contains_name(&base) {
      return base;
    }
    let mut n = 2u32;
    let name = loop {
      let candidate = format!("{base}-{n}");
      if !self.names.contains_name(&candidate) {
        break candidate;
      }
      n += 1;
    };
    log::warn!("Window name {base:?} already taken, registering {id} as {name:?}");
    name
  }

  fn emit(&self, event: Event) {
    if let Err(e) = self.events_tx.try_broadcast(event) {
      if e.is_full() {
        log::error!("Event channel overflow - events are being dropped.");
      }
    }
  }
}

impl fmt::Debug for WindowRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WindowRegistry")
      .field("windows", &self.windows.len())
      .field("main", &self.main)
      .field("max_windows", &self.max_windows)
      .finish_non_exhaustive()
  }
}


#[cfg(test)]
mod proptests {
  use super::*;
  use crate::host::mock::{MockRuntime, MockWindow};
  use proptest::prelude::*;
  use std::collections::HashSet;

  #[derive(Debug, Clone)]
  enum Op {
    Register(Option<String>),
    Remove(usize),
  }

  /// Names drawn from a small pool so collisions are common.
  fn op() -> impl Strategy<Value = Op> {
    let name = prop::option::of(prop::sample::select(vec!["a", "b", "c"]));
    prop_oneof![
      name.prop_map(|n| Op::Register(n.map(str::to_owned))),
      (0usize..16).prop_map(Op::Remove),
    ]
  }

  proptest! {
    /// Any register/remove sequence keeps ids unique, names unique, and
    /// every live name resolvable back to its id.
    #[test]
    fn indexes_stay_bijective(ops in prop::collection::vec(op(), 0..48)) {
      let host = MockRuntime::new();
      let (tx, _rx) = async_broadcast::broadcast(256);
      let mut registry = WindowRegistry::new(host, tx);
      let mut host_id = 0u64;

      for op in ops {
        match op {
          Op::Register(name) => {
            host_id += 1;
            let _ = registry.register(
              MockWindow::alive(host_id),
              RegisterOptions { id: None, name },
            );
          }
          Op::Remove(pick) => {
            let ids = registry.ids();
            if !ids.is_empty() {
              registry.remove(ids[pick % ids.len()]);
            }
          }
        }

        let windows = registry.windows();
        prop_assert_eq!(windows.len(), registry.count());

        let mut seen_names = HashSet::new();
        for info in &windows {
          prop_assert!(seen_names.insert(info.name.clone()), "duplicate live name");
          prop_assert_eq!(registry.resolve(Some(&info.name)), Some(info.id));
          prop_assert_eq!(registry.name_of(info.id), Some(info.name.as_str()));
        }
      }
    }
  }
}
