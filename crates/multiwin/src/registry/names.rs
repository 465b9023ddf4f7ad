/*!
Bidirectional window name index.

Maintains the id -> name and name -> id mappings together, so neither
side can drift from the other. All mutations go through methods that
update both directions atomically; callers never touch one side alone.

## Invariants

1. Bijection: `name_of(id) == Some(name)` iff `id_for(name) == Some(id)`.
2. Uniqueness: no two ids map to the same name.
*/

use crate::types::WindowId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct NameIndex {
  by_id: HashMap<WindowId, String>,
  by_name: HashMap<String, WindowId>,
}

impl NameIndex {
  pub(super) fn new() -> Self {
    Self::default()
  }

  /// Whether any window currently owns this name.
  pub(super) fn contains_name(&self, name: &str) -> bool {
    self.by_name.contains_key(name)
  }

  /// Id of the window owning this name, if any.
  pub(super) fn id_for(&self, name: &str) -> Option<WindowId> {
    self.by_name.get(name).copied()
  }

  /// Name owned by this id, if any.
  pub(super) fn name_of(&self, id: WindowId) -> Option<&str> {
    self.by_id.get(&id).map(String::as_str)
  }

  /// Number of indexed windows.
  pub(super) fn len(&self) -> usize {
    self.by_id.len()
  }

  /// Bind `id` to `name`. The caller has already ensured neither side is
  /// taken.
  pub(super) fn insert(&mut self, id: WindowId, name: String) {
    debug_assert!(!self.by_id.contains_key(&id), "id {id} already indexed");
    debug_assert!(!self.by_name.contains_key(&name), "name {name:?} already indexed");
    self.by_name.insert(name.clone(), id);
    self.by_id.insert(id, name);
  }

  /// Drop `id` from both directions, returning the name it held.
  pub(super) fn remove(&mut self, id: WindowId) -> Option<String> {
    let name = self.by_id.remove(&id)?;
    self.by_name.remove(&name);
    Some(name)
  }

  /// Rebind `id` to `new_name`, returning the previous name. The caller
  /// has already ensured `new_name` is free.
  pub(super) fn rename(&mut self, id: WindowId, new_name: String) -> Option<String> {
    debug_assert!(
      !self.by_name.contains_key(&new_name),
      "name {new_name:?} already indexed"
    );
    let old = self.by_id.remove(&id)?;
    self.by_name.remove(&old);
    self.by_name.insert(new_name.clone(), id);
    self.by_id.insert(id, new_name);
    Some(old)
  }

  /// Check invariants 1 and 2 hold.
  #[cfg(test)]
  fn is_consistent(&self) -> bool {
    self.by_id.len() == self.by_name.len()
      && self
        .by_id
        .iter()
        .all(|(id, name)| self.by_name.get(name) == Some(id))
  }
}
