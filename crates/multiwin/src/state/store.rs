/*!
Permissioned key-value store.

Pure data layer under the state bridge: entries, permission checks, no
events and no I/O. An entry can hold a value, permission metadata, or
both; permission-only entries are how a key gets locked down before it is
first written, and how its policy survives deletion of the value.
*/

use crate::types::{MultiwinError, MultiwinResult, Permission, WindowId};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct StoreEntry {
  value: Option<Value>,
  permission: Option<Permission>,
}

#[derive(Debug, Default)]
pub(super) struct DataStore {
  entries: HashMap<String, StoreEntry>,
}

impl DataStore {
  pub(super) fn new() -> Self {
    Self::default()
  }

  /// Current value of a key.
  pub(super) fn get(&self, key: &str) -> Option<&Value> {
    self.entries.get(key).and_then(|entry| entry.value.as_ref())
  }

  /// All keys that currently hold a value.
  pub(super) fn snapshot(&self) -> Map<String, Value> {
    self
      .entries
      .iter()
      .filter_map(|(key, entry)| entry.value.clone().map(|value| (key.clone(), value)))
      .collect()
  }

  /// Permission metadata for a key.
  pub(super) fn permission(&self, key: &str) -> Option<&Permission> {
    self
      .entries
      .get(key)
      .and_then(|entry| entry.permission.as_ref())
  }

  /// Whether a write to `key` from `origin` is allowed.
  ///
  /// Readonly rejects everyone. The allow-list only applies to writes
  /// that carry an origin window; writes from the embedding process
  /// itself (no origin) bypass it.
  pub(super) fn check_write(&self, key: &str, origin: Option<WindowId>) -> MultiwinResult<()> {
    let Some(permission) = self.permission(key) else {
      return Ok(());
    };
    if permission.readonly {
      return Err(MultiwinError::ReadonlyKey {
        key: key.to_owned(),
      });
    }
    if let (Some(allowed), Some(window)) = (permission.allowed_windows.as_ref(), origin) {
      if !allowed.contains(&window) {
        return Err(MultiwinError::WindowNotAllowed {
          window,
          key: key.to_owned(),
        });
      }
    }
    Ok(())
  }

  /// Write a value, returning the one it replaced.
  pub(super) fn set(
    &mut self,
    key: &str,
    value: Value,
    origin: Option<WindowId>,
  ) -> MultiwinResult<Option<Value>> {
    self.check_write(key, origin)?;
    let entry = self.entries.entry(key.to_owned()).or_default();
    Ok(entry.value.replace(value))
  }

  /// Remove a key's value, returning it. Permission metadata stays; an
  /// entry with neither value nor permission is dropped entirely.
  pub(super) fn delete(
    &mut self,
    key: &str,
    origin: Option<WindowId>,
  ) -> MultiwinResult<Option<Value>> {
    self.check_write(key, origin)?;
    let Some(entry) = self.entries.get_mut(key) else {
      return Ok(None);
    };
    let old = entry.value.take();
    if entry.permission.is_none() {
      self.entries.remove(key);
    }
    Ok(old)
  }

  /// Wipe every value. Permission metadata survives.
  pub(super) fn clear(&mut self) {
    self.entries.retain(|_, entry| {
      entry.value = None;
      entry.permission.is_some()
    });
  }

  /// Upsert permission metadata without touching the value.
  pub(super) fn set_permission(&mut self, key: &str, permission: Permission) {
    self.entries.entry(key.to_owned()).or_default().permission = Some(permission);
  }
}
