/*!
Shared-state types: per-key permissions and change notifications.
*/

use super::WindowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use ts_rs::TS;

/// Access policy for one state key.
///
/// Permissions live independently of the key's value: they can be set
/// before the key is first written and they survive deletion of the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Permission {
  /// Readonly keys reject every write, no matter where it came from.
  #[serde(default)]
  pub readonly: bool,
  /// Windows allowed to modify the key. `None` means everyone.
  ///
  /// Only enforceable when the write carries an origin window; writes
  /// without an origin (typically from the embedding process itself) are
  /// not subject to the allow-list.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub allowed_windows: Option<HashSet<WindowId>>,
}

/// What kind of mutation a [`ChangeEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ChangeKind {
  /// A key was written.
  Set,
  /// A key's value was removed.
  Delete,
  /// Every value was wiped at once.
  Clear,
}

/// Record of one state mutation, fanned out to every attached window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChangeEvent {
  /// Mutation type.
  pub kind: ChangeKind,
  /// Affected key. Absent for whole-store mutations.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub key: Option<String>,
  /// Value after the mutation, if any.
  #[serde(skip_serializing_if = "Option::is_none")]
  #[ts(type = "unknown")]
  pub new_value: Option<Value>,
  /// Value before the mutation, if any.
  #[serde(skip_serializing_if = "Option::is_none")]
  #[ts(type = "unknown")]
  pub old_value: Option<Value>,
  /// Window the mutation originated from, when it came over a channel.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub origin_window_id: Option<WindowId>,
  /// Wall-clock milliseconds since the Unix epoch.
  pub timestamp: u64,
}
