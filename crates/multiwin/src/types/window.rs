/*! Window description types. */

use super::WindowId;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A live window as seen by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WindowInfo {
  /// Logical id the window is registered under.
  pub id: WindowId,
  /// Unique human-readable name.
  pub name: String,
}
