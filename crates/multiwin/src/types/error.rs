/*!
Error types.
*/

use super::WindowId;
use thiserror::Error;

/// Errors that can occur in multiwin operations.
#[derive(Error, Debug)]
pub enum MultiwinError {
  /// The registry is full; no further windows can be registered.
  #[error("window capacity reached ({max} windows)")]
  CapacityExceeded {
    /// Configured maximum number of live windows.
    max: usize,
  },

  /// No live window is registered under this id.
  #[error("window {0} not found")]
  WindowNotFound(WindowId),

  /// A live window already owns the requested id.
  #[error("window id {0} is already registered")]
  IdInUse(WindowId),

  /// A live window already owns the requested name.
  #[error("window name {0:?} is already taken")]
  NameTaken(String),

  /// The key's permission metadata marks it readonly.
  #[error("{key} is readonly")]
  ReadonlyKey {
    /// Key the write was aimed at.
    key: String,
  },

  /// The origin window is not on the key's allow-list.
  #[error("{window} not allowed to modify {key}")]
  WindowNotAllowed {
    /// Origin window of the rejected write.
    window: WindowId,
    /// Key the write was aimed at.
    key: String,
  },

  /// Creation gave up after the configured number of recovery attempts.
  #[error("window creation failed after {attempts} recovery attempts")]
  CreateFailed {
    /// Recovery attempts that were made before giving up.
    attempts: u32,
  },

  /// A broadcast channel rejected a payload.
  #[error("channel error: {0}")]
  Channel(String),

  /// The host runtime reported a failure.
  #[error("host error: {0}")]
  Host(String),
}

/// Result type for multiwin operations.
pub type MultiwinResult<T> = Result<T, MultiwinError>;
