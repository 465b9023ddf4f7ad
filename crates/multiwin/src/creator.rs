/*!
Create-or-restore-and-show protocol.

`create_and_show` runs in two phases. *Resolving* decides whether the
request maps to an existing live window (reuse) or needs a fresh one from
the injected factory. *Revealing* makes the window visible: immediately
for reused windows, deferred to the host's first-paint signal for new
ones so the user never sees a half-initialized frame.

Windows can be destroyed out from under us between the two phases, so a
failed reveal enters an explicit bounded recovery loop: drop the stale
registration, wait out the backoff, and rerun both phases under the same
logical id. After `max_retries` failed recoveries the protocol gives up
rather than spin forever.
*/

use crate::host::{CreateSpec, HostWindow, WindowFactory};
use crate::registry::{RegisterOptions, WindowRegistry};
use crate::types::{MultiwinError, MultiwinResult, WindowId};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use ts_rs::TS;

/// Recovery settings for [`WindowCreator`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  /// Recovery cycles to attempt after a failed reveal.
  pub max_retries: u32,
  /// Pause between recovery cycles.
  pub backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 3,
      backoff: Duration::from_millis(500),
    }
  }
}

/// Arguments to [`WindowCreator::create_and_show`].
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
  /// Logical id to reuse, or to register a new window under.
  pub id: Option<WindowId>,
  /// Registry name for a newly created window.
  pub name: Option<String>,
  /// Host window options, passed through to the factory untouched.
  pub options: serde_json::Value,
}

/// What [`WindowCreator::create_and_show`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct CreateOutcome {
  /// Logical id of the revealed window.
  pub id: WindowId,
  /// Whether a new window was constructed (`false` means reuse).
  pub is_new: bool,
}

/// Create-or-restore protocol over a registry and a window factory.
pub struct WindowCreator {
  registry: Arc<RwLock<WindowRegistry>>,
  factory: Arc<dyn WindowFactory>,
  retry: RetryPolicy,
  strict: bool,
}

impl WindowCreator {
  /// Creator over `registry`, building windows with `factory`.
  ///
  /// With `strict` set, an exhausted recovery loop returns
  /// [`MultiwinError::CreateFailed`]; otherwise it logs and reports the
  /// outcome it was left with.
  pub fn new(
    registry: Arc<RwLock<WindowRegistry>>,
    factory: Arc<dyn WindowFactory>,
    retry: RetryPolicy,
    strict: bool,
  ) -> Self {
    Self {
      registry,
      factory,
      retry,
      strict,
    }
  }

  /// Reuse or create the requested window, then reveal it.
  ///
  /// Reused windows are shown and focused immediately. New windows are
  /// revealed when the host signals readiness, and are told their
  /// assigned id via a `window:id` message first.
  pub async fn create_and_show(&self, request: CreateRequest) -> MultiwinResult<CreateOutcome> {
    let mut request = request;
    let mut recoveries = 0u32;

    loop {
      let (id, is_new) = self.resolve_window(&request)?;

      let handle = { self.registry.read().handle(id) };
      match handle {
        Some(handle) if !handle.is_destroyed() => {
          self.reveal(&handle, is_new);
          return Ok(CreateOutcome { id, is_new });
        }
        // Destroyed (or yanked) between resolving and revealing.
        Some(_) | None => {
          self.drop_stale(id);

          if recoveries >= self.retry.max_retries {
            log::error!(
              "Window {id} kept dying before reveal, giving up after {recoveries} recovery attempts"
            );
            if self.strict {
              return Err(MultiwinError::CreateFailed {
                attempts: recoveries,
              });
            }
            return Ok(CreateOutcome { id, is_new });
          }

          recoveries += 1;
          log::warn!(
            "Window {id} destroyed before reveal, recovering ({recoveries}/{max})",
            max = self.retry.max_retries
          );
          // Later cycles must come back to the same logical id.
          request.id = Some(id);
          tokio::time::sleep(self.retry.backoff).await;
        }
      }
    }
  }

  /// Resolving phase: map the request to a live window id, creating and
  /// registering a window if needed.
  fn resolve_window(&self, request: &CreateRequest) -> MultiwinResult<(WindowId, bool)> {
    if let Some(id) = request.id {
      let liveness = { self.registry.read().handle(id).map(|h| h.is_destroyed()) };
      match liveness {
        Some(false) => return Ok((id, false)),
        // A record whose host window died out-of-band: clear it out and
        // fall through to creation.
        Some(true) => self.drop_stale(id),
        None => {}
      }
    }

    let spec = CreateSpec {
      id: request.id,
      name: request.name.clone(),
      options: request.options.clone(),
    };
    let handle = self.factory.create(&spec)?;

    let registered = self.registry.write().register(
      Arc::clone(&handle),
      RegisterOptions {
        id: request.id,
        name: request.name.clone(),
      },
    );
    let id = match registered {
      Ok(id) => id,
      Err(e) => {
        // Never leak an unregistered host window.
        if let Err(destroy_err) = handle.destroy() {
          log::debug!("Failed to destroy unregistered window: {destroy_err}");
        }
        return Err(e);
      }
    };

    if let Err(e) = handle.send("window:id", &json!(id)) {
      log::debug!("Window {id} did not receive its id: {e}");
    }
    Ok((id, true))
  }

  /// Revealing phase. New windows wait for the host's readiness signal;
  /// reused ones come forward immediately.
  fn reveal(&self, handle: &Arc<dyn HostWindow>, is_new: bool) {
    if is_new {
      let target = Arc::clone(handle);
      handle.on_ready_to_show(Box::new(move || target.show()));
    } else {
      handle.show();
      handle.focus();
    }
  }

  /// Remove a registration whose window is gone, destroying the handle
  /// outside the registry lock.
  fn drop_stale(&self, id: WindowId) {
    let stale = self.registry.write().detach(id);
    if let Some(stale) = stale {
      if let Err(e) = stale.destroy() {
        log::debug!("Destroying stale window {id} failed: {e}");
      }
    }
  }
}

impl fmt::Debug for WindowCreator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WindowCreator")
      .field("retry", &self.retry)
      .field("strict", &self.strict)
      .finish_non_exhaustive()
  }
}
