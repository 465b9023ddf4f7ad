/*!
Multiwin - multi-window lifecycle and shared-state synchronization.

```ignore
use multiwin::{CreateRequest, Multiwin, Permission};

// Wire the instance to the embedding runtime's capabilities.
let multiwin = Multiwin::new(host, factory);

// Create (or restore) a window; reveal is deferred to first paint.
let outcome = multiwin
    .create_and_show(CreateRequest {
        name: Some("editor".into()),
        ..CreateRequest::default()
    })
    .await?;

// Address windows by name, id token, or not at all (focused/main).
multiwin.operations().maximize(Some("editor"));
multiwin.operations().close(None);

// Shared state, fanned out to every other window.
multiwin.set_permission("version", Permission { readonly: true, allowed_windows: None });
multiwin.state_set("theme", serde_json::json!("dark"), None, None)?;

// Subscribe to lifecycle and state events
let mut events = multiwin.subscribe();
while let Ok(event) = events.recv().await {
    // handle event
}
```
*/

mod creator;
mod manager;
mod operations;
mod registry;
mod state;

pub mod host;

mod types;
pub use types::*;

pub use crate::creator::{CreateOutcome, CreateRequest, RetryPolicy, WindowCreator};
pub use crate::manager::{Multiwin, MultiwinBuilder};
pub use crate::operations::WindowOperations;
pub use crate::registry::{RegisterOptions, WindowRegistry, DEFAULT_MAX_WINDOWS};
pub use crate::state::{
  dispatch, dispatch_json, StateBridge, StateRequest, StateResponse, WriteOutcome,
  DEFAULT_STATE_EVENT,
};
