/*!
Core type definitions.

- `ids.rs` - branded id newtypes
- `error.rs` - error enum and result alias
- `event.rs` - broadcast events and snapshots
- `store.rs` - shared-state permissions and change records
- `window.rs` - window descriptions
- `geometry.rs` - screen-coordinate types
*/

mod error;
mod event;
mod geometry;
mod ids;
mod store;
mod window;

pub use error::{MultiwinError, MultiwinResult};
pub use event::{Event, Snapshot};
pub use geometry::Bounds;
pub use ids::{HandleId, WindowId};
pub use store::{ChangeEvent, ChangeKind, Permission};
pub use window::WindowInfo;
