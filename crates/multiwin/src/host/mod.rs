/*!
Host abstraction layer.

- `traits.rs` - capability traits the embedding runtime implements
- `mock.rs` - in-memory doubles (tests / `mock` feature)
*/

mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use traits::{
  ChannelEndpoint, CreateSpec, HostRuntime, HostWindow, ReadyCallback, WindowFactory,
};
