/*!
WebSocket-backed broadcast channel endpoint.

The sending half the state bridge holds for one connected window. Posts
go into the connection's outbound queue and are written to the socket by
the connection task, so per-channel FIFO order is the queue's order.

Clones share the closed flag: the connection keeps one clone and hands
the other to the bridge, so after the bridge closes its endpoint (on
replacement or detach) the connection can see that it no longer owns the
binding.
*/

use multiwin::host::ChannelEndpoint;
use multiwin::{MultiwinError, MultiwinResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone)]
pub(crate) struct WsChannel {
  inner: Arc<ChannelInner>,
}

#[derive(Debug)]
struct ChannelInner {
  tx: UnboundedSender<String>,
  closed: AtomicBool,
}

impl WsChannel {
  pub(crate) fn new(tx: UnboundedSender<String>) -> Self {
    Self {
      inner: Arc::new(ChannelInner {
        tx,
        closed: AtomicBool::new(false),
      }),
    }
  }

  /// Whether the bridge has closed this endpoint.
  pub(crate) fn is_closed(&self) -> bool {
    self.inner.closed.load(Ordering::SeqCst)
  }
}

impl ChannelEndpoint for WsChannel {
  fn post_message(&self, payload: &str) -> MultiwinResult<()> {
    if self.is_closed() {
      return Err(MultiwinError::Channel("channel is closed".to_owned()));
    }
    self
      .inner
      .tx
      .send(payload.to_owned())
      .map_err(|_| MultiwinError::Channel("window connection is gone".to_owned()))
  }

  fn close(&self) {
    self.inner.closed.store(true, Ordering::SeqCst);
  }
}
