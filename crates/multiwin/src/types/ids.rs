/*!
Branded identifier types.

Logical window ids and host handle ids live in different namespaces and
must never be confused, so both get their own newtype.
*/

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Logical window identifier, assigned by the registry.
///
/// Stable for the lifetime of a registration: removing a window frees its
/// id, and a later registration may reuse it.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, Display,
  From, Into,
)]
#[ts(export)]
pub struct WindowId(pub u32);

/// Identity of a host window handle, as reported by the host runtime.
///
/// Used only for reverse lookups (host handle -> logical id); the host
/// picks the values and we never interpret them.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, Display,
  From, Into,
)]
#[ts(export)]
pub struct HandleId(pub u64);
