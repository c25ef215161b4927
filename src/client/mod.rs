//! Dashboard side of the push channel.
//!
//! [`Session`] is the synchronous state machine (connection state, backoff,
//! log buffer, counters). [`ConnectionManager`] drives it from a single
//! tokio task over a real websocket and hands the UI a cloneable
//! [`ConnectionHandle`].

mod backoff;
mod buffer;
mod manager;
mod session;

pub use backoff::Backoff;
pub use buffer::LogBuffer;
pub use manager::{ConnectionHandle, ConnectionManager};
pub use session::{Session, Snapshot};
