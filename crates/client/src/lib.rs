//! Client role of the fieldlock protocol.
//!
//! Connects to a remote collaboration host over WebSocket, performs the
//! handshake, and then maintains a read replica of the authoritative state
//! through broadcast frames. Lock requests are fire-and-forget: the caller
//! observes outcomes through the next snapshot, never through a direct
//! return value.

pub mod session;

pub use session::{connect, ClientConfig, ClientHandle, ConnectError};
