//! Transport module - the live duplex connection to a kernel.
//!
//! Opens the WebSocket; splitting it into the writer task and the engine's
//! inbound stream happens in [`crate::channel`].

mod websocket;

pub use websocket::{connect, KernelSocket};
