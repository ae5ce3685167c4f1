//! Codec module - serialization/deserialization of envelopes.
//!
//! The kernel channels endpoint speaks JSON text frames:
//!
//! - [`JsonCodec`] - envelope to/from a JSON text frame
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects.
//! Decode failures are reported as [`KernelwireError::Protocol`](crate::error::KernelwireError::Protocol)
//! so the reader can drop the single bad frame and keep going.
//!
//! # Example
//!
//! ```
//! use kernelwire_client::codec::JsonCodec;
//! use kernelwire_client::protocol::{EnvelopeBuilder, ExecuteOptions};
//!
//! let builder = EnvelopeBuilder::new("");
//! let request = builder
//!     .execute_request("print(1)", &ExecuteOptions::default())
//!     .unwrap();
//!
//! let text = JsonCodec::encode(&request).unwrap();
//! let decoded = JsonCodec::decode(&text).unwrap();
//! assert_eq!(decoded.msg_id(), request.msg_id());
//! ```

mod json;

pub use json::JsonCodec;
