//! # kernelwire-client
//!
//! Rust client for the Jupyter kernel messaging protocol, spoken over a
//! Jupyter Server's `/api/kernels/{id}/channels` WebSocket.
//!
//! ## Architecture
//!
//! - **Envelopes** ([`protocol`], [`codec`]): JSON messages with unique ids;
//!   replies point back at their request through `parent_header.msg_id`
//! - **Channel** ([`channel`], [`engine`], [`writer`]): one socket, one
//!   writer task, one engine task that correlates replies and owns every
//!   outstanding request
//! - **REST** ([`http`]) and a local server [`supervisor`]
//!
//! ## Example
//!
//! ```ignore
//! use kernelwire_client::{ClientConfig, ServerClient};
//!
//! #[tokio::main]
//! async fn main() -> kernelwire_client::Result<()> {
//!     let client = ServerClient::new(ClientConfig::from_env()?)?;
//!     let kernel = client.start_kernel(None).await?;
//!
//!     let session = client.connect_kernel(&kernel.id).await?;
//!     let outputs = session.execute("print(1)", None).await?;
//!     print!("{}", kernelwire_client::render_text(&outputs));
//!
//!     session.close().await?;
//!     client.delete_kernel(&kernel.id).await
//! }
//! ```

pub mod channel;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod output;
pub mod protocol;
pub mod session;
pub mod supervisor;
pub mod transport;
pub mod writer;

pub use channel::KernelChannel;
pub use config::{ChannelConfig, ClientConfig};
pub use error::{KernelwireError, Result};
pub use http::ServerClient;
pub use output::{render_text, Output};
pub use protocol::ExecuteOptions;
pub use session::KernelSession;
pub use supervisor::{ServerEndpoint, ServerSupervisor, SupervisorConfig};
