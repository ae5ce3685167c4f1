//! Run code on a kernel of an already running Jupyter Server.
//!
//! ```text
//! JUPYTER_BASE_URL=http://127.0.0.1:8888 JUPYTER_TOKEN=... \
//!     cargo run --example execute -- "print('hello')"
//! ```

use std::time::Duration;

use kernelwire_client::{render_text, ClientConfig, KernelwireError, ServerClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> kernelwire_client::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let code = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "print('hello world')".to_string());

    let client = ServerClient::new(ClientConfig::from_env()?)?;
    tracing::info!(version = %client.api_info().await?.version, "connected to server");

    let kernel = client.start_kernel(None).await?;
    tracing::info!(kernel_id = %kernel.id, "kernel started");

    let session = client.connect_kernel(&kernel.id).await?;
    match session.execute(&code, Some(Duration::from_secs(30))).await {
        Ok(outputs) => print!("{}", render_text(&outputs)),
        Err(KernelwireError::ExecutionTimeout {
            partial_outputs, ..
        }) => {
            print!("{}", render_text(&partial_outputs));
            tracing::warn!("execution timed out");
        }
        Err(e) => tracing::error!("execution failed: {}", e),
    }

    session.close().await?;
    client.delete_kernel(&kernel.id).await?;
    Ok(())
}
