//! Start a local Jupyter Server, run code on a fresh kernel, and stop it.
//!
//! Requires `jupyter` on `PATH`.

use kernelwire_client::{render_text, ServerClient, ServerSupervisor, SupervisorConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> kernelwire_client::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut supervisor = ServerSupervisor::new(SupervisorConfig {
        port: 18888,
        root_dir: Some(std::env::temp_dir()),
        ..SupervisorConfig::default()
    });
    let endpoint = supervisor.start().await?;

    let result = run(&endpoint).await;
    supervisor.stop().await?;
    result
}

async fn run(endpoint: &kernelwire_client::ServerEndpoint) -> kernelwire_client::Result<()> {
    let client = ServerClient::new(endpoint.client_config()?)?;
    let specs = client.kernelspecs().await?;
    tracing::info!(default = %specs.default, "kernel specs loaded");

    let kernel = client.start_kernel(Some(&specs.default)).await?;
    let session = client.connect_kernel(&kernel.id).await?;

    let code = "import sys\nprint(sys.version)\n6 * 7";
    let (a, b) = tokio::join!(session.execute(code, None), session.execute("print('concurrent')", None));
    print!("{}", render_text(&a?));
    print!("{}", render_text(&b?));

    session.close().await?;
    client.delete_kernel(&kernel.id).await
}
