//! Supervisor for a local `jupyter server` process.
//!
//! Starts the server with permissive ServerApp flags, waits until
//! `GET /api/status` answers, and kills the process on [`stop`] or drop.
//!
//! [`stop`]: ServerSupervisor::stop

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::{KernelwireError, Result};
use crate::http::ServerClient;
use crate::protocol::new_msg_id;

/// Default port passed to `--ServerApp.port`.
pub const DEFAULT_PORT: u16 = 8888;

/// How long `start` waits for the status endpoint.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Which Jupyter front end to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerApp {
    #[default]
    Server,
    Notebook,
    Lab,
}

impl ServerApp {
    /// Subcommand passed to `jupyter`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Notebook => "notebook",
            Self::Lab => "lab",
        }
    }
}

/// Launch settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Executable to run.
    pub program: String,
    pub app: ServerApp,
    pub port: u16,
    /// `--ServerApp.root_dir`; the server's own default when `None`.
    pub root_dir: Option<PathBuf>,
    /// Access token; a random one is generated when `None`.
    pub token: Option<String>,
    pub startup_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: "jupyter".to_string(),
            app: ServerApp::default(),
            port: DEFAULT_PORT,
            root_dir: None,
            token: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

/// Where a started server can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub url: String,
    pub token: String,
}

impl ServerEndpoint {
    /// Client configuration for this server.
    pub fn client_config(&self) -> Result<ClientConfig> {
        Ok(ClientConfig::new(&self.url)?.with_token(self.token.as_str()))
    }
}

/// Owns one server process.
#[derive(Debug)]
pub struct ServerSupervisor {
    config: SupervisorConfig,
    token: String,
    child: Option<Child>,
}

impl ServerSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let token = config.token.clone().unwrap_or_else(new_msg_id);
        Self {
            config,
            token,
            child: None,
        }
    }

    /// Command-line arguments after the program name.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![self.config.app.as_str().to_string()];
        for (flag, value) in [
            ("--ServerApp.allow_credentials", "True"),
            ("--ServerApp.allow_external_kernels", "True"),
            ("--ServerApp.allow_origin", "*"),
            ("--ServerApp.allow_remote_access", "True"),
            ("--ServerApp.disable_check_xsrf", "True"),
            ("--ServerApp.ip", "0.0.0.0"),
            ("--ServerApp.open_browser", "False"),
        ] {
            args.push(flag.to_string());
            args.push(value.to_string());
        }

        args.push("--ServerApp.port".to_string());
        args.push(self.config.port.to_string());

        if let Some(dir) = &self.config.root_dir {
            args.push("--ServerApp.root_dir".to_string());
            args.push(dir.display().to_string());
        }

        args.push("--IdentityProvider.token".to_string());
        args.push(self.token.clone());
        args
    }

    /// Local endpoint of the server, whether or not it is running.
    pub fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint {
            url: format!("http://127.0.0.1:{}", self.config.port),
            token: self.token.clone(),
        }
    }

    /// Spawn the server and wait until it answers.
    ///
    /// # Errors
    ///
    /// - [`KernelwireError::Config`] if already running
    /// - [`KernelwireError::Io`] if the program can't be spawned
    /// - [`KernelwireError::Connection`] if the process exits or the status
    ///   endpoint doesn't answer before the startup timeout
    pub async fn start(&mut self) -> Result<ServerEndpoint> {
        if self.child.is_some() {
            return Err(KernelwireError::Config(
                "server is already running".to_string(),
            ));
        }

        let args = self.args();
        tracing::info!(program = %self.config.program, port = self.config.port, "starting server");

        let child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        self.child = Some(child);

        let endpoint = self.endpoint();
        match self.wait_ready(&endpoint).await {
            Ok(()) => {
                tracing::info!(url = %endpoint.url, "server ready");
                Ok(endpoint)
            }
            Err(e) => {
                let _ = self.stop().await;
                Err(e)
            }
        }
    }

    async fn wait_ready(&mut self, endpoint: &ServerEndpoint) -> Result<()> {
        let client = ServerClient::new(endpoint.client_config()?.with_request_timeout(POLL_INTERVAL * 4))?;
        let deadline = Instant::now() + self.config.startup_timeout;

        loop {
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    self.child = None;
                    return Err(KernelwireError::Connection(format!(
                        "server exited during startup: {}",
                        status
                    )));
                }
            }

            match client.status().await {
                Ok(_) => return Ok(()),
                Err(e) => tracing::trace!("server not ready: {}", e),
            }

            if Instant::now() >= deadline {
                return Err(KernelwireError::Connection(format!(
                    "server not ready after {:?}",
                    self.config.startup_timeout
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Check if the process is still alive.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Kill and reap the server. Does nothing if it isn't running.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if child.try_wait()?.is_none() {
            child.kill().await?;
        }
        tracing::info!(port = self.config.port, "server stopped");
        Ok(())
    }
}
