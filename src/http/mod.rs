//! REST client for Jupyter Server resources.
//!
//! Thin request/response wrappers with no correlation state. Every call
//! carries the configured `Authorization` header; any status >= 400 becomes
//! [`KernelwireError::HttpStatus`].
//!
//! # Example
//!
//! ```ignore
//! let client = ServerClient::new(ClientConfig::from_env()?)?;
//! let kernel = client.start_kernel(None).await?;
//! let session = client.connect_kernel(&kernel.id).await?;
//! let outputs = session.execute("1 + 1", None).await?;
//! ```

mod models;

pub use models::{
    ApiInfo, Contents, ContentsType, Kernel, KernelName, KernelSpecEntry, KernelSpecs,
    NewSession, ServerStatus, SessionModel, Terminal, UploadFormat, UserInfo,
};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{KernelwireError, Result};
use crate::session::KernelSession;
use models::PutContents;

/// Client for one Jupyter Server.
#[derive(Debug, Clone)]
pub struct ServerClient {
    http: Client,
    config: ClientConfig,
}

impl ServerClient {
    /// Create a client for the configured server.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(auth) = config.authorization_header() {
            let value = HeaderValue::from_str(&auth)
                .map_err(|_| KernelwireError::Config("token is not a valid header value".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ---- server ----

    /// `GET /api/`
    pub async fn api_info(&self) -> Result<ApiInfo> {
        self.get_json(&["api", ""]).await
    }

    /// `GET /api/status`
    pub async fn status(&self) -> Result<ServerStatus> {
        self.get_json(&["api", "status"]).await
    }

    /// `GET /api/me`
    pub async fn me(&self) -> Result<UserInfo> {
        self.get_json(&["api", "me"]).await
    }

    // ---- contents ----

    /// `GET /api/contents/{path}`. An empty path is the server root.
    pub async fn get_contents(&self, path: &str) -> Result<Contents> {
        let url = self.contents_url(path)?;
        self.json(self.http.get(url)).await
    }

    /// Create a directory at a path relative to the server root.
    ///
    /// Creating a directory that already exists is not an error.
    pub async fn create_dir(&self, path: &str) -> Result<Contents> {
        self.put_contents(path, "", UploadFormat::Text, ContentsType::Directory)
            .await
    }

    /// Upload a file. The parent directory must exist.
    pub async fn upload_file(
        &self,
        path: &str,
        content: &str,
        format: UploadFormat,
    ) -> Result<Contents> {
        self.put_contents(path, content, format, ContentsType::File)
            .await
    }

    /// `DELETE /api/contents/{path}`
    pub async fn delete_file(&self, path: &str) -> Result<()> {
        let url = self.contents_url(path)?;
        self.empty(self.http.delete(url)).await
    }

    async fn put_contents(
        &self,
        path: &str,
        content: &str,
        format: UploadFormat,
        kind: ContentsType,
    ) -> Result<Contents> {
        let url = self.contents_url(path)?;
        let body = PutContents {
            content,
            format,
            name: "",
            path,
            kind,
        };
        self.json(self.http.put(url).json(&body)).await
    }

    // ---- sessions ----

    /// `GET /api/sessions`
    pub async fn list_sessions(&self) -> Result<Vec<SessionModel>> {
        self.get_json(&["api", "sessions"]).await
    }

    /// `POST /api/sessions`
    pub async fn create_session(&self, session: &NewSession) -> Result<SessionModel> {
        let url = self.endpoint(&["api", "sessions"])?;
        self.json(self.http.post(url).json(session)).await
    }

    /// `GET /api/sessions/{id}`
    pub async fn get_session(&self, session_id: &str) -> Result<SessionModel> {
        self.get_json(&["api", "sessions", session_id]).await
    }

    /// `DELETE /api/sessions/{id}`
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.request_empty(Method::DELETE, &["api", "sessions", session_id])
            .await
    }

    // ---- kernels ----

    /// `GET /api/kernels`
    pub async fn list_kernels(&self) -> Result<Vec<Kernel>> {
        self.get_json(&["api", "kernels"]).await
    }

    /// `POST /api/kernels`. `None` starts the server's default kernel.
    pub async fn start_kernel(&self, kernel_name: Option<&str>) -> Result<Kernel> {
        let url = self.endpoint(&["api", "kernels"])?;
        let request = match kernel_name {
            Some(name) => self.http.post(url).json(&KernelName {
                name: name.to_string(),
            }),
            None => self.http.post(url),
        };
        self.json(request).await
    }

    /// `GET /api/kernels/{id}`
    pub async fn get_kernel(&self, kernel_id: &str) -> Result<Kernel> {
        self.get_json(&["api", "kernels", kernel_id]).await
    }

    /// `DELETE /api/kernels/{id}`
    pub async fn delete_kernel(&self, kernel_id: &str) -> Result<()> {
        self.request_empty(Method::DELETE, &["api", "kernels", kernel_id])
            .await
    }

    /// `POST /api/kernels/{id}/interrupt`
    pub async fn interrupt_kernel(&self, kernel_id: &str) -> Result<()> {
        self.request_empty(Method::POST, &["api", "kernels", kernel_id, "interrupt"])
            .await
    }

    /// `POST /api/kernels/{id}/restart`
    pub async fn restart_kernel(&self, kernel_id: &str) -> Result<()> {
        self.request_empty(Method::POST, &["api", "kernels", kernel_id, "restart"])
            .await
    }

    /// `GET /api/kernelspecs`
    pub async fn kernelspecs(&self) -> Result<KernelSpecs> {
        self.get_json(&["api", "kernelspecs"]).await
    }

    /// Open a channel to a running kernel.
    pub async fn connect_kernel(&self, kernel_id: &str) -> Result<KernelSession> {
        KernelSession::open(&self.config, kernel_id).await
    }

    // ---- terminals ----

    /// `GET /api/terminals`
    pub async fn list_terminals(&self) -> Result<Vec<Terminal>> {
        self.get_json(&["api", "terminals"]).await
    }

    /// `POST /api/terminals`
    pub async fn create_terminal(&self) -> Result<Terminal> {
        let url = self.endpoint(&["api", "terminals"])?;
        self.json(self.http.post(url)).await
    }

    /// `GET /api/terminals/{name}`
    pub async fn get_terminal(&self, name: &str) -> Result<Terminal> {
        self.get_json(&["api", "terminals", name]).await
    }

    /// `DELETE /api/terminals/{name}`
    pub async fn delete_terminal(&self, name: &str) -> Result<()> {
        self.request_empty(Method::DELETE, &["api", "terminals", name])
            .await
    }

    // ---- plumbing ----

    /// Base URL plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let base = self.config.base_url();
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| KernelwireError::InvalidUrl(format!("{} cannot be a base", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn contents_url(&self, path: &str) -> Result<Url> {
        let mut segments = vec!["api", "contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        self.endpoint(&segments)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        self.json(self.http.get(url)).await
    }

    async fn request_empty(&self, method: Method, segments: &[&str]) -> Result<()> {
        let url = self.endpoint(segments)?;
        self.empty(self.http.request(method, url)).await
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn empty(&self, request: RequestBuilder) -> Result<()> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                KernelwireError::Connection(format!(
                    "cannot connect to {}",
                    self.config.base_url()
                ))
            } else {
                KernelwireError::Http(e)
            }
        })?;

        let status = response.status();
        tracing::debug!(url = %response.url(), %status, "rest call");

        if status.as_u16() >= 400 {
            let url = response.url().to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(KernelwireError::HttpStatus {
                status: status.as_u16(),
                url,
                body,
            });
        }

        Ok(response)
    }
}
