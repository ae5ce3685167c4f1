//! REST resource models.
//!
//! Fields the server may omit are optional or defaulted, and unknown fields
//! are ignored, so models decode across server versions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /api/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub version: String,
}

/// `GET /api/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub started: Option<String>,
    #[serde(default)]
    pub last_activity: Option<String>,
    #[serde(default)]
    pub connections: u64,
    #[serde(default)]
    pub kernels: u64,
}

/// `GET /api/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub identity: Map<String, Value>,
    #[serde(default)]
    pub permissions: Map<String, Value>,
}

impl UserInfo {
    /// `identity.username`, if present.
    pub fn username(&self) -> Option<&str> {
        self.identity.get("username").and_then(Value::as_str)
    }
}

/// Kind of a contents entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentsType {
    Directory,
    File,
    Notebook,
}

/// A file, directory, or notebook from the contents API.
///
/// For directories `content` holds the listing; [`Contents::entries`]
/// decodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contents {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ContentsType,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub content: Value,
}

impl Contents {
    /// Directory listing; empty for files or when content wasn't requested.
    pub fn entries(&self) -> Vec<Contents> {
        match (&self.kind, &self.content) {
            (ContentsType::Directory, Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Text content of a file fetched in `text` format.
    pub fn text(&self) -> Option<&str> {
        match self.format.as_deref() {
            Some("text") => self.content.as_str(),
            _ => None,
        }
    }
}

/// Encoding of uploaded file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    #[default]
    Text,
    Base64,
}

/// Body of `PUT /api/contents/{path}`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct PutContents<'a> {
    pub content: &'a str,
    pub format: UploadFormat,
    pub name: &'a str,
    pub path: &'a str,
    #[serde(rename = "type")]
    pub kind: ContentsType,
}

/// A running kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kernel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub last_activity: Option<String>,
    #[serde(default)]
    pub execution_state: Option<String>,
    #[serde(default)]
    pub connections: u64,
}

/// Kernel selector used when creating sessions or kernels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelName {
    pub name: String,
}

/// A notebook/console session binding a path to a kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionModel {
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub kernel: Option<Kernel>,
}

/// Body of `POST /api/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSession {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub kernel: KernelName,
}

impl NewSession {
    /// A session of `kind` at `path` using the `python3` kernel.
    pub fn new(path: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: String::new(),
            kind: kind.into(),
            kernel: KernelName {
                name: "python3".to_string(),
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_kernel(mut self, kernel_name: impl Into<String>) -> Self {
        self.kernel.name = kernel_name.into();
        self
    }
}

/// `GET /api/kernelspecs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpecs {
    pub default: String,
    #[serde(default)]
    pub kernelspecs: HashMap<String, KernelSpecEntry>,
}

/// One installed kernel spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpecEntry {
    pub name: String,
    #[serde(default)]
    pub spec: Map<String, Value>,
    #[serde(default)]
    pub resources: Map<String, Value>,
}

impl KernelSpecEntry {
    /// `spec.display_name`, if present.
    pub fn display_name(&self) -> Option<&str> {
        self.spec.get("display_name").and_then(Value::as_str)
    }

    /// `spec.language`, if present.
    pub fn language(&self) -> Option<&str> {
        self.spec.get("language").and_then(Value::as_str)
    }
}

/// A terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    pub name: String,
    #[serde(default)]
    pub last_activity: Option<String>,
}
