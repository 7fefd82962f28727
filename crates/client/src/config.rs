//! Client configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_SOCKET_URL: &str = "http://localhost:5000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoints and storage location shared by the HTTP and real-time clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL every REST path is appended to.
    pub api_base_url: String,
    /// Base URL of the Socket.IO event server.
    pub socket_url: String,
    /// Timeout applied to each REST request.
    pub request_timeout: Duration,
    /// Directory for the persisted session. `None` means the platform config directory.
    pub session_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            session_dir: None,
        }
    }
}

impl ClientConfig {
    /// Read configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STOCKMASTER_API_BASE_URL`: REST base URL (default: "http://localhost:5000/api")
    /// - `STOCKMASTER_SOCKET_URL`: event server URL (default: "http://localhost:5000")
    /// - `STOCKMASTER_REQUEST_TIMEOUT_SECS`: REST timeout in seconds (default: 30)
    /// - `STOCKMASTER_SESSION_DIR`: session directory (default: platform config dir)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url =
            non_empty("STOCKMASTER_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let socket_url =
            non_empty("STOCKMASTER_SOCKET_URL").unwrap_or_else(|| DEFAULT_SOCKET_URL.to_string());
        let request_timeout = non_empty("STOCKMASTER_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let session_dir = non_empty("STOCKMASTER_SESSION_DIR").map(PathBuf::from);

        Self {
            api_base_url,
            socket_url,
            request_timeout,
            session_dir,
        }
    }
}
