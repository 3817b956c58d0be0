use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;

/// Default backend base URL for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:12000";

/// Client configuration loaded from environment variables.
///
/// All fields except the export dataset have defaults suitable for local
/// development.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL without the `/api/v1` prefix.
    pub api_url: String,
    /// Per-request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Delay of the simulated auto-labeler in milliseconds (default: `2000`).
    pub auto_label_delay_ms: u64,
    /// Dataset exported by `labelforge-export`.
    pub export_dataset_id: Option<String>,
    /// Output file of `labelforge-export` (default: `annotations.json`).
    pub export_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            auto_label_delay_ms: 2000,
            export_dataset_id: None,
            export_path: PathBuf::from("annotations.json"),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `LABELFORGE_API_URL`   | `http://localhost:12000`   |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `AUTO_LABEL_DELAY_MS`  | `2000`                     |
    /// | `EXPORT_DATASET_ID`    | unset                      |
    /// | `EXPORT_PATH`          | `annotations.json`         |
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("LABELFORGE_API_URL")
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or(defaults.api_url);
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "LABELFORGE_API_URL must start with http:// or https://, got '{api_url}'"
            )));
        }

        let request_timeout_secs =
            parse_or(&lookup, "REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?;
        if request_timeout_secs == 0 {
            return Err(ClientError::Config(
                "REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let auto_label_delay_ms =
            parse_or(&lookup, "AUTO_LABEL_DELAY_MS", defaults.auto_label_delay_ms)?;

        let export_dataset_id = lookup("EXPORT_DATASET_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let export_path = lookup("EXPORT_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.export_path);

        Ok(Self {
            api_url,
            request_timeout_secs,
            auto_label_delay_ms,
            export_dataset_id,
            export_path,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn auto_label_delay(&self) -> Duration {
        Duration::from_millis(self.auto_label_delay_ms)
    }
}

fn parse_or<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ClientError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ClientError::Config(format!("{key} must be a valid u64, got '{raw}'"))
        }),
    }
}
