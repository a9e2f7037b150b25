// Configuration for the API client
//
// Configuration is loaded in order of precedence:
// 1. Environment variables (highest priority)
// 2. Config file (~/.config/rfm-client/config.toml)
// 3. Built-in defaults (lowest priority)
//
// The resulting Config is read once at startup and immutable for the process
// lifetime.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend API base URL (no trailing slash, no version segment)
    pub api_url: String,

    /// API version segment, e.g. "v1"
    pub api_version: String,

    /// Per-request timeout; an in-flight call is aborted when it elapses
    pub timeout: Duration,
}

/// Config file structure (everything optional, defaults fill the gaps)
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    api_url: Option<String>,
    api_version: Option<String>,
    api_timeout_ms: Option<u64>,
}

impl Config {
    /// Get the config file path: ~/.config/rfm-client/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("rfm-client").join("config.toml"))
    }

    /// Create config template if it doesn't exist
    /// Called during startup to help users discover configuration options
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        // Don't overwrite existing config
        if path.exists() {
            return;
        }

        // Create parent directory
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Silently fail - config is optional
            }
        }

        let template = r#"# rfm-client configuration
# Uncomment and modify options as needed

# Backend API base URL (default: https://api.rfminsights.com.br)
# api_url = "https://api.rfminsights.com.br"

# API version segment (default: v1)
# api_version = "v1"

# Request timeout in milliseconds (default: 30000)
# api_timeout_ms = 30000
"#;

        // Write template (ignore errors - config is optional)
        let _ = std::fs::write(&path, template);
    }

    /// Load file config if it exists
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                FileConfig::default()
            }),
            Err(_) => FileConfig::default(), // File doesn't exist, use defaults
        }
    }

    /// Load configuration: env vars -> file -> defaults
    pub fn from_env() -> Self {
        let file = Self::load_file_config();

        // API URL: env > file > default
        let api_url = std::env::var("RFM_API_URL")
            .ok()
            .or(file.api_url)
            .unwrap_or_else(|| "https://api.rfminsights.com.br".to_string());

        // API version: env > file > default
        let api_version = std::env::var("RFM_API_VERSION")
            .ok()
            .or(file.api_version)
            .unwrap_or_else(|| "v1".to_string());

        // Timeout: env > file > default (30s, matching the backend's own budget)
        let timeout_ms = std::env::var("RFM_API_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.api_timeout_ms)
            .unwrap_or(30_000);

        Self {
            api_url,
            api_version,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "https://api.rfminsights.com.br".to_string(),
            api_version: "v1".to_string(),
            timeout: Duration::from_millis(30_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url, "https://api.rfminsights.com.br");
        assert_eq!(config.api_version, "v1");
        assert_eq!(config.timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn test_file_config_parses_partial_toml() {
        let file: FileConfig = toml::from_str(r#"api_version = "v2""#).unwrap();
        assert_eq!(file.api_version.as_deref(), Some("v2"));
        assert!(file.api_url.is_none());
        assert!(file.api_timeout_ms.is_none());
    }
}
