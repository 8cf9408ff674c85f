//! Global configuration loader for Siteflow.
//!
//! Reads `config.toml` from the data directory (`~/.siteflow/` in
//! production) and deserializes it into [`SiteflowConfig`]. Falls back to
//! sensible defaults when the file is missing or malformed.

use std::path::Path;

use serde::Deserialize;

/// Engine and collaborator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteflowConfig {
    /// SQLite database URL. Defaults to `{data_dir}/siteflow.db`.
    pub database_url: Option<String>,
    /// Execution lease duration in seconds.
    pub lease_ttl_secs: u64,
    /// Collaborator backend selection and endpoints.
    pub collaborators: CollaboratorConfig,
}

impl Default for SiteflowConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            lease_ttl_secs: 30,
            collaborators: CollaboratorConfig::default(),
        }
    }
}

/// Which collaborator backend to wire in.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// "heuristic" (offline, deterministic) or "http" (remote services).
    pub mode: CollaboratorMode,
    /// Base URL of the document-intelligence service (http mode).
    pub document_service_url: Option<String>,
    /// Base URL of the advisory service (http mode).
    pub advisory_service_url: Option<String>,
    /// API key sent to both services (http mode).
    pub api_key: Option<String>,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            mode: CollaboratorMode::Heuristic,
            document_service_url: None,
            advisory_service_url: None,
            api_key: None,
        }
    }
}

/// Collaborator backend flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorMode {
    Heuristic,
    Http,
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`SiteflowConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(data_dir: &Path) -> SiteflowConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            return SiteflowConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return SiteflowConfig::default();
        }
    };

    match toml::from_str::<SiteflowConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            SiteflowConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.lease_ttl_secs, 30);
        assert_eq!(config.collaborators.mode, CollaboratorMode::Heuristic);
        assert!(config.database_url.is_none());
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
lease_ttl_secs = 60

[collaborators]
mode = "http"
document_service_url = "https://docs.internal"
advisory_service_url = "https://advisory.internal"
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.lease_ttl_secs, 60);
        assert_eq!(config.collaborators.mode, CollaboratorMode::Http);
        assert_eq!(
            config.collaborators.document_service_url.as_deref(),
            Some("https://docs.internal")
        );
    }

    #[tokio::test]
    async fn malformed_toml_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "lease_ttl_secs = [nope")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.lease_ttl_secs, 30);
    }
}
