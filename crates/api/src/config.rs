//! Server configuration.

use keepsake_llm::LlmConfig;
use keepsake_memory::{SamplingConfig, WeightConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeepsakeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub weights: WeightConfig,

    #[serde(default)]
    pub survey: SurveyConfig,

    /// LLM provider; without it weight updates and surveys are unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; permissive when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors_origins: Option<Vec<String>>,

    #[serde(default = "default_caregiver_username")]
    pub caregiver_username: String,

    #[serde(default = "default_caregiver_password")]
    pub caregiver_password: String,
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

fn default_caregiver_username() -> String {
    "caretaker".into()
}

fn default_caregiver_password() -> String {
    "password".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            cors_origins: None,
            caregiver_username: default_caregiver_username(),
            caregiver_password: default_caregiver_password(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot of the collection; in-memory only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Memories offered to the generator per survey
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,

    #[serde(default = "default_questions")]
    pub questions: usize,
}

fn default_memory_limit() -> usize {
    5
}

fn default_questions() -> usize {
    5
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            memory_limit: default_memory_limit(),
            questions: default_questions(),
        }
    }
}

impl KeepsakeConfig {
    /// Load configuration from a TOML file.
    ///
    /// On Unix the file must be a regular file that is not world-writable,
    /// and must not be world-readable when it holds secrets.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;

        if config.llm.as_ref().is_some_and(|l| l.api_key.is_some()) {
            warn!(
                path = %path.display(),
                "API key found in config file; prefer OPENAI_API_KEY or ANTHROPIC_API_KEY"
            );
        }
        if config.server.caregiver_password == default_caregiver_password() {
            warn!("Caregiver login uses the default password");
        }

        Ok(config)
    }
}

/// Whether a TOML document assigns a value to a secret key.
fn holds_secret(content: &str) -> bool {
    content.lines().any(|line| {
        let line = line.trim_start();
        ["api_key", "caregiver_password"].iter().any(|key| {
            line.strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        })
    })
}

#[cfg(unix)]
fn validate_config_file_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!("Config path '{}' is not a regular file", path.display());
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)?;
    if holds_secret(&content) && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains credentials but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}
