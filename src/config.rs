//! Cascade configuration: gateway settings (TOML) and the worker catalog (JSON).
//!
//! The worker catalog uses the `mcpServers` document layout shared by most MCP
//! clients, so an existing client config file can be pointed at directly.

use crate::error::CascadeError;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Strip an env var reference to its variable name.
///
/// Accepts `${VAR_NAME}` syntax only. Returns `None` for literal values.
pub fn parse_env_ref(value: &str) -> Option<&str> {
    value.strip_prefix("${").and_then(|s| s.strip_suffix('}'))
}

/// Resolve a worker's env overrides to concrete values.
///
/// Literal values pass through unchanged. `${VAR}` references are read from
/// the gateway's own environment; unknown variables resolve to the empty
/// string (same as shell `${UNSET-}`).
pub fn resolve_env_vars(env: &HashMap<String, String>) -> HashMap<String, String> {
    env.iter()
        .map(|(k, v)| {
            let resolved = match parse_env_ref(v) {
                Some(var_name) => std::env::var(var_name).unwrap_or_default(),
                None => v.clone(),
            };
            (k.clone(), resolved)
        })
        .collect()
}

/// Gateway settings, parsed from TOML. Every field has a default, so an
/// empty file (or no file) is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Ceiling on the summed tool counts of all tracked workers.
    #[serde(default = "default_max_tools")]
    pub max_tools: usize,
    /// Address every external worker is assumed to listen on.
    #[serde(default = "default_worker_addr")]
    pub worker_addr: String,
    /// Path prefix of the worker's MCP endpoints (`{prefix}/list_tools`, `{prefix}/call_tool`).
    #[serde(default = "default_worker_mount_path")]
    pub worker_mount_path: String,
    /// Location of the `mcpServers` JSON catalog.
    #[serde(default = "default_worker_config")]
    pub worker_config: PathBuf,
    /// Timeout applied to each outbound HTTP request to a worker.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Pause between spawning a worker and probing it.
    #[serde(default)]
    pub startup_grace_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_tools: default_max_tools(),
            worker_addr: default_worker_addr(),
            worker_mount_path: default_worker_mount_path(),
            worker_config: default_worker_config(),
            request_timeout_secs: default_request_timeout_secs(),
            startup_grace_ms: 0,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_max_tools() -> usize {
    50
}

fn default_worker_addr() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_worker_mount_path() -> String {
    "/mcp".to_string()
}

fn default_worker_config() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".codeium")
        .join("windsurf")
        .join("mcp_config.json")
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl GatewaySettings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CascadeError::InvalidConfig(path.display().to_string(), e.to_string()))?;
        let settings: GatewaySettings = toml::from_str(&content)
            .map_err(|e| CascadeError::InvalidConfig(path.display().to_string(), e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Base URL of an external worker's MCP endpoints, e.g. `http://127.0.0.1:9000/mcp`.
    pub fn worker_base_url(&self) -> String {
        format!(
            "http://{}{}",
            self.worker_addr,
            self.worker_mount_path.trim_end_matches('/')
        )
    }

    /// Validate the settings, failing fast before the listener is bound.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_tools == 0 {
            return Err(CascadeError::InvalidConfig(
                "settings".to_string(),
                "max_tools must be > 0".to_string(),
            ));
        }
        if self.worker_addr.parse::<SocketAddr>().is_err() {
            return Err(CascadeError::InvalidConfig(
                "settings".to_string(),
                format!("worker_addr '{}' is not a socket address", self.worker_addr),
            ));
        }
        if !self.worker_mount_path.starts_with('/') {
            return Err(CascadeError::InvalidConfig(
                "settings".to_string(),
                format!(
                    "worker_mount_path '{}' must start with '/'",
                    self.worker_mount_path
                ),
            ));
        }
        Ok(())
    }
}

/// Launch description of one external worker.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WorkerSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Overrides merged onto the inherited environment. Values may be
    /// literals or `${VAR}` references.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// The `mcpServers` catalog of named external workers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerCatalog {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: HashMap<String, WorkerSpec>,
}

impl WorkerCatalog {
    /// Parse a catalog from its JSON text and validate it.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        let catalog: WorkerCatalog = serde_json::from_str(text)
            .map_err(|e| CascadeError::InvalidConfig("worker catalog".to_string(), e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read, parse, and validate the catalog file at `path`.
    pub async fn load(path: &Path) -> crate::Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            CascadeError::InvalidConfig(
                "worker catalog".to_string(),
                format!("{}: {}", path.display(), e),
            )
        })?;
        Self::from_json(&text)
    }

    pub fn get(&self, name: &str) -> Option<&WorkerSpec> {
        self.mcp_servers.get(name)
    }

    /// Sorted list of configured worker names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mcp_servers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn validate(&self) -> crate::Result<()> {
        for (name, spec) in &self.mcp_servers {
            if name.trim().is_empty() {
                return Err(CascadeError::InvalidConfig(
                    "worker catalog".to_string(),
                    "worker names must be non-empty".to_string(),
                ));
            }
            if spec.command.trim().is_empty() {
                return Err(CascadeError::InvalidConfig(
                    name.clone(),
                    "worker requires a non-empty 'command'".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_ref() {
        assert_eq!(parse_env_ref("${FOO}"), Some("FOO"));
        assert_eq!(parse_env_ref("$FOO"), None);
        assert_eq!(parse_env_ref("literal"), None);
        assert_eq!(parse_env_ref("${"), None);
    }

    #[test]
    fn test_resolve_env_vars_mixes_literals_and_refs() {
        // SAFETY: test-only, no concurrent threads depend on this env var.
        unsafe { std::env::set_var("CASCADE_TEST_VAR", "resolved_value") };
        let mut env = HashMap::new();
        env.insert("REF".to_string(), "${CASCADE_TEST_VAR}".to_string());
        env.insert("LIT".to_string(), "plain".to_string());
        env.insert("MISSING".to_string(), "${CASCADE_SURELY_UNSET_VAR}".to_string());
        let resolved = resolve_env_vars(&env);
        assert_eq!(resolved["REF"], "resolved_value");
        assert_eq!(resolved["LIT"], "plain");
        assert_eq!(resolved["MISSING"], "");
        // SAFETY: test-only cleanup.
        unsafe { std::env::remove_var("CASCADE_TEST_VAR") };
    }

    #[test]
    fn test_settings_defaults_from_empty_toml() {
        let settings: GatewaySettings = toml::from_str("").expect("valid TOML");
        assert_eq!(settings.port, 8888);
        assert_eq!(settings.max_tools, 50);
        assert_eq!(settings.worker_addr, "127.0.0.1:9000");
        assert_eq!(settings.worker_base_url(), "http://127.0.0.1:9000/mcp");
        assert!(settings.worker_config.ends_with("mcp_config.json"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_zero_max_tools_rejected() {
        let settings: GatewaySettings = toml::from_str("max_tools = 0").expect("valid TOML");
        let result = settings.validate();
        assert!(
            matches!(result, Err(CascadeError::InvalidConfig(_, msg)) if msg.contains("max_tools"))
        );
    }

    #[test]
    fn test_settings_bad_worker_addr_rejected() {
        let settings: GatewaySettings =
            toml::from_str(r#"worker_addr = "localhost""#).expect("valid TOML");
        assert!(matches!(
            settings.validate(),
            Err(CascadeError::InvalidConfig(_, msg)) if msg.contains("worker_addr")
        ));
    }

    #[test]
    fn test_settings_mount_path_trailing_slash() {
        let settings: GatewaySettings =
            toml::from_str(r#"worker_mount_path = "/mcp/""#).expect("valid TOML");
        assert_eq!(settings.worker_base_url(), "http://127.0.0.1:9000/mcp");
    }

    #[test]
    fn test_catalog_parses_mcp_servers() {
        let catalog = WorkerCatalog::from_json(
            r#"{
                "mcpServers": {
                    "playwright": {
                        "command": "npx",
                        "args": ["-y", "@playwright/mcp@latest", "--headless"],
                        "env": {"DEBUG": "1"}
                    },
                    "bare": {"command": "worker-bin"}
                }
            }"#,
        )
        .expect("valid catalog");
        assert_eq!(catalog.names(), vec!["bare".to_string(), "playwright".to_string()]);
        let pw = catalog.get("playwright").unwrap();
        assert_eq!(pw.command, "npx");
        assert_eq!(pw.args.len(), 3);
        assert_eq!(pw.env["DEBUG"], "1");
        let bare = catalog.get("bare").unwrap();
        assert!(bare.args.is_empty());
        assert!(bare.env.is_empty());
    }

    #[test]
    fn test_catalog_empty_command_rejected() {
        let result = WorkerCatalog::from_json(r#"{"mcpServers": {"x": {"command": " "}}}"#);
        assert!(matches!(result, Err(CascadeError::InvalidConfig(scope, _)) if scope == "x"));
    }

    #[test]
    fn test_catalog_invalid_json_rejected() {
        let result = WorkerCatalog::from_json("{not json");
        assert!(matches!(
            result,
            Err(CascadeError::InvalidConfig(scope, _)) if scope == "worker catalog"
        ));
    }

    #[test]
    fn test_settings_load_from_file() {
        use std::io::Write;
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        writeln!(temp, "port = 9999\nmax_tools = 10\nworker_addr = \"127.0.0.1:9100\"").unwrap();
        let settings = GatewaySettings::load(temp.path()).unwrap();
        assert_eq!(settings.port, 9999);
        assert_eq!(settings.max_tools, 10);
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.worker_base_url(), "http://127.0.0.1:9100/mcp");
    }

    #[tokio::test]
    async fn test_catalog_load_missing_file() {
        let result = WorkerCatalog::load(Path::new("/nonexistent/mcp_config.json")).await;
        assert!(result.is_err());
    }
}
