/// `load_config` module: builds the one [`ServiceConfig`] the process runs with.
///
/// This is the only place that reads the YAML config file or the process
/// environment. Everything downstream receives the finished struct.
///
/// # Layering (later wins)
/// 1. Built-in defaults (`ServiceConfig::default()`).
/// 2. The optional YAML file passed with `--config`; every key is optional.
/// 3. Environment variables, read through an injectable lookup so tests never
///    touch the real environment.
///
/// CLI flags are applied on top by [`crate::cli`].
///
/// # Errors
/// All errors use `anyhow::Error` and surface at the CLI boundary. A numeric
/// environment variable that does not parse is an error naming the variable.
use anyhow::{anyhow, Context, Result};
use md_publish_core::config::PublishConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub publish: PublishConfig,
}

impl ServiceConfig {
    pub fn trace_loaded(&self) {
        info!(
            host = %self.server.host,
            port = self.server.port,
            log_level = %self.logging.level,
            log_format = ?self.logging.format,
            "Loaded ServiceConfig"
        );
        self.publish.trace_loaded();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerSettings {
    /// `host:port`, as handed to the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive string, e.g. `info` or `md_publish=debug,info`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("unknown log format '{other}', expected 'compact' or 'json'")),
        }
    }
}

/// Load defaults, the optional YAML file and the real process environment.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with a caller-supplied environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            info!("No config file given, starting from defaults");
            ServiceConfig::default()
        }
    };
    apply_env(&mut config, lookup)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ServiceConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {path:?}: {e}"));
        }
    };

    if content.trim().is_empty() {
        return Ok(ServiceConfig::default());
    }

    match serde_yaml::from_str(&content) {
        Ok(config) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML {path:?}: {e}"))
        }
    }
}

/// Overlay environment variables onto `config`. Blank values count as unset.
pub fn apply_env<F>(config: &mut ServiceConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(host) = get("MD_PUBLISH_HOST") {
        config.server.host = host;
    }
    if let Some(port) = parse_var(&get, "PORT")? {
        config.server.port = port;
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get("LOG_FORMAT") {
        config.logging.format = format
            .parse()
            .with_context(|| format!("Invalid value for LOG_FORMAT: '{format}'"))?;
    }

    let publish = &mut config.publish;
    if let Some(workspace) = get("GITHUB_WORKSPACE") {
        publish.workspace_dir = Some(PathBuf::from(workspace));
    }
    if let Some(branch) = get("GITHUB_DEFAULT_BRANCH") {
        publish.github.default_branch = branch;
    }
    if let Some(token) = get("GITHUB_TOKEN").or_else(|| get("gh_token")) {
        publish.github.token = Some(token);
    }
    if let Some(secs) = parse_var(&get, "DOWNLOAD_TIMEOUT_SECS")? {
        publish.github.timeout_secs = secs;
    }

    let confluence = &mut publish.confluence;
    for (key, slot) in [
        ("CONFLUENCE_DOMAIN", &mut confluence.domain),
        ("CONFLUENCE_USERNAME", &mut confluence.username),
        ("CONFLUENCE_API_KEY", &mut confluence.api_key),
        ("CONFLUENCE_SPACE", &mut confluence.space),
        ("CONFLUENCE_ROOT_PAGE", &mut confluence.root_page),
    ] {
        if let Some(value) = get(key) {
            *slot = Some(value);
        }
    }

    if let Some(program) = get("MD2CONF_PROGRAM") {
        publish.converter.program = program;
    }
    if let Some(secs) = parse_var(&get, "CONVERTER_TIMEOUT_SECS")? {
        publish.converter.timeout_secs = secs;
    }
    Ok(())
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid value for {key}: '{raw}' ({e})")),
        None => Ok(None),
    }
}
