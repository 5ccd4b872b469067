use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::sonar::pipeline::Models;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_REFERER: &str = "https://github.com/sonar-mcp-server";
pub const DEFAULT_TITLE: &str = "Sonar MCP Server";

/// `[upstream]` table of the config file. Every key is optional.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct UpstreamSection {
    endpoint: Option<String>,
    api_key_env: Option<String>,
    model: Option<String>,
    reasoning_model: Option<String>,
    timeout_secs: Option<u64>,
    referer: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    upstream: Option<UpstreamSection>,
}

/// How to reach the chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamSettings {
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub models: Models,
    pub timeout_secs: u64,
    pub referer: String,
    pub title: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            models: Models::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl UpstreamSettings {
    /// Reads the API key from the environment at call time.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn is_api_key_present(&self) -> bool {
        self.api_key().is_some()
    }
}

/// Resolved configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub path: PathBuf,
    pub file_found: bool,
    pub upstream: UpstreamSettings,
}

/// Loads settings from the config file (if any) and `SONAR_MCP_*` overrides.
pub fn load() -> Result<Settings, String> {
    load_with(|name| env::var(name).ok())
}

/// Same as [`load`], reading variables through `lookup`.
pub fn load_with<F>(lookup: F) -> Result<Settings, String>
where
    F: Fn(&str) -> Option<String>,
{
    let path = config_path(&lookup)?;
    let file = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|err| format!("Failed to read config file '{}': {err}", path.display()))?;
        let parsed: ConfigFile = toml::from_str(&raw)
            .map_err(|err| format!("Failed to parse config file '{}': {err}", path.display()))?;
        Some(parsed)
    } else {
        None
    };
    let file_found = file.is_some();
    let section = file.and_then(|file| file.upstream).unwrap_or_default();

    let mut upstream = UpstreamSettings::default();
    apply_section(&mut upstream, section);
    apply_env(&mut upstream, &lookup)?;

    if upstream.timeout_secs == 0 {
        return Err("Invalid timeout: must be at least 1 second.".to_string());
    }

    Ok(Settings {
        path,
        file_found,
        upstream,
    })
}

fn apply_section(upstream: &mut UpstreamSettings, section: UpstreamSection) {
    if let Some(endpoint) = section.endpoint {
        upstream.endpoint = endpoint;
    }
    if let Some(api_key_env) = section.api_key_env {
        upstream.api_key_env = api_key_env;
    }
    if let Some(model) = section.model {
        upstream.models.model = model;
    }
    if let Some(reasoning_model) = section.reasoning_model {
        upstream.models.reasoning_model = reasoning_model;
    }
    if let Some(timeout_secs) = section.timeout_secs {
        upstream.timeout_secs = timeout_secs;
    }
    if let Some(referer) = section.referer {
        upstream.referer = referer;
    }
    if let Some(title) = section.title {
        upstream.title = title;
    }
}

fn apply_env<F>(upstream: &mut UpstreamSettings, lookup: &F) -> Result<(), String>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(endpoint) = var("SONAR_MCP_ENDPOINT") {
        upstream.endpoint = endpoint;
    }
    if let Some(model) = var("SONAR_MCP_MODEL") {
        upstream.models.model = model;
    }
    if let Some(model) = var("SONAR_MCP_REASONING_MODEL") {
        upstream.models.reasoning_model = model;
    }
    if let Some(raw) = var("SONAR_MCP_TIMEOUT") {
        upstream.timeout_secs = raw.parse().map_err(|_| {
            format!("Invalid SONAR_MCP_TIMEOUT '{raw}'. Expected a whole number of seconds.")
        })?;
    }
    Ok(())
}

fn config_path<F>(lookup: &F) -> Result<PathBuf, String>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(path) = non_empty("SONAR_MCP_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    if let Some(xdg) = non_empty("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("sonar-mcp").join("config.toml"));
    }
    let home = non_empty("HOME").ok_or_else(|| {
        "Cannot resolve config path: set SONAR_MCP_CONFIG or HOME/XDG_CONFIG_HOME.".to_string()
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("sonar-mcp")
        .join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        env::temp_dir().join(format!("sonar-mcp-config-{label}-{nanos}.toml"))
    }

    fn load_from(vars: &[(&str, &str)]) -> Result<Settings, String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        load_with(|name| vars.get(name).cloned())
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = temp_path("missing");
        let settings =
            load_from(&[("SONAR_MCP_CONFIG", path.to_str().expect("utf-8"))]).expect("defaults");
        assert!(!settings.file_found);
        assert_eq!(settings.upstream, UpstreamSettings::default());
        assert_eq!(settings.upstream.timeout_secs, 120);
    }

    #[test]
    fn file_values_override_defaults_and_env_overrides_file() {
        let path = temp_path("layered");
        fs::write(
            &path,
            "[upstream]\nmodel = \"file/model\"\nreasoning_model = \"file/reason\"\ntimeout_secs = 30\n",
        )
        .expect("config should be writable");

        let settings = load_from(&[
            ("SONAR_MCP_CONFIG", path.to_str().expect("utf-8")),
            ("SONAR_MCP_MODEL", "env/model"),
            ("SONAR_MCP_TIMEOUT", "45"),
        ])
        .expect("layered settings");

        assert!(settings.file_found);
        assert_eq!(settings.upstream.models.model, "env/model");
        assert_eq!(settings.upstream.models.reasoning_model, "file/reason");
        assert_eq!(settings.upstream.timeout_secs, 45);
        assert_eq!(settings.upstream.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn invalid_toml_is_reported() {
        let path = temp_path("invalid");
        fs::write(&path, "[upstream\nmodel = 1").expect("config should be writable");
        let err = load_from(&[("SONAR_MCP_CONFIG", path.to_str().expect("utf-8"))])
            .expect_err("parse failure");
        assert!(err.starts_with("Failed to parse config file"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let path = temp_path("unknown-key");
        fs::write(&path, "[upstream]\nretries = 3\n").expect("config should be writable");
        let err = load_from(&[("SONAR_MCP_CONFIG", path.to_str().expect("utf-8"))])
            .expect_err("unknown key");
        assert!(err.contains("retries"));
    }

    #[test]
    fn bad_timeouts_are_rejected() {
        let path = temp_path("timeouts");
        let config = path.to_str().expect("utf-8");
        let err = load_from(&[("SONAR_MCP_CONFIG", config), ("SONAR_MCP_TIMEOUT", "soon")])
            .expect_err("not a number");
        assert!(err.contains("SONAR_MCP_TIMEOUT"));

        let err = load_from(&[("SONAR_MCP_CONFIG", config), ("SONAR_MCP_TIMEOUT", "0")])
            .expect_err("zero");
        assert!(err.contains("at least 1 second"));
    }

    #[test]
    fn config_path_prefers_explicit_then_xdg_then_home() {
        let lookup = |vars: &'static [(&'static str, &'static str)]| {
            move |name: &str| {
                vars.iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| value.to_string())
            }
        };

        let path = config_path(&lookup(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/u")]))
            .expect("xdg path");
        assert_eq!(path, PathBuf::from("/xdg/sonar-mcp/config.toml"));

        let path = config_path(&lookup(&[("HOME", "/home/u")])).expect("home path");
        assert_eq!(path, PathBuf::from("/home/u/.config/sonar-mcp/config.toml"));

        let path = config_path(&lookup(&[("SONAR_MCP_CONFIG", "/etc/sonar.toml"), ("HOME", "/h")]))
            .expect("explicit path");
        assert_eq!(path, PathBuf::from("/etc/sonar.toml"));

        assert!(config_path(&lookup(&[])).is_err());
    }
}
