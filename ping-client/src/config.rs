//! Load config from file and environment.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ping_core::ClientConfig;
use serde::Deserialize;

/// Client configuration. File: ~/.config/ping-client/config.toml or /etc/ping-client/config.toml.
/// Env overrides: PING_GROUP_PREFIX, PING_OBJECT_PATH, PING_LOG, PING_LOG_FORMAT,
/// PING_DEMO_SERVICE, PING_DEMO_DELAY_MS.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Group prefix, object path and interface (`[client]` table).
    #[serde(default)]
    pub client: ClientConfig,
    /// tracing filter directive (default "info").
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// "text" or "json" (default "text").
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Host a SimpleService on the local bus so there is something to find (default true).
    #[serde(default = "default_demo_service")]
    pub demo_service: bool,
    /// Delay before the demo service advertises (default 500 ms).
    #[serde(default = "default_demo_delay_ms")]
    pub demo_delay_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_demo_service() -> bool {
    true
}
fn default_demo_delay_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            demo_service: default_demo_service(),
            demo_delay_ms: default_demo_delay_ms(),
        }
    }
}

/// Load config: merge default, then config file, then env vars.
/// An explicit `path` must exist and parse; the default locations are best effort.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut c = match path {
        Some(p) => read_file(p)?,
        None => load_default_file().unwrap_or_default(),
    };
    apply_env(&mut c, |k| std::env::var(k).ok());
    c.client.validate()?;
    Ok(c)
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("PING_GROUP_PREFIX") {
        c.client.group_prefix = s;
    }
    if let Some(s) = var("PING_OBJECT_PATH") {
        c.client.object_path = s;
    }
    if let Some(s) = var("PING_LOG") {
        c.log_level = s;
    }
    if let Some(s) = var("PING_LOG_FORMAT") {
        c.log_format = s;
    }
    if let Some(s) = var("PING_DEMO_SERVICE") {
        match s.as_str() {
            "1" | "true" | "yes" => c.demo_service = true,
            "0" | "false" | "no" => c.demo_service = false,
            _ => {}
        }
    }
    if let Some(s) = var("PING_DEMO_DELAY_MS") {
        if let Ok(ms) = s.parse::<u64>() {
            c.demo_delay_ms = ms;
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/ping-client/config.toml"));
    }
    out.push(PathBuf::from("/etc/ping-client/config.toml"));
    out
}

fn load_default_file() -> Option<Config> {
    let p = config_paths().into_iter().find(|p| p.exists())?;
    match read_file(&p) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("ignoring {}: {:#}", p.display(), e);
            None
        }
    }
}

fn read_file(path: &Path) -> anyhow::Result<Config> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parsing {}", path.display()))
}
