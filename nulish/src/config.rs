use std::sync::OnceLock;

use serde::Deserialize;

use crate::tags::FingerprintMode;

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,

    // local-first mode
    pub remote_url: Option<String>,
    #[serde(default = "default_cache_namespace")]
    pub cache_namespace: String,
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    // tags
    #[serde(default)]
    pub tag_fingerprint: FingerprintMode,

    // editor
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    #[serde(default)]
    pub log_json: bool,

    // build
    pub app_version: Option<String>,
    #[serde(default = "default_local")]
    pub source: String,
    #[serde(default = "default_local")]
    pub git_commit: String,
    #[serde(default = "default_local")]
    pub pipeline_id: String,
    #[serde(default = "default_local")]
    pub version: String,
}

fn default_port() -> u16 {
    4000
}

fn default_database_url() -> String {
    "sqlite.db".into()
}

fn default_cache_namespace() -> String {
    "nulish".into()
}

fn default_cache_ttl_ms() -> u64 {
    100
}

fn default_save_debounce_ms() -> u64 {
    1000
}

fn default_local() -> String {
    "local".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_url: default_database_url(),
            remote_url: None,
            cache_namespace: default_cache_namespace(),
            cache_ttl_ms: default_cache_ttl_ms(),
            tag_fingerprint: FingerprintMode::default(),
            save_debounce_ms: default_save_debounce_ms(),
            log_json: false,
            app_version: None,
            source: default_local(),
            git_commit: default_local(),
            pipeline_id: default_local(),
            version: default_local(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Self>()
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Reads the environment once. Must run before anything calls [`config`].
pub fn init() -> Result<&'static Config, envy::Error> {
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}

pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

#[cfg(test)]
pub fn config_override<F>(override_config: F) -> &'static Config
where
    F: FnOnce(Config) -> Config,
{
    CONFIG.get_or_init(|| override_config(Config::default()))
}
