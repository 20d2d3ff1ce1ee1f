//! Application configuration.
//!
//! [`FusionConfig`] bundles the search library's settings with logging and
//! request-shell options. It loads from a TOML file, then environment
//! variables override individual fields (mostly API keys).

use crate::error::{FusionError, Result};
use fusion_search::{
    DispatcherConfig, FetchConfig, GateConfig, HttpConfig, ProvidersConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file when no CLI path is given.
pub const CONFIG_PATH_ENV: &str = "SEARCH_FUSION_CONFIG";

/// Log file rotation cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl LogRotation {
    /// Parse a rotation name, case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" | "1 day" => Some(Self::Daily),
            "hourly" | "1 hour" => Some(Self::Hourly),
            "never" | "none" => Some(Self::Never),
            _ => None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`,
    /// `fusion_search=debug`).
    pub level: String,
    /// Optional log file; console output always goes to stderr.
    pub file: Option<PathBuf>,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
            rotation: LogRotation::Daily,
        }
    }
}

/// Request-shell settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Outer time budget for one `fetch_url` call, in seconds.
    pub fetch_timeout_secs: u64,
    /// Result count used when a search request omits `num_results`.
    pub default_num_results: usize,
    /// Page fetches allowed to run at once; further requests queue.
    pub max_concurrent_fetches: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 90,
            default_num_results: 10,
            max_concurrent_fetches: 10,
        }
    }
}

impl ServerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub providers: ProvidersConfig,
    pub dispatcher: DispatcherConfig,
    pub gate: GateConfig,
    pub fetch: FetchConfig,
}

impl FusionConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| FusionError::Config(e.to_string()))
    }

    /// Load from `path` if given, otherwise defaults, then apply the process
    /// environment and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or the result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment variables read through `lookup`.
    ///
    /// Blank values are ignored. Where two names are listed the first one
    /// set wins.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .find_map(|k| lookup(k))
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(level) = get(&["LOG_LEVEL"]) {
            self.logging.level = level.to_lowercase();
        }
        if let Some(file) = get(&["LOG_FILE"]) {
            self.logging.file = Some(PathBuf::from(file));
        }
        if let Some(raw) = get(&["LOG_ROTATION"]) {
            match LogRotation::parse(&raw) {
                Some(rotation) => self.logging.rotation = rotation,
                None => tracing::warn!(value = %raw, "ignoring unknown LOG_ROTATION"),
            }
        }

        if let Some(proxy) = get(&["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"]) {
            self.http.proxy = Some(proxy);
        }

        let providers = &mut self.providers;
        if let Some(key) = get(&["GOOGLE_API_KEY", "GOOGLE_SEARCH_API_KEY"]) {
            providers.google.api_key = Some(key);
        }
        if let Some(cse) = get(&["GOOGLE_CSE_ID", "GOOGLE_SEARCH_CSE_ID"]) {
            providers.google.cse_id = Some(cse);
        }
        if let Some(key) = get(&["SERPER_API_KEY", "SERPER_SEARCH_API_KEY"]) {
            providers.serper_api_key = Some(key);
        }
        if let Some(key) = get(&["JINA_API_KEY", "JINA_SEARCH_API_KEY"]) {
            providers.jina_api_key = Some(key);
        }
        if let Some(key) = get(&["EXA_API_KEY", "EXA_SEARCH_API_KEY"]) {
            providers.exa_api_key = Some(key);
        }
        if let Some(key) = get(&["BING_API_KEY", "BING_SEARCH_API_KEY"]) {
            providers.bing_api_key = Some(key);
        }

        // Page fetching reuses the Jina key for its reader and the Serper
        // key for its scrape API unless they were set explicitly.
        if self.fetch.reader_api_key.is_none() {
            self.fetch.reader_api_key = self.providers.jina_api_key.clone();
        }
        if self.fetch.scrape_api_key.is_none() {
            self.fetch.scrape_api_key = self.providers.serper_api_key.clone();
        }
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.http.validate()?;
        self.dispatcher.validate()?;
        self.gate.validate()?;
        self.fetch.validate()?;
        if self.server.fetch_timeout_secs == 0 {
            return Err(FusionError::Config(
                "server.fetch_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.default_num_results == 0 {
            return Err(FusionError::Config(
                "server.default_num_results must be greater than 0".into(),
            ));
        }
        if self.server.max_concurrent_fetches == 0 {
            return Err(FusionError::Config(
                "server.max_concurrent_fetches must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Config path from the first CLI argument, else [`CONFIG_PATH_ENV`].
    pub fn path_from_args<I>(mut args: I) -> Option<PathBuf>
    where
        I: Iterator<Item = String>,
    {
        args.next()
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = FusionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.fetch_timeout(), Duration::from_secs(90));
        assert!(config.providers.duckduckgo_enabled);
    }

    #[test]
    fn from_file_reads_partial_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("search-fusion.toml");
        std::fs::write(
            &path,
            r#"
[logging]
level = "debug"
rotation = "hourly"

[providers]
serper_api_key = "from-file"
duckduckgo_enabled = false

[gate]
max_concurrent = 4
"#,
        )
        .expect("write");

        let config = FusionConfig::from_file(&path).expect("load");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.rotation, LogRotation::Hourly);
        assert_eq!(config.providers.serper_api_key.as_deref(), Some("from-file"));
        assert!(!config.providers.duckduckgo_enabled);
        assert_eq!(config.gate.max_concurrent, 4);
        assert_eq!(config.gate.operation_timeout_secs, 60);
        assert_eq!(config.fetch.default_max_length, 50_000);
    }

    #[test]
    fn from_file_missing_or_invalid_is_error() {
        assert!(FusionConfig::from_file(Path::new("/nonexistent/search-fusion.toml")).is_err());

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").expect("write");
        let err = FusionConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, FusionError::Config(_)));
    }

    #[test]
    fn env_overrides_keys_and_logging() {
        let mut config = FusionConfig::default();
        config.apply_env(env(&[
            ("LOG_LEVEL", "DEBUG"),
            ("LOG_FILE", "/var/log/search-fusion.log"),
            ("LOG_ROTATION", "never"),
            ("GOOGLE_SEARCH_API_KEY", "g-key"),
            ("GOOGLE_CSE_ID", "cse"),
            ("SERPER_API_KEY", "serper"),
            ("JINA_SEARCH_API_KEY", "jina"),
            ("EXA_API_KEY", "exa"),
            ("BING_API_KEY", "  "),
            ("https_proxy", "http://proxy.local:3128"),
        ]));

        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.file.as_deref(),
            Some(Path::new("/var/log/search-fusion.log"))
        );
        assert_eq!(config.logging.rotation, LogRotation::Never);
        assert_eq!(config.providers.google.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.providers.google.cse_id.as_deref(), Some("cse"));
        assert_eq!(config.providers.serper_api_key.as_deref(), Some("serper"));
        assert_eq!(config.providers.jina_api_key.as_deref(), Some("jina"));
        assert_eq!(config.providers.exa_api_key.as_deref(), Some("exa"));
        assert!(config.providers.bing_api_key.is_none());
        assert_eq!(config.http.proxy.as_deref(), Some("http://proxy.local:3128"));
    }

    #[test]
    fn primary_env_name_wins() {
        let mut config = FusionConfig::default();
        config.apply_env(env(&[
            ("SERPER_API_KEY", "primary"),
            ("SERPER_SEARCH_API_KEY", "secondary"),
        ]));
        assert_eq!(config.providers.serper_api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn fetch_keys_follow_provider_keys_unless_set() {
        let mut config = FusionConfig::default();
        config.fetch.scrape_api_key = Some("explicit".into());
        config.apply_env(env(&[("JINA_API_KEY", "jina"), ("SERPER_API_KEY", "serper")]));
        assert_eq!(config.fetch.reader_api_key.as_deref(), Some("jina"));
        assert_eq!(config.fetch.scrape_api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn unknown_rotation_is_ignored() {
        let mut config = FusionConfig::default();
        config.apply_env(env(&[("LOG_ROTATION", "fortnightly")]));
        assert_eq!(config.logging.rotation, LogRotation::Daily);
        assert_eq!(LogRotation::parse("Hourly"), Some(LogRotation::Hourly));
    }

    #[test]
    fn validate_rejects_nested_and_server_fields() {
        let mut config = FusionConfig::default();
        config.gate.max_concurrent = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_concurrent"));

        let mut config = FusionConfig::default();
        config.server.fetch_timeout_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("fetch_timeout_secs"));

        let mut config = FusionConfig::default();
        config.server.max_concurrent_fetches = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_concurrent_fetches"));
    }

    #[test]
    fn path_from_args_prefers_cli() {
        let path = FusionConfig::path_from_args(vec!["cli.toml".to_owned()].into_iter());
        assert_eq!(path, Some(PathBuf::from("cli.toml")));
    }
}
