//! Configuration file parser for `pagefeed.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which carries a single built-in target. Unknown keys are ignored by serde
//! but logged as a warning so typos do not go unnoticed.
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::feed::Channel;
use crate::util::validate_url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Config parsed but describes something that cannot run.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration: one shared fetch policy and a list of targets.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP behaviour shared by every target.
    pub fetch: FetchConfig,

    /// Pages to turn into feeds, processed in order.
    #[serde(rename = "target")]
    pub targets: Vec<Target>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            targets: vec![Target::default()],
        }
    }
}

/// Request headers and retry policy for page fetches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total attempts per fetch, including the first one.
    pub max_attempts: u32,

    /// Upper bound on a single attempt (connect, send and body read).
    pub timeout_secs: u64,

    /// Backoff base after a connection error; doubles on every retry.
    pub connect_backoff_ms: u64,

    /// Backoff base after a timed-out attempt; doubles on every retry.
    pub timeout_backoff_ms: u64,

    /// Pages larger than this are rejected rather than parsed.
    pub max_page_bytes: usize,

    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,

    /// Extra request headers, sent verbatim.
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            timeout_secs: 30,
            connect_backoff_ms: 5_000,
            timeout_backoff_ms: 3_000,
            max_page_bytes: 10 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: "en-IN,en;q=0.9".to_string(),
            headers: BTreeMap::new(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }

    pub fn timeout_backoff(&self) -> Duration {
        Duration::from_millis(self.timeout_backoff_ms)
    }
}

/// One scraped page and the feed generated from it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Target {
    /// Short identifier used on the command line and in logs.
    pub name: String,

    /// Page to fetch. Also the channel `<link>`.
    pub url: String,

    /// Base that relative hrefs are resolved against. Defaults to `url`,
    /// also for targets read from a file (only the built-in target sets it).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Where the feed file is written.
    pub output: PathBuf,

    pub title: String,
    pub description: String,
    pub language: String,

    /// `id` of the element that bounds extraction. Falls back to the whole
    /// document when the page has no such element.
    pub content_id: String,

    /// Case-insensitive substrings that mark a link as interesting.
    pub keywords: Vec<String>,

    /// Case-insensitive title prefixes that mark a link as interesting.
    pub title_prefixes: Vec<String>,

    /// Titles longer than this many characters are kept regardless of href.
    pub min_title_len: usize,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            name: "cdsco-sec".to_string(),
            url: "https://cdsco.gov.in/opencms/opencms/en/Committees/SEC/".to_string(),
            base_url: Some("https://cdsco.gov.in".to_string()),
            output: PathBuf::from("sec-rss.xml"),
            title: "CDSCO - SEC (auto)".to_string(),
            description: "Automated RSS for CDSCO SEC page (generated).".to_string(),
            language: "en-IN".to_string(),
            content_id: "content".to_string(),
            keywords: [
                "/resources/",
                "uploadcommitteefiles",
                "recommendations",
                "uploadcdscoweb",
                "pdf",
                "committeefiles",
                "newsdetails",
                "minutes",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            title_prefixes: vec!["minutes".to_string()],
            min_title_len: 6,
        }
    }
}

impl Target {
    /// Channel metadata written at the top of this target's feed.
    pub fn channel(&self) -> Channel {
        Channel {
            title: self.title.clone(),
            link: self.url.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
        }
    }

    /// The URL relative hrefs on the page are joined onto.
    pub fn resolve_base(&self) -> Result<Url, ConfigError> {
        let raw = self.base_url.as_deref().unwrap_or(&self.url);
        validate_url(raw).map_err(|e| {
            ConfigError::Invalid(format!("target '{}': base URL '{}': {}", self.name, raw, e))
        })
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 2] = ["fetch", "target"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    ///
    /// The result is not validated; call [`Config::validate`] before use.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid slurping something enormous
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text. Empty text yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(targets = config.targets.len(), "Loaded configuration");
        Ok(config)
    }

    /// Checks everything that would otherwise fail halfway through a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::Invalid("no targets configured".to_string()));
        }

        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "fetch.max_attempts must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        let mut outputs = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                return Err(ConfigError::Invalid("target with empty name".to_string()));
            }
            if !names.insert(target.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate target name '{}'",
                    target.name
                )));
            }
            validate_url(&target.url).map_err(|e| {
                ConfigError::Invalid(format!(
                    "target '{}': url '{}': {}",
                    target.name, target.url, e
                ))
            })?;
            target.resolve_base()?;
            if target.output.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "target '{}': output path is empty",
                    target.name
                )));
            }
            // Unset `output` falls back to the built-in default for every target
            if !outputs.insert(target.output.as_path()) {
                return Err(ConfigError::Invalid(format!(
                    "target '{}': output '{}' is already written by another target",
                    target.name,
                    target.output.display()
                )));
            }
        }

        for (name, value) in &self.fetch.headers {
            reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::Invalid(format!("invalid header name '{}'", name)))?;
            reqwest::header::HeaderValue::from_str(value).map_err(|_| {
                ConfigError::Invalid(format!("invalid value for header '{}'", name))
            })?;
        }

        Ok(())
    }

    /// Looks up a target by name.
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// The targets a run should process: the named one, or all of them.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&Target>, ConfigError> {
        match name {
            None => Ok(self.targets.iter().collect()),
            Some(name) => self.target(name).map(|t| vec![t]).ok_or_else(|| {
                let known: Vec<&str> = self.targets.iter().map(|t| t.name.as_str()).collect();
                ConfigError::Invalid(format!(
                    "unknown target '{}' (configured: {})",
                    name,
                    known.join(", ")
                ))
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
