//! Review configuration: file defaults overlaid by environment variables.
//!
//! The config object is built once at startup and handed to the components that
//! need it; nothing here is process-global.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ReviewError};

/// Default capacity of each result-cache level.
pub const DEFAULT_CACHE_CAPACITY: usize = 200;

/// A named keyword list used for row highlighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordListConfig {
    pub name: String,
    pub words: Vec<String>,
    #[serde(default)]
    pub whole_word: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Entries per cache level before the oldest is evicted.
    pub cache_capacity: usize,
    /// Settle time after a search-text edit.
    pub text_debounce_ms: u64,
    /// Settle time after a date edit (longer than text).
    pub date_debounce_ms: u64,
    /// How long a superseded resolve may keep running before it is detached.
    pub worker_grace_ms: u64,
    /// Master switch for log output.
    pub logging: bool,
    /// Color rows by which participant sent them.
    pub sender_colors: bool,
    pub keyword_lists: Vec<KeywordListConfig>,
    pub active_keyword_list: Option<String>,
    /// Theme color overrides, `name = "#rrggbb"`.
    pub colors: BTreeMap<String, String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            text_debounce_ms: 300,
            date_debounce_ms: 600,
            worker_grace_ms: 500,
            logging: true,
            sender_colors: false,
            keyword_lists: Vec::new(),
            active_keyword_list: None,
            colors: BTreeMap::new(),
        }
    }
}

impl ReviewConfig {
    /// Load from `path` if it exists (defaults otherwise), then apply env overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw, path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ReviewError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    fn from_toml(raw: &str, path: &Path) -> Result<Self> {
        toml::from_str(raw).map_err(|source| ReviewError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `CHATFX_*` environment variables. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(val) = dotenvy::var("CHATFX_CACHE_CAPACITY")
            && let Ok(n) = val.parse::<usize>()
            && n > 0
        {
            self.cache_capacity = n;
        }

        if let Ok(val) = dotenvy::var("CHATFX_TEXT_DEBOUNCE_MS")
            && let Ok(ms) = val.parse()
        {
            self.text_debounce_ms = ms;
        }

        if let Ok(val) = dotenvy::var("CHATFX_DATE_DEBOUNCE_MS")
            && let Ok(ms) = val.parse()
        {
            self.date_debounce_ms = ms;
        }

        if let Ok(val) = dotenvy::var("CHATFX_WORKER_GRACE_MS")
            && let Ok(ms) = val.parse()
        {
            self.worker_grace_ms = ms;
        }

        if let Ok(val) = dotenvy::var("CHATFX_LOGGING")
            && let Some(flag) = parse_flag(&val)
        {
            self.logging = flag;
        }

        if let Ok(val) = dotenvy::var("CHATFX_SENDER_COLORS")
            && let Some(flag) = parse_flag(&val)
        {
            self.sender_colors = flag;
        }
    }

    pub fn text_debounce(&self) -> Duration {
        Duration::from_millis(self.text_debounce_ms)
    }

    pub fn date_debounce(&self) -> Duration {
        Duration::from_millis(self.date_debounce_ms)
    }

    pub fn worker_grace(&self) -> Duration {
        Duration::from_millis(self.worker_grace_ms)
    }

    pub fn keyword_list(&self, name: &str) -> Option<&KeywordListConfig> {
        self.keyword_lists.iter().find(|l| l.name == name)
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "chat-forensics", "chat-forensics")
}

/// Platform config file location (`config.toml`).
pub fn default_config_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Platform data directory (annotation DB, logs).
pub fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(".chat-forensics"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    struct EnvGuard(&'static str);

    impl EnvGuard {
        fn set(key: &'static str, val: &str) -> Self {
            unsafe { std::env::set_var(key, val) };
            Self(key)
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            unsafe { std::env::remove_var(self.0) };
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ReviewConfig::default();
        assert_eq!(cfg.cache_capacity, 200);
        assert!(cfg.date_debounce() > cfg.text_debounce());
        assert!(cfg.logging);
        assert!(!cfg.sender_colors);
    }

    #[test]
    #[serial]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = ReviewConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, ReviewConfig::default());
    }

    #[test]
    #[serial]
    fn file_values_and_keyword_lists_are_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r##"
cache_capacity = 16
sender_colors = true
active_keyword_list = "drugs"

[[keyword_lists]]
name = "drugs"
words = ["pill", "gram"]
whole_word = true

[colors]
"tag.csam" = "#ff0000"
"##,
        )
        .unwrap();

        let cfg = ReviewConfig::load(&path).unwrap();
        assert_eq!(cfg.cache_capacity, 16);
        assert!(cfg.sender_colors);
        let list = cfg.keyword_list("drugs").unwrap();
        assert_eq!(list.words, vec!["pill", "gram"]);
        assert!(list.whole_word);
        assert_eq!(cfg.colors.get("tag.csam").map(String::as_str), Some("#ff0000"));
        // Unspecified fields keep defaults.
        assert_eq!(cfg.text_debounce_ms, 300);
    }

    #[test]
    #[serial]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "cache_capacity = \"lots\"").unwrap();
        let err = ReviewConfig::load(&path).unwrap_err();
        assert!(matches!(err, ReviewError::Config { .. }));
    }

    #[test]
    #[serial]
    fn env_overrides_file() {
        let _cap = EnvGuard::set("CHATFX_CACHE_CAPACITY", "5");
        let _log = EnvGuard::set("CHATFX_LOGGING", "off");
        let _bad = EnvGuard::set("CHATFX_TEXT_DEBOUNCE_MS", "soon");

        let mut cfg = ReviewConfig::default();
        cfg.apply_env();
        assert_eq!(cfg.cache_capacity, 5);
        assert!(!cfg.logging);
        assert_eq!(cfg.text_debounce_ms, 300);
    }
}
