//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--no-watcher`)
//! 2. `$ADT_CONFIG` environment variable (path to config file)
//! 3. Project-local `.adoc-tree.toml` in the current working directory
//! 4. Global `~/.config/adoc-tree/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::store::StoreSettings;

// ── Section configs ──────────────────────────────────────────────────────────

/// Editor and file-switching settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EditorConfig {
    /// Run the periodic auto-save. Test setups turn this off.
    pub autosave: Option<bool>,
    /// Auto-save period in milliseconds.
    pub autosave_interval_ms: Option<u64>,
    /// Debounce for keyboard-driven selection, in milliseconds.
    pub select_delay_ms: Option<u64>,
    /// Bytes scanned for a NUL before opening a file.
    pub binary_sniff_bytes: Option<usize>,
}

/// Search overlay settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size used when the result list cannot be measured.
    pub page_size_fallback: Option<usize>,
}

/// Session restoration settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Reopen the last root and file on startup.
    pub restore: Option<bool>,
    /// Where the session JSON lives.
    pub state_file: Option<PathBuf>,
}

/// Filesystem watcher settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatcherConfig {
    /// Enable filesystem watcher for auto-refresh.
    pub enabled: Option<bool>,
    /// Debounce interval in milliseconds.
    pub debounce_ms: Option<u64>,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for rolling log files.
    pub dir: Option<PathBuf>,
    /// Default filter directive when `ADT_LOG` is unset.
    pub level: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub editor: EditorConfig,
    pub search: SearchConfig,
    pub session: SessionConfig,
    pub watcher: WatcherConfig,
    pub log: LogConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

/// Default auto-save period (5 s).
pub const DEFAULT_AUTOSAVE_INTERVAL_MS: u64 = 5_000;
/// Default keyboard selection debounce.
pub const DEFAULT_SELECT_DELAY_MS: u64 = 750;
/// Default binary sniff window (1 KiB).
pub const DEFAULT_BINARY_SNIFF_BYTES: usize = 1024;
/// Default search page size fallback.
pub const DEFAULT_PAGE_SIZE_FALLBACK: usize = 10;
/// Default watcher debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

const APP_DIR: &str = "adoc-tree";

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path; `load` adds that one.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("ADT_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".adoc-tree.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_DIR).join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning logged).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse config file");
            None
        }
    }
}

impl AppConfig {
    /// Merge `other` on top of `self`. `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            editor: EditorConfig {
                autosave: other.editor.autosave.or(self.editor.autosave),
                autosave_interval_ms: other
                    .editor
                    .autosave_interval_ms
                    .or(self.editor.autosave_interval_ms),
                select_delay_ms: other.editor.select_delay_ms.or(self.editor.select_delay_ms),
                binary_sniff_bytes: other
                    .editor
                    .binary_sniff_bytes
                    .or(self.editor.binary_sniff_bytes),
            },
            search: SearchConfig {
                page_size_fallback: other
                    .search
                    .page_size_fallback
                    .or(self.search.page_size_fallback),
            },
            session: SessionConfig {
                restore: other.session.restore.or(self.session.restore),
                state_file: other
                    .session
                    .state_file
                    .clone()
                    .or(self.session.state_file),
            },
            watcher: WatcherConfig {
                enabled: other.watcher.enabled.or(self.watcher.enabled),
                debounce_ms: other.watcher.debounce_ms.or(self.watcher.debounce_ms),
            },
            log: LogConfig {
                dir: other.log.dir.clone().or(self.log.dir),
                level: other.log.level.clone().or(self.log.level),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn autosave_enabled(&self) -> bool {
        self.editor.autosave.unwrap_or(true)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(
            self.editor
                .autosave_interval_ms
                .unwrap_or(DEFAULT_AUTOSAVE_INTERVAL_MS),
        )
    }

    pub fn select_delay(&self) -> Duration {
        Duration::from_millis(self.editor.select_delay_ms.unwrap_or(DEFAULT_SELECT_DELAY_MS))
    }

    pub fn binary_sniff_bytes(&self) -> usize {
        self.editor
            .binary_sniff_bytes
            .unwrap_or(DEFAULT_BINARY_SNIFF_BYTES)
    }

    pub fn page_size_fallback(&self) -> usize {
        self.search
            .page_size_fallback
            .unwrap_or(DEFAULT_PAGE_SIZE_FALLBACK)
    }

    pub fn restore_session(&self) -> bool {
        self.session.restore.unwrap_or(true)
    }

    /// Session file, defaulting to the platform data directory.
    pub fn state_file(&self) -> Option<PathBuf> {
        self.session
            .state_file
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR).join("session.json")))
    }

    pub fn watcher_enabled(&self) -> bool {
        self.watcher.enabled.unwrap_or(true)
    }

    pub fn debounce_ms(&self) -> u64 {
        self.watcher.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)
    }

    /// Log directory, defaulting to the platform data directory.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log
            .dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR).join("logs")))
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or("info")
    }

    /// Timing and sizing knobs for the tree store.
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            autosave_enabled: self.autosave_enabled(),
            autosave_interval: self.autosave_interval(),
            select_delay: self.select_delay(),
            binary_sniff_bytes: self.binary_sniff_bytes(),
            page_size_fallback: self.page_size_fallback(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let cfg = AppConfig::default();
        assert!(cfg.autosave_enabled());
        assert_eq!(cfg.autosave_interval(), Duration::from_secs(5));
        assert_eq!(cfg.select_delay(), Duration::from_millis(750));
        assert_eq!(cfg.binary_sniff_bytes(), 1024);
        assert_eq!(cfg.page_size_fallback(), 10);
        assert!(cfg.restore_session());
        assert!(cfg.watcher_enabled());
        assert_eq!(cfg.debounce_ms(), 300);
        assert_eq!(cfg.log_level(), "info");
    }

    #[test]
    fn test_toml_parsing_full() {
        let toml = r#"
[editor]
autosave = false
autosave_interval_ms = 1000
select_delay_ms = 200
binary_sniff_bytes = 512

[search]
page_size_fallback = 20

[session]
restore = false
state_file = "/tmp/adt-session.json"

[watcher]
enabled = false
debounce_ms = 500

[log]
dir = "/tmp/adt-logs"
level = "debug"
"#;
        let cfg: AppConfig = toml::from_str(toml).unwrap();
        assert!(!cfg.autosave_enabled());
        assert_eq!(cfg.autosave_interval(), Duration::from_secs(1));
        assert_eq!(cfg.select_delay(), Duration::from_millis(200));
        assert_eq!(cfg.binary_sniff_bytes(), 512);
        assert_eq!(cfg.page_size_fallback(), 20);
        assert!(!cfg.restore_session());
        assert_eq!(cfg.state_file(), Some(PathBuf::from("/tmp/adt-session.json")));
        assert!(!cfg.watcher_enabled());
        assert_eq!(cfg.debounce_ms(), 500);
        assert_eq!(cfg.log_dir(), Some(PathBuf::from("/tmp/adt-logs")));
        assert_eq!(cfg.log_level(), "debug");
    }

    #[test]
    fn test_toml_parsing_partial() {
        let cfg: AppConfig = toml::from_str("[editor]\nselect_delay_ms = 100\n").unwrap();
        assert_eq!(cfg.select_delay(), Duration::from_millis(100));
        assert_eq!(cfg.autosave_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_merge_override_wins() {
        let base: AppConfig = toml::from_str("[watcher]\nenabled = true\ndebounce_ms = 100\n").unwrap();
        let over: AppConfig = toml::from_str("[watcher]\nenabled = false\n").unwrap();
        let merged = base.merge(&over);
        assert!(!merged.watcher_enabled());
        assert_eq!(merged.debounce_ms(), 100);
    }

    #[test]
    fn test_load_explicit_file_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[editor]\nautosave_interval_ms = 2000\nselect_delay_ms = 10").unwrap();

        let overrides: AppConfig = toml::from_str("[editor]\nselect_delay_ms = 20\n").unwrap();
        let cfg = AppConfig::load(Some(file.path()), Some(&overrides));
        assert_eq!(cfg.autosave_interval(), Duration::from_secs(2));
        assert_eq!(cfg.select_delay(), Duration::from_millis(20));
    }

    #[test]
    fn test_invalid_file_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not = = toml").unwrap();
        assert!(load_file(file.path()).is_none());
    }

    #[test]
    fn test_store_settings_mirror_getters() {
        let cfg: AppConfig = toml::from_str("[editor]\nautosave = false\n").unwrap();
        let settings = cfg.store_settings();
        assert!(!settings.autosave_enabled);
        assert_eq!(settings.select_delay, Duration::from_millis(750));
        assert_eq!(settings.binary_sniff_bytes, 1024);
    }
}
