//! Configuration file management for surveyor.
//!
//! Provides a TOML-based config file at `~/.config/surveyor/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.
//!
//! Secrets (planner and search API keys) are read from the environment only
//! and never written to the config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use surveyor_core::plan::DEFAULT_GENERATOR_TIMEOUT;
use surveyor_core::providers::{KeyRotator, openrouter, serper};
use surveyor_core::stage::{FanOutLimits, MissionLimits};

/// Default browser executable for screenshots.
pub const DEFAULT_BROWSER: &str = "chromium";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub storage: StorageSection,
    pub planner: PlannerSection,
    pub search: SearchSection,
    pub capture: CaptureSection,
    pub limits: LimitsSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory holding one subdirectory of snapshots per mission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSection {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            model: openrouter::DEFAULT_MODEL.to_string(),
            base_url: openrouter::DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_GENERATOR_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub base_url: String,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            base_url: serper::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub browser: String,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            browser: DEFAULT_BROWSER.to_string(),
        }
    }
}

/// Per-category fan-out ceilings and per-item timeouts.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub search_concurrency: usize,
    pub search_timeout_secs: u64,
    pub extraction_concurrency: usize,
    pub extraction_timeout_secs: u64,
    pub capture_concurrency: usize,
    pub capture_timeout_secs: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        let d = MissionLimits::default();
        Self {
            search_concurrency: d.search.concurrency,
            search_timeout_secs: d.search.timeout.as_secs(),
            extraction_concurrency: d.extraction.concurrency,
            extraction_timeout_secs: d.extraction.timeout.as_secs(),
            capture_concurrency: d.capture.concurrency,
            capture_timeout_secs: d.capture.timeout.as_secs(),
        }
    }
}

impl From<&LimitsSection> for MissionLimits {
    fn from(s: &LimitsSection) -> Self {
        let limits = |concurrency: usize, secs: u64| {
            FanOutLimits::new(concurrency.max(1), Duration::from_secs(secs.max(1)))
        };
        Self {
            search: limits(s.search_concurrency, s.search_timeout_secs),
            extraction: limits(s.extraction_concurrency, s.extraction_timeout_secs),
            capture: limits(s.capture_concurrency, s.capture_timeout_secs),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the surveyor config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/surveyor` or
/// `~/.config/surveyor`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("surveyor");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("surveyor")
}

/// Return the path to the surveyor config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default snapshot directory: `$XDG_DATA_HOME/surveyor/sessions` or
/// `~/.local/share/surveyor/sessions`.
pub fn default_sessions_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("surveyor").join("sessions");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("surveyor")
        .join("sessions")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(config, &config_path())
}

pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct SurveyorConfig {
    pub sessions_dir: PathBuf,
    pub planner: openrouter::OpenRouterConfig,
    pub generator_timeout: Duration,
    pub search_base_url: String,
    pub browser: String,
    pub limits: MissionLimits,
}

impl SurveyorConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config
    /// file > default.
    ///
    /// - Sessions dir: `cli_sessions_dir` > `SURVEYOR_SESSIONS_DIR` >
    ///   `storage.sessions_dir` > [`default_sessions_dir`]
    /// - Planner model: `SURVEYOR_PLANNER_MODEL` > `planner.model` > default
    /// - Planner key: `OPENROUTER_API_KEY` (absent disables the planner)
    /// - Browser: `SURVEYOR_BROWSER` > `capture.browser` > `chromium`
    pub fn resolve(cli_sessions_dir: Option<&Path>) -> Result<Self> {
        let file = match load_config() {
            Ok(file) => file,
            Err(e) if config_path().exists() => return Err(e),
            Err(_) => ConfigFile::default(),
        };
        Ok(Self::from_file(file, cli_sessions_dir))
    }

    fn from_file(file: ConfigFile, cli_sessions_dir: Option<&Path>) -> Self {
        let sessions_dir = if let Some(dir) = cli_sessions_dir {
            dir.to_path_buf()
        } else if let Some(dir) = non_empty_env("SURVEYOR_SESSIONS_DIR") {
            PathBuf::from(dir)
        } else if let Some(dir) = file.storage.sessions_dir {
            dir
        } else {
            default_sessions_dir()
        };

        let generator_timeout = Duration::from_secs(file.planner.timeout_secs.max(1));
        let planner = openrouter::OpenRouterConfig {
            api_key: non_empty_env("OPENROUTER_API_KEY"),
            base_url: file.planner.base_url,
            model: non_empty_env("SURVEYOR_PLANNER_MODEL").unwrap_or(file.planner.model),
            timeout: generator_timeout,
        };

        let browser = non_empty_env("SURVEYOR_BROWSER").unwrap_or(file.capture.browser);

        Self {
            sessions_dir,
            planner,
            generator_timeout,
            search_base_url: file.search.base_url,
            browser,
            limits: MissionLimits::from(&file.limits),
        }
    }

    /// Search API keys from `SERPER_API_KEY`, `SERPER_API_KEY_1`, ...
    pub fn search_keys(&self) -> KeyRotator {
        KeyRotator::from_env("SERPER_API_KEY")
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("surveyor").join("config.toml");

        let mut original = ConfigFile::default();
        original.storage.sessions_dir = Some(PathBuf::from("/data/sessions"));
        original.limits.capture_concurrency = 2;
        save_config_to(&original, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.storage.sessions_dir, original.storage.sessions_dir);
        assert_eq!(loaded.limits.capture_concurrency, 2);
        assert_eq!(loaded.planner.model, openrouter::DEFAULT_MODEL);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let file: ConfigFile = toml::from_str("[capture]\nbrowser = \"google-chrome\"\n").unwrap();
        assert_eq!(file.capture.browser, "google-chrome");
        assert_eq!(file.search.base_url, serper::DEFAULT_BASE_URL);
        assert_eq!(file.limits.extraction_concurrency, 10);
    }

    #[test]
    fn zero_limits_are_clamped() {
        let section = LimitsSection {
            search_concurrency: 0,
            search_timeout_secs: 0,
            ..LimitsSection::default()
        };
        let limits = MissionLimits::from(&section);
        assert_eq!(limits.search.concurrency, 1);
        assert_eq!(limits.search.timeout, Duration::from_secs(1));
    }

    #[test]
    fn cli_flag_overrides_env_and_file() {
        let _lock = lock_env();
        unsafe { std::env::set_var("SURVEYOR_SESSIONS_DIR", "/env/sessions") };

        let mut file = ConfigFile::default();
        file.storage.sessions_dir = Some(PathBuf::from("/file/sessions"));
        let config = SurveyorConfig::from_file(file, Some(Path::new("/cli/sessions")));
        assert_eq!(config.sessions_dir, PathBuf::from("/cli/sessions"));

        unsafe { std::env::remove_var("SURVEYOR_SESSIONS_DIR") };
    }

    #[test]
    fn env_var_overrides_config_file() {
        let _lock = lock_env();
        unsafe { std::env::set_var("SURVEYOR_SESSIONS_DIR", "/env/sessions") };
        unsafe { std::env::set_var("SURVEYOR_BROWSER", "google-chrome") };

        let mut file = ConfigFile::default();
        file.storage.sessions_dir = Some(PathBuf::from("/file/sessions"));
        let config = SurveyorConfig::from_file(file, None);
        assert_eq!(config.sessions_dir, PathBuf::from("/env/sessions"));
        assert_eq!(config.browser, "google-chrome");

        unsafe { std::env::remove_var("SURVEYOR_SESSIONS_DIR") };
        unsafe { std::env::remove_var("SURVEYOR_BROWSER") };
    }

    #[test]
    fn file_value_used_when_env_unset() {
        let _lock = lock_env();
        unsafe { std::env::remove_var("SURVEYOR_SESSIONS_DIR") };
        unsafe { std::env::remove_var("SURVEYOR_PLANNER_MODEL") };

        let mut file = ConfigFile::default();
        file.storage.sessions_dir = Some(PathBuf::from("/file/sessions"));
        file.planner.model = "some/other-model".to_string();
        let config = SurveyorConfig::from_file(file, None);
        assert_eq!(config.sessions_dir, PathBuf::from("/file/sessions"));
        assert_eq!(config.planner.model, "some/other-model");
    }

    #[test]
    fn planner_key_comes_from_env_only() {
        let _lock = lock_env();
        unsafe { std::env::remove_var("OPENROUTER_API_KEY") };
        let config = SurveyorConfig::from_file(ConfigFile::default(), None);
        assert!(config.planner.api_key.is_none());

        unsafe { std::env::set_var("OPENROUTER_API_KEY", "sk-test") };
        let config = SurveyorConfig::from_file(ConfigFile::default(), None);
        assert_eq!(config.planner.api_key.as_deref(), Some("sk-test"));
        unsafe { std::env::remove_var("OPENROUTER_API_KEY") };
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("surveyor/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
