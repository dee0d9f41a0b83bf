//! Screenshot capture by driving a headless Chromium binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use super::{CaptureResult, VisualCapturer};
use crate::state::MissionId;

/// Longest file stem derived from a URL.
const MAX_STEM_LEN: usize = 50;

/// Settings for [`BrowserCapturer`].
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Browser executable (e.g. `chromium`, `google-chrome`).
    pub binary: String,
    /// Root directory; screenshots land in `<root>/<mission>/screenshots/`.
    pub output_root: PathBuf,
    pub window_size: (u32, u32),
}

/// [`VisualCapturer`] that shells out to a headless browser.
///
/// Process-level failures (missing binary, non-zero exit) are reported as an
/// unsuccessful [`CaptureResult`] rather than an error, so the caller can
/// record what went wrong per URL.
#[derive(Debug, Clone)]
pub struct BrowserCapturer {
    config: BrowserConfig,
}

impl BrowserCapturer {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn screenshot_dir(&self, mission_id: &MissionId) -> PathBuf {
        self.config
            .output_root
            .join(mission_id.as_str())
            .join("screenshots")
    }
}

#[async_trait]
impl VisualCapturer for BrowserCapturer {
    async fn capture(&self, url: &str, mission_id: &MissionId) -> Result<CaptureResult> {
        let dir = self.screenshot_dir(mission_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let path = dir.join(format!("{}.png", file_stem_for(url)));
        let (w, h) = self.config.window_size;

        tracing::debug!(url, path = %path.display(), "capturing screenshot");

        let output = Command::new(&self.config.binary)
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--hide-scrollbars")
            .arg(format!("--window-size={w},{h}"))
            .arg(format!("--screenshot={}", path.display()))
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let result = match output {
            Ok(out) if out.status.success() && path_exists(&path).await => CaptureResult {
                success: true,
                url: url.to_string(),
                filepath: Some(path.display().to_string()),
                error: None,
            },
            Ok(out) => CaptureResult {
                success: false,
                url: url.to_string(),
                filepath: None,
                error: Some(format!(
                    "browser exited with {}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                )),
            },
            Err(e) => CaptureResult {
                success: false,
                url: url.to_string(),
                filepath: None,
                error: Some(format!("failed to launch {}: {e}", self.config.binary)),
            },
        };
        Ok(result)
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Derive a filesystem-safe file stem from a URL.
pub fn file_stem_for(url: &str) -> String {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let stem: String = without_scheme
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .take(MAX_STEM_LEN)
        .collect();
    if stem.is_empty() { "capture".to_string() } else { stem }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_strips_scheme_and_separators() {
        assert_eq!(
            file_stem_for("https://www.example.com/a/b?c=d"),
            "www.example.com_a_b_c_d"
        );
        assert_eq!(file_stem_for(""), "capture");
    }

    #[test]
    fn file_stem_is_truncated() {
        let long = format!("https://{}", "x".repeat(200));
        assert_eq!(file_stem_for(&long).len(), MAX_STEM_LEN);
    }

    #[tokio::test]
    async fn missing_browser_is_an_unsuccessful_capture() {
        let tmp = tempfile::TempDir::new().unwrap();
        let capturer = BrowserCapturer::new(BrowserConfig {
            binary: "definitely-not-a-browser-binary".into(),
            output_root: tmp.path().to_path_buf(),
            window_size: (800, 600),
        });
        let id = MissionId::generate();
        let result = capturer.capture("https://example.com", &id).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("failed to launch"));
        assert!(tmp.path().join(id.as_str()).join("screenshots").is_dir());
    }
}
