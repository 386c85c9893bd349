//! Screenshot provider: captures a public web page as a PNG data URL with a
//! headless Chromium subprocess. The SSRF guard runs before anything else.

use crate::config::ScreenshotConfig;
use crate::error::ScreenshotError;
use crate::security::validate_public_url;
use base64::Engine as _;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub trait ScreenshotProvider: Send + Sync {
    /// Capture `url` and return a `data:image/png;base64,...` URL.
    fn capture<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ScreenshotError>> + Send + 'a>>;
}

pub struct ChromiumScreenshotter {
    binary: String,
    width: u32,
    height: u32,
    timeout: Duration,
    scratch_dir: PathBuf,
}

impl ChromiumScreenshotter {
    pub fn new(config: &ScreenshotConfig) -> Self {
        Self {
            binary: config.chrome_binary.clone(),
            width: config.width,
            height: config.height,
            timeout: Duration::from_secs(config.timeout_secs),
            scratch_dir: std::env::temp_dir(),
        }
    }

    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    async fn run_browser(&self, url: &str, output: &Path) -> Result<(), ScreenshotError> {
        let child = Command::new(&self.binary)
            .args([
                "--headless=new",
                "--disable-gpu",
                "--hide-scrollbars",
                "--mute-audio",
                "--no-first-run",
                "--no-default-browser-check",
                &format!("--window-size={},{}", self.width, self.height),
                &format!("--screenshot={}", output.display()),
                url,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ScreenshotError::Capture(format!("failed to start {}: {e}", self.binary))
            })?;

        let output_result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ScreenshotError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| ScreenshotError::Capture(e.to_string()))?;

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            return Err(ScreenshotError::Capture(crate::util::truncate_with_ellipsis(
                stderr.trim(),
                200,
            )));
        }
        Ok(())
    }
}

impl ScreenshotProvider for ChromiumScreenshotter {
    fn capture<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ScreenshotError>> + Send + 'a>> {
        Box::pin(async move {
            let parsed = validate_public_url(url).await?;

            let output = self
                .scratch_dir
                .join(format!("shot-{}.png", crate::util::random_id(12)));
            let result = self.run_browser(parsed.as_str(), &output).await;
            let bytes = match result {
                Ok(()) => tokio::fs::read(&output)
                    .await
                    .map_err(|e| ScreenshotError::Capture(format!("no screenshot written: {e}"))),
                Err(e) => Err(e),
            };
            let _ = tokio::fs::remove_file(&output).await;
            let bytes = bytes?;

            tracing::info!(
                host = parsed.host_str().unwrap_or_default(),
                size = bytes.len(),
                "screenshot captured"
            );
            Ok(format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ))
        })
    }
}
