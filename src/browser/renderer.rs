//! Page renderer: one isolated Playwright process per capture.

use crate::error::{GatewayError, Result};
use crate::storage::ScreenshotStore;
use crate::types::{ImageRef, Viewport};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::playwright::{
    ensure_node_available, ensure_playwright_available, map_playwright_error, map_spawn_error,
    ScriptResult, CAPTURE_SCRIPT,
};

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(45);

const SCREENSHOT_PREFIX: &str = "screenshot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RenderOptions {
    pub node_command: String,
    pub viewport: Viewport,
    pub headless: bool,
    /// Bound on `goto` reaching network idle.
    #[serde(with = "humantime_serde")]
    pub navigation_timeout: Duration,
    /// Extra network-idle wait after navigation.
    #[serde(with = "humantime_serde")]
    pub network_idle_timeout: Duration,
    /// Bound on the whole helper process; the session is killed past it.
    #[serde(with = "humantime_serde")]
    pub process_timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            viewport: Viewport::default(),
            headless: true,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            network_idle_timeout: DEFAULT_NETWORK_IDLE_TIMEOUT,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
        }
    }
}

/// Renders web pages to full-height PNG captures in a [`ScreenshotStore`].
///
/// Every call launches its own browser process; nothing is reused between
/// captures. The process is owned by a [`RenderSession`] so it is torn down
/// on success, failure, timeout, and when the calling future is dropped.
#[derive(Debug, Clone)]
pub struct PageRenderer {
    options: RenderOptions,
    store: ScreenshotStore,
    sessions: Arc<AtomicUsize>,
}

impl PageRenderer {
    pub fn new(options: RenderOptions, store: ScreenshotStore) -> Self {
        Self {
            options,
            store,
            sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Number of browser processes currently alive for this renderer.
    pub fn active_sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub async fn render_url(&self, url: &str) -> Result<ImageRef> {
        ensure_node_available(&self.options.node_command).await?;
        ensure_playwright_available(&self.options.node_command).await?;

        let target = self.store.allocate(SCREENSHOT_PREFIX)?;
        let result = self.capture_into(url, &target).await;
        if result.is_err() {
            self.store.discard(&target);
        }
        result.map(|()| target)
    }

    async fn capture_into(&self, url: &str, target: &ImageRef) -> Result<()> {
        info!(
            %url,
            viewport = %self.options.viewport,
            nav_timeout = ?self.options.navigation_timeout,
            "launching headless browser"
        );

        let mut cmd = Command::new(&self.options.node_command);
        cmd.arg("-e")
            .arg(CAPTURE_SCRIPT)
            .arg(url)
            .arg(self.options.viewport.width.to_string())
            .arg(self.options.viewport.height.to_string())
            .arg(self.options.navigation_timeout.as_millis().to_string())
            .arg(self.options.network_idle_timeout.as_millis().to_string())
            .arg(&target.path)
            .arg(if self.options.headless { "1" } else { "0" })
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = Instant::now();
        let mut session = RenderSession::spawn(cmd, &self.options.node_command, &self.sessions)?;
        let stdout_pipe = session.child.stdout.take();
        let stderr_pipe = session.child.stderr.take();

        let run = async {
            let (status, stdout, stderr) = tokio::join!(
                session.child.wait(),
                read_pipe(stdout_pipe),
                read_pipe(stderr_pipe)
            );
            status.map(|status| (status, stdout, stderr))
        };

        let (status, stdout, stderr) = match timeout(self.options.process_timeout, run).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(%url, timeout = ?self.options.process_timeout, "render timed out; killing session");
                session.terminate().await;
                return Err(GatewayError::RenderTimeout(self.options.process_timeout));
            }
        };
        drop(session);

        if !status.success() {
            return Err(map_playwright_error(
                &status.to_string(),
                &String::from_utf8_lossy(&stderr),
            ));
        }

        let stdout = String::from_utf8_lossy(&stdout);
        let last_line = stdout.lines().last().unwrap_or_default();
        match serde_json::from_str::<ScriptResult>(last_line) {
            Ok(result) if result.status == "ok" => {}
            Ok(result) => {
                return Err(GatewayError::render(format!(
                    "Playwright returned non-ok status {}: {}",
                    result.status,
                    result.message.as_deref().unwrap_or("no additional details")
                )));
            }
            Err(_) => {
                return Err(GatewayError::render(format!(
                    "Unexpected Playwright output: {}",
                    stdout.trim()
                )));
            }
        }

        if !target.path.is_file() {
            return Err(GatewayError::render(format!(
                "Playwright reported success but no capture was written to {}",
                target.path.display()
            )));
        }

        debug!(%url, elapsed = ?start.elapsed(), path = %target.path.display(), "page captured");
        Ok(())
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// Owns one browser helper process and counts it as active until dropped.
///
/// Dropping the session kills the process if it is still running.
#[derive(Debug)]
pub struct RenderSession {
    child: Child,
    sessions: Arc<AtomicUsize>,
}

impl RenderSession {
    fn spawn(mut cmd: Command, program: &str, sessions: &Arc<AtomicUsize>) -> Result<Self> {
        let child = cmd
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| map_spawn_error(err, program))?;
        sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            child,
            sessions: Arc::clone(sessions),
        })
    }

    /// Kill the process and wait for it to be reaped.
    async fn terminate(&mut self) {
        if let Err(err) = self.child.kill().await {
            debug!(error = %err, "render session already exited");
        }
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.start_kill();
        }
        self.sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn options_parse_humantime_durations() {
        let options: RenderOptions = toml::from_str(
            r#"
            navigation_timeout = "5s"
            process_timeout = "1m 30s"
            viewport = { width = 800, height = 600 }
            "#,
        )
        .expect("parse options");
        assert_eq!(options.navigation_timeout, Duration::from_secs(5));
        assert_eq!(options.process_timeout, Duration::from_secs(90));
        assert_eq!(options.network_idle_timeout, DEFAULT_NETWORK_IDLE_TIMEOUT);
        assert_eq!(options.viewport, Viewport { width: 800, height: 600 });
        assert_eq!(options.node_command, "node");
    }

    #[tokio::test]
    async fn missing_node_binary_fails_without_leaking_sessions() {
        let dir = TempDir::new().expect("tempdir");
        let renderer = PageRenderer::new(
            RenderOptions {
                node_command: "definitely-not-a-binary".into(),
                ..RenderOptions::default()
            },
            ScreenshotStore::new(dir.path(), None),
        );

        let err = renderer
            .render_url("https://example.com")
            .await
            .expect_err("render should fail");
        assert!(err.to_string().contains("not found on PATH"), "got: {err}");
        assert_eq!(renderer.active_sessions(), 0);
    }
}
