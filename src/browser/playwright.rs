//! Playwright integration: the inline capture script, error mapping, and
//! availability checks for Node.js and Playwright.

use crate::error::{GatewayError, Result};
use serde::Deserialize;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Full-page capture. Arguments after `-e SCRIPT`: url, width, height,
/// navigation timeout (ms), network-idle timeout (ms), output path, headless.
pub(crate) const CAPTURE_SCRIPT: &str = r#"
const [, url, width, height, navTimeout, idleTimeout, screenshotPath, headlessFlag] = process.argv;

async function run() {
  let browser;
  try {
    const { chromium } = require('playwright');
    browser = await chromium.launch({ headless: headlessFlag !== '0' });
    const context = await browser.newContext({
      viewport: {
        width: parseInt(width, 10),
        height: parseInt(height, 10)
      }
    });
    const page = await context.newPage();
    const navMs = parseInt(navTimeout, 10);
    const idleMs = parseInt(idleTimeout, 10);

    await page.goto(url, { waitUntil: 'networkidle', timeout: navMs });
    await page.waitForLoadState('networkidle', { timeout: idleMs });
    await page.screenshot({ path: screenshotPath, fullPage: true });

    console.log(JSON.stringify({ status: 'ok' }));
  } catch (err) {
    const message = err && err.message ? err.message : String(err);
    console.error(JSON.stringify({ status: 'error', message }));
    process.exitCode = 1;
  } finally {
    if (browser) {
      await browser.close();
    }
  }
}

run();
"#;

pub(crate) const NODE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const PLAYWRIGHT_CHECK_SCRIPT: &str = "require('playwright'); process.stdout.write('ok');";

const MISSING_PLAYWRIGHT: &str =
    "Playwright npm package is missing; install with `npm install playwright`.";

#[derive(Debug, Deserialize)]
pub(crate) struct ScriptResult {
    pub status: String,
    pub message: Option<String>,
}

pub(crate) fn map_spawn_error(err: io::Error, command: &str) -> GatewayError {
    if err.kind() == io::ErrorKind::NotFound {
        GatewayError::render(format!(
            "Unable to spawn Playwright helper; '{command}' was not found on PATH"
        ))
    } else {
        GatewayError::Io(err)
    }
}

/// Classify a failed script run from its stderr (JSON error line or raw
/// Node output).
pub(crate) fn map_playwright_error(status_text: &str, stderr: &str) -> GatewayError {
    if let Ok(result) = serde_json::from_str::<ScriptResult>(stderr.trim()) {
        let message = result.message.unwrap_or_default();
        return map_script_message(&result.status, &message);
    }

    let lower = stderr.to_ascii_lowercase();
    if lower.contains("cannot find module 'playwright'") {
        return GatewayError::render(MISSING_PLAYWRIGHT);
    }
    if lower.contains("timeout") {
        return GatewayError::render(
            "Playwright timed out; increase --nav-timeout/--network-idle-timeout or --process-timeout.",
        );
    }

    GatewayError::render(format!(
        "Playwright exited with status {status_text}: {}",
        stderr.trim()
    ))
}

fn map_script_message(status: &str, message: &str) -> GatewayError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("cannot find module 'playwright'") {
        GatewayError::render(MISSING_PLAYWRIGHT)
    } else if lower.contains("timeout") {
        GatewayError::render(format!(
            "Playwright error (status {status}): {message}. Hint: increase --nav-timeout/--network-idle-timeout."
        ))
    } else {
        GatewayError::render(format!("Playwright error (status {status}): {message}"))
    }
}

pub(crate) async fn ensure_node_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let status = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.status())
        .await
        .map_err(|_| {
            GatewayError::render(format!(
                "Timed out checking node availability after {NODE_CHECK_TIMEOUT:?}"
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !status.success() {
        return Err(GatewayError::render(format!(
            "Node command {node_command:?} is not available (exit {status})"
        )));
    }
    Ok(())
}

pub(crate) async fn ensure_playwright_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("-e")
        .arg(PLAYWRIGHT_CHECK_SCRIPT)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.output())
        .await
        .map_err(|_| {
            GatewayError::render(format!(
                "Timed out checking Playwright availability after {NODE_CHECK_TIMEOUT:?}"
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(map_playwright_error(&output.status.to_string(), &stderr));
    }
    Ok(())
}
