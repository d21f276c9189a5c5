#![cfg(unix)]

use async_trait::async_trait;
use parity_gateway::error::Result;
use parity_gateway::{
    ComparisonPipeline, ComparisonRequest, DesignAuth, DesignDocument, DesignFile, DesignNode,
    DesignSource, GatewayError, PageRenderer, PipelineError, PipelineOptions, RenderOptions,
    ScreenshotStore,
};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::Mutex;

// Writing the script while another test forks can make exec fail with ETXTBSY.
static SERIAL: Mutex<()> = Mutex::const_new(());

/// Stands in for `node`: passes the availability checks, then hangs on the
/// capture run.
const HANGING_NODE: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo v20.0.0
  exit 0
fi
if [ "$#" -le 2 ]; then
  exit 0
fi
exec sleep 30
"#;

fn write_fake_node(dir: &Path) -> String {
    let path = dir.join("node");
    std::fs::write(&path, HANGING_NODE).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path.to_string_lossy().into_owned()
}

struct UnreachableDesign;

#[async_trait]
impl DesignSource for UnreachableDesign {
    async fn fetch_document(&self, _file_key: &str, _auth: &DesignAuth) -> Result<DesignFile> {
        // Outlives the render timeout so the page path fails first.
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(GatewayError::Config("unreachable".into()))
    }

    async fn export_node(&self, _: &str, _: &str, _: &DesignAuth) -> Result<String> {
        Err(GatewayError::Config("unreachable".into()))
    }

    async fn fetch_bytes(&self, _: &str, _: &DesignAuth) -> Result<Vec<u8>> {
        Err(GatewayError::Config("unreachable".into()))
    }
}

/// Returns a document without the requested frame once the renderer has a
/// live session, so the design path fails while the page render is running.
struct FailsDuringRender {
    renderer: PageRenderer,
}

#[async_trait]
impl DesignSource for FailsDuringRender {
    async fn fetch_document(&self, _file_key: &str, _auth: &DesignAuth) -> Result<DesignFile> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.renderer.active_sessions() == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(DesignFile {
            name: None,
            last_modified: None,
            version: None,
            document: DesignDocument::with_pages(vec![DesignNode::new("1:0", "Page 1")]),
        })
    }

    async fn export_node(&self, _: &str, _: &str, _: &DesignAuth) -> Result<String> {
        Err(GatewayError::Config("unreachable".into()))
    }

    async fn fetch_bytes(&self, _: &str, _: &DesignAuth) -> Result<Vec<u8>> {
        Err(GatewayError::Config("unreachable".into()))
    }
}

#[tokio::test]
async fn hung_render_is_killed_at_the_deadline() {
    let _serial = SERIAL.lock().await;
    let dir = TempDir::new().expect("tempdir");
    let options = RenderOptions {
        node_command: write_fake_node(dir.path()),
        process_timeout: Duration::from_millis(300),
        ..RenderOptions::default()
    };
    let store = ScreenshotStore::new(dir.path().join("images"), None);
    let renderer = PageRenderer::new(options, store.clone());

    let started = Instant::now();
    let err = renderer
        .render_url("https://example.com")
        .await
        .expect_err("render should time out");

    assert!(
        matches!(err, GatewayError::RenderTimeout(d) if d == Duration::from_millis(300)),
        "got: {err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(renderer.active_sessions(), 0);

    // Same failure seen through the pipeline.
    let pipeline = ComparisonPipeline::new(
        renderer,
        UnreachableDesign,
        store,
        PipelineOptions::default(),
    )
    .expect("pipeline");
    let request = ComparisonRequest::new("https://example.com", "ABC123", "Homepage", "tok");

    let err = pipeline.compare(&request).await.expect_err("timeout");

    assert!(matches!(
        err,
        PipelineError::Acquisition(GatewayError::RenderTimeout(_))
    ));
    assert_eq!(err.public_message(), "Comparison pipeline failed");
    assert_eq!(pipeline.page().active_sessions(), 0);
}

#[tokio::test]
async fn design_failure_tears_down_the_running_render() {
    let _serial = SERIAL.lock().await;
    let dir = TempDir::new().expect("tempdir");
    let options = RenderOptions {
        node_command: write_fake_node(dir.path()),
        process_timeout: Duration::from_secs(20),
        ..RenderOptions::default()
    };
    let store = ScreenshotStore::new(dir.path().join("images"), None);
    let renderer = PageRenderer::new(options, store.clone());
    let pipeline = ComparisonPipeline::new(
        renderer.clone(),
        FailsDuringRender { renderer },
        store,
        PipelineOptions::default(),
    )
    .expect("pipeline");
    let request = ComparisonRequest::new("https://example.com", "ABC123", "Homepage", "tok");

    let started = Instant::now();
    let err = pipeline.compare(&request).await.expect_err("frame is missing");

    assert!(
        matches!(
            err,
            PipelineError::FrameNotFound(_) | PipelineError::Acquisition(_)
        ),
        "got: {err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(pipeline.page().active_sessions(), 0);
}
