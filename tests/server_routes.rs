use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use parity_gateway::error::Result;
use parity_gateway::server::{router, RouterSettings};
use parity_gateway::{
    ComparisonPipeline, DesignAuth, DesignDocument, DesignFile, DesignNode, DesignSource,
    DesignStage, GatewayError, ImageRef, PageCapture, PipelineOptions, ScreenshotStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

struct StubPage {
    store: ScreenshotStore,
}

#[async_trait]
impl PageCapture for StubPage {
    async fn capture(&self, _url: &Url) -> Result<ImageRef> {
        self.store.persist("screenshot", b"page").await
    }
}

struct StubDesign {
    fail_export: bool,
}

#[async_trait]
impl DesignSource for StubDesign {
    async fn fetch_document(&self, _file_key: &str, _auth: &DesignAuth) -> Result<DesignFile> {
        Ok(DesignFile {
            name: None,
            last_modified: None,
            version: None,
            document: DesignDocument::with_pages(vec![DesignNode::new("1:0", "Page 1")
                .with_children(vec![DesignNode::new("1:2", "Homepage")])]),
        })
    }

    async fn export_node(
        &self,
        _file_key: &str,
        node_id: &str,
        _auth: &DesignAuth,
    ) -> Result<String> {
        if self.fail_export {
            return Err(GatewayError::design_api(
                DesignStage::Export,
                None,
                "token figd_secret rejected",
            ));
        }
        Ok(format!("https://images.example.com/{node_id}.png"))
    }

    async fn fetch_bytes(&self, _url: &str, _auth: &DesignAuth) -> Result<Vec<u8>> {
        Ok(b"design".to_vec())
    }
}

fn app(dir: &TempDir, context_path: &str, fail_export: bool) -> Router {
    let images = dir.path().join("images");
    let store = ScreenshotStore::new(&images, Some("http://localhost:5001".into()));
    let pipeline = ComparisonPipeline::new(
        StubPage {
            store: store.clone(),
        },
        StubDesign { fail_export },
        store,
        PipelineOptions::default(),
    )
    .expect("pipeline");

    router(
        Arc::new(pipeline),
        RouterSettings {
            port: 5001,
            context_path: context_path.to_string(),
            images_dir: images,
        },
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn full_request(frame: &str) -> Value {
    json!({
        "page_url": "https://example.com",
        "figma_file_key": "ABC123",
        "figma_page_name": frame,
        "figma_token": "tok",
    })
}

#[tokio::test]
async fn ping_reports_port_and_context_path() {
    let dir = TempDir::new().expect("tempdir");
    let request = Request::get("/gateway/ping").body(Body::empty()).expect("request");

    let (status, body) = send(app(&dir, "/gateway", false), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!(true));
    assert_eq!(
        body["message"],
        json!("Gateway is running on port 5001 root path --> /gateway")
    );
}

#[tokio::test]
async fn compare_returns_both_locators() {
    let dir = TempDir::new().expect("tempdir");

    let (status, body) = send(
        app(&dir, "/gateway", false),
        post_json("/gateway/compare", full_request("Homepage")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let page = body["page_image"].as_str().expect("page_image");
    let figma = body["figma_image"].as_str().expect("figma_image");
    assert!(page.starts_with("http://localhost:5001/images/screenshot-"), "got: {page}");
    assert!(figma.starts_with("http://localhost:5001/images/figma-"), "got: {figma}");
    assert!(body.get("matching_ratio").is_none());
}

#[tokio::test]
async fn compare_lists_missing_fields() {
    let dir = TempDir::new().expect("tempdir");
    let body = json!({"page_url": "https://example.com", "figma_file_key": "ABC123"});

    let (status, body) = send(
        app(&dir, "/gateway", false),
        post_json("/gateway/compare", body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!(false));
    assert_eq!(body["missingFields"], json!(["figma_page_name", "figma_token"]));
    assert_eq!(
        body["message"],
        json!("Missing required fields: figma_page_name, figma_token")
    );
}

#[tokio::test]
async fn compare_refuses_local_file_urls() {
    let dir = TempDir::new().expect("tempdir");
    let mut request = full_request("Homepage");
    request["page_url"] = json!("file:///etc/passwd");

    let (status, body) = send(
        app(&dir, "/gateway", false),
        post_json("/gateway/compare", request),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("Invalid page_url"), "got: {message}");
    assert!(!dir.path().join("images").exists());
}

#[tokio::test]
async fn compare_rejects_malformed_json() {
    let dir = TempDir::new().expect("tempdir");
    let request = Request::post("/gateway/compare")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("request");

    let (status, body) = send(app(&dir, "/gateway", false), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!(false));
}

#[tokio::test]
async fn unknown_frame_is_not_found() {
    let dir = TempDir::new().expect("tempdir");

    let (status, body) = send(
        app(&dir, "/gateway", false),
        post_json("/gateway/compare", full_request("Checkout")),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap_or_default().contains("Checkout"));
}

#[tokio::test]
async fn acquisition_failure_hides_the_cause() {
    let dir = TempDir::new().expect("tempdir");

    let (status, body) = send(
        app(&dir, "/gateway", true),
        post_json("/gateway/compare", full_request("Homepage")),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], json!("Comparison pipeline failed"));
    assert!(!body.to_string().contains("figd_secret"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let request = Request::get("/elsewhere").body(Body::empty()).expect("request");

    let (status, body) = send(app(&dir, "/gateway", false), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Not Found"));
}

#[tokio::test]
async fn routes_follow_a_custom_context_path() {
    let dir = TempDir::new().expect("tempdir");

    let request = Request::get("/api/v2/ping").body(Body::empty()).expect("request");
    let (status, _) = send(app(&dir, "/api/v2", false), request).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::get("/gateway/ping").body(Body::empty()).expect("request");
    let (status, _) = send(app(&dir, "/api/v2", false), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stored_captures_are_served() {
    let dir = TempDir::new().expect("tempdir");
    let images = dir.path().join("images");
    std::fs::create_dir_all(&images).expect("mkdir");
    std::fs::write(images.join("figma-1-0.png"), b"bytes").expect("write");

    let request = Request::get("/images/figma-1-0.png")
        .body(Body::empty())
        .expect("request");
    let response = app(&dir, "/gateway", false)
        .oneshot(request)
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    assert_eq!(&bytes[..], b"bytes");
}
