use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use parity_gateway::server;
use parity_gateway::ComparisonPipeline;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{OutputFormat, ServeArgs};
use crate::formatting::render_error;
use crate::settings::{apply_serve_overrides, load_config, validated};

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_serve(config_path: Option<PathBuf>, args: ServeArgs) -> ExitCode {
    let fail = |err: parity_gateway::GatewayError| render_error(err.to_payload(), OutputFormat::Json, None);

    let mut config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return fail(err),
    };
    apply_serve_overrides(&mut config, &args);
    let config = match validated(config, config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return fail(err),
    };

    let store = config.screenshot_store();
    let design = match config.design_client() {
        Ok(client) => client,
        Err(err) => return fail(err),
    };
    let pipeline = match ComparisonPipeline::new(
        config.page_renderer(store.clone()),
        design,
        store,
        config.comparison,
    ) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(err) => return fail(err),
    };

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
            return;
        }
        info!("shutdown requested");
        signal.cancel();
    });

    match server::serve(
        &config.server,
        config.storage.images_dir.clone(),
        pipeline,
        shutdown,
    )
    .await
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(err),
    }
}
