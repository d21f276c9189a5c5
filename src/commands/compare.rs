use std::path::PathBuf;
use std::process::ExitCode;

use parity_gateway::{
    CompareOutput, ComparisonPipeline, ComparisonRequest, ErrorCategory, ErrorPayload,
    GatewayOutput,
};
use tracing::debug;

use crate::cli::CompareArgs;
use crate::formatting::{render_error, write_output};
use crate::settings::{apply_compare_overrides, load_config, validated};

/// Run one comparison and print the result envelope.
pub async fn run_compare(config_path: Option<PathBuf>, args: CompareArgs) -> ExitCode {
    let format = args.format;
    let output = args.output.clone();

    let mut config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err.to_payload(), format, output),
    };
    apply_compare_overrides(&mut config, &args);
    let config = match validated(config, config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err.to_payload(), format, output),
    };
    debug!(?config, "effective configuration");

    let store = config.screenshot_store();
    let design = match config.design_client() {
        Ok(client) => client,
        Err(err) => return render_error(err.to_payload(), format, output),
    };
    let pipeline = match ComparisonPipeline::new(
        config.page_renderer(store.clone()),
        design,
        store,
        config.comparison,
    ) {
        Ok(pipeline) => pipeline,
        Err(err) => return render_error(err.to_payload(), format, output),
    };

    let request = ComparisonRequest {
        page_url: Some(args.page_url.clone()),
        design_file_key: Some(args.file_key.clone()),
        design_frame_name: Some(args.frame_name.clone()),
        design_access_token: args.token.clone(),
    };

    let result = match pipeline.compare(&request).await {
        Ok(result) => result,
        Err(err) => {
            let mut payload = err.to_payload();
            if payload.missing_fields.iter().any(|f| f == "figma_token") {
                payload.remediation =
                    Some("Pass --token or set FIGMA_TOKEN.".to_string());
            } else if payload.category == ErrorCategory::Pipeline {
                payload.remediation =
                    Some("Re-run with --verbose to see the underlying cause.".to_string());
            }
            return render_error(payload, format, output);
        }
    };

    let body = GatewayOutput::Compare(CompareOutput::from_result(
        &result,
        args.page_url,
        args.file_key,
        args.frame_name,
        config.comparison.scoring,
    ));
    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(
            ErrorPayload::bare(ErrorCategory::Config, err.to_string()),
            format,
            output,
        );
    }
    ExitCode::SUCCESS
}
