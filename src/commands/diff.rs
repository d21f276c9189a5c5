use std::path::{Path, PathBuf};
use std::process::ExitCode;

use parity_gateway::{
    CompareError, CompareOptions, DiffOutput, ErrorCategory, ErrorPayload, GatewayError,
    GatewayOutput, PixelComparator, OUTPUT_VERSION,
};
use tracing::debug;

use crate::cli::DiffArgs;
use crate::formatting::{exit_code_for_diff, render_error, write_output};
use crate::settings::load_config;

/// Compare two local images with the pixel comparator.
pub async fn run_diff(config_path: Option<PathBuf>, args: DiffArgs) -> ExitCode {
    let format = args.format;
    let output = args.output.clone();

    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err.to_payload(), format, output),
    };

    match diff(config.comparison.compare, &args) {
        Ok(body) => {
            let passed = body.passed;
            if let Err(err) = write_output(&GatewayOutput::Diff(body), format, output.clone()) {
                return render_error(
                    ErrorPayload::bare(ErrorCategory::Config, err.to_string()),
                    format,
                    output,
                );
            }
            exit_code_for_diff(passed)
        }
        Err(payload) => render_error(payload, format, output),
    }
}

fn diff(defaults: CompareOptions, args: &DiffArgs) -> Result<DiffOutput, ErrorPayload> {
    if let Some(min) = args.fail_under {
        if !(0.0..=1.0).contains(&min) {
            return Err(GatewayError::Config(format!(
                "--fail-under must be between 0 and 1, got {min}"
            ))
            .to_payload());
        }
    }

    let options = CompareOptions {
        threshold: args.threshold.unwrap_or(defaults.threshold),
        include_anti_aliasing: args.include_aa || defaults.include_anti_aliasing,
        ..defaults
    };
    let comparator = PixelComparator::new(options).map_err(compare_payload)?;

    let left = open_rgba(&args.left)?;
    let right = open_rgba(&args.right)?;
    let outcome = comparator
        .compare(&left, &right, args.diff_output.is_some())
        .map_err(compare_payload)?;
    debug!(
        different = outcome.different_pixels,
        anti_aliased = outcome.anti_aliased_pixels,
        "diff computed"
    );

    if let (Some(path), Some(image)) = (&args.diff_output, &outcome.diff_image) {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| GatewayError::Io(e).to_payload())?;
        }
        image
            .save(path)
            .map_err(|e| GatewayError::Image(e).to_payload())?;
    }

    let passed = args
        .fail_under
        .map_or(true, |min| outcome.matching_ratio >= min);

    Ok(DiffOutput {
        version: OUTPUT_VERSION.to_string(),
        left: args.left.clone(),
        right: args.right.clone(),
        width: outcome.width,
        height: outcome.height,
        total_pixels: outcome.total_pixels,
        different_pixels: outcome.different_pixels,
        anti_aliased_pixels: outcome.anti_aliased_pixels,
        matching_ratio: outcome.matching_ratio,
        threshold: options.threshold,
        fail_under: args.fail_under,
        passed,
        diff_image: args.diff_output.clone(),
    })
}

fn open_rgba(path: &Path) -> Result<image::RgbaImage, ErrorPayload> {
    image::open(path).map(|img| img.to_rgba8()).map_err(|e| {
        ErrorPayload::new(
            ErrorCategory::Image,
            format!("Failed to load {}: {e}", path.display()),
            "Verify the path exists and is a PNG, JPEG, GIF, WebP or BMP image.",
        )
    })
}

fn compare_payload(err: CompareError) -> ErrorPayload {
    match err {
        CompareError::IncomparableDimensions { .. } => ErrorPayload::new(
            ErrorCategory::Comparison,
            err.to_string(),
            "Both images must have the same width and height; the comparator does not resize.",
        ),
        CompareError::InvalidThreshold(_) => {
            GatewayError::Config(err.to_string()).to_payload()
        }
        CompareError::Decode(e) => GatewayError::Image(e).to_payload(),
    }
}
