use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use parity_gateway::{ErrorOutput, ErrorPayload, GatewayOutput};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &GatewayOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the fatal exit code.
pub fn render_error(error: ErrorPayload, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let payload = GatewayOutput::Error(ErrorOutput::new(error));

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {write_err}");
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {write_err}");
            }
        }
    };

    // Exit code 2 is reserved for errors; a ratio under --fail-under uses 1.
    ExitCode::from(2)
}

fn write_json_output(
    body: &GatewayOutput,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn write_pretty_output(body: &GatewayOutput, output: Option<&Path>) -> io::Result<()> {
    let use_human = output.is_none() && std::io::stdout().is_terminal();

    if use_human {
        println!("{}", format_pretty(body, true));
        return Ok(());
    }

    // Files and pipes keep the JSON shape.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for a terminal.
pub fn format_pretty(body: &GatewayOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        GatewayOutput::Compare(out) => {
            let header = color("[COMPARE]", "36", colorize);
            writeln!(buf, "{header} {} vs frame '{}'", out.page_url, out.frame_name).ok();
            writeln!(buf, "Page image:   {}", out.page_image).ok();
            writeln!(buf, "Figma image:  {}", out.figma_image).ok();
            match out.matching_ratio {
                Some(ratio) => {
                    let text = format!("{ratio:.4} ({:.1}%)", ratio * 100.0);
                    writeln!(buf, "Matching:     {}", color(&text, ratio_color_code(ratio), colorize)).ok();
                }
                None => {
                    writeln!(buf, "Matching:     not scored (capture only)").ok();
                }
            }
        }
        GatewayOutput::Diff(out) => {
            let status = if out.passed { "PASS" } else { "FAIL" };
            let status = color(status, if out.passed { "32" } else { "31" }, colorize);
            writeln!(buf, "{status} Pixel diff {}x{}", out.width, out.height).ok();
            let text = format!("{:.4} ({:.1}%)", out.matching_ratio, out.matching_ratio * 100.0);
            writeln!(
                buf,
                "Matching: {} (threshold {})",
                color(&text, ratio_color_code(out.matching_ratio), colorize),
                out.threshold
            )
            .ok();
            writeln!(
                buf,
                "Different pixels: {} of {} ({} anti-aliased ignored)",
                out.different_pixels, out.total_pixels, out.anti_aliased_pixels
            )
            .ok();
            if let Some(min) = out.fail_under {
                writeln!(buf, "Fail under: {min}").ok();
            }
            if let Some(path) = &out.diff_image {
                writeln!(buf, "Diff image: {}", path.display()).ok();
            }
        }
        GatewayOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            writeln!(buf, "{header} {}", out.error.message).ok();
            if !out.error.missing_fields.is_empty() {
                writeln!(buf, "Missing: {}", out.error.missing_fields.join(", ")).ok();
            }
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {remediation}").ok();
            }
        }
    }
    buf
}

fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn ratio_color_code(ratio: f64) -> &'static str {
    if ratio >= 0.99 {
        "32" // green
    } else if ratio >= 0.9 {
        "33" // yellow
    } else {
        "31" // red
    }
}

/// Exit code for a diff run: 1 when the ratio fell under `--fail-under`.
pub fn exit_code_for_diff(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
