use std::path::Path;
use std::time::Duration;

use parity_gateway::{Config, GatewayError, ScoringMode};

use crate::cli::{CompareArgs, ServeArgs};

/// Load config (defaults < file < environment) and validate it.
pub fn load_config(path: Option<&Path>) -> Result<Config, GatewayError> {
    let config = Config::load(path)?;
    validated(config, path)
}

/// Re-validate after CLI overrides, naming the config file when there is one.
pub fn validated(config: Config, path: Option<&Path>) -> Result<Config, GatewayError> {
    config.validate().map_err(|e| {
        let detail = match e {
            GatewayError::Config(msg) => msg,
            other => other.to_string(),
        };
        let message = match path {
            Some(p) => format!("Invalid config ({}): {detail}", p.display()),
            None => format!("Invalid config: {detail}"),
        };
        GatewayError::Config(message)
    })?;
    Ok(config)
}

/// CLI flags take precedence over file and environment values.
pub fn apply_serve_overrides(config: &mut Config, args: &ServeArgs) {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(context_path) = &args.context_path {
        config.server.context_path = context_path.clone();
    }
    if let Some(dir) = &args.images_dir {
        config.storage.images_dir = dir.clone();
    }
    if let Some(base) = &args.image_base_url {
        config.server.image_base_url = Some(base.clone());
    }
}

pub fn apply_compare_overrides(config: &mut Config, args: &CompareArgs) {
    if args.score {
        config.comparison.scoring = ScoringMode::Score;
    }
    if let Some(threshold) = args.threshold {
        config.comparison.compare.threshold = threshold;
    }
    if args.allow_file_urls {
        config.comparison.allow_file_urls = true;
    }
    if let Some(viewport) = args.viewport {
        config.browser.viewport = viewport;
    }
    if let Some(dir) = &args.images_dir {
        config.storage.images_dir = dir.clone();
    }
    if let Some(secs) = args.nav_timeout {
        config.browser.navigation_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.network_idle_timeout {
        config.browser.network_idle_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.process_timeout {
        config.browser.process_timeout = Duration::from_secs(secs);
    }
}
