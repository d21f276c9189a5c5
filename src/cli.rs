use clap::{Args, Parser, Subcommand, ValueEnum};
use parity_gateway::Viewport;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "parity-gateway")]
#[command(
    version,
    about = "Parity Gateway - capture a web page and its design frame, and score how closely they match",
    long_about = "Parity Gateway\n\nModes:\n- serve: run the HTTP gateway (ping + compare routes).\n- compare: run one comparison from the command line.\n- diff: score two local images with the pixel comparator.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines on stderr")]
    pub log_json: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML or YAML); environment and CLI flags override it"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway
    Serve(ServeArgs),
    /// Capture a page and a design frame, optionally scoring them
    Compare(CompareArgs),
    /// Compare two local images
    Diff(DiffArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    #[arg(long, help = "Address to bind (default 0.0.0.0)")]
    pub host: Option<String>,

    #[arg(long, help = "Port to listen on (default 5001, or $PORT)")]
    pub port: Option<u16>,

    #[arg(long, help = "Route prefix (default /gateway, or $GATEWAY_CONTEXT_PATH)")]
    pub context_path: Option<String>,

    #[arg(long, value_name = "PATH", help = "Directory for stored captures")]
    pub images_dir: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "Public base URL for stored captures")]
    pub image_base_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    #[arg(long, help = "Web page to capture")]
    pub page_url: String,

    #[arg(long, help = "Design file key")]
    pub file_key: String,

    #[arg(long, help = "Name of the frame to export (matched below each page)")]
    pub frame_name: String,

    #[arg(
        long,
        env = "FIGMA_TOKEN",
        hide_env_values = true,
        help = "Design service access token"
    )]
    pub token: Option<String>,

    #[arg(long, help = "Run the pixel comparator and report a matching ratio")]
    pub score: bool,

    #[arg(long, help = "Comparator sensitivity, 0-1 (default 0.1)")]
    pub threshold: Option<f64>,

    #[arg(long, help = "Allow file:// page URLs (local captures)")]
    pub allow_file_urls: bool,

    #[arg(long, help = "Viewport dimensions (WIDTHxHEIGHT)")]
    pub viewport: Option<Viewport>,

    #[arg(long, value_name = "PATH", help = "Directory for stored captures")]
    pub images_dir: Option<PathBuf>,

    #[arg(long, value_name = "SECS", help = "Navigation timeout (seconds)")]
    pub nav_timeout: Option<u64>,

    #[arg(long, value_name = "SECS", help = "Network idle timeout (seconds)")]
    pub network_idle_timeout: Option<u64>,

    #[arg(long, value_name = "SECS", help = "Timeout for the whole browser process (seconds)")]
    pub process_timeout: Option<u64>,

    #[arg(long, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, short, help = "Output file path (stdout if omitted)")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    #[arg(long, value_name = "PATH", help = "First image")]
    pub left: PathBuf,

    #[arg(long, value_name = "PATH", help = "Second image")]
    pub right: PathBuf,

    #[arg(long, help = "Comparator sensitivity, 0-1 (default 0.1)")]
    pub threshold: Option<f64>,

    #[arg(long, help = "Count anti-aliased pixels as differences")]
    pub include_aa: bool,

    #[arg(long, value_name = "PATH", help = "Write a diff image (PNG)")]
    pub diff_output: Option<PathBuf>,

    #[arg(
        long,
        value_name = "RATIO",
        help = "Exit with code 1 when the matching ratio is below this value"
    )]
    pub fail_under: Option<f64>,

    #[arg(long, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, short, help = "Output file path (stdout if omitted)")]
    pub output: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum OutputFormat {
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}
