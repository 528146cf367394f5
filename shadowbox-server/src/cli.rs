use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "shadowbox-server",
    about = "Shadowbox Manager REST Service",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    /// Directory holding persisted state: access keys, server config, and
    /// the proxy/scraper's own config files.
    #[arg(long, env = "SB_STATE_DIR", default_value = "/root/shadowbox/persisted-state")]
    pub state_dir: PathBuf,

    /// Port the Manager REST Service listens on.
    #[arg(long, env = "SB_API_PORT", default_value_t = 8081)]
    pub api_port: u16,

    /// URL-path prefix every API request must begin with.
    #[arg(long, env = "SB_API_PREFIX")]
    pub api_prefix: Option<String>,

    #[arg(long, env = "SB_CERTIFICATE_FILE")]
    pub certificate_file: Option<PathBuf>,

    #[arg(long, env = "SB_PRIVATE_KEY_FILE")]
    pub private_key_file: Option<PathBuf>,

    /// Collector endpoint the Shared Metrics Publisher POSTs reports to.
    #[arg(
        long,
        env = "SB_METRICS_URL",
        default_value = "https://metrics.getoutline.org"
    )]
    pub metrics_url: String,

    #[arg(long, env = "SB_DEFAULT_SERVER_NAME", default_value = "Shadowbox Server")]
    pub default_server_name: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Path to the `outline-ss-server`-compatible proxy binary.
    #[arg(long, env = "SB_PROXY_BINARY", default_value = "/usr/local/bin/outline-ss-server")]
    pub proxy_binary: PathBuf,

    /// Path to the Prometheus-compatible scraper binary.
    #[arg(long, env = "SB_SCRAPER_BINARY", default_value = "/usr/local/bin/prometheus")]
    pub scraper_binary: PathBuf,

    /// Optional MMDB database enabling country-tagging in proxy metrics.
    #[arg(long, env = "SB_MMDB_PATH")]
    pub mmdb_path: Option<PathBuf>,

    #[arg(long, env = "SB_REPLAY_PROTECTION", default_value_t = true)]
    pub replay_protection: bool,

    /// Base URL of the scraper's query API (the scraper binary's own listen address).
    #[arg(long, env = "SB_SCRAPER_URL", default_value = "http://127.0.0.1:9090")]
    pub scraper_url: String,
}
