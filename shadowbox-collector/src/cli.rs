use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "shadowbox-collector",
    about = "Shadowbox Metrics Collector Service",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[arg(long, env = "SB_COLLECTOR_PORT", default_value_t = 8082)]
    pub port: u16,

    #[arg(long, env = "SB_COLLECTOR_DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
