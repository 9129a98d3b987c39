//! Narrowfin CLI - starts the web front end
//!
//! Parses the listen address, upstream server location, trust policy and log
//! level, then runs the server until the process exits.

use std::net::SocketAddr;

use clap::Parser;
use narrowfin_core::config::{NarrowfinConfig, PageConfig, UpstreamConfig};
use narrowfin_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "narrowfin")]
#[command(about = "A minimal web front end for Jellyfin-compatible media servers")]
struct Cli {
    /// Address to serve the web interface on
    #[arg(long, default_value = "127.0.0.1:9097")]
    listen: SocketAddr,

    /// Base URL of the upstream media server
    #[arg(long, default_value = "http://localhost:8096")]
    server: url::Url,

    /// Accept self-signed or otherwise invalid upstream TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Items per page for listings and search
    #[arg(long, default_value_t = 25)]
    page_size: usize,

    /// Console log level
    #[arg(long, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), None)?;

    let config = NarrowfinConfig {
        upstream: UpstreamConfig {
            base_url: cli.server.as_str().trim_end_matches('/').to_string(),
            accept_invalid_certs: cli.insecure,
            ..UpstreamConfig::default()
        },
        pages: PageConfig {
            default_page_size: cli.page_size,
        },
        ..NarrowfinConfig::default()
    };

    narrowfin_web::run_server(config, cli.listen).await
}
