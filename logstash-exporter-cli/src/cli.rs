use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use clap::Parser;
use logstash_exporter::DEFAULT_METRICS_PATH;

/// Prometheus exporter for the Logstash monitoring API.
#[derive(Parser, Debug)]
#[command(name = "logstash_exporter", version, about, long_about = None)]
pub struct Args {
    /// Base URL of the Logstash monitoring API.
    #[arg(
        short = 'l',
        long,
        alias = "logstash_endpoint",
        env = "LOGSTASH_ENDPOINT",
        default_value = "http://localhost:9600"
    )]
    pub logstash_endpoint: String,

    /// Address to expose metrics on; `:port` listens on all interfaces.
    #[arg(
        short = 'w',
        long,
        alias = "web_listen_address",
        env = "WEB_LISTEN_ADDRESS",
        default_value = ":9198",
        value_parser = parse_listen_address
    )]
    pub web_listen_address: SocketAddr,

    /// Tag distinguishing exporters that watch Logstash instances with different roles.
    #[arg(
        short = 'u',
        long,
        alias = "logstash_usage",
        env = "LOGSTASH_USAGE",
        default_value = "logstash"
    )]
    pub logstash_usage: String,

    /// Prefix of every metric name.
    #[arg(long, env = "EXPORTER_NAMESPACE", default_value = "logstash")]
    pub namespace: String,

    /// Path the metrics are served on.
    #[arg(long, env = "METRICS_PATH", default_value = DEFAULT_METRICS_PATH)]
    pub metrics_path: String,

    /// Timeout of each request to Logstash, in milliseconds.
    #[arg(
        long,
        env = "SCRAPE_TIMEOUT_MS",
        default_value_t = 5000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub scrape_timeout_ms: u64,

    /// Enable debug logging.
    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_millis(self.scrape_timeout_ms)
    }
}

/// Parses `host:port`, treating a bare `:port` as every interface.
pub fn parse_listen_address(value: &str) -> Result<SocketAddr, String> {
    let value = value.trim();
    let candidate = match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => value.to_string(),
    };

    if let Ok(addr) = candidate.parse::<SocketAddr>() {
        return Ok(addr);
    }

    candidate
        .to_socket_addrs()
        .map_err(|e| format!("invalid listen address `{value}`: {e}"))?
        .next()
        .ok_or_else(|| format!("listen address `{value}` did not resolve"))
}
