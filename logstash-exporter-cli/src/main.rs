mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use logstash_exporter::{
    BuildInfo, Endpoint, ExporterOptions, ExporterServer, LogstashExporter, ServerConfig,
};
use sysinfo::System;
use tracing::{Level, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.debug);

    let build_info = BuildInfo::from_env();
    info!(
        version = build_info.version,
        commit = build_info.commit_sha,
        build_date = build_info.date,
        arch = std::env::consts::ARCH,
        os = std::env::consts::OS,
        "starting logstash exporter"
    );

    let hostname = System::host_name().context("could not determine the local hostname")?;
    let endpoint = Endpoint::new(&args.logstash_endpoint, args.scrape_timeout())?;
    let options = ExporterOptions {
        namespace: args.namespace.clone(),
        usage: args.logstash_usage.clone(),
        hostname,
        endpoint,
    };
    info!(
        endpoint = %options.endpoint.base_url(),
        usage = %options.usage,
        namespace = %options.namespace,
        hostname = %options.hostname,
        timeout_ms = args.scrape_timeout_ms,
        "scraping Logstash"
    );

    let exporter = Arc::new(LogstashExporter::new(options)?);
    let config = ServerConfig::new(args.web_listen_address, args.metrics_path.clone())?;
    let server = ExporterServer::new(config, exporter, build_info);

    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl-C, shutting down");
                cancel_token.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    server.run().await.context("exporter server failed")?;
    info!("logstash exporter stopped");
    Ok(())
}

fn init_logging(debug: bool) {
    let default_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(debug))
        .init();
}
