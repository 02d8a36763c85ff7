//! HTTP forward-proxy daemon.
//!
//! ```text
//!     Client                      ┌───────────────────────────────────────────────┐
//!     GET /proxy/<target>  ──────▶│ net::listener → http::server → routing::target │
//!                                 │                                   │            │
//!                                 │                        security::policy        │
//!                                 │                                   ▼            │
//!     upstream reply       ◀──────│ http::server ◀── http::forward ◀──▶ Upstream   │
//!                                 │                                                │
//!                                 │  lifecycle: starting → serving → draining →    │
//!                                 │             stopped                            │
//!                                 └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use http_proxy_daemon::config::{self, ServerConfig};
use http_proxy_daemon::lifecycle::{shutdown_signal, Server};
use http_proxy_daemon::observability::init_logging;

#[derive(Parser)]
#[command(name = "http-proxy-daemon", version)]
#[command(about = "HTTP forward proxy: /<prefix>/<url> is fetched from <url>", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    serve: ServeArgs,
}

impl Cli {
    /// Arguments of the `serve` run, whether or not the subcommand was named.
    fn into_serve_args(self) -> ServeArgs {
        match self.command {
            Some(Commands::Serve(args)) => args,
            None => self.serve,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy until SIGINT or SIGTERM (default)
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Listen address
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Listen port (0 picks an ephemeral port)
    #[arg(short, long, env = "LISTEN_PORT")]
    port: Option<u16>,

    /// Path prefix under which targets are accepted
    #[arg(short = 'x', long, env = "PROXY_PREFIX")]
    prefix: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: Option<bool>,

    /// Allow-list entries (host, *.suffix or IP), comma separated
    #[arg(long, env = "ALLOW_HOSTS", value_delimiter = ',')]
    allow_host: Vec<String>,
}

impl ServeArgs {
    /// File (or defaults) first, then command line and environment on top.
    fn into_config(self) -> Result<ServerConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::parse_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listener.address = listen;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(prefix) = self.prefix {
            config.proxy.prefix = prefix;
        }
        if let Some(log_json) = self.log_json {
            config.observability.log_json = log_json;
        }
        config.policy.allow_hosts.extend(self.allow_host);

        config::validated(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse().into_serve_args();
    let config = args.into_config()?;
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.listener.address,
        port = config.listener.port,
        prefix = %config.proxy.normalized_prefix(),
        "http-proxy-daemon starting"
    );

    let server = Server::bind(config).await?;
    if let Err(e) = server.run(shutdown_signal()).await {
        tracing::error!(error = %e, "Shutdown incomplete");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
