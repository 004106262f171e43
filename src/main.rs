//! ModelForge server entry point

use clap::{Parser, Subcommand};
use modelforge::server::{run_server, ServerConfig};

#[derive(Parser)]
#[command(name = "modelforge", version, about = "Tabular ML training service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Bind address (overrides API_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides API_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Upload and artifact directory (overrides DATA_DIR)
        #[arg(long)]
        data_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modelforge=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::default();

    match cli.command {
        Some(Commands::Serve {
            host,
            port,
            data_dir,
        }) => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            run_server(config).await
        }
        None => run_server(config).await,
    }
}
