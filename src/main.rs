//! Smart-home voice server - Main Entry Point
//!
//! Serves the device registry, the realtime voice session endpoint and the
//! turn-based voice assistant over HTTP.

use clap::{Parser, Subcommand};
use smarthome_voice::{
    http_transport::HttpTransportServer,
    logging::{init_logging, LogConfig},
    openai::{AssistantBackend, OpenAiClient},
    registry::DeviceRegistry,
    HomeError, Result, ServerConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Smart-home voice server configuration
#[derive(Parser, Debug)]
#[command(name = "smarthome-voice-server")]
#[command(about = "Smart-home device registry with an OpenAI voice assistant")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "SMARTHOME_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides configuration)
        #[arg(long)]
        host: Option<String>,

        /// JSON fixture to seed the in-memory registry with
        #[arg(long, env = "SMARTHOME_SEED")]
        seed: Option<PathBuf>,

        /// Enable CORS (permissive mode)
        #[arg(long)]
        enable_cors: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;

    let log_config = LogConfig::from_config(&config.logging).with_debug(cli.debug);
    let _log_guard = init_logging(log_config)
        .map_err(|e| HomeError::config(format!("Failed to initialize logging: {e}")))?;

    info!("Starting smart-home voice server v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve {
            port,
            host,
            seed,
            enable_cors,
        } => {
            if let Some(port) = port {
                config.http.port = port;
            }
            if let Some(host) = host {
                config.http.host = host;
            }
            config.http.enable_cors |= enable_cors;
            config.validate()?;

            let registry = DeviceRegistry::new();
            if let Some(seed) = seed {
                registry.seed_from_path(&seed).await?;
            }

            let backend: Option<Arc<dyn AssistantBackend>> =
                match OpenAiClient::new(config.openai.clone()) {
                    Ok(client) => Some(Arc::new(client)),
                    Err(e) => {
                        warn!("OpenAI backend unavailable: {e}");
                        None
                    }
                };

            info!(
                scope = ?config.assistant.scope,
                max_tool_rounds = config.assistant.max_tool_rounds,
                "Assistant configured"
            );

            HttpTransportServer::new(&config, registry, backend)
                .start()
                .await
        }
    }
}
