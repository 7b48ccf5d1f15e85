use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use lyrics_core::{GeminiLyricsClient, LyricsConfig};
use music_core::{MusicConfig, MusicGenerator};
use tokio::net::TcpListener;
use tracing::{info, warn};

use server::config::{ServerConfig, Transport};
use server::{app, mcp, AppState};

/// music-mcp: lyrics and instrumental music generation tools
#[derive(Parser, Debug)]
#[command(name = "music-mcp")]
#[command(about = "Lyrics and streaming music generation tool server")]
#[command(version)]
struct Cli {
    /// Serve over HTTP instead of stdio
    #[arg(long, alias = "sse")]
    http: bool,

    /// Transport to use (stdio, http). Overrides MCP_TRANSPORT.
    #[arg(long)]
    transport: Option<String>,

    /// Bind address for the HTTP transport. Overrides MCP_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Port for the HTTP transport. Overrides MCP_PORT.
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn apply(&self, config: &mut ServerConfig) -> anyhow::Result<()> {
        if let Some(transport) = self.transport.as_deref() {
            config.transport = Transport::parse(transport)
                .ok_or_else(|| anyhow::anyhow!("Unknown transport: {transport}"))?;
        }
        if self.http {
            config.transport = Transport::Http;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    // stdout carries protocol frames on the stdio transport
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env();
    cli.apply(&mut config)?;

    async_main(config).await
}

async fn async_main(config: ServerConfig) -> anyhow::Result<()> {
    info!("Starting music tool server...");

    let lyrics_config = LyricsConfig::from_env().with_timeout(config.lyrics_timeout());
    let music_config = MusicConfig::from_env();
    if lyrics_config.api_key.is_empty() || music_config.lyria.api_key.is_empty() {
        warn!("GEMINI_API_KEY / GOOGLE_API_KEY not set, tool calls will fail upstream");
    }
    if music_config.storage.is_configured() {
        info!(
            "Publishing to bucket {} at {}",
            music_config.storage.bucket, music_config.storage.endpoint
        );
    } else {
        warn!("Object storage not configured, music files stay in {}", music_config.staging_dir.display());
    }

    let lyrics = Arc::new(GeminiLyricsClient::new(lyrics_config));
    let music = Arc::new(MusicGenerator::from_config(&music_config));
    let state = AppState::new(lyrics, music, config.clone());

    info!(
        "Server configuration loaded: transport={}, rate_limit={}/min, lyrics_timeout={}s",
        config.transport.as_str(),
        config.rate_limit_per_minute,
        config.lyrics_timeout_secs
    );

    match config.transport {
        Transport::Stdio => mcp::serve_stdio(state).await,
        Transport::Http => {
            let router = app(state)?;
            let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
            let listener = TcpListener::bind(addr).await.map_err(|e| {
                anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different MCP_PORT.")
            })?;

            info!("Server listening on http://{addr}");
            axum::serve(listener, router).await?;
            Ok(())
        }
    }
}
