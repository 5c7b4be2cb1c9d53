//! Orchestration server binary
//!
//! Run with: cargo run -p rag-orchestrator --bin rag-orchestrator-server -- --config config.toml

use clap::Parser;
use rag_orchestrator::{config::OrchestratorConfig, server::OrchestratorServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "rag-orchestrator-server", version, about = "RAG answer orchestration server")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "RAG_ORCHESTRATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_orchestrator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = OrchestratorConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    let presence = |key: &Option<String>| if key.is_some() { "set" } else { "missing" };
    tracing::info!("  - Gateway key: {}", presence(&config.gateway.api_key));
    tracing::info!("  - Gemini key: {}", presence(&config.gemini.api_key));
    tracing::info!("  - Retrieval backend: {:?}", config.retrieval.backend);
    tracing::info!(
        "  - Retrieval k: {}/{}/{}",
        config.pipelines.single_pass.retrieval_k,
        config.pipelines.evaluate_once.retrieval_k,
        config.pipelines.iterative_refine.retrieval_k
    );

    let server = OrchestratorServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/query      - Ask a question ({{\"query\", \"mode\"}})");
    println!("  GET  /api/pipelines  - List pipelines");
    println!("  GET  /api/models     - List provider tiers");
    println!("  POST /v1/chat/completions - OpenAI-compatible chat via the gateway");
    println!("  GET  /v1/models      - OpenAI-compatible model list");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
