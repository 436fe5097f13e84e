//! PDF QA server binary
//!
//! Run with: cargo run -p pdf-qa --bin pdf-qa-server
//! Set `PDF_QA_CONFIG` to a TOML file to override the defaults.

use std::sync::Arc;

use pdf_qa::{
    answering::OnnxQaModel,
    config::{IndexPolicy, QaConfig},
    embeddings::OnnxEmbedder,
    generation::{OllamaClient, TextGenerator},
    hardware::NvidiaSmiProbe,
    ingestion::PdfPageSource,
    server::{state::AppState, QaServer},
    Models, QaService,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_qa=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = QaConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Documents: {}", config.documents.paths.len());
    tracing::info!("  - Embedding model: {}", config.embeddings.repo);
    tracing::info!("  - Extractive model: {}", config.extractive.repo);
    tracing::info!("  - LLM models: {} / {}", config.llm.completion_model, config.llm.answer_model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.overlap
    );
    tracing::info!("  - Index policy: {:?}", config.retrieval.index_policy);

    let embedder = Arc::new(OnnxEmbedder::new(&config.embeddings).await?);
    let extractive = Arc::new(OnnxQaModel::new(&config.extractive).await?);
    let generator = Arc::new(OllamaClient::new(&config.llm)?);

    // Check Ollama
    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    match generator.health_check().await {
        Ok(true) => tracing::info!("Ollama is running"),
        _ => {
            tracing::warn!("Ollama not available at {}", config.llm.base_url);
            tracing::warn!("/generate and /queryllm will fail until it is started:");
            tracing::warn!("  1. Start: ollama serve");
            tracing::warn!(
                "  2. Pull models: ollama pull {} && ollama pull {}",
                config.llm.completion_model,
                config.llm.answer_model
            );
        }
    }

    let models = Models {
        pages: Arc::new(PdfPageSource),
        embedder,
        extractive,
        generator,
    };
    let service = Arc::new(QaService::new(config.clone(), models)?);

    if config.retrieval.index_policy == IndexPolicy::Shared {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = service.warm_up().await {
                tracing::warn!("Index warm-up failed, will retry on first request: {}", e);
            }
        });
    }

    let server = QaServer::new(
        config.server.clone(),
        AppState::new(service, Arc::new(NvidiaSmiProbe::default())),
    );

    tracing::info!("Endpoints:");
    tracing::info!("  GET  /          - Liveness");
    tracing::info!("  GET  /checkup   - GPU summary");
    tracing::info!("  POST /generate  - Text continuation");
    tracing::info!("  POST /query     - Extractive answer");
    tracing::info!("  POST /queryllm  - Generated answer");

    server.start().await?;

    Ok(())
}
