//! Liveness report for the database and both providers.

use anyhow::Result;
use serde::Serialize;

use docqa_core::answer::Generator;
use docqa_core::catalog::list_documents;
use docqa_core::embedding::EmbeddingClient;
use docqa_core::error::StoreError;
use docqa_core::store::VectorStore;

use crate::config::Config;
use crate::services::Services;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `healthy`, or `degraded` when the embedding provider is unreachable.
    pub status: &'static str,
    pub backend: &'static str,
    pub version: &'static str,
    pub database: DatabaseHealth,
    pub embedding: ProviderHealth,
    pub llm: ProviderHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseHealth {
    pub status: &'static str,
    pub total_documents: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub status: &'static str,
    pub provider: String,
    pub model: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Probe the store and the embedding provider.
///
/// A store failure is an error. An embedding failure only degrades the
/// report. The language model is reported as configured, not called.
pub async fn check_health(
    store: &dyn VectorStore,
    embedder: &EmbeddingClient,
    generator: &dyn Generator,
) -> Result<HealthReport, StoreError> {
    let total_chunks = store.count().await?;
    let total_documents = list_documents(store).await?.len();

    let embedding_ok = embedder.test_connection().await;
    let provider = embedder.provider();

    Ok(HealthReport {
        status: if embedding_ok { "healthy" } else { "degraded" },
        backend: "running",
        version: env!("CARGO_PKG_VERSION"),
        database: DatabaseHealth {
            status: "connected",
            total_documents,
            total_chunks,
        },
        embedding: ProviderHealth {
            status: if embedding_ok { "connected" } else { "error" },
            provider: provider.name().to_string(),
            model: provider.model_name().to_string(),
        },
        llm: ProviderHealth {
            status: if generator.name() == "disabled" {
                "disabled"
            } else {
                "configured"
            },
            provider: generator.name().to_string(),
            model: generator.model_name().to_string(),
        },
    })
}

/// `docqa health`
pub async fn run_health(config: &Config) -> Result<()> {
    let services = Services::from_config(config).await?;
    let report = services.health().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    services.close().await;
    Ok(())
}
