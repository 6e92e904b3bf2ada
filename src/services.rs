//! Wiring: configuration → store, provider clients, and pipelines.
//!
//! Every collaborator is constructed here once and injected; nothing below
//! this layer reads configuration or environment variables.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use docqa_core::answer::{AnswerSynthesizer, Assistant, Generator};
use docqa_core::embedding::{EmbeddingClient, EmbeddingProvider};
use docqa_core::error::StoreError;
use docqa_core::retrieval::Retriever;
use docqa_core::store::VectorStore;

use crate::config::Config;
use crate::db;
use crate::documents::DocumentCatalog;
use crate::embedding::create_provider;
use crate::health::{check_health, HealthReport};
use crate::ingest::IngestionPipeline;
use crate::llm::create_generator;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn VectorStore>,
    pub embedder: EmbeddingClient,
    pub generator: Arc<dyn Generator>,
    pub pipeline: IngestionPipeline,
    pub catalog: DocumentCatalog,
    pub assistant: Assistant,
    pool: Option<SqlitePool>,
}

impl Services {
    /// Open the SQLite store and build providers from `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool)
            .await
            .context("Failed to prepare database schema")?;

        let provider = create_provider(&config.embedding)
            .context("Failed to initialize embedding provider")?;
        let generator =
            create_generator(&config.llm).context("Failed to initialize language model")?;

        let store: Arc<dyn VectorStore> = Arc::new(SqliteStore::new(pool.clone()));
        let mut services = Self::assemble(config, store, provider, generator);
        services.pool = Some(pool);
        Ok(services)
    }

    /// Build services around already-constructed collaborators.
    pub fn assemble(
        config: &Config,
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let embedder = EmbeddingClient::new(provider).with_batch_size(config.embedding.batch_size);
        let pipeline = IngestionPipeline::new(
            config.storage.upload_dir.clone(),
            config.chunk_params(),
            embedder.clone(),
            store.clone(),
        );
        let catalog = DocumentCatalog::new(store.clone(), config.storage.upload_dir.clone());
        let assistant = Assistant::new(
            Retriever::new(embedder.clone(), store.clone()),
            AnswerSynthesizer::new(generator.clone()),
            config.retrieval.top_k,
        );

        Self {
            store,
            embedder,
            generator,
            pipeline,
            catalog,
            assistant,
            pool: None,
        }
    }

    pub async fn health(&self) -> Result<HealthReport, StoreError> {
        check_health(self.store.as_ref(), &self.embedder, self.generator.as_ref()).await
    }

    /// Close the database pool, if this instance owns one.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
