//! Ingestion, retrieval, and deletion through the public pipeline API,
//! using an in-memory store and offline providers.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use docqa::config::Config;
use docqa::ingest::{IngestError, IngestFailure, IngestState};
use docqa::services::Services;
use docqa_core::answer::{Generator, NO_RELEVANT_INFO};
use docqa_core::catalog::DeleteOutcome;
use docqa_core::embedding::{EmbedMode, EmbeddingProvider, HashEmbedder};
use docqa_core::error::{EmbedError, GenerateError, StoreError};
use docqa_core::models::{ChunkRecord, QueryHit, StoredChunk};
use docqa_core::store::memory::InMemoryStore;
use docqa_core::store::{ChunkFilter, VectorStore};

const FREEDONIA: &str = "Bananas ripen quickly in warm tropical climates.\n\n\
Rivers carry sediment toward distant deltas every spring.\n\n\
The capital of Freedonia is Lapitopolis.\n\n\
Violins require careful humidity control during long winters.\n\n\
Glaciers carve valleys slowly across many centuries.";

// ─── Fakes ──────────────────────────────────────────────────────────

/// Hash embeddings, counting provider calls.
struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: HashEmbedder::new(256),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn name(&self) -> &str {
        "counting"
    }
    fn model_name(&self) -> &str {
        "feature-hash"
    }
    fn dims(&self) -> usize {
        self.inner.dims()
    }
    async fn embed(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(texts, mode).await
    }
}

/// Always fails, like an embedding service that is down.
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        256
    }
    async fn embed(&self, _texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Service("503 Service Unavailable".to_string()))
    }
}

/// A store that writes the first record of a batch and then fails.
struct HalfWritingStore {
    inner: InMemoryStore,
}

#[async_trait]
impl VectorStore for HalfWritingStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<(), StoreError> {
        self.inner.upsert(&records[..1]).await?;
        Err(StoreError::Backend("disk full".to_string()))
    }
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, StoreError> {
        self.inner.query(vector, k).await
    }
    async fn get(&self, filter: &ChunkFilter) -> Result<Vec<StoredChunk>, StoreError> {
        self.inner.get(filter).await
    }
    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError> {
        self.inner.delete(ids).await
    }
    async fn delete_where(&self, filter: &ChunkFilter) -> Result<Vec<String>, StoreError> {
        self.inner.delete_where(filter).await
    }
    async fn count(&self) -> Result<usize, StoreError> {
        self.inner.count().await
    }
}

/// Returns a fixed answer and counts calls.
struct CannedGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl Generator for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }
    fn model_name(&self) -> &str {
        "canned"
    }
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(prompt.contains("Question:"));
        Ok("Lapitopolis.".to_string())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config(tmp: &TempDir) -> Config {
    let root = tmp.path();
    let config_content = format!(
        r#"
[storage]
upload_dir = "{}"
db_path = "{}"

[chunking]
chunk_size = 200
chunk_overlap = 40

[retrieval]
top_k = 3

[server]
bind = "127.0.0.1:0"
"#,
        root.join("uploads").display(),
        root.join("docqa.sqlite").display()
    );
    toml::from_str(&config_content).unwrap()
}

fn services_with(
    cfg: &Config,
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
) -> (Services, Arc<CannedGenerator>) {
    let generator = Arc::new(CannedGenerator {
        calls: AtomicUsize::new(0),
    });
    let services = Services::assemble(cfg, store, provider, generator.clone());
    (services, generator)
}

fn files_in(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Build a PDF with one Helvetica text line per page; empty strings give
/// pages without any text operators.
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 14.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_then_ask_round_trip() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = Arc::new(InMemoryStore::new());
    let (services, generator) =
        services_with(&cfg, store.clone(), Arc::new(CountingEmbedder::new()));

    let receipt = services
        .pipeline
        .ingest("freedonia.txt", FREEDONIA.as_bytes())
        .await
        .unwrap();
    assert_eq!(receipt.status, IngestState::Committed);
    assert_eq!(receipt.filename, "freedonia.txt");
    assert!(receipt.chunk_count >= 2);
    assert_eq!(store.count().await.unwrap(), receipt.chunk_count);

    let stored_path = services
        .pipeline
        .upload_path(&receipt.doc_id, "freedonia.txt");
    assert!(stored_path.exists());

    let answer = services
        .assistant
        .ask("What is the capital of Freedonia?")
        .await
        .unwrap();
    assert_eq!(answer.answer, "Lapitopolis.");
    assert_eq!(answer.question, "What is the capital of Freedonia?");
    assert!(answer.sources.len() <= 3);
    assert!(answer.sources[0]
        .chunk_text
        .contains("The capital of Freedonia is Lapitopolis."));
    assert!(answer.sources[0].relevance_score > 0.0);
    assert_eq!(answer.sources[0].document, "freedonia.txt");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pdf_upload_is_indexed_and_retrievable() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = Arc::new(InMemoryStore::new());
    let (services, _) = services_with(&cfg, store.clone(), Arc::new(CountingEmbedder::new()));

    let pdf = pdf_with_pages(&[
        "Bananas ripen quickly in warm tropical climates",
        "",
        "The capital of Freedonia is Lapitopolis",
    ]);
    let receipt = services.pipeline.ingest("atlas.pdf", &pdf).await.unwrap();
    assert_eq!(receipt.status, IngestState::Committed);
    assert!(receipt.chunk_count >= 1);
    assert!(services
        .pipeline
        .upload_path(&receipt.doc_id, "atlas.pdf")
        .exists());

    let chunks = store
        .get(&ChunkFilter::doc_id(receipt.doc_id.as_str()))
        .await
        .unwrap();
    let all_text: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert!(all_text.contains("Lapitopolis"));

    let sources = services
        .assistant
        .retriever()
        .retrieve("What is the capital of Freedonia?", 1)
        .await
        .unwrap();
    assert_eq!(sources[0].document, "atlas.pdf");
    assert!(sources[0].chunk_text.contains("Lapitopolis"));
}

#[tokio::test]
async fn chunk_indices_are_contiguous() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = Arc::new(InMemoryStore::new());
    let (services, _) = services_with(&cfg, store.clone(), Arc::new(CountingEmbedder::new()));

    let receipt = services
        .pipeline
        .ingest("freedonia.md", FREEDONIA.as_bytes())
        .await
        .unwrap();

    let mut chunks = store
        .get(&ChunkFilter::doc_id(receipt.doc_id.as_str()))
        .await
        .unwrap();
    chunks.sort_by_key(|c| c.metadata.chunk_index);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.metadata.chunk_index, i);
        assert_eq!(chunk.id, format!("{}_chunk_{}", receipt.doc_id, i));
        assert_eq!(chunk.metadata.upload_date, chunks[0].metadata.upload_date);
    }
    assert_eq!(chunks.len(), receipt.chunk_count);
}

#[tokio::test]
async fn embedding_failure_leaves_nothing_behind() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = Arc::new(InMemoryStore::new());
    let (services, _) = services_with(&cfg, store.clone(), Arc::new(FailingEmbedder));

    let err = services
        .pipeline
        .ingest("freedonia.txt", FREEDONIA.as_bytes())
        .await
        .unwrap_err();

    match &err {
        IngestError::Failed { state, failure } => {
            assert_eq!(*state, IngestState::Chunked);
            assert!(matches!(failure, IngestFailure::Embedding(_)));
        }
        other => panic!("expected pipeline failure, got {:?}", other),
    }
    assert!(err.to_string().starts_with("Upload failed while generating embeddings"));
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(files_in(&cfg.storage.upload_dir).is_empty());
}

#[tokio::test]
async fn docx_is_rejected_before_any_processing() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = Arc::new(InMemoryStore::new());
    let embedder = Arc::new(CountingEmbedder::new());
    let (services, _) = services_with(&cfg, store.clone(), embedder.clone());

    let err = services
        .pipeline
        .ingest("report.docx", b"PK\x03\x04 not really a docx")
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::UnsupportedFormat(ref ext) if ext == "docx"));
    assert!(err.is_rejection());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(files_in(&cfg.storage.upload_dir).is_empty());
}

#[tokio::test]
async fn blank_document_fails_as_empty() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = Arc::new(InMemoryStore::new());
    let embedder = Arc::new(CountingEmbedder::new());
    let (services, _) = services_with(&cfg, store.clone(), embedder.clone());

    let err = services
        .pipeline
        .ingest("blank.md", b"  \n\n\t  \n")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Failed {
            state: IngestState::Saved,
            failure: IngestFailure::EmptyDocument
        }
    ));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert!(files_in(&cfg.storage.upload_dir).is_empty());
}

#[tokio::test]
async fn undecodable_text_fails_extraction() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = Arc::new(InMemoryStore::new());
    let (services, _) = services_with(&cfg, store.clone(), Arc::new(CountingEmbedder::new()));

    let err = services
        .pipeline
        .ingest("latin1.txt", &[0x63, 0x61, 0x66, 0xe9, 0xff])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Failed {
            failure: IngestFailure::Extraction(_),
            ..
        }
    ));
    assert!(err.to_string().contains("extracting text"));
    assert!(files_in(&cfg.storage.upload_dir).is_empty());
}

#[tokio::test]
async fn partial_store_write_is_rolled_back() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = Arc::new(HalfWritingStore {
        inner: InMemoryStore::new(),
    });
    let (services, _) = services_with(&cfg, store.clone(), Arc::new(CountingEmbedder::new()));

    let err = services
        .pipeline
        .ingest("freedonia.txt", FREEDONIA.as_bytes())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Failed {
            state: IngestState::Embedded,
            failure: IngestFailure::Store(_)
        }
    ));
    assert_eq!(store.inner.count().await.unwrap(), 0);
    assert!(files_in(&cfg.storage.upload_dir).is_empty());
}

#[tokio::test]
async fn delete_removes_chunks_and_file() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = Arc::new(InMemoryStore::new());
    let (services, _) = services_with(&cfg, store.clone(), Arc::new(CountingEmbedder::new()));

    let kept = services
        .pipeline
        .ingest("other.txt", b"Glaciers carve valleys slowly.")
        .await
        .unwrap();
    let receipt = services
        .pipeline
        .ingest("freedonia.txt", FREEDONIA.as_bytes())
        .await
        .unwrap();
    let path = services
        .pipeline
        .upload_path(&receipt.doc_id, "freedonia.txt");
    assert!(path.exists());
    assert_eq!(services.catalog.list().await.unwrap().len(), 2);

    let outcome = services
        .catalog
        .delete_document(&receipt.doc_id)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DeleteOutcome::Deleted {
            chunks_removed: receipt.chunk_count
        }
    );

    let listed = services.catalog.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].doc_id, kept.doc_id);
    assert!(store
        .get(&ChunkFilter::doc_id(receipt.doc_id.as_str()))
        .await
        .unwrap()
        .is_empty());
    assert!(!path.exists());
    assert!(services
        .pipeline
        .upload_path(&kept.doc_id, "other.txt")
        .exists());

    let again = services
        .catalog
        .delete_document(&receipt.doc_id)
        .await
        .unwrap();
    assert_eq!(again, DeleteOutcome::NotFound);
}

#[tokio::test]
async fn empty_index_answers_without_the_model() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let store = Arc::new(InMemoryStore::new());
    let (services, generator) =
        services_with(&cfg, store, Arc::new(CountingEmbedder::new()));

    let answer = services.assistant.ask("Anything there?").await.unwrap();
    assert_eq!(answer.answer, NO_RELEVANT_INFO);
    assert!(answer.sources.is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}
