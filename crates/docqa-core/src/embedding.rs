//! Embedding provider trait, the [`EmbeddingClient`] wrapper, and vector
//! utilities.
//!
//! Providers only know how to turn a batch of strings into vectors. The
//! client adds the guarantees the pipelines rely on: input order is
//! preserved 1:1, every vector has the provider's declared dimensionality,
//! and a call either embeds all inputs or fails as a whole.
//!
//! Network-backed providers (Gemini, OpenAI, Ollama) live in the `docqa`
//! application crate. [`HashEmbedder`] is a deterministic offline provider
//! used by tests and air-gapped setups.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::EmbedError;

/// Default number of texts sent per provider request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Which side of retrieval a text is embedded for.
///
/// Both modes share one vector space, so query vectors compare directly
/// against document vectors. Providers that support it use the hint to
/// optimize each side differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Document,
    Query,
}

/// A backend that maps text to fixed-length vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider identifier (e.g. `"gemini"`).
    fn name(&self) -> &str;
    /// Model identifier (e.g. `"gemini-embedding-001"`).
    fn model_name(&self) -> &str;
    /// Expected vector dimensionality, or 0 when unknown.
    fn dims(&self) -> usize;
    /// Embed `texts`, returning one vector per input in input order.
    async fn embed(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Injected handle around an [`EmbeddingProvider`].
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Embed every text, or fail without returning any vectors.
    pub async fn embed_many(
        &self,
        texts: &[String],
        mode: EmbedMode,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.provider.embed(batch, mode).await?;
            if embedded.len() != batch.len() {
                return Err(EmbedError::InvalidResponse(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        if let Some(first) = vectors.first() {
            let dims = first.len();
            if dims == 0 {
                return Err(EmbedError::InvalidResponse(
                    "provider returned an empty vector".to_string(),
                ));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
                return Err(EmbedError::InvalidResponse(format!(
                    "inconsistent dimensionality: {} vs {}",
                    dims,
                    bad.len()
                )));
            }
            let expected = self.provider.dims();
            if expected > 0 && dims != expected {
                return Err(EmbedError::InvalidResponse(format!(
                    "{} returned {}-dimensional vectors, configured for {}",
                    self.provider.name(),
                    dims,
                    expected
                )));
            }
        }

        Ok(vectors)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>, EmbedError> {
        self.embed_many(&[text.to_string()], mode)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::InvalidResponse("empty embedding response".to_string()))
    }

    /// Liveness check: one trivial embed call. Never returns an error.
    pub async fn test_connection(&self) -> bool {
        match self.embed_one("test", EmbedMode::Query).await {
            Ok(_) => true,
            Err(e) => {
                debug!(provider = self.provider.name(), error = %e, "embedding liveness check failed");
                false
            }
        }
    }
}

// ============ Hashing provider ============

/// Deterministic feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed into one of `dims` buckets
/// with a hash-derived sign, and the result is L2-normalized. Texts that
/// share vocabulary get a positive cosine similarity. No network, no model.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }
    fn model_name(&self) -> &str {
        "feature-hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docqa_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance, the native metric of both stores: `1 - similarity`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the text length as a 2-d vector and counts calls.
    struct LengthProvider {
        calls: AtomicUsize,
        drop_last: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        fn name(&self) -> &str {
            "length"
        }
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out: Vec<Vec<f32>> = texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::Service("connection refused".to_string()))
        }
    }

    fn length_client(drop_last: bool) -> (Arc<LengthProvider>, EmbeddingClient) {
        let provider = Arc::new(LengthProvider {
            calls: AtomicUsize::new(0),
            drop_last,
        });
        let client = EmbeddingClient::new(provider.clone()).with_batch_size(2);
        (provider, client)
    }

    #[tokio::test]
    async fn embed_many_preserves_order_across_batches() {
        let (provider, client) = length_client(false);
        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let vectors = client.embed_many(&texts, EmbedMode::Document).await.unwrap();
        let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn embed_many_rejects_short_responses() {
        let (_, client) = length_client(true);
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = client.embed_many(&texts, EmbedMode::Document).await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidResponse(_)));
    }

    /// Declares 3 dimensions but answers with 2.
    struct MisdeclaredProvider;

    #[async_trait]
    impl EmbeddingProvider for MisdeclaredProvider {
        fn name(&self) -> &str {
            "misdeclared"
        }
        fn model_name(&self) -> &str {
            "misdeclared"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn embed_many_rejects_undeclared_dimensionality() {
        let client = EmbeddingClient::new(Arc::new(MisdeclaredProvider));
        let err = client
            .embed_many(&["a".to_string()], EmbedMode::Document)
            .await
            .unwrap_err();
        match err {
            EmbedError::InvalidResponse(msg) => {
                assert!(msg.contains("2-dimensional"), "message: {}", msg);
                assert!(msg.contains("configured for 3"), "message: {}", msg);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn embed_many_of_nothing_makes_no_calls() {
        let (provider, client) = length_client(false);
        let vectors = client.embed_many(&[], EmbedMode::Document).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connection_reports_without_raising() {
        let (_, ok) = length_client(false);
        assert!(ok.test_connection().await);
        let failing = EmbeddingClient::new(Arc::new(FailingProvider));
        assert!(!failing.test_connection().await);
    }

    #[test]
    fn hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_text("The capital of Freedonia is Lapitopolis.");
        let b = embedder.embed_text("The capital of Freedonia is Lapitopolis.");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hash_embedder_relates_shared_vocabulary() {
        let embedder = HashEmbedder::new(256);
        let doc = embedder.embed_text("The capital of Freedonia is Lapitopolis.");
        let question = embedder.embed_text("What is the capital of Freedonia?");
        let unrelated = embedder.embed_text("Kubernetes schedules containers onto nodes.");
        assert!(cosine_similarity(&doc, &question) > cosine_similarity(&doc, &unrelated));
        assert!(cosine_similarity(&doc, &question) > 0.5);
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
