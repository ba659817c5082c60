//! Query-time retrieval: embed the question, search the tenant's index.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::{check_batch, Embedder};
use crate::error::{Error, Result};
use crate::models::{ScoredChunk, TenantId};
use crate::store::VectorIndex;

pub const DEFAULT_TOP_K: usize = 5;

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Top-`k` chunks of `tenant_id` for `query`, best first.
    ///
    /// A blank query returns nothing without touching the embedder. Embedding
    /// failures propagate, as does a reply that is not exactly one vector of
    /// the embedder's width. An index with no matches yields an empty list.
    pub async fn retrieve(
        &self,
        tenant_id: TenantId,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        check_batch(1, self.embedder.dims(), &vectors)?;
        let vector = vectors
            .pop()
            .ok_or_else(|| Error::embedding("no vector returned for the query"))?;

        let hits = self.index.query(tenant_id, &vector, k).await?;
        debug!(tenant_id, k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::models::Chunk;
    use crate::store::memory::InMemoryStore;

    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(texts).await
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            8
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::embedding("quota exceeded"))
        }
    }

    /// Claims `dims` but returns vectors one element short.
    struct NarrowEmbedder {
        dims: usize,
    }

    #[async_trait]
    impl Embedder for NarrowEmbedder {
        fn model_name(&self) -> &str {
            "narrow"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0; self.dims - 1]).collect())
        }
    }

    #[tokio::test]
    async fn query_vector_of_wrong_width_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let chunk = Chunk {
            document_id: 1,
            tenant_id: 7,
            chunk_index: 0,
            text: "shipping".into(),
        };
        store.upsert(7, 1, &[chunk], &[vec![1.0; 7]]).await.unwrap();

        let retriever = Retriever::new(Arc::new(NarrowEmbedder { dims: 8 }), store);
        let err = retriever.retrieve(7, "shipping", 5).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingService(_)));
    }

    #[tokio::test]
    async fn records_from_another_model_are_ignored() {
        let embedder = Arc::new(HashingEmbedder::new(16));
        let store = Arc::new(InMemoryStore::new());
        let stale = Chunk {
            document_id: 1,
            tenant_id: 7,
            chunk_index: 0,
            text: "written by a 32-wide model".into(),
        };
        store.upsert(7, 1, &[stale], &[vec![0.1; 32]]).await.unwrap();

        let retriever = Retriever::new(embedder, store);
        assert!(retriever.retrieve(7, "model", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_query_skips_embedder() {
        let embedder = Arc::new(CountingEmbedder {
            inner: HashingEmbedder::new(16),
            calls: AtomicUsize::new(0),
        });
        let retriever = Retriever::new(embedder.clone(), Arc::new(InMemoryStore::new()));
        assert!(retriever.retrieve(1, "   ", 5).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_tenant_yields_empty_list() {
        let retriever = Retriever::new(
            Arc::new(HashingEmbedder::new(16)),
            Arc::new(InMemoryStore::new()),
        );
        assert!(retriever.retrieve(1, "refund", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let retriever = Retriever::new(Arc::new(FailingEmbedder), Arc::new(InMemoryStore::new()));
        let err = retriever.retrieve(1, "hello", 5).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingService(_)));
    }

    #[tokio::test]
    async fn best_match_first() {
        let embedder = Arc::new(HashingEmbedder::new(256));
        let store = Arc::new(InMemoryStore::new());
        let texts = [
            "Our store opens at nine in the morning.",
            "Refunds are issued to the original payment method within five days.",
            "We ship to over forty countries.",
        ];
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                document_id: 1,
                tenant_id: 7,
                chunk_index: i,
                text: t.to_string(),
            })
            .collect();
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let vectors = embedder.embed(&owned).await.unwrap();
        store.upsert(7, 1, &chunks, &vectors).await.unwrap();

        let retriever = Retriever::new(embedder, store);
        let hits = retriever
            .retrieve(7, "how are refunds issued to my payment method", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk_index, 1);
    }
}
