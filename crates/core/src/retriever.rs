use crate::embeddings::EmbeddingProvider;
use crate::error::{IndexError, QueryError};
use crate::models::RetrievedChunk;
use crate::traits::VectorIndex;
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 3;

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, top_k: usize) -> Self {
        Self { embedder, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Embeds `question` and returns the `top_k` most similar chunks of `index`.
    pub async fn retrieve<I: VectorIndex>(
        &self,
        index: &I,
        question: &str,
    ) -> Result<Vec<RetrievedChunk>, QueryError> {
        let model = self.embedder.model_id();
        if model != index.embedding_model() || self.embedder.dimensions() != index.dimensions() {
            return Err(IndexError::EmbeddingMismatch {
                indexed: format!("{} ({}d)", index.embedding_model(), index.dimensions()),
                requested: format!("{model} ({}d)", self.embedder.dimensions()),
            }
            .into());
        }

        let query_vector = self.embedder.embed(question).await?;
        let hits = index.query(&query_vector, self.top_k)?;

        tracing::debug!(hits = hits.len(), indexed = index.len(), "retrieved chunks");
        Ok(hits)
    }
}
