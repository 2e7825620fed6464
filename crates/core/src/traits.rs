use crate::error::{CapabilityError, IndexError};
use crate::models::RetrievedChunk;
use async_trait::async_trait;

/// Similarity index over embedded chunk text.
pub trait VectorIndex: Sized {
    fn add(&mut self, vectors: Vec<Vec<f32>>, texts: Vec<String>) -> Result<(), IndexError>;

    /// Returns at most `k` chunks, most similar first.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, IndexError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifier of the embedding model whose vectors this index holds.
    fn embedding_model(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn to_bytes(&self) -> Result<Vec<u8>, IndexError>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError>;
}

#[async_trait]
pub trait GenerativeAnswerer: Send + Sync {
    fn name(&self) -> &str;

    async fn answer(
        &self,
        context: &[RetrievedChunk],
        question: &str,
    ) -> Result<String, CapabilityError>;
}
