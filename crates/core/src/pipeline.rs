use crate::chunking::{split_text, ChunkingConfig};
use crate::embeddings::EmbeddingProvider;
use crate::error::{IngestError, QueryError};
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::index::FlatIndex;
use crate::models::{Answer, DocumentFingerprint, DocumentKey, IngestOutcome, IngestionOptions};
use crate::retriever::Retriever;
use crate::store::{IndexStore, SaveOutcome};
use crate::traits::{GenerativeAnswerer, VectorIndex};
use std::sync::Arc;
use tracing::{info, warn};

/// Ingestion and question answering over per-document indexes.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct RagPipeline {
    extractor: Box<dyn PdfExtractor>,
    chunking: ChunkingConfig,
    store: IndexStore,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: Retriever,
    answerer: Arc<dyn GenerativeAnswerer>,
}

impl RagPipeline {
    pub fn new(
        store: IndexStore,
        embedder: Arc<dyn EmbeddingProvider>,
        answerer: Arc<dyn GenerativeAnswerer>,
    ) -> Self {
        Self::with_options(store, embedder, answerer, IngestionOptions::default())
    }

    pub fn with_options(
        store: IndexStore,
        embedder: Arc<dyn EmbeddingProvider>,
        answerer: Arc<dyn GenerativeAnswerer>,
        options: IngestionOptions,
    ) -> Self {
        let retriever = Retriever::new(Arc::clone(&embedder), options.top_k);
        Self {
            extractor: Box::new(LopdfExtractor),
            chunking: ChunkingConfig::from(options),
            store,
            embedder,
            retriever,
            answerer,
        }
    }

    pub fn with_extractor(mut self, extractor: impl PdfExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Extracts, chunks and (on first sight of the key) indexes an uploaded PDF.
    ///
    /// An existing index for the derived key is never replaced.
    pub async fn ingest(&self, file_name: &str, pdf: &[u8]) -> Result<IngestOutcome, IngestError> {
        let key = DocumentKey::from_file_name(file_name).ok_or_else(|| {
            IngestError::InvalidArgument(format!("cannot derive a document key from '{file_name}'"))
        })?;
        let fingerprint = DocumentFingerprint::of_upload(file_name, pdf);

        let text = self.extractor.extract_text(pdf)?;
        let chunks = split_text(&text, &self.chunking)?;

        if let Some(existing) = self.store.read_bytes(&key).await? {
            let stale = is_stale(&existing, &fingerprint);
            if stale {
                warn!(key = %key, "upload differs from indexed document; keeping existing index");
            }
            info!(key = %key, "index already exists, skipping build");
            return Ok(IngestOutcome::AlreadyIndexed { stale });
        }

        let chunk_count = chunks.len();
        let vectors = self.embedder.embed_batch(&chunks).await?;
        let mut index = FlatIndex::new(self.embedder.model_id(), self.embedder.dimensions())
            .with_fingerprint(fingerprint);
        index.add(vectors, chunks)?;

        match self.store.save_new(&key, &index).await? {
            SaveOutcome::Written => {
                info!(key = %key, chunk_count, "index built");
                Ok(IngestOutcome::Indexed { chunk_count })
            }
            SaveOutcome::AlreadyExists => {
                info!(key = %key, "concurrent ingestion stored this key first");
                Ok(IngestOutcome::AlreadyIndexed { stale: false })
            }
        }
    }

    pub async fn ask(&self, file_name: &str, question: &str) -> Result<Answer, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::InvalidArgument("question is empty".to_string()));
        }
        let key = DocumentKey::from_file_name(file_name).ok_or_else(|| {
            QueryError::InvalidArgument(format!("cannot derive a document key from '{file_name}'"))
        })?;

        let index: FlatIndex = self.store.load(&key).await?;
        let context = self.retriever.retrieve(&index, question).await?;
        let answer = self.answerer.answer(&context, question).await?;

        info!(
            key = %key,
            context_chunks = context.len(),
            answerer = self.answerer.name(),
            "question answered"
        );
        Ok(Answer { answer })
    }
}

fn is_stale(existing: &[u8], upload: &DocumentFingerprint) -> bool {
    match FlatIndex::from_bytes(existing) {
        Ok(index) => index
            .fingerprint()
            .is_some_and(|indexed| indexed.checksum != upload.checksum),
        Err(error) => {
            warn!(%error, "existing index could not be decoded");
            false
        }
    }
}
