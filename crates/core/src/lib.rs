pub mod answer;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod retriever;
pub mod store;
pub mod traits;

pub use answer::{stuff_prompt, ExtractiveAnswerer, GenerationConfig};
pub use chunking::{split_text, ChunkingConfig};
pub use embeddings::{CharacterNgramEmbedder, EmbeddingProvider, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{CapabilityError, ErrorKind, IndexError, IngestError, QueryError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use index::FlatIndex;
pub use ingest::{
    discover_pdf_files, ingest_folder_best_effort, FolderIngestionReport, IngestedPdf, SkippedPdf,
};
pub use models::{
    Answer, DocumentFingerprint, DocumentKey, IngestOutcome, IngestionOptions, QuestionRequest,
    RetrievedChunk,
};
pub use pipeline::RagPipeline;
pub use providers::{HuggingFaceAnswerer, HuggingFaceConfig, HuggingFaceEmbedder};
pub use retriever::Retriever;
pub use store::{IndexStore, SaveOutcome};
pub use traits::{GenerativeAnswerer, VectorIndex};
