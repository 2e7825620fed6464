pub mod huggingface;

pub use huggingface::{HuggingFaceAnswerer, HuggingFaceConfig, HuggingFaceEmbedder};
