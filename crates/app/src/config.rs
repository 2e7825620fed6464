use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf_ask_core::providers::huggingface::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL, DEFAULT_HF_EMBEDDING_DIMENSIONS,
    DEFAULT_HF_ENDPOINT,
};
use pdf_ask_core::{
    CharacterNgramEmbedder, EmbeddingProvider, ExtractiveAnswerer, GenerationConfig,
    GenerativeAnswerer, HuggingFaceAnswerer, HuggingFaceConfig, HuggingFaceEmbedder, IndexStore,
    RagPipeline,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "pdf-ask", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory where per-document indexes are persisted
    #[arg(long, env = "INDEX_DIR", default_value = ".")]
    pub index_dir: PathBuf,

    #[command(flatten)]
    pub backends: BackendArgs,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the HTTP ingestion and question endpoints.
    Serve(ServeArgs),
    /// Ingest one PDF file.
    Ingest {
        /// PDF to read.
        #[arg(long)]
        file: PathBuf,
        /// Name the document is keyed by. Defaults to the file's own name.
        #[arg(long)]
        file_name: Option<String>,
    },
    /// Ingest every PDF below a folder, skipping the ones that fail.
    IngestFolder {
        #[arg(long)]
        folder: PathBuf,
    },
    /// Ask a question about an ingested document.
    Ask {
        /// File name the document was ingested under, e.g. report.pdf
        #[arg(long)]
        file_name: String,
        #[arg(long)]
        question: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Front-end origin allowed by CORS
    #[arg(long, env = "REACT_APP_URL")]
    pub react_app_url: String,

    /// Server origin allowed by CORS
    #[arg(long, env = "SERVER_URL")]
    pub server_url: String,

    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Largest accepted upload body, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Hugging Face feature-extraction inference API
    Huggingface,
    /// Local hashed character trigrams
    Ngram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnswererKind {
    /// Hugging Face text-generation inference API
    Huggingface,
    /// Local best-matching-sentence extraction
    Extractive,
}

#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    #[arg(long, env = "EMBEDDER", value_enum, default_value_t = EmbedderKind::Huggingface)]
    pub embedder: EmbedderKind,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Vector width produced by the remote embedding model
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_HF_EMBEDDING_DIMENSIONS)]
    pub embedding_dimensions: usize,

    #[arg(long, env = "ANSWERER", value_enum, default_value_t = AnswererKind::Huggingface)]
    pub answerer: AnswererKind,

    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    pub llm_model: String,

    #[arg(long, env = "HF_ENDPOINT", default_value = DEFAULT_HF_ENDPOINT)]
    pub hf_endpoint: String,

    #[arg(long, env = "HUGGINGFACEHUB_API_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Timeout for each remote embedding or generation call
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,
}

impl BackendArgs {
    pub fn local() -> Self {
        Self {
            embedder: EmbedderKind::Ngram,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: DEFAULT_HF_EMBEDDING_DIMENSIONS,
            answerer: AnswererKind::Extractive,
            llm_model: DEFAULT_GENERATION_MODEL.to_string(),
            hf_endpoint: DEFAULT_HF_ENDPOINT.to_string(),
            hf_token: None,
            request_timeout_secs: 120,
        }
    }

    fn huggingface(&self) -> anyhow::Result<HuggingFaceConfig> {
        let token = self
            .hf_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .context("HUGGINGFACEHUB_API_TOKEN is required for the huggingface backends")?;

        Ok(HuggingFaceConfig {
            endpoint: self.hf_endpoint.clone(),
            api_token: token,
            timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    pub fn build_pipeline(&self, index_dir: PathBuf) -> anyhow::Result<RagPipeline> {
        let embedder: Arc<dyn EmbeddingProvider> = match self.embedder {
            EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder::default()),
            EmbedderKind::Huggingface => Arc::new(HuggingFaceEmbedder::new(
                self.huggingface()?,
                self.embedding_model.clone(),
                self.embedding_dimensions,
            )?),
        };

        let answerer: Arc<dyn GenerativeAnswerer> = match self.answerer {
            AnswererKind::Extractive => Arc::new(ExtractiveAnswerer::new()?),
            AnswererKind::Huggingface => Arc::new(HuggingFaceAnswerer::new(
                self.huggingface()?,
                self.llm_model.clone(),
                GenerationConfig::default(),
            )?),
        };

        tracing::info!(
            embedder = %embedder.model_id(),
            answerer = answerer.name(),
            index_dir = %index_dir.display(),
            "pipeline configured"
        );
        Ok(RagPipeline::new(IndexStore::new(index_dir), embedder, answerer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_requires_both_cors_origins() {
        let parsed = Cli::try_parse_from([
            "pdf-ask",
            "serve",
            "--react-app-url",
            "http://localhost:3000",
        ]);

        match std::env::var("SERVER_URL") {
            Err(_) => {
                let error = parsed.err().expect("SERVER_URL is missing");
                assert_eq!(error.kind(), clap::error::ErrorKind::MissingRequiredArgument);
                assert!(error.to_string().contains("--server-url"));
            }
            Ok(from_env) => match parsed.expect("SERVER_URL comes from the environment").command {
                Command::Serve(args) => assert_eq!(args.server_url, from_env),
                _ => panic!("expected serve"),
            },
        }
    }

    #[test]
    fn serve_parses_origins_and_defaults() {
        let cli = Cli::try_parse_from([
            "pdf-ask",
            "--embedder",
            "ngram",
            "serve",
            "--react-app-url",
            "http://localhost:3000",
            "--server-url",
            "http://localhost:8000",
        ])
        .expect("valid arguments");

        assert_eq!(cli.backends.embedder, EmbedderKind::Ngram);
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.react_app_url, "http://localhost:3000");
                assert_eq!(args.server_url, "http://localhost:8000");
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn huggingface_backends_need_a_token() {
        let mut backends = BackendArgs::local();
        backends.answerer = AnswererKind::Huggingface;
        backends.hf_token = None;

        let error = backends
            .build_pipeline(std::env::temp_dir())
            .err()
            .expect("token is missing");
        assert!(error.to_string().contains("HUGGINGFACEHUB_API_TOKEN"));
    }

    #[test]
    fn local_backends_build_without_network() {
        assert!(BackendArgs::local()
            .build_pipeline(std::env::temp_dir())
            .is_ok());
    }
}
