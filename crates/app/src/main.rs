use chrono::Utc;
use clap::Parser;
use pdf_ask_core::{ingest_folder_best_effort, IngestOutcome};
use pdf_ask_server::{run_server, Cli, Command, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    // values from .env never override the real environment
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-ask boot"
    );

    let pipeline = cli.backends.build_pipeline(cli.index_dir.clone())?;

    match cli.command {
        Command::Serve(args) => {
            let config = ServerConfig {
                bind: args.bind,
                allowed_origins: vec![args.server_url, args.react_app_url],
                max_upload_bytes: args.max_upload_bytes,
            };
            run_server(config, pipeline).await?;
        }
        Command::Ingest { file, file_name } => {
            let file_name = match file_name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("{} has no file name", file.display()))?,
            };
            let bytes = tokio::fs::read(&file).await?;

            match pipeline.ingest(&file_name, &bytes).await? {
                IngestOutcome::Indexed { chunk_count } => {
                    println!("{file_name}: indexed {chunk_count} chunks");
                }
                IngestOutcome::AlreadyIndexed { stale } => {
                    println!("{file_name}: already indexed");
                    if stale {
                        warn!(file_name = %file_name, "existing index was built from different content");
                    }
                }
            }
        }
        Command::IngestFolder { folder } => {
            let report = ingest_folder_best_effort(&pipeline, &folder).await?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
            }
            for ingested in &report.ingested {
                println!("{}: {:?}", ingested.path.display(), ingested.outcome);
            }
            println!(
                "{} pdfs processed, {} skipped at {}",
                report.ingested.len(),
                report.skipped_files.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask {
            file_name,
            question,
        } => {
            let answer = pipeline.ask(&file_name, &question).await?;
            println!("{}", answer.answer);
        }
    }

    Ok(())
}
