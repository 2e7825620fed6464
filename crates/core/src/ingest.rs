use crate::error::IngestError;
use crate::models::IngestOutcome;
use crate::pipeline::RagPipeline;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct IngestedPdf {
    pub path: PathBuf,
    pub outcome: IngestOutcome,
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct FolderIngestionReport {
    pub ingested: Vec<IngestedPdf>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Ingests every PDF below `folder`, keyed by its file name. A file that
/// fails is recorded in `skipped_files` and does not stop the rest.
pub async fn ingest_folder_best_effort(
    pipeline: &RagPipeline,
    folder: &Path,
) -> Result<FolderIngestionReport, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let mut ingested = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        let result: Result<IngestOutcome, IngestError> = async {
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    IngestError::InvalidArgument(format!(
                        "path has no usable file name: {}",
                        path.display()
                    ))
                })?;
            let bytes = tokio::fs::read(&path).await?;
            pipeline.ingest(file_name, &bytes).await
        }
        .await;

        match result {
            Ok(outcome) => ingested.push(IngestedPdf { path, outcome }),
            Err(error) => skipped_files.push(SkippedPdf {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(FolderIngestionReport {
        ingested,
        skipped_files,
    })
}
