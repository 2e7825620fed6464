use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const EXTENSION_CHARS: usize = 4;

/// Identifier shared by ingestion and queries: the uploaded file name with
/// its last four characters (the `.pdf` extension) removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Derives the key from a client file name.
    ///
    /// Returns `None` when nothing is left after stripping, or when the
    /// remainder could escape the index directory.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let total = file_name.chars().count();
        if total <= EXTENSION_CHARS {
            return None;
        }

        let stem: String = file_name.chars().take(total - EXTENSION_CHARS).collect();
        if stem.trim().is_empty()
            || stem.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
            || stem == ".."
        {
            return None;
        }

        if !file_name
            .chars()
            .skip(total - EXTENSION_CHARS)
            .collect::<String>()
            .eq_ignore_ascii_case(".pdf")
        {
            tracing::warn!(file_name, key = %stem, "file name does not end with .pdf");
        }

        Some(Self(stem))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provenance of the bytes an index was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub file_name: String,
    pub checksum: String,
    pub byte_len: usize,
    pub ingested_at: DateTime<Utc>,
}

impl DocumentFingerprint {
    pub fn of_upload(file_name: &str, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.to_string(),
            checksum: digest_bytes(bytes),
            byte_len: bytes.len(),
            ingested_at: Utc::now(),
        }
    }
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    pub question: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed { chunk_count: usize },
    /// An index already existed for the key and was left untouched.
    /// `stale` is set when the upload differs from the bytes it was built from.
    AlreadyIndexed { stale: bool },
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_separator: &'static str,
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub top_k: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_separator: "\n",
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 200,
            top_k: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_strips_extension() {
        let key = DocumentKey::from_file_name("test.pdf").expect("valid name");
        assert_eq!(key.as_str(), "test");
    }

    #[test]
    fn key_counts_characters_not_bytes() {
        let key = DocumentKey::from_file_name("résumé.pdf").expect("valid name");
        assert_eq!(key.as_str(), "résumé");
    }

    #[test]
    fn key_strips_four_chars_even_without_pdf_suffix() {
        let key = DocumentKey::from_file_name("notes.text").expect("valid name");
        assert_eq!(key.as_str(), "notes.");
    }

    #[test]
    fn key_rejects_short_and_traversing_names() {
        assert!(DocumentKey::from_file_name(".pdf").is_none());
        assert!(DocumentKey::from_file_name("").is_none());
        assert!(DocumentKey::from_file_name("../etc/passwd.pdf").is_none());
        assert!(DocumentKey::from_file_name("dir/file.pdf").is_none());
        assert!(DocumentKey::from_file_name("   .pdf").is_none());
        assert!(DocumentKey::from_file_name("...pdf").is_none());
    }

    #[test]
    fn key_keeps_double_dots_inside_a_name() {
        let key = DocumentKey::from_file_name("v1..2 notes.pdf").expect("valid name");
        assert_eq!(key.as_str(), "v1..2 notes");
    }

    #[test]
    fn question_request_uses_camel_case_file_name() -> Result<(), serde_json::Error> {
        let parsed: QuestionRequest =
            serde_json::from_str(r#"{"question":"Why?","fileName":"a.pdf"}"#)?;
        assert_eq!(parsed.file_name, "a.pdf");
        Ok(())
    }

    #[test]
    fn fingerprint_checksum_tracks_content() {
        let first = DocumentFingerprint::of_upload("a.pdf", b"one");
        let second = DocumentFingerprint::of_upload("a.pdf", b"two");
        assert_ne!(first.checksum, second.checksum);
        assert_eq!(first.checksum, digest_bytes(b"one"));
    }
}
