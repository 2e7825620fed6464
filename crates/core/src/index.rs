use crate::error::IndexError;
use crate::models::{DocumentFingerprint, RetrievedChunk};
use crate::traits::VectorIndex;
use serde::{Deserialize, Serialize};

pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexEntry {
    text: String,
    vector: Vec<f32>,
}

/// Exact cosine-similarity index, serialized as a versioned JSON envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    format_version: u32,
    embedding_model: String,
    dimensions: usize,
    #[serde(default)]
    fingerprint: Option<DocumentFingerprint>,
    entries: Vec<IndexEntry>,
}

#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

impl FlatIndex {
    pub fn new(embedding_model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimensions,
            fingerprint: None,
            entries: Vec::new(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: DocumentFingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn fingerprint(&self) -> Option<&DocumentFingerprint> {
        self.fingerprint.as_ref()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorIndex for FlatIndex {
    fn add(&mut self, vectors: Vec<Vec<f32>>, texts: Vec<String>) -> Result<(), IndexError> {
        if vectors.len() != texts.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                texts: texts.len(),
            });
        }

        if let Some(bad) = vectors.iter().find(|vector| vector.len() != self.dimensions) {
            return Err(IndexError::DimensionMismatch {
                found: bad.len(),
                expected: self.dimensions,
            });
        }

        self.entries.extend(
            vectors
                .into_iter()
                .zip(texts)
                .map(|(vector, text)| IndexEntry { text, vector }),
        );
        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                found: vector.len(),
                expected: self.dimensions,
            });
        }

        let mut scored: Vec<RetrievedChunk> = self
            .entries
            .iter()
            .map(|entry| RetrievedChunk {
                text: entry.text.clone(),
                score: cosine_similarity(&entry.vector, vector),
            })
            .collect();

        // stable: equal scores keep insertion order
        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(k);
        Ok(scored)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let probe: VersionProbe = serde_json::from_slice(bytes)?;
        if probe.format_version != INDEX_FORMAT_VERSION {
            return Err(IndexError::UnsupportedFormat {
                found: probe.format_version,
                expected: INDEX_FORMAT_VERSION,
            });
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(vectors: Vec<Vec<f32>>) -> FlatIndex {
        let texts = (0..vectors.len()).map(|i| format!("chunk-{i}")).collect();
        let mut index = FlatIndex::new("test-model", 2);
        index.add(vectors, texts).expect("vectors match dimensions");
        index
    }

    #[test]
    fn query_orders_by_descending_similarity() {
        let index = index_with(vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.7, 0.7],
            vec![-1.0, 0.0],
        ]);

        let hits = index.query(&[1.0, 0.1], 3).unwrap();
        let texts: Vec<_> = hits.iter().map(|hit| hit.text.as_str()).collect();
        assert_eq!(texts, vec!["chunk-1", "chunk-2", "chunk-0"]);
        assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[test]
    fn query_returns_everything_when_fewer_than_k() {
        let index = index_with(vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
        let hits = index.query(&[0.0, 1.0], 3).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "chunk-0");
    }

    #[test]
    fn add_rejects_mismatched_input() {
        let mut index = FlatIndex::new("test-model", 2);
        assert!(matches!(
            index.add(vec![vec![1.0, 0.0]], vec![]),
            Err(IndexError::LengthMismatch { .. })
        ));
        assert!(matches!(
            index.add(vec![vec![1.0]], vec!["x".to_string()]),
            Err(IndexError::DimensionMismatch { .. })
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn restored_index_answers_like_the_built_one() {
        let index = index_with(vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
        let restored = FlatIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();

        assert_eq!(restored, index);
        assert_eq!(restored.embedding_model(), "test-model");
        assert_eq!(
            restored.query(&[1.0, 0.0], 1).unwrap(),
            index.query(&[1.0, 0.0], 1).unwrap()
        );
    }

    #[test]
    fn unknown_format_version_is_rejected() {
        let mut value = serde_json::to_value(index_with(vec![vec![1.0, 0.0]])).unwrap();
        value["format_version"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&value).unwrap();

        assert!(matches!(
            FlatIndex::from_bytes(&bytes),
            Err(IndexError::UnsupportedFormat { found: 99, .. })
        ));
    }
}
