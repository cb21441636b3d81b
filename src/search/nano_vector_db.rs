//! A lightweight cosine-similarity vector store persisted as a single JSON file.
#![forbid(unsafe_code)]

use base64::{engine::general_purpose, Engine as _};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

type Float = f32;

#[derive(Debug, Error)]
pub enum VectorDbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed vector store: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embedding dimension must be non-zero")]
    ZeroDimension,

    #[error("Matrix size mismatch: expected {expected}, got {got}")]
    MatrixSizeMismatch { expected: usize, got: usize },

    #[error("Vector dimension mismatch for '{id}': expected {expected}, got {got}")]
    VectorDimensionMismatch {
        id: String,
        expected: usize,
        got: usize,
    },
}

/// A single vector entry with metadata
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Data {
    /// Unique identifier for the vector
    #[serde(rename = "__id__")]
    pub id: String,
    /// Input vector for `upsert`. Not persisted; the normalized copy lives in the matrix.
    #[serde(skip)]
    pub vector: Vec<Float>,
    /// Additional metadata fields stored with the vector
    #[serde(flatten, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DataBase {
    embedding_dim: usize,
    data: Vec<Data>,
    #[serde(with = "base64_floats")]
    matrix: Vec<Float>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    additional_data: HashMap<String, serde_json::Value>,
}

mod base64_floats {
    use super::*;
    use bytemuck::cast_slice;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(vec: &[Float], serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: &[u8] = cast_slice(vec);
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Float>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)?;
        if bytes.len() % std::mem::size_of::<Float>() != 0 {
            return Err(serde::de::Error::custom(format!(
                "matrix byte length {} is not a multiple of {}",
                bytes.len(),
                std::mem::size_of::<Float>()
            )));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| Float::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

/// A query hit borrowed from the store.
#[derive(Debug, Clone, Copy)]
pub struct ScoredData<'a> {
    /// Position of the entry in insertion order.
    pub position: usize,
    pub data: &'a Data,
    /// Cosine similarity to the query.
    pub score: Float,
}

#[derive(Debug)]
pub struct NanoVectorDB {
    storage_file: PathBuf,
    storage: DataBase,
}

#[derive(Debug, PartialEq)]
struct ScoredIndex {
    score: Float,
    index: usize,
}

impl Eq for ScoredIndex {}

impl PartialOrd for ScoredIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// "Better" candidates compare as Less: higher score first, then lower index.
// The max-heap therefore pops the worst kept candidate, and `into_sorted_vec`
// yields best-first order.
impl Ord for ScoredIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_score = match (self.score.is_nan(), other.score.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => other
                .score
                .partial_cmp(&self.score)
                .unwrap_or(Ordering::Equal),
        };
        by_score.then_with(|| self.index.cmp(&other.index))
    }
}

impl NanoVectorDB {
    /// Creates an empty store that will be written to `storage_file` on `save`.
    pub fn create(embedding_dim: usize, storage_file: impl AsRef<Path>) -> Result<Self, VectorDbError> {
        if embedding_dim == 0 {
            return Err(VectorDbError::ZeroDimension);
        }
        Ok(Self {
            storage_file: storage_file.as_ref().to_path_buf(),
            storage: DataBase {
                embedding_dim,
                data: Vec::new(),
                matrix: Vec::new(),
                additional_data: HashMap::new(),
            },
        })
    }

    /// Loads a store previously written by `save`.
    pub fn load(storage_file: impl AsRef<Path>) -> Result<Self, VectorDbError> {
        let storage_file = storage_file.as_ref().to_path_buf();
        let contents = fs::read_to_string(&storage_file)?;
        let storage: DataBase = serde_json::from_str(&contents)?;

        if storage.embedding_dim == 0 {
            return Err(VectorDbError::ZeroDimension);
        }
        let expected = storage.data.len() * storage.embedding_dim;
        if storage.matrix.len() != expected {
            return Err(VectorDbError::MatrixSizeMismatch {
                expected,
                got: storage.matrix.len(),
            });
        }

        Ok(Self {
            storage_file,
            storage,
        })
    }

    /// Inserts new ids and overwrites existing ones. Vectors are normalized on the way in.
    /// Returns `(updated_ids, inserted_ids)`.
    pub fn upsert(&mut self, datas: Vec<Data>) -> Result<(Vec<String>, Vec<String>), VectorDbError> {
        let dim = self.storage.embedding_dim;
        if let Some(bad) = datas.iter().find(|d| d.vector.len() != dim) {
            return Err(VectorDbError::VectorDimensionMismatch {
                id: bad.id.clone(),
                expected: dim,
                got: bad.vector.len(),
            });
        }

        let mut positions: HashMap<String, usize> = self
            .storage
            .data
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();

        let mut updates = Vec::new();
        let mut inserts = Vec::new();

        for data_item in datas {
            let norm_vec = normalize(&data_item.vector);
            match positions.get(&data_item.id) {
                Some(&pos) => {
                    let start = pos * dim;
                    self.storage.matrix[start..start + dim].copy_from_slice(&norm_vec);
                    self.storage.data[pos].fields = data_item.fields;
                    updates.push(data_item.id);
                }
                None => {
                    positions.insert(data_item.id.clone(), self.storage.data.len());
                    self.storage.matrix.extend_from_slice(&norm_vec);
                    inserts.push(data_item.id.clone());
                    self.storage.data.push(Data {
                        id: data_item.id,
                        vector: Vec::new(),
                        fields: data_item.fields,
                    });
                }
            }
        }

        Ok((updates, inserts))
    }

    /// Returns up to `top_k` entries ordered by descending cosine similarity.
    /// Equal scores are ordered by ascending insertion position.
    pub fn query(&self, query: &[Float], top_k: usize) -> Vec<ScoredData<'_>> {
        if self.storage.data.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let top_k = top_k.min(self.storage.data.len());
        let query_norm = normalize(query);
        let dim = self.storage.embedding_dim;

        let scores: Vec<Float> = self
            .storage
            .matrix
            .par_chunks_exact(dim)
            .map(|row| dot_product(row, &query_norm))
            .collect();

        let mut heap = BinaryHeap::with_capacity(top_k + 1);
        for (index, score) in scores.into_iter().enumerate() {
            heap.push(ScoredIndex { score, index });
            if heap.len() > top_k {
                heap.pop();
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|si| ScoredData {
                position: si.index,
                data: &self.storage.data[si.index],
                score: si.score,
            })
            .collect()
    }

    /// Normalized vector stored at `position`.
    pub fn vector(&self, position: usize) -> Option<&[Float]> {
        let dim = self.storage.embedding_dim;
        self.storage
            .matrix
            .get(position * dim..(position + 1) * dim)
    }

    pub fn data(&self) -> &[Data] {
        &self.storage.data
    }

    pub fn save(&self) -> Result<(), VectorDbError> {
        let serialized = serde_json::to_string_pretty(&self.storage)?;
        fs::write(&self.storage_file, serialized)?;
        Ok(())
    }

    pub fn get_additional_data(&self) -> &HashMap<String, serde_json::Value> {
        &self.storage.additional_data
    }

    pub fn store_additional_data(&mut self, data: HashMap<String, serde_json::Value>) {
        self.storage.additional_data = data;
    }

    pub fn embedding_dim(&self) -> usize {
        self.storage.embedding_dim
    }

    pub fn len(&self) -> usize {
        self.storage.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.data.is_empty()
    }
}

#[inline]
fn dot_product(vec1: &[Float], vec2: &[Float]) -> Float {
    vec1.iter().zip(vec2.iter()).map(|(a, b)| a * b).sum()
}

/// Normalize a vector to unit length. The zero vector stays zero.
pub fn normalize(vector: &[Float]) -> Vec<Float> {
    let norm_sq: Float = vector.iter().map(|&x| x * x).sum();
    if norm_sq == 0.0 {
        return vec![0.0; vector.len()];
    }
    let inv_norm = 1.0 / norm_sq.sqrt();
    vector.iter().map(|&x| x * inv_norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn item(id: &str, vector: Vec<Float>) -> Data {
        Data {
            id: id.to_string(),
            vector,
            fields: HashMap::new(),
        }
    }

    #[test]
    fn test_base64_deserialization_edge_cases() {
        let valid_db = DataBase {
            embedding_dim: 2,
            data: vec![item("test", vec![])],
            matrix: vec![1.0, 2.0],
            additional_data: HashMap::new(),
        };
        let serialized = serde_json::to_string(&valid_db).unwrap();
        let deserialized: DataBase = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.matrix, vec![1.0, 2.0]);

        let invalid_json = r#"{
            "embedding_dim": 2,
            "data": [{"__id__": "test"}],
            "matrix": "INVALID_BASE64!!"
        }"#;
        assert!(serde_json::from_str::<DataBase>(invalid_json).is_err());

        // Three bytes cannot hold an f32.
        let truncated = format!(
            r#"{{"embedding_dim": 1, "data": [], "matrix": "{}"}}"#,
            general_purpose::STANDARD.encode([0u8, 0, 0])
        );
        assert!(serde_json::from_str::<DataBase>(&truncated).is_err());
    }

    #[test]
    fn test_matrix_size_validation_on_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let corrupt = DataBase {
            embedding_dim: 2,
            data: vec![item("entry1", vec![])],
            matrix: vec![1.0],
            additional_data: HashMap::new(),
        };
        fs::write(temp_file.path(), serde_json::to_string(&corrupt).unwrap()).unwrap();

        let err = NanoVectorDB::load(temp_file.path()).unwrap_err();
        let err_msg = err.to_string();
        assert!(err_msg.contains("Matrix size mismatch"), "{}", err_msg);
        assert!(err_msg.contains("expected 2"), "{}", err_msg);
        assert!(err_msg.contains("got 1"), "{}", err_msg);
    }

    #[test]
    fn test_load_rejects_garbage_and_missing_files() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "not json").unwrap();
        assert!(matches!(
            NanoVectorDB::load(temp_file.path()),
            Err(VectorDbError::Json(_))
        ));
        assert!(matches!(
            NanoVectorDB::load("definitely/not/here.json"),
            Err(VectorDbError::Io(_))
        ));
    }

    #[test]
    fn test_create_rejects_zero_dimension() {
        assert!(matches!(
            NanoVectorDB::create(0, "unused.json"),
            Err(VectorDbError::ZeroDimension)
        ));
    }

    #[test]
    fn test_scored_index_ordering() {
        let mut heap = BinaryHeap::new();
        heap.push(ScoredIndex { score: 0.8, index: 0 });
        heap.push(ScoredIndex { score: 0.9, index: 1 });
        heap.push(ScoredIndex { score: 0.7, index: 2 });
        heap.push(ScoredIndex { score: 1.0, index: 3 });
        while heap.len() > 2 {
            heap.pop();
        }
        let sorted_k = heap.into_sorted_vec();
        assert_eq!(sorted_k.len(), 2);
        assert_eq!(sorted_k[0].score, 1.0);
        assert_eq!(sorted_k[1].score, 0.9);

        // NaN is worse than any number, so it is popped first.
        let nan_score = ScoredIndex { score: Float::NAN, index: 0 };
        let regular_score = ScoredIndex { score: 0.5, index: 1 };
        assert_eq!(nan_score.cmp(&regular_score), Ordering::Greater);
        assert_eq!(regular_score.cmp(&nan_score), Ordering::Less);
    }

    #[test]
    fn test_equal_scores_keep_lowest_positions() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut db = NanoVectorDB::create(2, temp_file.path()).unwrap();
        let items = (0..6).map(|i| item(&i.to_string(), vec![1.0, 1.0])).collect();
        db.upsert(items).unwrap();

        let positions: Vec<usize> = db.query(&[1.0, 1.0], 3).iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_upsert_and_query() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let mut db = NanoVectorDB::create(3, temp_file.path())?;

        let samples1 = vec![
            Data { id: "vec1".into(), vector: vec![1.0, 2.0, 3.0], fields: [("color".into(), serde_json::json!("red"))].into() },
            Data { id: "vec2".into(), vector: vec![-4.0, 5.0, 6.0], fields: [("color".into(), serde_json::json!("blue"))].into() },
        ];
        let (_, inserted1) = db.upsert(samples1)?;
        assert_eq!(inserted1.len(), 2);

        let samples2 = vec![
            Data { id: "vec1".into(), vector: vec![1.1, 2.1, 3.1], fields: [("color".into(), serde_json::json!("dark red"))].into() },
            Data { id: "vec3".into(), vector: vec![7.0, 8.0, -9.0], fields: [("color".into(), serde_json::json!("green"))].into() },
        ];
        let (updated2, inserted2) = db.upsert(samples2)?;
        assert_eq!(updated2, vec!["vec1".to_string()]);
        assert_eq!(inserted2, vec!["vec3".to_string()]);
        assert_eq!(db.len(), 3);

        let results = db.query(&[1.0, 2.0, 3.0], 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].data.id, "vec1");
        assert_eq!(results[0].data.fields["color"], "dark red");
        assert!(results[0].score > 0.95);
        Ok(())
    }

    #[test]
    fn test_upsert_rejects_wrong_dimension() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut db = NanoVectorDB::create(3, temp_file.path()).unwrap();
        let err = db.upsert(vec![item("short", vec![1.0])]).unwrap_err();
        assert!(matches!(
            err,
            VectorDbError::VectorDimensionMismatch { expected: 3, got: 1, .. }
        ));
        assert!(db.is_empty());
    }

    #[test]
    fn test_query_limits() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut db = NanoVectorDB::create(2, temp_file.path()).unwrap();
        assert!(db.query(&[1.0, 0.0], 5).is_empty());

        db.upsert(vec![item("a", vec![1.0, 0.0]), item("b", vec![0.0, 1.0])]).unwrap();
        assert_eq!(db.query(&[1.0, 0.0], 5).len(), 2);
        assert!(db.query(&[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn test_oversized_top_k_returns_every_row() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut db = NanoVectorDB::create(2, temp_file.path()).unwrap();
        db.upsert(vec![
            item("a", vec![1.0, 0.0]),
            item("b", vec![0.0, 1.0]),
            item("c", vec![1.0, 1.0]),
        ])
        .unwrap();

        let positions: Vec<usize> = db.query(&[1.0, 0.0], usize::MAX).iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 2, 1]);
        assert_eq!(db.query(&[1.0, 0.0], 1 << 40).len(), 3);
    }

    #[test]
    fn test_save_then_load_keeps_vectors_fields_and_metadata() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let mut db = NanoVectorDB::create(2, temp_file.path())?;
        db.upsert(vec![Data {
            id: "0".into(),
            vector: vec![3.0, 4.0],
            fields: [("food_entity".into(), serde_json::json!("oats"))].into(),
        }])?;
        db.store_additional_data([("rows".into(), serde_json::json!(1))].into());
        db.save()?;

        let loaded = NanoVectorDB::load(temp_file.path())?;
        assert_eq!(loaded.embedding_dim(), 2);
        assert_eq!(loaded.len(), 1);
        let stored = loaded.vector(0).unwrap();
        assert!((stored[0] - 0.6).abs() < 1e-6);
        assert!((stored[1] - 0.8).abs() < 1e-6);
        assert!(loaded.vector(1).is_none());
        assert_eq!(loaded.data()[0].fields["food_entity"], "oats");
        assert_eq!(loaded.get_additional_data()["rows"], 1);
        Ok(())
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_normalize_non_zero_vector() {
        let normalized = normalize(&[3.0, 4.0]);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }
}
