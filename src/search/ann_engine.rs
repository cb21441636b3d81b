use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::LoadError;
use crate::search::nano_vector_db::{Data as NanoDBData, NanoVectorDB};

/// Field stored with every vector so an index can be checked against its dataset.
pub const FOOD_ENTITY_FIELD: &str = "food_entity";
const META_EMBEDDING_MODEL: &str = "embedding_model";
const META_ROWS: &str = "rows";

/// A nearest-neighbor hit, addressed by dataset row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnHit {
    pub row: usize,
    pub score: f32,
}

/// Row-keyed wrapper over the vector store: the entry at position `i` always has id `"i"`.
pub struct AnnEngine {
    db: NanoVectorDB,
    path: PathBuf,
}

impl AnnEngine {
    /// Starts a new, empty index that `save` will write to `path`.
    pub fn create(path: &Path, dimension: usize) -> Result<Self> {
        let db = NanoVectorDB::create(dimension, path)
            .with_context(|| format!("Failed to create vector index at {:?}", path))?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Opens a prebuilt index and checks that its ids are the row numbers in order.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::IndexNotFound(path.to_path_buf()));
        }
        let db = NanoVectorDB::load(path).map_err(|source| LoadError::Index {
            path: path.to_path_buf(),
            source,
        })?;

        for (position, data) in db.data().iter().enumerate() {
            if data.id.parse::<usize>().ok() != Some(position) {
                return Err(LoadError::MisalignedIndex {
                    position,
                    id: data.id.clone(),
                });
            }
        }

        tracing::debug!(
            path = ?path,
            entries = db.len(),
            dimension = db.embedding_dim(),
            "Opened vector index"
        );
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Appends one vector per dataset row. `food_entities[i]` is stored next to `embeddings[i]`.
    pub fn add_items_batch(&mut self, embeddings: &[Vec<f32>], food_entities: &[String]) -> Result<()> {
        if embeddings.len() != food_entities.len() {
            return Err(anyhow::anyhow!(
                "Embeddings and food entities count mismatch: {} vs {}",
                embeddings.len(),
                food_entities.len()
            ));
        }

        let first_row = self.db.len();
        let items: Vec<NanoDBData> = embeddings
            .iter()
            .zip(food_entities)
            .enumerate()
            .map(|(offset, (embedding, food_entity))| NanoDBData {
                id: (first_row + offset).to_string(),
                vector: embedding.clone(),
                fields: HashMap::from([(
                    FOOD_ENTITY_FIELD.to_string(),
                    serde_json::Value::String(food_entity.clone()),
                )]),
            })
            .collect();

        if !items.is_empty() {
            self.db
                .upsert(items)
                .context("Failed to add embeddings to the vector index")?;
        }
        Ok(())
    }

    pub fn set_metadata(&mut self, embedding_model: &str) {
        let rows = self.db.len();
        self.db.store_additional_data(HashMap::from([
            (META_EMBEDDING_MODEL.to_string(), serde_json::json!(embedding_model)),
            (META_ROWS.to_string(), serde_json::json!(rows)),
        ]));
    }

    /// Embedding model recorded by the builder, if any.
    pub fn embedding_model(&self) -> Option<&str> {
        self.db
            .get_additional_data()
            .get(META_EMBEDDING_MODEL)
            .and_then(|v| v.as_str())
    }

    pub fn save(&self) -> Result<()> {
        self.db
            .save()
            .with_context(|| format!("Failed to save vector index to {:?}", self.path))
    }

    /// The `k` rows most similar to `query_embedding`, best first, ties by ascending row.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<AnnHit>> {
        if query_embedding.len() != self.dimension() {
            anyhow::bail!(
                "Search query embedding dimension mismatch. Expected {}, got {}.",
                self.dimension(),
                query_embedding.len()
            );
        }

        // Position equals row for every index that passed `open` or was built here.
        Ok(self
            .db
            .query(query_embedding, k)
            .into_iter()
            .map(|hit| AnnHit {
                row: hit.position,
                score: hit.score,
            })
            .collect())
    }

    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        self.db.vector(row)
    }

    /// Food entity stored next to `row` by the builder.
    pub fn stored_food_entity(&self, row: usize) -> Option<&str> {
        self.db
            .data()
            .get(row)
            .and_then(|d| d.fields.get(FOOD_ENTITY_FIELD))
            .and_then(|v| v.as_str())
    }

    pub fn dimension(&self) -> usize {
        self.db.embedding_dim()
    }

    pub fn item_count(&self) -> usize {
        self.db.len()
    }
}
