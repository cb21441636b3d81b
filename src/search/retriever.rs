use anyhow::{Context, Result};
use std::path::Path;

use crate::error::LoadError;
use crate::food::{FoodEntry, FoodRecord};
use crate::search::ann_engine::AnnEngine;
use crate::search::data_loader::load_food_dataset;
use crate::search::embedding_engine::Embedder;

/// A retrieved dataset entry and its cosine similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub entry: &'a FoodEntry,
    pub score: f32,
}

/// Finds the food entries nearest to a disease name, over a read-only dataset and index.
///
/// Loaded once and queried many times; all query methods take `&self`, so a
/// `Retriever` can be shared across threads once built.
///
/// Results are ordered by descending similarity. Equal similarities are ordered
/// by ascending dataset row, which makes every query fully deterministic.
pub struct Retriever<E: Embedder> {
    embedder: E,
    index: AnnEngine,
    entries: Vec<FoodEntry>,
}

impl<E: Embedder> Retriever<E> {
    /// Loads the dataset and its prebuilt index and checks they describe the same rows.
    pub fn load(dataset_path: &Path, index_path: &Path, embedder: E) -> Result<Self, LoadError> {
        let records = load_food_dataset(dataset_path)?;
        let index = AnnEngine::open(index_path)?;
        Self::from_parts(records, index, embedder)
    }

    pub fn from_parts(records: Vec<FoodRecord>, index: AnnEngine, embedder: E) -> Result<Self, LoadError> {
        if index.dimension() != embedder.dimension() {
            return Err(LoadError::DimensionMismatch {
                index: index.dimension(),
                model: embedder.dimension(),
            });
        }
        if records.len() != index.item_count() {
            return Err(LoadError::RowCountMismatch {
                dataset_rows: records.len(),
                index_rows: index.item_count(),
            });
        }
        if let Some(model) = index.embedding_model() {
            if model != embedder.model_id() {
                tracing::warn!(
                    index_model = model,
                    query_model = embedder.model_id(),
                    "Index was built with a different embedding model; similarities may be meaningless"
                );
            }
        }

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            if let Some(indexed) = index.stored_food_entity(record.row) {
                if indexed != record.food_entity {
                    return Err(LoadError::EntityMismatch {
                        row: record.row,
                        indexed: indexed.to_string(),
                        dataset: record.food_entity,
                    });
                }
            }
            let embedding = index
                .vector(record.row)
                .map(<[f32]>::to_vec)
                .ok_or(LoadError::RowCountMismatch {
                    dataset_rows: record.row + 1,
                    index_rows: index.item_count(),
                })?;
            entries.push(FoodEntry::new(record, embedding));
        }

        tracing::info!(
            rows = entries.len(),
            dimension = index.dimension(),
            "Retriever ready"
        );
        Ok(Self {
            embedder,
            index,
            entries,
        })
    }

    /// Encodes a disease name. A blank name maps to the all-zero vector without
    /// calling the model; every row then scores 0 and the first rows win the tie-break.
    pub fn embed_query(&self, disease: &str) -> Result<Vec<f32>> {
        let disease = disease.trim();
        if disease.is_empty() {
            tracing::debug!("Blank disease name; using the zero vector");
            return Ok(vec![0.0; self.index.dimension()]);
        }
        let embedding = self
            .embedder
            .embed_one(disease)
            .with_context(|| format!("Failed to generate embedding for disease: {}", disease))?;
        if embedding.len() != self.index.dimension() {
            anyhow::bail!(
                "Query embedding has dimension {}, index expects {}",
                embedding.len(),
                self.index.dimension()
            );
        }
        Ok(embedding)
    }

    /// The `k` entries nearest to `disease` (fewer when the index holds fewer rows).
    pub fn retrieve(&self, disease: &str, k: usize) -> Result<Vec<Neighbor<'_>>> {
        let query = self.embed_query(disease)?;
        let hits = self.index.search(&query, k)?;
        let neighbors = hits
            .into_iter()
            .map(|hit| {
                self.entries
                    .get(hit.row)
                    .map(|entry| Neighbor {
                        entry,
                        score: hit.score,
                    })
                    .ok_or_else(|| anyhow::anyhow!("Index returned unknown row {}", hit.row))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(disease, k, found = neighbors.len(), "Retrieved neighbors");
        Ok(neighbors)
    }

    pub fn entries(&self) -> &[FoodEntry] {
        &self.entries
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::food::Label;
    use crate::test_support::TableEmbedder;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(row: usize, food: &str, label: Label) -> FoodRecord {
        FoodRecord {
            row,
            food_entity: food.to_string(),
            disease_entity: None,
            label,
        }
    }

    /// Eight rows on the unit circle of a 2-D space, each at a distinct angle.
    fn fixture(dir: &TempDir) -> (Vec<FoodRecord>, AnnEngine) {
        let foods = [
            ("oats", Label::Recommend, [1.0, 0.0]),
            ("sugar", Label::Avoid, [0.95, 0.31]),
            ("lentils", Label::Recommend, [0.81, 0.59]),
            ("soda", Label::Avoid, [0.59, 0.81]),
            ("spinach", Label::Recommend, [0.31, 0.95]),
            ("white rice", Label::Avoid, [0.0, 1.0]),
            ("broccoli", Label::Recommend, [-0.5, 0.87]),
            ("candy", Label::Avoid, [-1.0, 0.0]),
        ];
        let records: Vec<FoodRecord> = foods
            .iter()
            .enumerate()
            .map(|(row, (food, label, _))| record(row, food, *label))
            .collect();
        let embeddings: Vec<Vec<f32>> = foods.iter().map(|(_, _, v)| v.to_vec()).collect();
        let names: Vec<String> = foods.iter().map(|(f, _, _)| f.to_string()).collect();

        let mut index = AnnEngine::create(&dir.path().join("index.json"), 2).unwrap();
        index.add_items_batch(&embeddings, &names).unwrap();
        (records, index)
    }

    fn embedder() -> TableEmbedder {
        TableEmbedder::new(2)
            .with("diabetes", vec![1.0, 0.0])
            .with("anemia", vec![0.0, 1.0])
    }

    fn names(neighbors: &[Neighbor<'_>]) -> Vec<String> {
        neighbors.iter().map(|n| n.entry.food_entity.clone()).collect()
    }

    #[test]
    fn test_retrieve_returns_exactly_k_nearest() -> Result<()> {
        let dir = TempDir::new()?;
        let (records, index) = fixture(&dir);
        let retriever = Retriever::from_parts(records, index, embedder())?;

        let neighbors = retriever.retrieve("diabetes", 5)?;
        assert_eq!(neighbors.len(), 5);
        assert_eq!(names(&neighbors), vec!["oats", "sugar", "lentils", "soda", "spinach"]);
        assert!(neighbors.windows(2).all(|w| w[0].score >= w[1].score));

        let anemia = retriever.retrieve("anemia", 2)?;
        assert_eq!(names(&anemia), vec!["white rice", "spinach"]);
        Ok(())
    }

    #[test]
    fn test_retrieve_caps_at_index_size() -> Result<()> {
        let dir = TempDir::new()?;
        let (records, index) = fixture(&dir);
        let retriever = Retriever::from_parts(records, index, embedder())?;
        assert_eq!(retriever.retrieve("diabetes", 50)?.len(), 8);
        assert!(retriever.retrieve("diabetes", 0)?.is_empty());
        assert_eq!(retriever.retrieve("diabetes", usize::MAX)?.len(), 8);
        Ok(())
    }

    #[test]
    fn test_different_embedding_model_still_loads() -> Result<()> {
        let dir = TempDir::new()?;
        let (records, mut index) = fixture(&dir);
        index.set_metadata("some-other-model");
        assert_eq!(index.embedding_model(), Some("some-other-model"));

        let retriever = Retriever::from_parts(records, index, embedder())?;
        assert_eq!(retriever.len(), 8);
        assert_eq!(names(&retriever.retrieve("diabetes", 1)?), vec!["oats"]);
        Ok(())
    }

    #[test]
    fn test_same_query_same_neighbors() -> Result<()> {
        let dir = TempDir::new()?;
        let (records, index) = fixture(&dir);
        let retriever = Retriever::from_parts(records, index, embedder())?;

        let first = names(&retriever.retrieve("diabetes", 4)?);
        let second = names(&retriever.retrieve("diabetes", 4)?);
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_blank_query_returns_first_rows() -> Result<()> {
        let dir = TempDir::new()?;
        let (records, index) = fixture(&dir);
        let retriever = Retriever::from_parts(records, index, embedder())?;

        assert_eq!(retriever.embed_query("   ")?, vec![0.0, 0.0]);
        let neighbors = retriever.retrieve("", 3)?;
        let rows: Vec<usize> = neighbors.iter().map(|n| n.entry.row).collect();
        assert_eq!(rows, vec![0, 1, 2]);
        assert!(neighbors.iter().all(|n| n.score == 0.0));
        assert_eq!(retriever.embedder().calls(), 0);
        Ok(())
    }

    #[test]
    fn test_equal_scores_break_ties_by_row() -> Result<()> {
        let dir = TempDir::new()?;
        let records = (0..4).map(|i| record(i, &format!("food {}", i), Label::Avoid)).collect();
        let mut index = AnnEngine::create(&dir.path().join("index.json"), 2)?;
        let same = vec![vec![0.0, 1.0]; 4];
        let names: Vec<String> = (0..4).map(|i| format!("food {}", i)).collect();
        index.add_items_batch(&same, &names)?;

        let retriever = Retriever::from_parts(records, index, embedder())?;
        let rows: Vec<usize> = retriever.retrieve("anemia", 2)?.iter().map(|n| n.entry.row).collect();
        assert_eq!(rows, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn test_entries_carry_normalized_embeddings() -> Result<()> {
        let dir = TempDir::new()?;
        let mut index = AnnEngine::create(&dir.path().join("index.json"), 2)?;
        index.add_items_batch(&[vec![3.0, 4.0]], &["oats".to_string()])?;
        let retriever = Retriever::from_parts(vec![record(0, "oats", Label::Recommend)], index, embedder())?;

        let embedding = &retriever.entries()[0].embedding;
        assert!((embedding[0] - 0.6).abs() < 1e-6);
        assert!((embedding[1] - 0.8).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_concurrent_reads() -> Result<()> {
        let dir = TempDir::new()?;
        let (records, index) = fixture(&dir);
        let retriever = Arc::new(Retriever::from_parts(records, index, embedder())?);
        let expected = names(&retriever.retrieve("diabetes", 3)?);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let retriever = Arc::clone(&retriever);
                std::thread::spawn(move || names(&retriever.retrieve("diabetes", 3).unwrap()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let (records, index) = fixture(&dir);
        let result = Retriever::from_parts(records, index, TableEmbedder::new(3));
        assert!(matches!(
            result,
            Err(LoadError::DimensionMismatch { index: 2, model: 3 })
        ));
    }

    #[test]
    fn test_row_count_mismatch_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let (mut records, index) = fixture(&dir);
        records.pop();
        let result = Retriever::from_parts(records, index, embedder());
        assert!(matches!(
            result,
            Err(LoadError::RowCountMismatch { dataset_rows: 7, index_rows: 8 })
        ));
    }

    #[test]
    fn test_entity_mismatch_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let (mut records, index) = fixture(&dir);
        records[3].food_entity = "water".to_string();
        match Retriever::from_parts(records, index, embedder()) {
            Err(LoadError::EntityMismatch { row, indexed, dataset }) => {
                assert_eq!(row, 3);
                assert_eq!(indexed, "soda");
                assert_eq!(dataset, "water");
            }
            other => panic!("expected EntityMismatch, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_load_fails_fast_on_missing_artifacts() {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("missing.csv");
        let index = dir.path().join("missing.json");
        assert!(matches!(
            Retriever::load(&dataset, &index, embedder()),
            Err(LoadError::DatasetNotFound(_))
        ));

        std::fs::write(&dataset, "food_entity,label\noats,1\n").unwrap();
        assert!(matches!(
            Retriever::load(&dataset, &index, embedder()),
            Err(LoadError::IndexNotFound(_))
        ));
    }
}
