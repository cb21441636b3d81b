use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

use crate::search::ann_engine::AnnEngine;
use crate::search::data_loader::load_food_dataset;
use crate::search::embedding_engine::Embedder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub rows: usize,
    pub dimension: usize,
    pub zero_vectors: usize,
    pub duplicate_vectors: usize,
}

#[derive(Debug, Default)]
struct EmbeddingReport {
    wrong_dimension: Vec<usize>,
    non_finite: Vec<usize>,
    zero_vectors: usize,
    duplicate_vectors: usize,
}

fn inspect_embeddings(embeddings: &[Vec<f32>], dimension: usize) -> EmbeddingReport {
    let mut report = EmbeddingReport::default();
    let mut seen = HashSet::with_capacity(embeddings.len());

    for (row, emb) in embeddings.iter().enumerate() {
        if emb.len() != dimension {
            tracing::error!(row, got = emb.len(), expected = dimension, "Embedding has incorrect dimension");
            report.wrong_dimension.push(row);
        }
        if emb.iter().any(|v| !v.is_finite()) {
            tracing::error!(row, "Embedding contains NaN or Infinity");
            report.non_finite.push(row);
        }
        if emb.iter().all(|&v| v == 0.0) {
            tracing::warn!(row, "Embedding is an all-zero vector");
            report.zero_vectors += 1;
        }
        let bits: Vec<u32> = emb.iter().map(|v| v.to_bits()).collect();
        if !seen.insert(bits) {
            report.duplicate_vectors += 1;
        }
    }
    report
}

/// Embeds every dataset row and writes the vector index, replacing any existing file.
/// Row `i` of the dataset becomes index entry `"i"`.
pub fn build_index<E: Embedder>(dataset_path: &Path, index_path: &Path, embedder: &E) -> Result<BuildSummary> {
    let records = load_food_dataset(dataset_path)
        .with_context(|| format!("Failed to load dataset from {:?}", dataset_path))?;
    tracing::info!(rows = records.len(), "Loaded dataset");

    let texts: Vec<String> = records.iter().map(|r| r.index_text()).collect();
    let food_entities: Vec<String> = records.iter().map(|r| r.food_entity.clone()).collect();

    tracing::info!(count = texts.len(), model = embedder.model_id(), "Generating embeddings");
    let embeddings = embedder
        .embed(&texts)
        .context("Failed to generate embeddings for dataset rows")?;
    if embeddings.len() != texts.len() {
        anyhow::bail!(
            "Embedding model returned {} vectors for {} rows",
            embeddings.len(),
            texts.len()
        );
    }

    let dimension = embedder.dimension();
    let report = inspect_embeddings(&embeddings, dimension);
    if !report.wrong_dimension.is_empty() {
        anyhow::bail!(
            "{} embeddings had an incorrect dimension (first at row {}). Cannot proceed.",
            report.wrong_dimension.len(),
            report.wrong_dimension[0]
        );
    }
    if !report.non_finite.is_empty() {
        anyhow::bail!(
            "{} embeddings contained NaN or Infinity (first at row {}). Cannot proceed.",
            report.non_finite.len(),
            report.non_finite[0]
        );
    }
    if report.duplicate_vectors > 0 {
        tracing::warn!(
            duplicates = report.duplicate_vectors,
            total = embeddings.len(),
            "Duplicate embeddings found; their rows will tie on every query"
        );
    }

    let mut index = AnnEngine::create(index_path, dimension)?;
    index.add_items_batch(&embeddings, &food_entities)?;
    index.set_metadata(embedder.model_id());
    index.save()?;
    tracing::info!(path = ?index_path, entries = index.item_count(), dimension, "Index written");

    Ok(BuildSummary {
        rows: index.item_count(),
        dimension,
        zero_vectors: report.zero_vectors,
        duplicate_vectors: report.duplicate_vectors,
    })
}
