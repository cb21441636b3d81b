//! Deterministic embedder for unit tests.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::search::embedding_engine::Embedder;

/// Returns a fixed vector for known texts and a byte-histogram vector for anything else.
pub struct TableEmbedder {
    dimension: usize,
    table: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl TableEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            table: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension);
        self.table.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.table.get(text) {
            return v.clone();
        }
        let mut v = vec![0.0; self.dimension];
        for byte in text.bytes() {
            v[byte as usize % self.dimension] += 1.0;
        }
        v
    }
}

impl Embedder for TableEmbedder {
    fn model_id(&self) -> &str {
        "table-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}
