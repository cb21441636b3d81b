use anyhow::Result;
use model2vec_rs::model::StaticModel;

pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "minishlab/potion-base-32M";

const DIMENSION_PROBE: &str = "dimension probe";

/// Turns text into fixed-length vectors.
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model, recorded in built indexes.
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Failed to generate embedding for single text: {}", text))
    }
}

/// Static (model2vec) embedding model loaded from the Hugging Face hub or a local path.
pub struct EmbeddingEngine {
    model: StaticModel,
    model_id: String,
    dimension: usize,
}

impl EmbeddingEngine {
    pub fn new(model_id: &str) -> Result<Self> {
        tracing::info!(model = model_id, "Loading embedding model");
        let model = StaticModel::from_pretrained(model_id, None, None, None)?;
        // The model does not expose its output size; measure it once.
        let dimension = model
            .encode(&[DIMENSION_PROBE.to_string()])
            .first()
            .map(Vec::len)
            .ok_or_else(|| anyhow::anyhow!("Embedding model '{}' produced no output", model_id))?;
        tracing::debug!(model = model_id, dimension, "Embedding model ready");
        Ok(Self {
            model,
            model_id: model_id.to_string(),
            dimension,
        })
    }
}

impl Embedder for EmbeddingEngine {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(self.model.encode(texts))
    }
}
