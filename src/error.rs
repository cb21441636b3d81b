use std::path::PathBuf;
use thiserror::Error;

use crate::search::nano_vector_db::VectorDbError;

/// Fatal startup failures: the precomputed dataset or index is absent, corrupt,
/// or the two do not describe the same rows.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Dataset file not found at: {0:?}")]
    DatasetNotFound(PathBuf),

    #[error("Failed to read dataset {path:?}")]
    Dataset {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Column '{0}' not found in dataset")]
    MissingColumn(&'static str),

    #[error("Invalid label '{value}' at row {row}: expected 1 or -1")]
    InvalidLabel { row: usize, value: String },

    #[error("Empty food_entity at row {0}")]
    EmptyFoodEntity(usize),

    #[error("No rows loaded from dataset {0:?}")]
    EmptyDataset(PathBuf),

    #[error("Index file not found at: {0:?}")]
    IndexNotFound(PathBuf),

    #[error("Failed to load index {path:?}")]
    Index {
        path: PathBuf,
        #[source]
        source: VectorDbError,
    },

    #[error("Index entry at position {position} has id '{id}', expected '{position}'")]
    MisalignedIndex { position: usize, id: String },

    #[error("Index entry {row} was built from '{indexed}' but the dataset row is '{dataset}'")]
    EntityMismatch {
        row: usize,
        indexed: String,
        dataset: String,
    },

    #[error("Dataset has {dataset_rows} rows but index has {index_rows} entries")]
    RowCountMismatch {
        dataset_rows: usize,
        index_rows: usize,
    },

    #[error("Index dimension {index} does not match embedding model dimension {model}")]
    DimensionMismatch { index: usize, model: usize },
}
