pub mod ann_engine;
pub mod data_loader;
pub mod embedding_engine;
pub mod nano_vector_db;
pub mod retriever;

pub use ann_engine::{AnnEngine, AnnHit};
pub use data_loader::load_food_dataset;
pub use embedding_engine::{Embedder, EmbeddingEngine, DEFAULT_EMBEDDING_MODEL_ID};
pub use nano_vector_db::{NanoVectorDB, VectorDbError};
pub use retriever::{Neighbor, Retriever};
