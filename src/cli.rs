use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::search::embedding_engine::DEFAULT_EMBEDDING_MODEL_ID;

pub const DEFAULT_DATASET_PATH: &str = "preprocessed_data.csv";
pub const DEFAULT_INDEX_PATH: &str = "food_disease_index.json";
pub const DEFAULT_K: usize = 5;
pub const MAX_K: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    Groq,
    #[value(name = "openrouter")]
    OpenRouter,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Disease-to-food recommendation lookup", long_about = None)]
pub struct Cli {
    /// Food/disease dataset (CSV with food_entity and label columns)
    #[arg(long, global = true, default_value = DEFAULT_DATASET_PATH)]
    pub dataset: PathBuf,

    /// Vector index built from the dataset
    #[arg(long, global = true, default_value = DEFAULT_INDEX_PATH)]
    pub index: PathBuf,

    /// Chat-completion service used for explanations
    #[arg(long, global = true, value_enum, default_value_t = ProviderKind::Groq)]
    pub provider: ProviderKind,

    /// Chat model id (defaults to the provider's first listed model)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Environment variable holding the API key (defaults per provider)
    #[arg(long, global = true)]
    pub api_key_env: Option<String>,

    /// model2vec embedding model (hub id or local path)
    #[arg(long, global = true, default_value = DEFAULT_EMBEDDING_MODEL_ID)]
    pub embedding_model: String,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recommend foods to eat and avoid for one disease
    Recommend {
        /// Disease name, e.g. "diabetes"
        #[arg(short, long)]
        disease: String,

        /// Number of neighbors to retrieve (1-10)
        #[arg(short, default_value_t = DEFAULT_K, value_parser = parse_k)]
        k: usize,

        /// Skip the language-model explanation
        #[arg(long)]
        no_reasoning: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read one disease per line from stdin; a blank line or EOF exits
    Interactive {
        #[arg(short, default_value_t = DEFAULT_K, value_parser = parse_k)]
        k: usize,

        #[arg(long)]
        no_reasoning: bool,
    },
    /// Embed the dataset and write the vector index
    BuildIndex,
}

fn parse_k(s: &str) -> Result<usize, String> {
    let k: usize = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if (1..=MAX_K).contains(&k) {
        Ok(k)
    } else {
        Err(format!("k must be between 1 and {}", MAX_K))
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
