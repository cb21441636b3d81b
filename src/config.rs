use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::api_connection::endpoints::{Provider, GROQ_API_KEY_ENV_VAR, OPENROUTER_API_KEY_ENV_VAR};
use crate::cli::{Cli, ProviderKind};

/// Settings shared by every command, resolved from flags and the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub dataset_path: PathBuf,
    pub index_path: PathBuf,
    pub embedding_model: String,
    pub provider: Provider,
    pub chat_model: String,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let provider = match cli.provider {
            ProviderKind::Groq => Provider::groq(GROQ_API_KEY_ENV_VAR),
            ProviderKind::OpenRouter => Provider::openrouter(OPENROUTER_API_KEY_ENV_VAR),
        };
        let provider = match &cli.api_key_env {
            Some(var) => provider.with_api_key_env_var(var),
            None => provider,
        };
        let chat_model = cli
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());

        Self {
            dataset_path: cli.dataset.clone(),
            index_path: cli.index.clone(),
            embedding_model: cli.embedding_model.clone(),
            provider,
            chat_model,
        }
    }
}

/// `RUST_LOG` wins; otherwise `-v` raises the level from warn to info to debug.
pub fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
