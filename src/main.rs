use anyhow::{Context, Result};
use nutri_lookup::app::{render_report, AppState};
use nutri_lookup::cli::{parse_args, Command};
use nutri_lookup::config::{init_logging, AppConfig};
use nutri_lookup::index_builder::build_index;
use nutri_lookup::search::EmbeddingEngine;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Load .env file for API keys

    let cli_args = parse_args();
    init_logging(cli_args.verbose);
    let config = AppConfig::from_cli(&cli_args);

    match cli_args.command {
        Command::BuildIndex => {
            let embedder = EmbeddingEngine::new(&config.embedding_model)
                .with_context(|| format!("Failed to load embedding model '{}'", config.embedding_model))?;
            let summary = build_index(&config.dataset_path, &config.index_path, &embedder)?;
            println!(
                "Indexed {} rows ({} dimensions) into {}",
                summary.rows,
                summary.dimension,
                config.index_path.display()
            );
            if summary.zero_vectors > 0 || summary.duplicate_vectors > 0 {
                println!(
                    "Warnings: {} all-zero vectors, {} duplicate vectors",
                    summary.zero_vectors, summary.duplicate_vectors
                );
            }
        }
        Command::Recommend {
            disease,
            k,
            no_reasoning,
            json,
        } => {
            let state = AppState::load(&config)?;
            let report = state.recommend(&disease, k, !no_reasoning).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render_report(&report));
            }
        }
        Command::Interactive { k, no_reasoning } => {
            let state = AppState::load(&config)?;
            let stdin = std::io::stdin();
            let answered = state
                .run_interactive(stdin.lock(), std::io::stdout(), k, !no_reasoning)
                .await?;
            tracing::info!(answered, "Interactive session finished");
        }
    }

    Ok(())
}
