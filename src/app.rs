use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{BufRead, Write};

use crate::config::AppConfig;
use crate::reasoning::{Explanation, ReasoningClient};
use crate::recommendation_filter::{partition_by_label, RecommendationResult};
use crate::search::embedding_engine::{Embedder, EmbeddingEngine};
use crate::search::retriever::Retriever;

/// Everything a lookup needs, loaded once and passed to each command.
pub struct AppState<E: Embedder> {
    pub retriever: Retriever<E>,
    pub reasoning: ReasoningClient,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationReport {
    pub disease: String,
    pub k: usize,
    #[serde(flatten)]
    pub recommendations: RecommendationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

impl AppState<EmbeddingEngine> {
    pub fn load(config: &AppConfig) -> Result<Self> {
        let embedder = EmbeddingEngine::new(&config.embedding_model)
            .with_context(|| format!("Failed to load embedding model '{}'", config.embedding_model))?;
        let retriever = Retriever::load(&config.dataset_path, &config.index_path, embedder)
            .with_context(|| {
                format!(
                    "Failed to load precomputed data ({:?}, {:?})",
                    config.dataset_path, config.index_path
                )
            })?;
        Ok(Self {
            retriever,
            reasoning: ReasoningClient::new(config.provider.clone(), config.chat_model.clone()),
        })
    }
}

impl<E: Embedder> AppState<E> {
    pub fn new(retriever: Retriever<E>, reasoning: ReasoningClient) -> Self {
        Self { retriever, reasoning }
    }

    pub async fn recommend(&self, disease: &str, k: usize, with_reasoning: bool) -> Result<RecommendationReport> {
        let neighbors = self.retriever.retrieve(disease, k)?;
        let recommendations = partition_by_label(neighbors.iter().map(|n| n.entry));

        let explanation = if with_reasoning {
            Some(self.reasoning.explain(disease, &recommendations).await)
        } else {
            None
        };

        Ok(RecommendationReport {
            disease: disease.to_string(),
            k,
            recommendations,
            explanation,
        })
    }

    /// Answers one disease per input line until a blank line or EOF.
    pub async fn run_interactive<R: BufRead, W: Write>(
        &self,
        input: R,
        mut output: W,
        k: usize,
        with_reasoning: bool,
    ) -> Result<usize> {
        let mut answered = 0;
        let mut lines = input.lines();
        loop {
            write!(output, "disease> ")?;
            output.flush()?;
            let line = match lines.next() {
                Some(line) => line?,
                None => break,
            };
            let disease = line.trim();
            if disease.is_empty() {
                break;
            }
            let report = self.recommend(disease, k, with_reasoning).await?;
            writeln!(output, "{}", render_report(&report))?;
            answered += 1;
        }
        Ok(answered)
    }
}

fn push_list(out: &mut String, foods: &[String]) {
    if foods.is_empty() {
        out.push_str("  (none)\n");
    }
    for food in foods {
        out.push_str(&format!("  - {}\n", food));
    }
}

pub fn render_report(report: &RecommendationReport) -> String {
    let mut out = format!("Recommendations for {}:\n\nFoods to Eat\n", report.disease);
    push_list(&mut out, &report.recommendations.recommend);
    out.push_str("\nFoods to Avoid\n");
    push_list(&mut out, &report.recommendations.avoid);

    if let Some(explanation) = &report.explanation {
        out.push_str(&format!(
            "\nReasoning\n{}\n\nSummary and Recommendations\n{}\n",
            explanation.reasoning, explanation.summary
        ));
    }
    out
}
