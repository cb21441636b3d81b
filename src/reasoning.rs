use serde::{Deserialize, Serialize};

use crate::api_connection::endpoints::{ChatCompletionRequest, ChatMessage, Provider};
use crate::recommendation_filter::RecommendationResult;

pub const NO_REASONING: &str = "No reasoning provided.";

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

const SYSTEM_PROMPT: &str = "You are a helpful, respectful and honest medical assistant. \
Always answer as helpfully as possible, while being safe. \
Your answers should not include any harmful, unethical, racist, sexist, toxic, dangerous, or illegal content. \
Please ensure that your responses are socially unbiased and positive in nature. If a question does not make any sense, or is not factually coherent, explain why instead of answering something not correct. \
If you don't know the answer to a question, please don't share false information.";

const TEMPERATURE: f32 = 0.6;
const MAX_TOKENS: u32 = 4096;
const TOP_P: f32 = 0.95;

/// Free-text rationale for a recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub reasoning: String,
    pub summary: String,
}

impl Explanation {
    fn unavailable(cause: &str) -> Self {
        Self {
            reasoning: NO_REASONING.to_string(),
            summary: format!("Explanation unavailable: {}", cause),
        }
    }
}

/// `['a', 'b']`
fn format_food_list(foods: &[String]) -> String {
    let quoted: Vec<String> = foods.iter().map(|f| format!("'{}'", f)).collect();
    format!("[{}]", quoted.join(", "))
}

pub fn build_prompt(disease: &str, recommendations: &RecommendationResult) -> String {
    format!(
        "For a patient with {}, the system recommends eating {} and avoiding {}. \
Can you explain why these recommendations are made and provide additional medical advice? \
Please provide your reasoning inside <think> tags and the final summary/recommendations after the </think> tag.",
        disease,
        format_food_list(&recommendations.recommend),
        format_food_list(&recommendations.avoid)
    )
}

/// Separates `<think>...</think>` reasoning from the summary that follows it.
/// Without both tags the whole output becomes the summary.
pub fn split_reasoning(raw: &str) -> Explanation {
    let tagged = raw.find(THINK_OPEN).and_then(|open| {
        let inner_start = open + THINK_OPEN.len();
        raw[inner_start..]
            .find(THINK_CLOSE)
            .map(|close| (inner_start, inner_start + close))
    });

    match tagged {
        Some((inner_start, inner_end)) => Explanation {
            reasoning: raw[inner_start..inner_end].trim().to_string(),
            summary: raw[inner_end + THINK_CLOSE.len()..].trim().to_string(),
        },
        None => Explanation {
            reasoning: NO_REASONING.to_string(),
            summary: raw.trim().to_string(),
        },
    }
}

/// Asks a hosted chat model to justify a recommendation. Never fails: any error
/// degrades to an explanation without reasoning.
#[derive(Debug, Clone)]
pub struct ReasoningClient {
    provider: Provider,
    model: String,
}

impl ReasoningClient {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn request(&self, disease: &str, recommendations: &RecommendationResult) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_prompt(disease, recommendations)),
            ],
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_TOKENS),
            top_p: Some(TOP_P),
            stream: Some(false),
        }
    }

    pub async fn explain(&self, disease: &str, recommendations: &RecommendationResult) -> Explanation {
        let request = self.request(disease, recommendations);
        match self.provider.call_chat_completion(&request).await {
            Ok(response) => {
                let content = response.first_content().unwrap_or_default();
                if content.trim().is_empty() {
                    tracing::warn!(provider = self.provider.name(), "Model returned empty content");
                }
                split_reasoning(content)
            }
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "Explanation request failed");
                Explanation::unavailable(&e.to_string())
            }
        }
    }
}
