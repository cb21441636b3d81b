use dotenv::dotenv;
use reqwest::Client;
use std::env;
use std::time::Duration;
use thiserror::Error;

use super::endpoints::{
    AvailableModel, ChatCompletionRequest, ChatCompletionResponse, Provider, GROQ_BASE_URL,
    GROQ_MODELS, OPENROUTER_BASE_URL, OPENROUTER_MODELS,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },

    #[error("API response contained no choices")]
    NoChoices,
}

impl Provider {
    pub fn groq(api_key_env_var: &str) -> Self {
        Self::Groq {
            api_key_env_var: api_key_env_var.to_string(),
            base_url: GROQ_BASE_URL.to_string(),
        }
    }

    pub fn openrouter(api_key_env_var: &str) -> Self {
        Self::OpenRouter {
            api_key_env_var: api_key_env_var.to_string(),
            base_url: OPENROUTER_BASE_URL.to_string(),
        }
    }

    /// Points the provider at another OpenAI-compatible host (a proxy or a mock server).
    pub fn with_base_url(self, url: &str) -> Self {
        let url = url.trim_end_matches('/').to_string();
        match self {
            Provider::Groq { api_key_env_var, .. } => Provider::Groq {
                api_key_env_var,
                base_url: url,
            },
            Provider::OpenRouter { api_key_env_var, .. } => Provider::OpenRouter {
                api_key_env_var,
                base_url: url,
            },
        }
    }

    pub fn with_api_key_env_var(self, var: &str) -> Self {
        let api_key_env_var = var.to_string();
        match self {
            Provider::Groq { base_url, .. } => Provider::Groq {
                api_key_env_var,
                base_url,
            },
            Provider::OpenRouter { base_url, .. } => Provider::OpenRouter {
                api_key_env_var,
                base_url,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Groq { .. } => "groq",
            Provider::OpenRouter { .. } => "openrouter",
        }
    }

    pub fn get_available_models(&self) -> Vec<AvailableModel> {
        match self {
            Provider::Groq { .. } => GROQ_MODELS.to_vec(),
            Provider::OpenRouter { .. } => OPENROUTER_MODELS.to_vec(),
        }
    }

    pub fn default_model(&self) -> &'static str {
        self.get_available_models()
            .first()
            .map(|m| m.model_name)
            .unwrap_or_default()
    }

    fn api_key_env_var(&self) -> &str {
        match self {
            Provider::Groq { api_key_env_var, .. } | Provider::OpenRouter { api_key_env_var, .. } => {
                api_key_env_var
            }
        }
    }

    pub fn completions_url(&self) -> String {
        let base_url = match self {
            Provider::Groq { base_url, .. } | Provider::OpenRouter { base_url, .. } => base_url,
        };
        format!("{}/chat/completions", base_url)
    }

    pub async fn call_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        dotenv().ok();
        let key_name = self.api_key_env_var();
        let actual_api_key =
            env::var(key_name).map_err(|_| ApiConnectionError::MissingApiKey(key_name.to_string()))?;

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let mut builder = client
            .post(self.completions_url())
            .bearer_auth(actual_api_key)
            .header("Content-Type", "application/json");

        if let Provider::OpenRouter { .. } = self {
            let site_url = env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
            let app_name = env::var("APP_NAME").unwrap_or_else(|_| "NutriLookup".to_string());
            builder = builder.header("HTTP-Referer", site_url).header("X-Title", app_name);
        }

        tracing::debug!(
            provider = self.name(),
            model = %request.model,
            "Sending chat completion request"
        );
        let response = builder.json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(ApiConnectionError::ApiError { status, error_body });
        }

        let body = response.text().await?;
        let chat_response: ChatCompletionResponse = serde_json::from_str(&body)?;
        if chat_response.choices.is_empty() {
            return Err(ApiConnectionError::NoChoices);
        }
        Ok(chat_response)
    }
}
