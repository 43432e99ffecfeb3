use crate::error::DigestError;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use std::env;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 600;
const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Single-shot text generation: ordered turns in, one response out.
pub trait SummaryModel {
    fn complete(&self, turns: &[ChatTurn]) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    Ollama,
    OpenAiCompatible,
    Anthropic,
}

impl ModelProvider {
    pub fn label(self) -> &'static str {
        match self {
            ModelProvider::Ollama => "ollama",
            ModelProvider::OpenAiCompatible => "openai-compatible",
            ModelProvider::Anthropic => "anthropic",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn parse_provider_alias(raw: &str) -> Option<ModelProvider> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ollama" | "local" => Some(ModelProvider::Ollama),
        "openai" | "openai-compatible" | "compatible" | "deepseek" => {
            Some(ModelProvider::OpenAiCompatible)
        }
        "anthropic" | "claude" => Some(ModelProvider::Anthropic),
        _ => None,
    }
}

fn parse_prefixed_model(raw: &str) -> (Option<ModelProvider>, String) {
    let trimmed = raw.trim();
    if let Some((prefix, model)) = trimmed.split_once(':')
        && let Some(provider) = parse_provider_alias(prefix)
    {
        return (Some(provider), model.trim().to_string());
    }
    (None, trimmed.to_string())
}

fn infer_provider_from_model(model: &str) -> Option<ModelProvider> {
    let lower = model.trim().to_ascii_lowercase();
    if lower.starts_with("claude-") {
        return Some(ModelProvider::Anthropic);
    }
    if lower.starts_with("gpt-") || lower.starts_with("deepseek-") || lower.starts_with("o4") {
        return Some(ModelProvider::OpenAiCompatible);
    }
    None
}

fn default_model_for_provider(provider: ModelProvider) -> &'static str {
    match provider {
        ModelProvider::Ollama => "llama3.1",
        ModelProvider::OpenAiCompatible => "gpt-4.1-mini",
        ModelProvider::Anthropic => "claude-3-5-haiku-latest",
    }
}

fn default_base_url(provider: ModelProvider) -> &'static str {
    match provider {
        ModelProvider::Ollama => DEFAULT_OLLAMA_BASE_URL,
        ModelProvider::OpenAiCompatible => DEFAULT_OPENAI_BASE_URL,
        ModelProvider::Anthropic => DEFAULT_ANTHROPIC_BASE_URL,
    }
}

fn resolve_api_key(provider: ModelProvider) -> Option<String> {
    match provider {
        ModelProvider::Ollama => None,
        ModelProvider::OpenAiCompatible => {
            env_non_empty("AI_API_KEY").or_else(|| env_non_empty("OPENAI_API_KEY"))
        }
        ModelProvider::Anthropic => {
            env_non_empty("ANTHROPIC_API_KEY").or_else(|| env_non_empty("AI_API_KEY"))
        }
    }
}

/// Pick the provider from an explicit setting, a `provider:model` prefix, or
/// the model name, defaulting to a local Ollama server.
pub fn resolve_model_config() -> Result<ModelConfig> {
    let explicit = match env_non_empty("DIGEST_MODEL_PROVIDER") {
        Some(raw) => Some(parse_provider_alias(&raw).ok_or_else(|| {
            DigestError::InvalidConfig(format!(
                "unknown DIGEST_MODEL_PROVIDER `{raw}`; use ollama, openai-compatible or anthropic"
            ))
        })?),
        None => None,
    };

    let (prefixed, mut model) = env_non_empty("DIGEST_MODEL")
        .as_deref()
        .map(parse_prefixed_model)
        .unwrap_or((None, String::new()));
    let provider = explicit
        .or(prefixed)
        .or_else(|| infer_provider_from_model(&model))
        .unwrap_or(ModelProvider::Ollama);
    if model.is_empty() {
        model = default_model_for_provider(provider).to_string();
    }

    let base_url = env_non_empty("DIGEST_MODEL_BASE_URL")
        .unwrap_or_else(|| default_base_url(provider).to_string());
    let api_key = resolve_api_key(provider);
    if provider != ModelProvider::Ollama && api_key.is_none() {
        return Err(DigestError::InvalidConfig(format!(
            "{} provider requires an api key (AI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY)",
            provider.label()
        ))
        .into());
    }

    Ok(ModelConfig {
        provider,
        model,
        base_url: base_url.trim_end_matches('/').to_string(),
        api_key,
    })
}

fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("failed to create model http client")
}

fn extract_ollama_text(json: &Value) -> Option<String> {
    json.get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

fn extract_openai_compatible_text(json: &Value) -> Option<String> {
    let choices = json.get("choices").and_then(Value::as_array)?;
    let first = choices.first()?;
    let content = first.get("message")?.get("content")?;
    match content {
        Value::String(s) => Some(s.to_string()),
        Value::Array(parts) => {
            let mut chunks = Vec::new();
            for part in parts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    chunks.push(text.to_string());
                }
            }
            if chunks.is_empty() {
                None
            } else {
                Some(chunks.join("\n"))
            }
        }
        _ => None,
    }
}

fn extract_anthropic_text(json: &Value) -> Option<String> {
    let mut chunks = Vec::new();
    let content = json.get("content").and_then(Value::as_array)?;
    for part in content {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            chunks.push(text.to_string());
        }
    }
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n"))
    }
}

pub struct OllamaModel {
    pub base_url: String,
    pub model: String,
}

pub struct OpenAiCompatModel {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

pub struct AnthropicModel {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

impl SummaryModel for OllamaModel {
    fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": turns,
            "stream": false
        });
        let response = http_client()?
            .post(format!("{}/api/chat", self.base_url))
            .json(&payload)
            .send()
            .map_err(|err| DigestError::transport("ollama.chat", err))?;
        if !response.status().is_success() {
            anyhow::bail!("ollama call failed with status {}", response.status());
        }
        let json: Value = response.json()?;
        extract_ollama_text(&json).context("ollama response missing message content")
    }
}

impl SummaryModel for OpenAiCompatModel {
    fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": turns,
            "temperature": 0.2
        });
        let response = http_client()?
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|err| DigestError::transport("chat.completions", err))?;
        if !response.status().is_success() {
            anyhow::bail!(
                "openai-compatible call failed with status {}",
                response.status()
            );
        }
        let json: Value = response.json()?;
        extract_openai_compatible_text(&json)
            .context("openai-compatible response missing text content")
    }
}

impl SummaryModel for AnthropicModel {
    fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let system: Vec<&str> = turns
            .iter()
            .filter(|turn| turn.role == Role::System)
            .map(|turn| turn.content.as_str())
            .collect();
        let messages: Vec<&ChatTurn> = turns.iter().filter(|turn| turn.role != Role::System).collect();
        let payload = serde_json::json!({
            "model": self.model,
            "max_tokens": 2000,
            "temperature": 0.2,
            "system": system.join("\n"),
            "messages": messages
        });
        let response = http_client()?
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .map_err(|err| DigestError::transport("anthropic.messages", err))?;
        if !response.status().is_success() {
            anyhow::bail!("anthropic call failed with status {}", response.status());
        }
        let json: Value = response.json()?;
        extract_anthropic_text(&json).context("anthropic response missing text content")
    }
}

pub fn build_model(cfg: &ModelConfig) -> Box<dyn SummaryModel> {
    let api_key = cfg.api_key.clone().unwrap_or_default();
    match cfg.provider {
        ModelProvider::Ollama => Box::new(OllamaModel {
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
        }),
        ModelProvider::OpenAiCompatible => Box::new(OpenAiCompatModel {
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            api_key,
        }),
        ModelProvider::Anthropic => Box::new(AnthropicModel {
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            api_key,
        }),
    }
}
