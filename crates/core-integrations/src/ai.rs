//! Async AI chat clients.
//!
//! One `ask` entry point dispatches to a provider-specific request shape;
//! providers share the HTTP client, the timeout policy, and the error
//! taxonomy. API keys come from configuration with `<PROVIDER>_API_KEY`
//! environment variables as fallback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use core_config::Config;
use core_events::{AiRequestConfig, TaskErrorKind, TaskRequest, TaskResult};
use core_tasks::TaskExecutor;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Default operation-level timeout for network-bound tasks.
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("quota exhausted: {0}")]
    Quota(String),
    #[error("rate limited: {0}")]
    RateLimit(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("{0}")]
    Unknown(String),
}

impl AiError {
    pub fn kind(&self) -> TaskErrorKind {
        match self {
            AiError::Auth(_) => TaskErrorKind::Auth,
            AiError::Quota(_) => TaskErrorKind::Quota,
            AiError::RateLimit(_) => TaskErrorKind::RateLimit,
            AiError::BadRequest(_) => TaskErrorKind::BadRequest,
            AiError::Server(_) => TaskErrorKind::Server,
            AiError::Network(_) => TaskErrorKind::Network,
            AiError::Timeout(_) => TaskErrorKind::Timeout,
            AiError::Unknown(_) => TaskErrorKind::Unknown,
        }
    }
}

/// Resolve the API key for `provider`: config first, then the
/// conventional environment variable.
pub fn resolve_api_key(provider: &str, config: &Config) -> Option<String> {
    if let Some(key) = config.file.ai.keys.get(provider) {
        if !key.is_empty() {
            return Some(key.clone());
        }
    }
    let var = match provider {
        "openai" => "OPENAI_API_KEY",
        "gemini" => "GEMINI_API_KEY",
        "mistral" => "MISTRAL_API_KEY",
        "huggingface" => "HUGGINGFACE_API_KEY",
        "claude" => "ANTHROPIC_API_KEY",
        "grok" => "XAI_API_KEY",
        _ => return None,
    };
    std::env::var(var).ok().filter(|k| !k.is_empty())
}

/// Default model per provider when configuration does not name one.
pub fn default_model(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("gpt-4o-mini"),
        "gemini" => Some("gemini-1.5-flash"),
        "mistral" => Some("mistral-small-latest"),
        "huggingface" => Some("mistralai/Mistral-7B-Instruct-v0.3"),
        "claude" => Some("claude-3-5-haiku-latest"),
        "grok" => Some("grok-2-latest"),
        _ => None,
    }
}

struct ProviderRequest {
    url: String,
    headers: Vec<(&'static str, String)>,
    body: Value,
}

fn build_request(
    provider: &str,
    prompt: &str,
    system: Option<&str>,
    config: &AiRequestConfig,
) -> Result<ProviderRequest, AiError> {
    let model = &config.model;
    let key = &config.api_key;
    let chat_messages = || -> Value {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));
        Value::Array(messages)
    };

    let request = match provider {
        "openai" => ProviderRequest {
            url: "https://api.openai.com/v1/chat/completions".to_string(),
            headers: vec![("Authorization", format!("Bearer {key}"))],
            body: json!({"model": model, "messages": chat_messages()}),
        },
        "mistral" => ProviderRequest {
            url: "https://api.mistral.ai/v1/chat/completions".to_string(),
            headers: vec![("Authorization", format!("Bearer {key}"))],
            body: json!({"model": model, "messages": chat_messages()}),
        },
        "grok" => ProviderRequest {
            url: "https://api.x.ai/v1/chat/completions".to_string(),
            headers: vec![("Authorization", format!("Bearer {key}"))],
            body: json!({"model": model, "messages": chat_messages()}),
        },
        "gemini" => ProviderRequest {
            url: format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent?key={key}"
            ),
            headers: Vec::new(),
            body: json!({
                "contents": [{"parts": [{"text": match system {
                    Some(system) => format!("{system}\n\n{prompt}"),
                    None => prompt.to_string(),
                }}]}]
            }),
        },
        "claude" => ProviderRequest {
            url: "https://api.anthropic.com/v1/messages".to_string(),
            headers: vec![
                ("x-api-key", key.clone()),
                ("anthropic-version", "2023-06-01".to_string()),
            ],
            body: json!({
                "model": model,
                "max_tokens": 4096,
                "system": system.unwrap_or(""),
                "messages": [{"role": "user", "content": prompt}],
            }),
        },
        "huggingface" => ProviderRequest {
            url: format!("https://api-inference.huggingface.co/models/{model}/v1/chat/completions"),
            headers: vec![("Authorization", format!("Bearer {key}"))],
            body: json!({"model": model, "messages": chat_messages()}),
        },
        other => return Err(AiError::BadRequest(format!("unknown provider '{other}'"))),
    };
    Ok(request)
}

fn extract_text(provider: &str, body: &Value) -> Result<String, AiError> {
    let text = match provider {
        "gemini" => body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str),
        "claude" => body.pointer("/content/0/text").and_then(Value::as_str),
        _ => body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str),
    };
    text.map(str::to_string)
        .ok_or_else(|| AiError::Unknown(format!("no text in {provider} response")))
}

fn classify_status(status: u16, detail: String) -> AiError {
    match status {
        401 | 403 => AiError::Auth(detail),
        402 => AiError::Quota(detail),
        429 => {
            if detail.to_lowercase().contains("quota") {
                AiError::Quota(detail)
            } else {
                AiError::RateLimit(detail)
            }
        }
        400 | 404 | 422 => AiError::BadRequest(detail),
        500..=599 => AiError::Server(detail),
        _ => AiError::Unknown(detail),
    }
}

fn classify_transport(err: reqwest::Error, timeout_secs: u64) -> AiError {
    if err.is_timeout() {
        AiError::Timeout(timeout_secs)
    } else {
        AiError::Network(err.to_string())
    }
}

/// One chat round-trip against the named provider.
pub async fn ask(
    provider: &str,
    prompt: &str,
    system: Option<&str>,
    config: &AiRequestConfig,
) -> Result<String, AiError> {
    let timeout = if config.timeout_secs == 0 {
        DEFAULT_TIMEOUT_SECS
    } else {
        config.timeout_secs
    };
    let request = build_request(provider, prompt, system, config)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .map_err(|err| AiError::Network(err.to_string()))?;

    let mut builder = client.post(&request.url).json(&request.body);
    for (name, value) in &request.headers {
        builder = builder.header(*name, value.as_str());
    }

    debug!(target: "integrations.ai", provider, model = %config.model, "ai_request");
    let send = tokio::time::timeout(Duration::from_secs(timeout), builder.send());
    let response = match send.await {
        Err(_) => return Err(AiError::Timeout(timeout)),
        Ok(Err(err)) => return Err(classify_transport(err, timeout)),
        Ok(Ok(response)) => response,
    };

    let status = response.status().as_u16();
    let body_text = response
        .text()
        .await
        .map_err(|err| classify_transport(err, timeout))?;
    if !(200..300).contains(&status) {
        let detail = truncate(&body_text, 200);
        warn!(target: "integrations.ai", provider, status, "ai_error_response");
        return Err(classify_status(status, detail));
    }
    let body: Value = serde_json::from_str(&body_text)
        .map_err(|err| AiError::Unknown(format!("malformed response: {err}")))?;
    extract_text(provider, &body)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}

/// Task-engine executor bridging `TaskRequest::AiChat` to `ask`.
pub struct AiTaskExecutor;

impl TaskExecutor for AiTaskExecutor {
    fn execute(
        self: Arc<Self>,
        request: TaskRequest,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>> {
        Box::pin(async move {
            match request {
                TaskRequest::AiChat {
                    provider,
                    prompt,
                    config,
                } => match ask(
                    &provider,
                    &prompt,
                    config.system_message.as_deref(),
                    &config,
                )
                .await
                {
                    Ok(text) => TaskResult::AiReply { provider, text },
                    Err(err) => TaskResult::TaskError {
                        kind: err.kind(),
                        message: truncate(&err.to_string(), 200),
                    },
                },
                TaskRequest::Shutdown => TaskResult::TaskError {
                    kind: TaskErrorKind::Unknown,
                    message: "shutdown is handled by the engine".to_string(),
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::ConfigFile;

    fn request_config() -> AiRequestConfig {
        AiRequestConfig {
            api_key: "key".to_string(),
            model: "model-x".to_string(),
            system_message: None,
            timeout_secs: 90,
        }
    }

    #[test]
    fn error_kinds_classify_statuses() {
        assert_eq!(
            classify_status(401, String::new()).kind(),
            TaskErrorKind::Auth
        );
        assert_eq!(
            classify_status(429, "Quota exceeded".to_string()).kind(),
            TaskErrorKind::Quota
        );
        assert_eq!(
            classify_status(429, "slow down".to_string()).kind(),
            TaskErrorKind::RateLimit
        );
        assert_eq!(
            classify_status(400, String::new()).kind(),
            TaskErrorKind::BadRequest
        );
        assert_eq!(
            classify_status(503, String::new()).kind(),
            TaskErrorKind::Server
        );
        assert_eq!(
            classify_status(302, String::new()).kind(),
            TaskErrorKind::Unknown
        );
    }

    #[test]
    fn request_shapes_per_provider() {
        let cfg = request_config();
        let openai = build_request("openai", "hi", Some("sys"), &cfg).unwrap();
        assert!(openai.url.contains("api.openai.com"));
        assert_eq!(openai.body["messages"][0]["role"], "system");
        assert_eq!(openai.body["messages"][1]["content"], "hi");

        let gemini = build_request("gemini", "hi", None, &cfg).unwrap();
        assert!(gemini.url.contains("model-x:generateContent"));
        assert!(gemini.headers.is_empty());

        let claude = build_request("claude", "hi", Some("sys"), &cfg).unwrap();
        assert!(claude
            .headers
            .iter()
            .any(|(name, _)| *name == "anthropic-version"));

        assert!(matches!(
            build_request("nope", "hi", None, &cfg),
            Err(AiError::BadRequest(_))
        ));
    }

    #[test]
    fn response_text_extraction() {
        let openai = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(extract_text("openai", &openai).unwrap(), "hello");
        let gemini = json!({"candidates": [{"content": {"parts": [{"text": "hi"}]}}]});
        assert_eq!(extract_text("gemini", &gemini).unwrap(), "hi");
        let claude = json!({"content": [{"type": "text", "text": "hey"}]});
        assert_eq!(extract_text("claude", &claude).unwrap(), "hey");
        assert!(extract_text("openai", &json!({})).is_err());
    }

    #[test]
    fn api_key_resolution_prefers_config() {
        let file: ConfigFile =
            toml::from_str("[ai.keys]\nopenai = \"from-config\"\n").unwrap();
        let config = Config::from_file(file);
        assert_eq!(
            resolve_api_key("openai", &config).as_deref(),
            Some("from-config")
        );
        assert_eq!(resolve_api_key("unknown-provider", &config), None);
    }

    #[tokio::test]
    async fn unknown_provider_fails_fast() {
        let err = ask("nope", "hi", None, &request_config()).await.unwrap_err();
        assert_eq!(err.kind(), TaskErrorKind::BadRequest);
    }
}
