use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::config::AssistantConfig;

/// Prompt framing every chatbot exchange.
pub const SYSTEM_PROMPT: &str = "You are an assistant for a household \
electricity-monitoring service. Help users understand their consumption, \
estimate bills under the active tariff, and suggest practical ways to save \
energy. Keep numbers realistic and briefly explain how you got them.";

const FALLBACK_REPLY: &str =
    "I'm having trouble reaching the assistant right now. Please try again shortly.";
const DISABLED_REPLY: &str =
    "The assistant is not enabled. Configure an assistant API key to activate it.";

/// Conversational collaborator. Replies never fail: any upstream problem
/// degrades to a fallback sentence so the chat surface stays renderable.
/// Billing, aggregation, and forecasting do not depend on this.
#[async_trait::async_trait]
pub trait Assistant: Send + Sync {
    async fn generate(&self, system_prompt: &str, message: &str) -> String;
}

/// Stand-in used when no API key is configured.
pub struct DisabledAssistant;

#[async_trait::async_trait]
impl Assistant for DisabledAssistant {
    async fn generate(&self, _system_prompt: &str, _message: &str) -> String {
        DISABLED_REPLY.to_string()
    }
}

/// Gemini-backed assistant speaking the `generateContent` REST API.
pub struct GeminiAssistant {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiAssistant {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    async fn request(&self, system_prompt: &str, message: &str) -> anyhow::Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": system_prompt },
                    { "text": format!("User: {message}") },
                ],
            }],
        });

        let response: GenerateResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text = response
            .candidates
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|mut p| p.drain(..).next())
            .and_then(|p| p.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            anyhow::bail!("assistant returned an empty reply");
        }
        Ok(text.trim().to_string())
    }
}

#[async_trait::async_trait]
impl Assistant for GeminiAssistant {
    async fn generate(&self, system_prompt: &str, message: &str) -> String {
        match self.request(system_prompt, message).await {
            Ok(text) => {
                metrics::counter!("assistant_replies_total").increment(1);
                text
            }
            Err(e) => {
                metrics::counter!("assistant_errors_total").increment(1);
                tracing::warn!(error = %e, "assistant request failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

/// Build the assistant from configuration; absent key means disabled.
pub fn from_config(cfg: Option<&AssistantConfig>) -> Arc<dyn Assistant> {
    match cfg.and_then(|c| c.api_key.clone()) {
        Some(api_key) => {
            let model = cfg
                .map(|c| c.model.clone())
                .unwrap_or_else(|| "gemini-1.5-flash".to_string());
            Arc::new(GeminiAssistant::new(api_key, model))
        }
        None => {
            tracing::warn!("no assistant API key configured, chatbot will use fallback replies");
            Arc::new(DisabledAssistant)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_assistant_returns_static_reply() {
        let reply = DisabledAssistant.generate(SYSTEM_PROMPT, "hello").await;
        assert_eq!(reply, DISABLED_REPLY);
    }

    #[test]
    fn missing_config_builds_disabled_assistant() {
        // A config without a key also disables the assistant.
        let cfg = AssistantConfig {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
        };
        let _ = from_config(Some(&cfg));
        let _ = from_config(None);
    }
}
