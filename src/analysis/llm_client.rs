// LLM chat-completion client for incident text analysis

use crate::analysis::text_analyzer::TextAnalysis;
use crate::api::TextAnalyzer;
use crate::core::errors::QhseError;
use crate::core::resilience::{create_circuit_breaker, execute_with_cb, ServiceCircuitBreaker};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

/// Fields the model is asked to return
#[derive(Debug, Deserialize)]
struct ModelAnswer {
    risk_level: u8,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    corrective_actions: Vec<String>,
    #[serde(default)]
    compliance_notes: Vec<String>,
    #[serde(default)]
    estimated_cost: f64,
}

/// Text analyzer backed by an OpenAI-compatible chat completion endpoint
pub struct LlmTextAnalyzer {
    http_client: Client,
    api_url: String,
    api_key: Secret<String>,
    model: String,
    cb: ServiceCircuitBreaker,
}

impl LlmTextAnalyzer {
    /// # Arguments
    /// * `api_url` - full chat completions URL
    /// * `timeout_secs` - per-request timeout
    pub fn new(
        api_url: impl Into<String>,
        api_key: Secret<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, QhseError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(2))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| QhseError::ConfigurationError(format!(
                "Failed to create HTTP client: {}", e
            )))?;

        Ok(Self {
            http_client,
            api_url: api_url.into(),
            api_key,
            model: model.into(),
            cb: create_circuit_breaker(),
        })
    }

    fn prompt(text: &str, sector: Option<&str>) -> String {
        format!(
            "En tant qu'expert QHSE, analysez le texte suivant et répondez uniquement en JSON \
             avec les clés risk_level (entier 1-5), recommendations, corrective_actions, \
             compliance_notes (listes de chaînes) et estimated_cost (nombre, en euros).\n\
             Contexte: {}\nTexte: {}",
            sector.unwrap_or("QHSE"),
            text
        )
    }

    async fn analyze_internal(&self, text: &str, sector: Option<&str>) -> Result<TextAnalysis, QhseError> {
        let request = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": Self::prompt(text, sector)}],
            "max_tokens": 1000,
            "temperature": 0.3
        });

        debug!(url = %self.api_url, model = %self.model, "Requesting text analysis");

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QhseError::TransientError("LLM request timed out".to_string())
                } else {
                    QhseError::DependencyFailure {
                        service: "llm".to_string(),
                        error: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "LLM endpoint returned HTTP error");
            return Err(QhseError::DependencyFailure {
                service: "llm".to_string(),
                error: format!("HTTP {}", status),
            });
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| QhseError::DependencyFailure {
            service: "llm".to_string(),
            error: format!("Failed to parse completion: {}", e),
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| QhseError::DependencyFailure {
                service: "llm".to_string(),
                error: "Completion has no choices".to_string(),
            })?;

        let answer = parse_answer(&content)?;
        info!(risk_level = answer.risk_level, "LLM text analysis completed");
        Ok(answer)
    }
}

/// Parse the model's JSON answer, tolerating a surrounding code fence
fn parse_answer(content: &str) -> Result<TextAnalysis, QhseError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let answer: ModelAnswer = serde_json::from_str(trimmed).map_err(|e| QhseError::DependencyFailure {
        service: "llm".to_string(),
        error: format!("Unstructured answer: {}", e),
    })?;

    Ok(TextAnalysis {
        risk_level: answer.risk_level.clamp(1, 5),
        recommendations: answer.recommendations,
        corrective_actions: answer.corrective_actions,
        compliance_notes: answer.compliance_notes,
        estimated_cost: answer.estimated_cost.max(0.0),
        source: "llm".to_string(),
    })
}

#[async_trait]
impl TextAnalyzer for LlmTextAnalyzer {
    async fn analyze(&self, text: &str, sector: Option<&str>) -> Result<TextAnalysis, QhseError> {
        execute_with_cb(&self.cb, "llm", || async { self.analyze_internal(text, sector).await }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_answer() {
        let content = "```json\n{\"risk_level\": 7, \"recommendations\": [\"a\"], \"estimated_cost\": 1200.5}\n```";
        let analysis = parse_answer(content).unwrap();
        assert_eq!(analysis.risk_level, 5);
        assert_eq!(analysis.recommendations, vec!["a".to_string()]);
        assert!(analysis.corrective_actions.is_empty());
        assert_eq!(analysis.source, "llm");
    }

    #[test]
    fn test_parse_rejects_prose() {
        let result = parse_answer("Le risque est élevé.");
        assert!(matches!(result, Err(QhseError::DependencyFailure { .. })));
    }

    #[test]
    fn test_prompt_includes_context() {
        let prompt = LlmTextAnalyzer::prompt("fuite de gaz", Some("Industrie"));
        assert!(prompt.contains("Contexte: Industrie"));
        assert!(prompt.contains("fuite de gaz"));
    }
}
