// Unit tests for the LLM analyzer against a mock endpoint

use qhse_assistant::analysis::{LlmTextAnalyzer, ResilientTextAnalyzer};
use qhse_assistant::api::TextAnalyzer;
use qhse_assistant::core::errors::QhseError;
use secrecy::Secret;
use serde_json::json;
use std::sync::Arc;

fn analyzer(server: &mockito::ServerGuard) -> LlmTextAnalyzer {
    LlmTextAnalyzer::new(
        format!("{}/v1/chat/completions", server.url()),
        Secret::new("test-key".to_string()),
        "gpt-test",
        5,
    )
    .unwrap()
}

fn completion(content: &str) -> String {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
    .to_string()
}

#[tokio::test]
async fn test_llm_answer_is_parsed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion(
            r#"{"risk_level": 4, "recommendations": ["Baliser la zone"], "corrective_actions": ["Réparer la fuite"], "compliance_notes": [], "estimated_cost": 8000}"#,
        ))
        .create_async()
        .await;

    let analysis = analyzer(&server)
        .analyze("Fuite de produit chimique dans l'atelier", Some("Chimie"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(analysis.risk_level, 4);
    assert_eq!(analysis.recommendations, vec!["Baliser la zone".to_string()]);
    assert_eq!(analysis.estimated_cost, 8000.0);
    assert_eq!(analysis.source, "llm");
}

#[tokio::test]
async fn test_llm_http_error_is_dependency_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(500)
        .create_async()
        .await;

    let result = analyzer(&server).analyze("Chute de plain-pied", None).await;

    assert!(matches!(result, Err(QhseError::DependencyFailure { .. })));
}

#[tokio::test]
async fn test_resilient_analyzer_falls_back_to_keywords() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(completion("Le risque semble important."))
        .create_async()
        .await;

    let resilient = ResilientTextAnalyzer::new(Some(Arc::new(analyzer(&server))));
    let analysis = resilient
        .analyze("Incendie dans l'entrepôt avec blessés", None)
        .await
        .unwrap();

    assert_eq!(analysis.source, "fallback");
    assert!(analysis.risk_level >= 4);
    assert!(!analysis.recommendations.is_empty());
}
