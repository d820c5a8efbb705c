//! Drives analysis and a GitHub commit through the real HTTP clients against mock servers.

use codelift::github::GitHubClient;
use codelift::suggest::llm::OpenRouterClient;
use codelift::suggest::settle::Branch;
use codelift::suggest::{AnalysisResponse, SuggestError, Suggester};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LEGACY: &str = r#"<div class="nav"><a href="/">Home</a></div>
<style>.nav { display: flex; gap: 8px; }</style>"#;

fn completion(content: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"message": {"content": content.to_string()}}],
        "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
    }))
}

fn suggester(server: &MockServer) -> Suggester {
    let client = OpenRouterClient::new("sk-test")
        .unwrap()
        .with_base_url(server.uri())
        .with_max_retries(0);
    Suggester::new(Arc::new(client))
}

async fn mount_branch(server: &MockServer, marker: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(marker))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

const COMPONENTS_MARKER: &str = "suggests React components";
const STYLES_MARKER: &str = "You are a CSS expert";
const PROJECT_MARKER: &str = "Your task is to convert";

#[tokio::test]
async fn partial_analysis_then_export_and_push() {
    let llm = MockServer::start().await;
    mount_branch(
        &llm,
        COMPONENTS_MARKER,
        ResponseTemplate::new(503).set_body_string("overloaded"),
    )
    .await;
    mount_branch(
        &llm,
        STYLES_MARKER,
        completion(serde_json::json!({"suggestions": ["flex gap-2", "text-sm"]})),
    )
    .await;
    mount_branch(
        &llm,
        PROJECT_MARKER,
        completion(serde_json::json!({"files": [
            {"path": "src/components/Nav.tsx", "content": "export function Nav() { return null; }"},
            {"path": "src/app/page.tsx", "content": "import { Nav } from '../components/Nav';"}
        ]})),
    )
    .await;

    let suggestions = suggester(&llm).analyze(LEGACY).await.unwrap();
    assert_eq!(suggestions.components, "");
    assert_eq!(suggestions.styles, "flex gap-2\ntext-sm");
    assert_eq!(suggestions.project.len(), 2);
    assert_eq!(suggestions.degraded, vec![Branch::Components]);
    assert_eq!(suggestions.usage.as_ref().unwrap().total_tokens, 240);

    let out = TempDir::new().unwrap();
    let written = suggestions.project.write_to(out.path()).unwrap();
    assert_eq!(written.len(), 2);
    let nav = std::fs::read_to_string(out.path().join("src/components/Nav.tsx")).unwrap();
    assert_eq!(nav, "export function Nav() { return null; }");

    let github = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/site/contents/src/components/Nav.tsx"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "message": "Not Found"
        })))
        .mount(&github)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/acme/site/contents/src/components/Nav.tsx"))
        .and(body_partial_json(serde_json::json!({"message": "Add Nav component"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "content": {"sha": "0123456789abcdef"}
        })))
        .expect(1)
        .mount(&github)
        .await;

    let client = GitHubClient::new(Some("gho_test".to_string()), github.uri()).unwrap();
    let sha = client
        .update_file("acme", "site", "src/components/Nav.tsx", &nav, "Add Nav component")
        .await
        .unwrap();
    assert_eq!(sha, "0123456789abcdef");
}

#[tokio::test]
async fn total_failure_reports_single_error() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .expect(3)
        .mount(&llm)
        .await;

    let result = suggester(&llm).analyze(LEGACY).await;
    assert!(matches!(result, Err(SuggestError::AllUpstreamFailed)));

    let wire = serde_json::to_value(AnalysisResponse::from(result)).unwrap();
    assert_eq!(
        wire,
        serde_json::json!({"error": "Failed to get suggestions from AI."})
    );
}

#[tokio::test]
async fn blank_input_never_reaches_the_model() {
    let llm = MockServer::start().await;
    let err = suggester(&llm).analyze(" \n ").await.unwrap_err();
    assert_eq!(err.to_string(), "Code input is empty.");
    assert!(llm.received_requests().await.unwrap().is_empty());
}
