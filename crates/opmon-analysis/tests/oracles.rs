//! Integration tests for the HTTP oracle clients using wiremock mocks.

use opmon_analysis::{AnalysisError, ChatClient, Embedder, GenerationRequest, TeiClient, TextGenerator};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("text {i}")).collect()
}

#[tokio::test]
async fn tei_embeds_in_chunks_and_preserves_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_partial_json(serde_json::json!({ "inputs": ["text 0", "text 1"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[1.0, 0.0], [0.0, 1.0]])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_partial_json(serde_json::json!({ "inputs": ["text 2"], "normalize": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[0.5, 0.5]])))
        .expect(1)
        .mount(&server)
        .await;

    let client = TeiClient::new(&server.uri(), 30, 2).expect("client construction should not fail");
    let embeddings = client.embed(&texts(3)).await.expect("should embed");

    assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]);
}

#[tokio::test]
async fn tei_server_error_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = TeiClient::new(&server.uri(), 30, 64).expect("client construction should not fail");
    let err = client.embed(&texts(2)).await.expect_err("should fail");
    assert!(matches!(err, AnalysisError::Tei(msg) if msg.contains("503")));
}

#[tokio::test]
async fn tei_wrong_vector_count_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[1.0]])))
        .mount(&server)
        .await;

    let client = TeiClient::new(&server.uri(), 30, 64).expect("client construction should not fail");
    assert!(client.embed(&texts(2)).await.is_err());
}

#[tokio::test]
async fn chat_client_sends_bearer_and_json_mode() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": "{\"scores\":[]}" } }
        ]
    });

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": "sys" },
                { "role": "user", "content": "hello" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new("sk-test", &format!("{}/v1/", server.uri()), "test-model", 30)
        .expect("client construction should not fail");
    let out = client
        .generate(&GenerationRequest::new("sys", "hello").json())
        .await
        .expect("should return content");

    assert_eq!(out, "{\"scores\":[]}");
}

#[tokio::test]
async fn chat_client_surfaces_http_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = ChatClient::new("k", &server.uri(), "m", 30).expect("client construction should not fail");
    let err = client
        .generate(&GenerationRequest::new("s", "u"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, AnalysisError::Llm(msg) if msg.contains("429") && msg.contains("rate limited")));
}

#[tokio::test]
async fn chat_client_rejects_empty_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "choices": [ { "message": { "content": null } } ] })),
        )
        .mount(&server)
        .await;

    let client = ChatClient::new("k", &server.uri(), "m", 30).expect("client construction should not fail");
    assert!(client.generate(&GenerationRequest::new("s", "u")).await.is_err());
}
