use super::*;
use crate::config::EmbeddingConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(api_url: &str) -> EmbeddingConfig {
    EmbeddingConfig {
        api_url: api_url.to_string(),
        api_key: Some("test-key".to_string()),
        batch_size: 2,
        batch_delay_ms: 0,
        retry_attempts: 2,
        ..EmbeddingConfig::default()
    }
}

async fn embed_documents(
    client: EmbeddingClient,
    texts: Vec<String>,
) -> crate::Result<Vec<Vec<f32>>> {
    // ureq is blocking, so keep it off the async test runtime.
    tokio::task::spawn_blocking(move || client.embed_documents(&texts))
        .await
        .expect("embedding task should not panic")
}

#[test]
fn missing_credential_fails_fast() {
    let config = EmbeddingConfig {
        api_key: None,
        ..EmbeddingConfig::default()
    };

    let err = EmbeddingClient::new(&config);
    assert!(matches!(err, Err(crate::RagError::Config(_))));
}

#[test]
fn empty_input_yields_empty_output() {
    let config = test_config("http://localhost:9");
    let client = EmbeddingClient::new(&config).expect("client");

    // No request is made, so the unreachable endpoint is never touched.
    let embeddings = client.embed_documents(&[]).expect("empty input is fine");
    assert!(embeddings.is_empty());
}

#[tokio::test]
async fn documents_are_batched_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "texts": ["alpha", "bravo"],
            "input_type": "search_document",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0], [2.0]],
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .and(body_partial_json(json!({
            "texts": ["charlie"],
            "input_type": "search_document",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[3.0]],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let client = EmbeddingClient::new(&config).expect("client");

    let texts = vec![
        "alpha".to_string(),
        "bravo".to_string(),
        "charlie".to_string(),
    ];
    let embeddings = embed_documents(client, texts).await.expect("embeddings");

    assert_eq!(embeddings, vec![vec![1.0], vec![2.0], vec![3.0]]);
}

#[tokio::test]
async fn query_uses_search_query_input_type() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .and(body_partial_json(json!({
            "texts": ["what is chunking"],
            "input_type": "search_query",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.5, 0.5]],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let client = EmbeddingClient::new(&config).expect("client");

    let vector = tokio::task::spawn_blocking(move || client.embed_query("what is chunking"))
        .await
        .expect("embedding task should not panic")
        .expect("query embedding");

    assert_eq!(vector, vec![0.5, 0.5]);
}

#[tokio::test]
async fn count_mismatch_is_a_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0]],
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let client = EmbeddingClient::new(&config).expect("client");

    let texts = vec!["alpha".to_string(), "bravo".to_string()];
    let err = embed_documents(client, texts).await;
    assert!(matches!(err, Err(crate::RagError::Provider(_))));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let client = EmbeddingClient::new(&config).expect("client");

    let err = embed_documents(client, vec!["alpha".to_string()]).await;
    assert!(matches!(err, Err(crate::RagError::Provider(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0]],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let client = EmbeddingClient::new(&config).expect("client");

    let embeddings = embed_documents(client, vec!["alpha".to_string()])
        .await
        .expect("retry should recover");
    assert_eq!(embeddings, vec![vec![1.0]]);
}

#[tokio::test]
async fn retries_are_exhausted_after_persistent_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let client = EmbeddingClient::new(&config).expect("client");

    let err = embed_documents(client, vec!["alpha".to_string()]).await;
    assert!(matches!(err, Err(crate::RagError::Provider(_))));
}
