use super::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server_uri: &str) -> Config {
    let mut config = Config::default();
    config.embedding.api_url = server_uri.to_string();
    config.embedding.api_key = Some("test-key".to_string());
    config.embedding.batch_delay_ms = 0;
    config.embedding.retry_attempts = 1;
    config.qdrant.url = server_uri.to_string();
    config.qdrant.collection = "docs".to_string();
    config.qdrant.retry_attempts = 1;
    config.qdrant.retry_delay_ms = 1;
    config
}

async fn mount_collections(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "collections": [{ "name": "docs" }] }
        })))
        .mount(server)
        .await;
}

async fn mount_embed(server: &MockServer, embeddings: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": embeddings,
        })))
        .mount(server)
        .await;
}

fn point(id: &str, score: f32) -> serde_json::Value {
    json!({
        "id": id,
        "score": score,
        "payload": {
            "content": format!("Retrieved content for {id} with enough length"),
            "source_url": "https://example.com/docs",
            "title": "Docs",
            "created_at": "2026-08-25T00:00:00Z",
            "content_length": 40,
        },
    })
}

#[tokio::test]
async fn ad_hoc_query_yields_one_report() {
    let server = MockServer::start().await;
    mount_collections(&server).await;
    mount_embed(&server, json!([[0.1, 0.2]])).await;

    Mock::given(method("POST"))
        .and(path("/collections/docs/points/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "points": [point("p1", 0.9), point("p2", 0.7)] }
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let reports = tokio::task::spawn_blocking(move || {
        let pipeline = ValidationPipeline::new(config)?;
        crate::Result::Ok(pipeline.run(Some("what is chunking"), None))
    })
    .await
    .expect("pipeline task should not panic")
    .expect("pipeline");

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].query, "what is chunking");
    assert!(reports[0].validation_passed);
    assert_eq!(reports[0].results_count, 2);
    assert!((reports[0].accuracy_score - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn category_filter_limits_the_batch() {
    let server = MockServer::start().await;
    mount_collections(&server).await;
    mount_embed(&server, json!([[0.1, 0.2]])).await;

    Mock::given(method("POST"))
        .and(path("/collections/docs/points/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "points": [] }
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let reports = tokio::task::spawn_blocking(move || {
        let pipeline = ValidationPipeline::new(config)?;
        crate::Result::Ok(pipeline.run(None, Some(QueryCategory::Procedure)))
    })
    .await
    .expect("pipeline task should not panic")
    .expect("pipeline");

    let expected = crate::validation::load_test_queries(Some(QueryCategory::Procedure)).len();
    assert_eq!(reports.len(), expected);
    // Zero-result retrievals validate vacuously.
    assert!(reports.iter().all(|r| r.validation_passed));
}

#[tokio::test]
async fn built_in_query_keywords_drive_content_accuracy() {
    let server = MockServer::start().await;
    mount_collections(&server).await;
    mount_embed(&server, json!([[0.1, 0.2]])).await;

    // The reference query expects configuration/options/default; this hit
    // mentions none of them.
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "points": [{
                "id": "p1",
                "score": 0.9,
                "payload": {
                    "content": "A meandering account of birds and weather patterns",
                    "source_url": "https://example.com/docs",
                    "title": "Docs",
                    "created_at": "2026-08-25T00:00:00Z",
                    "content_length": 50,
                },
            }] }
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let reports = tokio::task::spawn_blocking(move || {
        let pipeline = ValidationPipeline::new(config)?;
        crate::Result::Ok(pipeline.run(None, Some(QueryCategory::Reference)))
    })
    .await
    .expect("pipeline task should not panic")
    .expect("pipeline");

    assert_eq!(reports.len(), 1);
    assert!(!reports[0].validation_passed);
    assert!(reports[0].accuracy_score.abs() < f32::EPSILON);
    assert!(!reports[0].details.validation_details[0].content_valid);

    // Matching content passes under the same configuration.
    let server2 = MockServer::start().await;
    mount_collections(&server2).await;
    mount_embed(&server2, json!([[0.1, 0.2]])).await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "points": [{
                "id": "p1",
                "score": 0.9,
                "payload": {
                    "content": "Configuration options and their default values",
                    "source_url": "https://example.com/docs",
                    "title": "Docs",
                    "created_at": "2026-08-25T00:00:00Z",
                    "content_length": 47,
                },
            }] }
        })))
        .mount(&server2)
        .await;

    let config = test_config(&server2.uri());
    let reports = tokio::task::spawn_blocking(move || {
        let pipeline = ValidationPipeline::new(config)?;
        crate::Result::Ok(pipeline.run(None, Some(QueryCategory::Reference)))
    })
    .await
    .expect("pipeline task should not panic")
    .expect("pipeline");

    assert!(reports[0].validation_passed);
}

#[tokio::test]
async fn failed_query_becomes_a_failure_report() {
    let server = MockServer::start().await;
    mount_collections(&server).await;

    // The provider rejects every embed call; the run must still complete.
    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let reports = tokio::task::spawn_blocking(move || {
        let pipeline = ValidationPipeline::new(config)?;
        crate::Result::Ok(pipeline.run(Some("doomed query"), None))
    })
    .await
    .expect("pipeline task should not panic")
    .expect("pipeline");

    assert_eq!(reports.len(), 1);
    assert!(!reports[0].validation_passed);
    assert!(reports[0].accuracy_score.abs() < f32::EPSILON);
    assert_eq!(reports[0].details.errors.len(), 1);
}

#[tokio::test]
async fn connection_failure_is_fatal_at_construction() {
    let config = test_config("http://127.0.0.1:1");

    let err = tokio::task::spawn_blocking(move || ValidationPipeline::new(config))
        .await
        .expect("pipeline task should not panic");

    assert!(matches!(err, Err(RagError::Connection(_))));
}

#[tokio::test]
async fn ingest_writes_every_segment() {
    let server = MockServer::start().await;
    mount_collections(&server).await;
    // Three chunks at this chunking config, so three embeddings.
    mount_embed(&server, json!([[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]])).await;

    Mock::given(method("PUT"))
        .and(path("/collections/docs/points"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.chunking.chunk_size = 25;
    config.chunking.overlap_size = 5;

    let text: String = "abcdefghij".chars().cycle().take(240).collect();
    let count = tokio::task::spawn_blocking(move || {
        let pipeline = IngestPipeline::new(config)?;
        pipeline.ingest_page(&text, "https://example.com/docs", "Docs")
    })
    .await
    .expect("ingest task should not panic")
    .expect("ingest");

    assert_eq!(count, 3);
}

#[tokio::test]
async fn empty_page_text_is_rejected() {
    let server = MockServer::start().await;
    mount_collections(&server).await;

    let config = test_config(&server.uri());
    let err = tokio::task::spawn_blocking(move || {
        let pipeline = IngestPipeline::new(config)?;
        pipeline.ingest_page("   ", "https://example.com/docs", "Docs")
    })
    .await
    .expect("ingest task should not panic");

    assert!(matches!(err, Err(RagError::Validation(_))));
}
