//! HTTP upstream classification and retry behaviour against a mock server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vendora::error::TransportError;
use vendora::{HttpUpstream, RetryConfig, Upstream, VendoraError, http_client};

fn upstream(server: &MockServer, timeout: Duration) -> HttpUpstream {
    let client = http_client(timeout).unwrap();
    HttpUpstream::new("information_api", format!("{}/ia", server.uri()), client).retry(
        RetryConfig::new()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(10))
            .max_delay(Duration::from_millis(20)),
    )
}

#[tokio::test]
async fn fetch_posts_payload_and_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ia"))
        .and(body_partial_json(json!({"codOpe": "OBTENER_CATEGORIAS", "id_empresa": 42})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "categories": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let body = upstream(&server, Duration::from_secs(5))
        .fetch(&json!({"codOpe": "OBTENER_CATEGORIAS", "id_empresa": 42}))
        .await
        .unwrap();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn fetch_retries_timeouts_until_attempts_run_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let err = upstream(&server, Duration::from_millis(100))
        .fetch(&json!({"codOpe": "X"}))
        .await
        .unwrap_err();
    assert!(matches!(err, VendoraError::Transport(TransportError::Timeout)), "got {err:?}");
}

#[tokio::test]
async fn submit_is_sent_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = upstream(&server, Duration::from_millis(100))
        .submit(&json!({"codOpe": "REGISTRAR_PEDIDO"}))
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn http_status_is_an_api_error_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let err = upstream(&server, Duration::from_secs(5))
        .fetch(&json!({}))
        .await
        .unwrap_err();
    match err {
        VendoraError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn long_error_bodies_are_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("é".repeat(600)))
        .mount(&server)
        .await;

    let err = upstream(&server, Duration::from_secs(5))
        .fetch(&json!({}))
        .await
        .unwrap_err();
    let VendoraError::Api { message, .. } = err else {
        panic!("expected Api error");
    };
    assert!(message.len() <= 512);
    assert!(message.chars().all(|c| c == 'é'));
}

#[tokio::test]
async fn undecodable_body_is_a_data_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = upstream(&server, Duration::from_secs(5))
        .fetch(&json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, VendoraError::DataError(_)), "got {err:?}");
    assert!(!err.is_transient());
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let client = http_client(Duration::from_secs(1)).unwrap();
    let upstream = HttpUpstream::new("faq_api", "http://127.0.0.1:1/faq", client)
        .retry(RetryConfig::disabled());
    let err = upstream.fetch(&json!({"id_chatbot": 1})).await.unwrap_err();
    assert!(err.is_transient(), "got {err:?}");
    assert_eq!(err.kind(), "transport");
}
