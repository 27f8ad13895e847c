//! Gemini HTTP dispatch against a mock socket server.

use std::time::Duration;

use ideaforge::dispatch::http::GeminiDispatch;
use ideaforge::dispatch::{ModelRequest, TextModel};
use ideaforge::error::ForgeError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

/// Helper: bind a TCP listener on localhost and return (listener, port).
async fn mock_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Serve one canned response and hand back the raw request bytes.
fn serve_once(listener: TcpListener, status_line: &'static str, body: String) -> JoinHandle<String> {
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 16384];
        let n = socket.read(&mut buf).await.unwrap();
        let response = format!(
            "HTTP/1.1 {status_line}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    })
}

fn dispatch(port: u16) -> GeminiDispatch {
    GeminiDispatch::new(format!("http://127.0.0.1:{port}/v1beta/"), "test-key").unwrap()
}

fn req() -> ModelRequest {
    ModelRequest::new("write a prompt", "gemini-test")
}

#[test]
fn endpoint_shape() {
    let d = GeminiDispatch::new("https://example.com/v1beta/", "k").unwrap();
    assert_eq!(
        d.endpoint("gemini-2.0-flash"),
        "https://example.com/v1beta/models/gemini-2.0-flash:generateContent"
    );
}

#[tokio::test]
async fn joins_text_parts_of_first_candidate() {
    let (listener, port) = mock_listener().await;
    let body = r#"{"candidates":[
        {"content":{"role":"model","parts":[{"text":"A fox "},{"text":"in snow."}]}},
        {"content":{"role":"model","parts":[{"text":"ignored"}]}}
    ]}"#;
    let server = serve_once(listener, "200 OK", body.to_string());

    let result = assert_ok!(dispatch(port).generate(&req()).await);
    assert_eq!(result.text, "A fox in snow.");
    assert_eq!(result.model, "gemini-test");

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /v1beta/models/gemini-test:generateContent"));
    assert!(raw.to_lowercase().contains("x-goog-api-key: test-key"));
}

#[tokio::test]
async fn model_name_with_path_characters_never_sent() {
    let (listener, port) = mock_listener().await;

    let err = dispatch(port)
        .generate(&ModelRequest::new("x", "../../admin/secret?leak="))
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::Other(_)));

    let accepted = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(accepted.is_err(), "no connection should reach the upstream");
}

#[tokio::test]
async fn status_429_is_rate_limited() {
    let (listener, port) = mock_listener().await;
    let server = serve_once(listener, "429 Too Many Requests", "{}".to_string());

    let err = dispatch(port).generate(&req()).await.unwrap_err();
    assert!(matches!(err, ForgeError::RateLimited { ref provider } if provider == "gemini"));
    server.await.unwrap();
}

#[tokio::test]
async fn status_403_is_auth_failure() {
    let (listener, port) = mock_listener().await;
    let server = serve_once(listener, "403 Forbidden", "{}".to_string());

    let err = dispatch(port).generate(&req()).await.unwrap_err();
    assert!(matches!(err, ForgeError::AuthFailed { .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn server_error_keeps_status() {
    let (listener, port) = mock_listener().await;
    let server = serve_once(
        listener,
        "500 Internal Server Error",
        r#"{"error":{"message":"backend exploded"}}"#.to_string(),
    );

    let err = dispatch(port).generate(&req()).await.unwrap_err();
    match err {
        ForgeError::Upstream {
            status, message, ..
        } => {
            assert_eq!(status, Some(500));
            assert!(message.contains("backend exploded"));
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn garbage_body_is_schema_error() {
    let (listener, port) = mock_listener().await;
    let server = serve_once(listener, "200 OK", "<html>oops</html>".to_string());

    let err = dispatch(port).generate(&req()).await.unwrap_err();
    assert!(matches!(err, ForgeError::SchemaParse(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn blocked_prompt_without_candidates_is_upstream_error() {
    let (listener, port) = mock_listener().await;
    let server = serve_once(
        listener,
        "200 OK",
        r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#.to_string(),
    );

    let err = dispatch(port).generate(&req()).await.unwrap_err();
    assert!(matches!(err, ForgeError::Upstream { status: None, .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn connection_refused_is_request_error() {
    let (listener, port) = mock_listener().await;
    drop(listener);

    let err = dispatch(port).generate(&req()).await.unwrap_err();
    assert!(matches!(err, ForgeError::Request(_)));
    assert_eq!(err.user_message(), "Internal Server Error");
}
