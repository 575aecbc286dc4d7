use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use portal_engine::{
    FailureKind, LimitedTransport, ReqwestTransport, Transport, TransportError, TransportResponse,
    TransportSettings,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn transport_returns_body_and_lowercase_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/el/um/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(TransportSettings::default()).unwrap();
    let url = format!("{}/auth/el/um/", server.uri());

    let response = transport.retrieve(&url).await.expect("retrieve ok");
    assert_eq!(response.status, 200);
    assert_eq!(response.final_uri, url);
    assert!(response.is_html());
    assert!(response.headers.iter().all(|(name, _)| name == &name.to_ascii_lowercase()));
    assert_eq!(response.body, b"<html>ok</html>");
}

#[tokio::test]
async fn session_cookie_is_sent_with_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/"))
        .and(header("cookie", "iscreds=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hi"))
        .mount(&server)
        .await;

    let settings = TransportSettings {
        cookie: Some("iscreds=abc".to_string()),
        ..TransportSettings::default()
    };
    let transport = ReqwestTransport::new(settings).unwrap();

    let response = transport
        .retrieve(&format!("{}/auth/", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.body, b"hi");
}

#[tokio::test]
async fn transport_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(TransportSettings::default()).unwrap();
    let err = transport
        .retrieve(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn transport_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = TransportSettings {
        request_timeout: Duration::from_millis(50),
        ..TransportSettings::default()
    };
    let transport = ReqwestTransport::new(settings).unwrap();

    let err = transport
        .retrieve(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn transport_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .insert_header("Content-Length", "11")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = TransportSettings {
        max_bytes: 10,
        ..TransportSettings::default()
    };
    let transport = ReqwestTransport::new(settings).unwrap();

    let err = transport
        .retrieve(&format!("{}/large", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn invalid_uri_is_rejected_before_sending() {
    let transport = ReqwestTransport::new(TransportSettings::default()).unwrap();
    let err = transport.retrieve("not a url").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

/// Records the highest number of retrievals running at once.
#[derive(Default)]
struct PeakTransport {
    running: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait::async_trait]
impl Transport for PeakTransport {
    async fn retrieve(&self, uri: &str) -> Result<TransportResponse, TransportError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(TransportResponse {
            status: 200,
            final_uri: uri.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        })
    }
}

#[tokio::test]
async fn limiter_bounds_concurrent_retrievals() {
    let inner = Arc::new(PeakTransport::default());
    let limited = LimitedTransport::new(inner.clone(), 2);

    let uris: Vec<String> = (0..8).map(|i| format!("https://is.example.cz/{i}")).collect();
    let results = futures_util::future::join_all(uris.iter().map(|uri| limited.retrieve(uri))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(inner.peak.load(Ordering::SeqCst), 2);
    assert_eq!(limited.available_permits(), 2);
}
