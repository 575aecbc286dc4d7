use std::sync::Arc;

use portal_engine::{
    ContentKind, FailureKind, LinkResolver, Resolution, ReqwestTransport, TransportSettings,
};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver_for(server: &MockServer) -> LinkResolver {
    let transport = ReqwestTransport::new(TransportSettings::default()).unwrap();
    LinkResolver::new(Url::parse(&server.uri()).unwrap(), Arc::new(transport))
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn download_reference_needs_no_intermediate_hop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/dok/rfmgr.pl"))
        .and(query_param("download", "7"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="Prednaska 92.pdf""#)
                .set_body_raw(b"%PDF-1.7".to_vec(), "application/pdf"),
        )
        .mount(&server)
        .await;

    let resolution = resolver_for(&server)
        .resolve("/auth/dok/rfmgr.pl?download=7")
        .await;

    let Resolution::Ready { location, body } = resolution else {
        panic!("expected ready resolution, got {resolution:?}");
    };
    assert_eq!(location.file_name, "Prednaska 92.pdf");
    assert_eq!(location.kind, ContentKind::Document);
    assert_eq!(body, b"%PDF-1.7");
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn intermediate_page_is_followed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/el/um/doc.html"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body>
                <a href="/auth/osoba/1">Jana Nováková</a>
                <a href="/auth/dok/rfmgr.pl?download=9"><img src="/pics/mime/pdf.svg"></a>
            </body></html>"#,
            "text/html; charset=utf-8",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/dok/rfmgr.pl"))
        .and(query_param("download", "9"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF".to_vec(), "application/pdf"))
        .mount(&server)
        .await;

    let resolution = resolver_for(&server).resolve("/auth/el/um/doc.html").await;

    let Resolution::Ready { location, .. } = resolution else {
        panic!("expected ready resolution, got {resolution:?}");
    };
    assert!(location.uri.contains("download=9"));
    assert!(location.file_name.starts_with("rfmgr--"));
    assert!(location.file_name.ends_with(".pdf"));
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn view_reference_is_rewritten_without_a_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/dok/rfmgr.pl"))
        .and(query_param("download", "4521"))
        .and(query_param("vid", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", "attachment; filename=ukol.zip")
                .set_body_raw(b"PK".to_vec(), "application/zip"),
        )
        .mount(&server)
        .await;

    let resolution = resolver_for(&server)
        .resolve("/auth/dok/rfmgr.pl?view=4521;vid=3")
        .await;

    let Resolution::Ready { location, .. } = resolution else {
        panic!("expected ready resolution, got {resolution:?}");
    };
    assert_eq!(location.file_name, "ukol.zip");
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn html_instead_of_a_file_opens_externally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/dok/rfmgr.pl"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>Přihlášení</body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let resolution = resolver_for(&server)
        .resolve("/auth/dok/rfmgr.pl?download=5")
        .await;

    let Resolution::OpenExternally(location) = resolution else {
        panic!("expected external opening, got {resolution:?}");
    };
    assert_eq!(location.kind, ContentKind::HtmlUnexpected);
    assert!(location.uri.ends_with("/auth/dok/rfmgr.pl?download=5"));
}

#[tokio::test]
async fn page_without_download_anchor_keeps_original_reference() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/el/um/notes.html"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><a href="/auth/el/um/">Zpět</a></body></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    let resolution = resolver_for(&server)
        .resolve("/auth/el/um/notes.html#top")
        .await;

    let Resolution::OpenExternally(location) = resolution else {
        panic!("expected external opening, got {resolution:?}");
    };
    assert!(location.uri.ends_with("/auth/el/um/notes.html"));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn non_html_hop_response_is_the_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/el/um/slides.pptx"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            b"PK\x03\x04".to_vec(),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ))
        .mount(&server)
        .await;

    let resolution = resolver_for(&server).resolve("/auth/el/um/slides.pptx").await;

    let Resolution::Ready { location, .. } = resolution else {
        panic!("expected ready resolution, got {resolution:?}");
    };
    assert_eq!(location.kind, ContentKind::Document);
    assert!(location.file_name.ends_with(".pptx"));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn terminal_failure_is_reported_with_best_known_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/dok/rfmgr.pl"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let resolution = resolver_for(&server)
        .resolve("/auth/dok/rfmgr.pl?download=11")
        .await;

    let Resolution::RetrievalFailed { location, failure } = resolution else {
        panic!("expected retrieval failure, got {resolution:?}");
    };
    assert_eq!(failure.kind, FailureKind::HttpStatus(404));
    assert!(location.uri.contains("download=11"));
}

#[tokio::test]
async fn failed_intermediate_page_is_not_requested_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/el/um/doc.html"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let resolution = resolver_for(&server).resolve("/auth/el/um/doc.html").await;

    let Resolution::RetrievalFailed { location, failure } = resolution else {
        panic!("expected retrieval failure, got {resolution:?}");
    };
    assert_eq!(failure.kind, FailureKind::HttpStatus(503));
    assert!(location.uri.ends_with("/auth/el/um/doc.html"));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn offsite_reference_is_refused_without_retrieval() {
    let server = MockServer::start().await;

    let resolution = resolver_for(&server)
        .resolve("https://evil.example.com/auth/dok/rfmgr.pl?download=1")
        .await;

    let Resolution::RetrievalFailed { failure, .. } = resolution else {
        panic!("expected retrieval failure, got {resolution:?}");
    };
    assert_eq!(failure.kind, FailureKind::InvalidUrl);
    assert_eq!(request_count(&server).await, 0);
}
