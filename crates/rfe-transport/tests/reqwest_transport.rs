// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `reqwest` transport against a live stub server.

use rfe_core::HttpVerb;
use rfe_transport::{
    HttpTransport, PreparedBody, PreparedRequest, ReqwestTransport, ResponseBody, TransportFailure,
    TransportSettings,
};
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(timeout_ms: u64, max_body_bytes: usize) -> TransportSettings {
    TransportSettings {
        timeout: Duration::from_millis(timeout_ms),
        connect_timeout: Duration::from_millis(timeout_ms),
        max_body_bytes,
    }
}

fn get(url: String) -> PreparedRequest {
    PreparedRequest {
        verb: HttpVerb::Get,
        url,
        headers: vec![("Accept".into(), "*/*".into())],
        body: None,
    }
}

// ---------------------------------------------------------------------------
// Successful exchanges
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sends_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("content-type", "application/json"))
        .and(header("x-trace", "t1"))
        .and(body_string(r#"{"name":"ann"}"#))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Location", "/users/9")
                .insert_header("Content-Type", "application/json")
                .set_body_string(r#"{"id":9}"#),
        )
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(&settings(2_000, 1_000)).unwrap();
    let request = PreparedRequest {
        verb: HttpVerb::Post,
        url: format!("{}/users", server.uri()),
        headers: vec![("X-Trace".into(), "t1".into())],
        body: Some(PreparedBody {
            content_type: "application/json".into(),
            payload: r#"{"name":"ann"}"#.into(),
        }),
    };
    let response = transport.send(&request).await.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.location(), Some("/users/9"));
    assert_eq!(response.content_type(), Some("application/json"));
    assert_eq!(response.body, ResponseBody::Text(r#"{"id":9}"#.into()));
}

#[tokio::test]
async fn empty_body_is_reported_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let transport = ReqwestTransport::new(&settings(2_000, 1_000)).unwrap();
    let mut request = get(format!("{}/users/1", server.uri()));
    request.verb = HttpVerb::Delete;
    let response = transport.send(&request).await.unwrap();
    assert_eq!(response.status, 204);
    assert_eq!(response.body, ResponseBody::Empty);
}

#[tokio::test]
async fn body_over_limit_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(200)))
        .mount(&server)
        .await;
    let transport = ReqwestTransport::new(&settings(2_000, 100)).unwrap();
    let response = transport.send(&get(server.uri())).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, ResponseBody::TooLarge);
}

#[tokio::test]
async fn body_at_limit_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(100)))
        .mount(&server)
        .await;
    let transport = ReqwestTransport::new(&settings(2_000, 100)).unwrap();
    let response = transport.send(&get(server.uri())).await.unwrap();
    assert_eq!(response.body, ResponseBody::Text("x".repeat(100)));
}

#[tokio::test]
async fn redirect_is_returned_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let transport = ReqwestTransport::new(&settings(2_000, 1_000)).unwrap();
    let response = transport.send(&get(format!("{}/old", server.uri()))).await.unwrap();
    assert_eq!(response.status, 302);
    assert_eq!(response.location(), Some("/new"));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slow_response_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1_500)))
        .mount(&server)
        .await;
    let transport = ReqwestTransport::new(&settings(200, 1_000)).unwrap();
    let err = transport.send(&get(server.uri())).await.unwrap_err();
    assert_eq!(err.failure, TransportFailure::Timeout);
}

#[tokio::test]
async fn closed_port_is_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let transport = ReqwestTransport::new(&settings(2_000, 1_000)).unwrap();
    let err = transport
        .send(&get(format!("http://127.0.0.1:{port}/")))
        .await
        .unwrap_err();
    assert_eq!(err.failure, TransportFailure::ConnectionRefused);
}

#[tokio::test]
async fn malformed_url_is_internal() {
    let transport = ReqwestTransport::new(&settings(2_000, 1_000)).unwrap();
    let err = transport.send(&get("not a url".into())).await.unwrap_err();
    assert_eq!(err.failure, TransportFailure::Internal);
}
