//! Behaviour of the full rewrite/auth/filter pipeline against a test forwarder.

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use cors_proxy::http::CapturedResponse;
use cors_proxy::proxy::{HeaderList, RequestMetadata};
use cors_proxy::{AuthChecker, AuthDecision, CorsPolicy, CorsProxy, Protocol, ProxyError};

mod common;
use common::{banned_headers, default_request, FailingForwarder, RecordingForwarder};

const ACAO: HeaderName = header::ACCESS_CONTROL_ALLOW_ORIGIN;

struct Outcome {
    captured: CapturedResponse,
    body: String,
}

impl Outcome {
    fn status(&self) -> StatusCode {
        self.captured.head().expect("response not started").status
    }

    fn status_line(&self) -> String {
        self.captured.head().expect("response not started").status_line()
    }

    fn headers(&self) -> &HeaderList {
        &self.captured.head().expect("response not started").headers
    }

    fn has_header(&self, name: &HeaderName, value: &str) -> bool {
        self.headers().iter().any(|(n, v)| n == name && v == value)
    }
}

async fn call(proxy: &CorsProxy, request: RequestMetadata) -> Result<Outcome, ProxyError> {
    let mut captured = CapturedResponse::new();
    let body = proxy.handle(request, Body::empty(), &mut captured).await?;
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    Ok(Outcome {
        captured,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    })
}

fn with_origin(origin: &'static str) -> RequestMetadata {
    let mut req = default_request();
    req.headers.insert(header::ORIGIN, HeaderValue::from_static(origin));
    req
}

fn https_request() -> RequestMetadata {
    let mut req = default_request();
    req.scheme = "https".into();
    req.secure = true;
    req
}

#[tokio::test]
async fn test_basic() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone()).build();

    let out = call(&proxy, default_request()).await.unwrap();
    assert_eq!(out.body, "Success!");
    assert_eq!(out.status_line(), "200 OK");
    assert_eq!(forwarder.last().scheme, "http");
    assert_eq!(forwarder.calls(), 1);
}

#[tokio::test]
async fn test_auth_true() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone())
        .auth(|_: &RequestMetadata| AuthDecision::from(true))
        .build();

    let out = call(&proxy, default_request()).await.unwrap();
    assert_eq!(out.status(), StatusCode::OK);
    assert_eq!(forwarder.calls(), 1);
}

#[tokio::test]
async fn test_auth_false() {
    let forwarder = RecordingForwarder::with_response(StatusCode::OK, banned_headers(), "Success!");
    let proxy = CorsProxy::builder("localhost", forwarder.clone())
        .auth(|_: &RequestMetadata| AuthDecision::from(false))
        .allow_from(CorsPolicy::Any)
        .build();

    let out = call(&proxy, default_request()).await.unwrap();
    assert_eq!(out.status_line(), "401 Unauthorized");
    assert_eq!(out.body, "");
    assert!(out.headers().is_empty(), "denial skips the header filter");
    assert_eq!(forwarder.calls(), 0);
    assert!(proxy.last_request().is_none(), "denied requests are never rewritten");
}

#[tokio::test]
async fn test_auth_message() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone())
        .auth(|_: &RequestMetadata| AuthDecision::from("My error message"))
        .build();

    let out = call(&proxy, default_request()).await.unwrap();
    assert_eq!(out.status_line(), "401 Unauthorized");
    assert_eq!(out.body, "My error message");
    assert_eq!(forwarder.calls(), 0);
}

struct ExplodingAuth;

impl AuthChecker for ExplodingAuth {
    fn check(&self, _request: &RequestMetadata) -> Result<AuthDecision, ProxyError> {
        Err(ProxyError::Auth("token store unavailable".into()))
    }
}

#[tokio::test]
async fn test_auth_error_propagates() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone())
        .auth(ExplodingAuth)
        .build();

    let err = call(&proxy, default_request()).await.err().unwrap();
    assert!(matches!(err, ProxyError::Auth(_)));
    assert_eq!(forwarder.calls(), 0);
}

#[tokio::test]
async fn test_auth_sees_inbound_request() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("upstream.example", forwarder.clone())
        .auth(|req: &RequestMetadata| AuthDecision::from(req.server_name == "localhost"))
        .build();

    let out = call(&proxy, default_request()).await.unwrap();
    assert_eq!(out.status(), StatusCode::OK);
    assert_eq!(forwarder.last().server_name, "upstream.example");
}

#[tokio::test]
async fn test_keep_https() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone()).build();

    let out = call(&proxy, https_request()).await.unwrap();
    assert_eq!(out.body, "Success!");
    let seen = forwarder.last();
    assert_eq!(seen.scheme, "https");
    assert!(seen.secure);
}

#[tokio::test]
async fn test_keep_http() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone()).build();

    call(&proxy, default_request()).await.unwrap();
    let seen = forwarder.last();
    assert_eq!(seen.scheme, "http");
    assert!(!seen.secure);
}

#[tokio::test]
async fn test_force_http_downgrade() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone())
        .target_protocol("http")
        .build();

    call(&proxy, https_request()).await.unwrap();
    let seen = forwarder.last();
    assert_eq!(seen.scheme, "http");
    assert_eq!(seen.server_port, 80);
    assert!(!seen.secure);
}

#[tokio::test]
async fn test_force_https_upgrade() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone())
        .target_protocol("https")
        .build();

    call(&proxy, default_request()).await.unwrap();
    let seen = forwarder.last();
    assert_eq!(seen.scheme, "https");
    assert_eq!(seen.server_port, 443);
    assert!(seen.secure);
}

#[tokio::test]
async fn test_bad_target_protocol() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone())
        .target_protocol("junkproto")
        .build();

    let err = call(&proxy, default_request()).await.err().unwrap();
    assert!(matches!(err, ProxyError::InvalidProtocol(p) if p == "junkproto"));
    assert_eq!(forwarder.calls(), 0);
}

#[tokio::test]
async fn test_target_protocol_odd_caps() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone())
        .target_protocol("hTTp")
        .build();

    call(&proxy, https_request()).await.unwrap();
    assert_eq!(forwarder.last().scheme, "http");
}

#[tokio::test]
async fn test_bad_url_scheme_from_server() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone()).build();

    let mut req = default_request();
    req.scheme = "somejunk".into();
    let err = call(&proxy, req).await.err().unwrap();
    assert!(matches!(err, ProxyError::InvalidProtocol(_)));
    assert_eq!(forwarder.calls(), 0);
}

#[tokio::test]
async fn test_fix_inbound_scheme_odd_caps() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone()).build();

    let mut req = default_request();
    req.scheme = "hTTp".into();
    call(&proxy, req).await.unwrap();
    assert_eq!(forwarder.last().scheme, "http");
}

#[tokio::test]
async fn test_runtime_protocol_change_is_normalized() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone()).build();
    assert_eq!(proxy.target_protocol().unwrap(), None);

    proxy.set_target_protocol(Some("hTTpS"));
    assert_eq!(proxy.target_protocol().unwrap(), Some(Protocol::Https));
    call(&proxy, default_request()).await.unwrap();
    assert_eq!(forwarder.last().scheme, "https");
    assert_eq!(forwarder.last().server_port, 443);

    proxy.set_target_protocol(Some("hTTp"));
    call(&proxy, https_request()).await.unwrap();
    assert_eq!(forwarder.last().scheme, "http");
    assert!(!forwarder.last().secure);

    proxy.set_target_protocol(Some("gopher"));
    assert!(proxy.target_protocol().is_err());
    let err = call(&proxy, default_request()).await.err().unwrap();
    assert!(matches!(err, ProxyError::InvalidProtocol(_)));

    proxy.set_target_protocol(None);
    call(&proxy, https_request()).await.unwrap();
    assert_eq!(forwarder.last().scheme, "https");
}

#[tokio::test]
async fn test_pick_port_http() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone()).build();

    call(&proxy, default_request()).await.unwrap();
    assert_eq!(proxy.last_request().unwrap().server_port, 80);
    assert_eq!(forwarder.last().server_port, 80);
}

#[tokio::test]
async fn test_pick_port_https() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone()).build();

    let mut req = default_request();
    req.scheme = "https".into();
    call(&proxy, req).await.unwrap();
    assert_eq!(proxy.last_request().unwrap().server_port, 443);
    assert_eq!(forwarder.last().server_port, 443);
}

#[tokio::test]
async fn test_update_host_server() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("self.domain", forwarder.clone()).build();

    call(&proxy, default_request()).await.unwrap();
    let seen = forwarder.last();
    assert_eq!(seen.server_name, "self.domain");
    assert_eq!(seen.host_header(), Some("self.domain:80"));
}

#[tokio::test]
async fn test_keep_odd_port() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone()).port(17).build();

    call(&proxy, https_request()).await.unwrap();
    let seen = forwarder.last();
    assert_eq!(seen.host_header(), Some("localhost:17"));
    assert_eq!(seen.server_port, 17);
    assert_eq!(proxy.last_request().unwrap().server_port, 17);
}

#[tokio::test]
async fn test_other_fields_pass_through() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("upstream.example", forwarder.clone()).build();

    let mut req = default_request();
    req.path = "/api/items".into();
    req.query = Some("page=2".into());
    call(&proxy, req.clone()).await.unwrap();

    let seen = forwarder.last();
    assert_eq!(seen.path, "/api/items");
    assert_eq!(seen.query.as_deref(), Some("page=2"));
    assert_eq!(seen.method, req.method);
    assert_eq!(seen.remote_addr, req.remote_addr);
    assert_eq!(seen.headers.get(header::USER_AGENT), req.headers.get(header::USER_AGENT));
}

#[tokio::test]
async fn test_add_headers() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder)
        .add_header(HeaderName::from_static("x-my-special-header"), HeaderValue::from_static("My-Value"))
        .build();

    let out = call(&proxy, default_request()).await.unwrap();
    assert_eq!(
        out.headers(),
        &vec![(HeaderName::from_static("x-my-special-header"), HeaderValue::from_static("My-Value"))]
    );
}

#[tokio::test]
async fn test_remove_bad_headers() {
    let mut builder = CorsProxy::builder("localhost", RecordingForwarder::new());
    for (name, value) in banned_headers() {
        builder = builder.add_header(name, value);
    }
    let proxy = builder.build();

    let out = call(&proxy, default_request()).await.unwrap();
    assert!(out.headers().is_empty());
}

#[tokio::test]
async fn test_remove_bad_upstream_headers() {
    let forwarder = RecordingForwarder::with_response(StatusCode::OK, banned_headers(), "Success!");
    let proxy = CorsProxy::builder("localhost", forwarder).build();

    let out = call(&proxy, default_request()).await.unwrap();
    assert!(out.headers().is_empty());
}

#[tokio::test]
async fn test_dont_remove_bad_headers() {
    let forwarder = RecordingForwarder::with_response(StatusCode::OK, banned_headers(), "Success!");
    let proxy = CorsProxy::builder("localhost", forwarder).build();

    let mut req = default_request();
    req.server_software = "Not wsgiref".into();
    let out = call(&proxy, req).await.unwrap();
    assert_eq!(out.headers(), &banned_headers());
}

#[tokio::test]
async fn test_add_headers_follow_upstream_headers_for_every_policy() {
    let upstream = vec![(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))];
    let added = [
        (HeaderName::from_static("x-one"), HeaderValue::from_static("1")),
        (HeaderName::from_static("x-two"), HeaderValue::from_static("2")),
    ];

    for policy in [
        CorsPolicy::Disabled,
        CorsPolicy::Any,
        CorsPolicy::EchoOrigin,
        CorsPolicy::Origins(vec!["my.domain".into()]),
    ] {
        let forwarder = RecordingForwarder::with_response(StatusCode::OK, upstream.clone(), "");
        let mut builder = CorsProxy::builder("localhost", forwarder).allow_from(policy.clone());
        for (name, value) in added.clone() {
            builder = builder.add_header(name, value);
        }
        let proxy = builder.build();

        let out = call(&proxy, with_origin("my.domain")).await.unwrap();
        assert_eq!(&out.headers()[..3], &[upstream[0].clone(), added[0].clone(), added[1].clone()], "{policy:?}");
    }
}

#[tokio::test]
async fn test_added_acao_star_no_origin() {
    let proxy = CorsProxy::builder("localhost", RecordingForwarder::new())
        .allow_from(CorsPolicy::Any)
        .build();

    let out = call(&proxy, default_request()).await.unwrap();
    assert!(out.has_header(&ACAO, "*"));
}

#[tokio::test]
async fn test_added_acao_false_origin() {
    let proxy = CorsProxy::builder("localhost", RecordingForwarder::new())
        .allow_from(CorsPolicy::Disabled)
        .build();

    let out = call(&proxy, with_origin("my.domain")).await.unwrap();
    assert!(!out.headers().iter().any(|(n, _)| n == ACAO));
}

#[tokio::test]
async fn test_added_acao_true_origin() {
    let proxy = CorsProxy::builder("localhost", RecordingForwarder::new())
        .allow_from(CorsPolicy::Any)
        .build();

    let out = call(&proxy, with_origin("my.domain")).await.unwrap();
    assert!(out.has_header(&ACAO, "my.domain"));
}

#[tokio::test]
async fn test_added_acao_star_origin() {
    let proxy = CorsProxy::builder("localhost", RecordingForwarder::new())
        .allow_from(CorsPolicy::EchoOrigin)
        .build();

    let out = call(&proxy, with_origin("my.domain")).await.unwrap();
    assert!(out.has_header(&ACAO, "my.domain"));

    let out = call(&proxy, default_request()).await.unwrap();
    assert!(!out.headers().iter().any(|(n, _)| n == ACAO));
}

#[tokio::test]
async fn test_acao_origin_list_match() {
    let proxy = CorsProxy::builder("localhost", RecordingForwarder::new())
        .allow_from(CorsPolicy::Origins(vec![
            "google.com".into(),
            "my.domain".into(),
            "microsoft.com".into(),
        ]))
        .build();

    let out = call(&proxy, with_origin("my.domain")).await.unwrap();
    assert!(out.has_header(&ACAO, "my.domain"));
}

#[tokio::test]
async fn test_acao_origin_list_no_match() {
    let origins = CorsPolicy::Origins(vec!["google.com".into(), "microsoft.com".into()]);

    let proxy = CorsProxy::builder("localhost", RecordingForwarder::new())
        .allow_from(origins.clone())
        .build();
    let out = call(&proxy, with_origin("my.domain")).await.unwrap();
    assert!(!out.headers().iter().any(|(n, _)| n == ACAO));

    let legacy = CorsProxy::builder("localhost", RecordingForwarder::new())
        .allow_from(origins)
        .legacy_origin_fallback(true)
        .build();
    let out = call(&legacy, with_origin("my.domain")).await.unwrap();
    assert!(!out.has_header(&ACAO, "my.domain"));
    assert!(out.has_header(&ACAO, "google.com"));
}

#[tokio::test]
async fn test_https_scenario_with_cors() {
    let forwarder = RecordingForwarder::new();
    let proxy = CorsProxy::builder("localhost", forwarder.clone())
        .allow_from(CorsPolicy::Any)
        .build();

    let out = call(&proxy, https_request()).await.unwrap();

    let seen = forwarder.last();
    assert_eq!(seen.scheme, "https");
    assert!(seen.secure);
    assert_eq!(seen.server_port, 443);
    assert_eq!(seen.host_header(), Some("localhost:443"));
    assert!(out.has_header(&ACAO, "*"));
}

#[tokio::test]
async fn test_upstream_status_passes_through() {
    let forwarder = RecordingForwarder::with_response(StatusCode::NOT_FOUND, Vec::new(), "missing");
    let proxy = CorsProxy::builder("localhost", forwarder).build();

    let out = call(&proxy, default_request()).await.unwrap();
    assert_eq!(out.status_line(), "404 Not Found");
    assert_eq!(out.body, "missing");
}

#[tokio::test]
async fn test_forwarder_error_propagates() {
    let proxy = CorsProxy::builder("localhost", FailingForwarder)
        .allow_from(CorsPolicy::Any)
        .build();

    let err = call(&proxy, default_request()).await.err().unwrap();
    assert!(matches!(err, ProxyError::NoResponse));
    // The rewrite already happened and stays observable.
    assert_eq!(proxy.last_request().unwrap().host_header(), Some("localhost:80"));
}
