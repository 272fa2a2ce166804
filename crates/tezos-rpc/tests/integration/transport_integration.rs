//! Request dispatch, response classification and hooks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tezos_rpc::{Error, RequestInfo, RpcClient, RpcError, RpcObserver, RpcRequest, Service};

use crate::init_tracing;
use crate::mock::{MockNode, Reply};

#[tokio::test]
async fn test_call_decodes_one_value() {
    init_tracing();
    let node = MockNode::start(vec![(
        "/network/stat",
        Reply::json(r#"{"total_sent":"291690080","total_recv":"532639553","current_inflow":23596,"current_outflow":14972}"#),
    )])
    .await;

    let service = Service::new(RpcClient::new(node.url()).unwrap());
    let stats = service.network_stats().await.unwrap();
    assert_eq!(stats.total_bytes_sent, 291_690_080);
    assert_eq!(stats.total_bytes_recv, 532_639_553);
    assert_eq!(stats.current_outflow, 14972);
}

#[tokio::test]
async fn test_request_headers() {
    init_tracing();
    let node = MockNode::start(vec![("/chains/main/blocks/head/votes/current_quorum", Reply::json("5800"))]).await;

    let client = RpcClient::builder(node.url())
        .user_agent("tezos_exporter/1.0")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let quorum = Service::new(client).current_quorum("main", "head").await.unwrap();
    assert_eq!(quorum, 5800);

    let requests = node.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].target, "/chains/main/blocks/head/votes/current_quorum");
    assert_eq!(requests[0].header("user-agent"), Some("tezos_exporter/1.0"));
    assert_eq!(requests[0].header("accept"), Some("application/json"));
    assert_eq!(requests[0].header("content-type"), None);
}

#[tokio::test]
async fn test_no_content() {
    init_tracing();
    let node = MockNode::start(vec![("/network/stat", Reply::no_content())]).await;
    let client = RpcClient::new(node.url()).unwrap();

    let raw: Option<Value> = client.call(RpcRequest::get("/network/stat")).await.unwrap();
    assert!(raw.is_none());

    let err = Service::new(client).network_stats().await.unwrap_err();
    assert!(matches!(err, Error::NoContent(ref path) if path == "/network/stat"), "{:?}", err);
}

#[tokio::test]
async fn test_node_error_records() {
    init_tracing();
    let body = r#"[{"kind":"permanent","id":"proto.alpha.context.storage_error","missing_key":["rolls"]}]"#;
    let node = MockNode::start(vec![(
        "/chains/main/blocks/head/votes/ballots",
        Reply::status(500, Some("application/json"), body),
    )])
    .await;

    let err = Service::new(RpcClient::new(node.url()).unwrap())
        .ballots("main", "head")
        .await
        .unwrap_err();
    let rpc = err.as_rpc().expect("classified RPC error");
    assert_eq!(rpc.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rpc.errors().len(), 1);
    assert_eq!(rpc.errors()[0].id, "proto.alpha.context.storage_error");
    assert_eq!(rpc.body(), body.as_bytes());
}

#[tokio::test]
async fn test_empty_and_malformed_error_bodies() {
    init_tracing();
    let node = MockNode::start(vec![
        ("/empty", Reply::status(500, Some("application/json"), "[]")),
        ("/malformed", Reply::status(502, Some("application/json"), "{,}")),
    ])
    .await;
    let client = RpcClient::new(node.url()).unwrap();

    let err = client.execute(RpcRequest::get("/empty")).await.unwrap_err();
    assert!(matches!(err, Error::Rpc(RpcError::Empty { .. })), "{:?}", err);

    let err = client.execute(RpcRequest::get("/malformed")).await.unwrap_err();
    match err {
        Error::Rpc(RpcError::Malformed { status, .. }) => assert_eq!(status, StatusCode::BAD_GATEWAY),
        other => panic!("expected Malformed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_error_is_plain_http() {
    init_tracing();
    let node = MockNode::start(vec![]).await;

    let err = Service::new(RpcClient::new(node.url()).unwrap())
        .block("main", "BLnoArJNPCyYFK2z3Mnomi36Jo3FwrjriJ6hvzgTJGYYDKEkDXm")
        .await
        .unwrap_err();
    match err.as_rpc() {
        Some(RpcError::Http { status, body }) => {
            assert_eq!(*status, StatusCode::NOT_FOUND);
            assert_eq!(body, b"Not found");
        }
        other => panic!("expected Http, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_success_body_is_decode_error() {
    init_tracing();
    let node = MockNode::start(vec![("/network/stat", Reply::json(r#"{"total_sent":1}"#))]).await;

    let err = Service::new(RpcClient::new(node.url()).unwrap())
        .network_stats()
        .await
        .unwrap_err();
    assert!(err.is_decode(), "{:?}", err);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    init_tracing();
    let client = RpcClient::new("http://127.0.0.1:1").unwrap();
    let err = client.execute(RpcRequest::get("/network/stat")).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{:?}", err);
}

#[derive(Default)]
struct Recorder {
    headers: Mutex<Vec<(u64, u16)>>,
    completed: Mutex<Vec<(u64, bool)>>,
}

struct Hooks(Arc<Recorder>);

impl RpcObserver for Hooks {
    fn on_headers(&self, request: &RequestInfo, status: StatusCode, _elapsed: Duration) {
        self.0.headers.lock().unwrap().push((request.id, status.as_u16()));
    }

    fn on_complete(&self, request: &RequestInfo, _elapsed: Duration, outcome: Result<(), &Error>) {
        self.0.completed.lock().unwrap().push((request.id, outcome.is_ok()));
    }
}

#[tokio::test]
async fn test_observer_hooks() {
    init_tracing();
    let node = MockNode::start(vec![
        ("/chains/main/blocks/head/votes/current_period_kind", Reply::json(r#""proposal""#)),
        ("/chains/main/blocks/head/votes/current_proposal", Reply::status(500, Some("text/plain"), "boom")),
    ])
    .await;

    let recorder = Arc::new(Recorder::default());
    let client = RpcClient::builder(node.url())
        .observer(Hooks(recorder.clone()))
        .build()
        .unwrap();
    let service = Service::new(client);

    let kind = service.current_period_kind("main", "head").await.unwrap();
    assert!(kind.is_proposal());
    assert!(service.current_proposal("main", "head").await.is_err());

    assert_eq!(*recorder.headers.lock().unwrap(), vec![(0, 200), (1, 500)]);
    assert_eq!(*recorder.completed.lock().unwrap(), vec![(0, true), (1, false)]);
}
