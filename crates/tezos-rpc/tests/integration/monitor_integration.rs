//! Streaming monitors: delivery order, truncated bodies, cancellation.

use std::time::Duration;

use tezos_rpc::{BlockInfo, Error, RpcClient, RpcRequest, Service, with_deadline};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::init_tracing;
use crate::mock::{MockNode, Reply};

const HEAD_1: &str = r#"{"hash":"BLnoArJNPCyYFK2z3Mnomi36Jo3FwrjriJ6hvzgTJGYYDKEkDXm","level":219133,"proto":1,"predecessor":"BLNWdEensT9MFq8pkDwjHfGVFsV1reYUhVcMAVzq3LCMS1WdKZ8","timestamp":"2018-11-27T17:49:57Z","validation_pass":4,"operations_hash":"LLoaGLRPRx3Zf8kB4ACtgku8F4feeBiskeb41J1ciwfcXB3KzHKXc","fitness":["00","000000000003f1a2"],"context":"CoVGQd4Yo6a1d4FQ9L3Ktwkf5Ks9UJKGbZWzV7ESsyzBGbM1uWR6","protocol_data":""}"#;
const HEAD_2: &str = r#"{"hash":"BMRk6ckH8emVomsbPd4cWAqwpedoVwgj8UgFKPTzMm6vYyF5kjX","level":219134,"timestamp":"2018-11-27T17:50:27Z","fitness":["00","000000000003f1a3"]}"#;
const HEAD_3: &str = r#"{"hash":"BLyGCFGp3MAusXWyrQ45qn9pgy26umzAQTdeupUPtyMpZYK7fqj","level":219135,"timestamp":"2018-11-27T17:50:57Z","fitness":["00","000000000003f1a4"]}"#;

async fn collect_heads(service: &Service) -> (Result<(), Error>, Vec<BlockInfo>) {
    let (tx, mut rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let outcome = service.monitor_heads("main", &tx, &cancel).await;
    drop(tx);

    let mut heads = Vec::new();
    while let Some(head) = rx.recv().await {
        heads.push(head);
    }
    (outcome, heads)
}

#[tokio::test]
async fn test_heads_in_order() {
    init_tracing();
    let first_two = format!("{}\n{}", HEAD_1, HEAD_2);
    let node = MockNode::start(vec![(
        "/monitor/heads/main",
        Reply::stream(&[first_two.as_str(), "\n", HEAD_3]),
    )])
    .await;

    let (outcome, heads) = collect_heads(&Service::new(RpcClient::new(node.url()).unwrap())).await;
    outcome.unwrap();
    let levels: Vec<i32> = heads.iter().map(|h| h.level).collect();
    assert_eq!(levels, vec![219133, 219134, 219135]);
    assert_eq!(heads[0].fitness, vec![vec![0x00], vec![0, 0, 0, 0, 0, 0x03, 0xf1, 0xa2]]);
}

#[tokio::test]
async fn test_missing_final_chunk_is_clean_end() {
    init_tracing();
    let node = MockNode::start(vec![(
        "/monitor/heads/main",
        Reply::stream(&[HEAD_1, "\n", HEAD_2, "\n", HEAD_3, "\n"]).unterminated(),
    )])
    .await;

    let (outcome, heads) = collect_heads(&Service::new(RpcClient::new(node.url()).unwrap())).await;
    outcome.unwrap();
    assert_eq!(heads.len(), 3);
}

#[tokio::test]
async fn test_truncated_value_is_an_error() {
    init_tracing();
    let node = MockNode::start(vec![(
        "/monitor/heads/main",
        Reply::stream(&[HEAD_1, "\n", r#"{"hash":"BMRk6ck"#]).unterminated(),
    )])
    .await;

    let (outcome, heads) = collect_heads(&Service::new(RpcClient::new(node.url()).unwrap())).await;
    assert_eq!(heads.len(), 1);
    assert!(outcome.unwrap_err().is_decode());
}

#[tokio::test]
async fn test_schema_mismatch_stops_stream() {
    init_tracing();
    let node = MockNode::start(vec![(
        "/monitor/heads/main",
        Reply::stream(&[HEAD_1, r#"{"level":"high"}"#, HEAD_3]),
    )])
    .await;

    let (outcome, heads) = collect_heads(&Service::new(RpcClient::new(node.url()).unwrap())).await;
    assert_eq!(heads.len(), 1);
    assert!(outcome.unwrap_err().is_decode());
}

#[tokio::test]
async fn test_connection_reset_is_a_body_error() {
    init_tracing();
    let node = MockNode::start(vec![(
        "/monitor/heads/main",
        Reply::stream(&[HEAD_1, "\n"]).reset(),
    )])
    .await;

    let (outcome, heads) = collect_heads(&Service::new(RpcClient::new(node.url()).unwrap())).await;
    assert_eq!(heads.len(), 1);
    assert!(matches!(outcome, Err(Error::Body(_))), "{:?}", outcome);
}

#[tokio::test]
async fn test_error_status_on_stream() {
    init_tracing();
    let node = MockNode::start(vec![(
        "/monitor/heads/main",
        Reply::status(500, Some("application/json"), r#"{"kind":"temporary","id":"node.shutdown"}"#),
    )])
    .await;

    let (outcome, heads) = collect_heads(&Service::new(RpcClient::new(node.url()).unwrap())).await;
    assert!(heads.is_empty());
    let err = outcome.unwrap_err();
    assert_eq!(err.as_rpc().unwrap().errors()[0].id, "node.shutdown");
}

#[tokio::test]
async fn test_no_content_stream_is_empty() {
    init_tracing();
    let node = MockNode::start(vec![("/monitor/heads/main", Reply::no_content())]).await;

    let (outcome, heads) = collect_heads(&Service::new(RpcClient::new(node.url()).unwrap())).await;
    outcome.unwrap();
    assert!(heads.is_empty());
}

#[tokio::test]
async fn test_cancel_after_first_value() {
    init_tracing();
    let node = MockNode::start(vec![(
        "/monitor/heads/main",
        Reply::stream(&[HEAD_1, "\n"]).held_open(),
    )])
    .await;

    let service = Service::new(RpcClient::new(node.url()).unwrap());
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(4);

    let task = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { service.monitor_heads("main", &tx, &cancel).await })
    };

    let first = rx.recv().await.unwrap();
    assert_eq!(first.level, 219133);

    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("stream did not stop")
        .unwrap();
    assert!(outcome.unwrap_err().is_cancelled());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_cancel_drops_buffered_values() {
    init_tracing();
    let all = format!("{}\n{}\n{}\n", HEAD_1, HEAD_2, HEAD_3);
    let node = MockNode::start(vec![(
        "/monitor/heads/main",
        Reply::stream(&[all.as_str()]).held_open(),
    )])
    .await;

    let service = Service::new(RpcClient::new(node.url()).unwrap());
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(1);

    let task = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { service.monitor_heads("main", &tx, &cancel).await })
    };

    let first = rx.recv().await.unwrap();
    assert_eq!(first.level, 219133);

    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("stream did not stop")
        .unwrap();
    assert!(outcome.unwrap_err().is_cancelled());

    let mut rest = 0;
    while rx.recv().await.is_some() {
        rest += 1;
    }
    assert_eq!(rest, 0);
}

#[tokio::test]
async fn test_cancelled_before_connect() {
    init_tracing();
    let node = MockNode::start(vec![("/monitor/heads/main", Reply::stream(&[HEAD_1]))]).await;
    let client = RpcClient::new(node.url()).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, mut rx) = mpsc::channel::<BlockInfo>(4);
    let err = client
        .stream(RpcRequest::get("/monitor/heads/main"), &tx, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    drop(tx);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_deadline_stops_idle_stream() {
    init_tracing();
    let node = MockNode::start(vec![("/monitor/heads/main", Reply::stream(&[]).held_open())]).await;
    let service = Service::new(RpcClient::new(node.url()).unwrap());

    let deadline = with_deadline(&CancellationToken::new(), Duration::from_millis(100));
    let (tx, _rx) = mpsc::channel(4);
    let err = tokio::time::timeout(Duration::from_secs(5), service.monitor_heads("main", &tx, &deadline))
        .await
        .expect("deadline did not fire")
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_mempool_monitor_batches() {
    init_tracing();
    let op = |hash: &str, level: u32| {
        format!(
            r#"{{"hash":"{}","protocol":"PsYLVpVvgbLhAhoqAkMFUo6gudkJ9weNXhUYCiLDzcUpFpkk8Wt","branch":"BMLvebSvhTyZ7GG2vykV8hpGEc8egzcwn9fc3JJKrtCk8FssT9M","contents":[{{"kind":"endorsement","level":{}}}],"signature":"sigtTW5Y3xQaTKo5vEiqr8zG4YnPv7GbVbUgo7XYw7UZduz9jvdxzFbKUmftKFsFGH1UEZBbxyhyH5DLUUMh5KrQ3MENzUwC"}}"#,
            hash, level
        )
    };
    let first = format!("[{}]", op("opLHEC3xm8qPRP9g44oBpB45RzRVUoMX1NsX75sKKtNvA8pvSm2", 208806));
    let second = format!(
        "[{},{}]",
        op("oo1Z19oCkTWibLp7mJwFKP3UFVxuf6eV1iNWwJS7gZs8uZbrduS", 208807),
        op("onvBwqjPLfwSTAn7tHrvkrjBUJKYf6YLBpFeBENnAmHXKr6yMUE", 208807)
    );
    let node = MockNode::start(vec![(
        "/chains/main/mempool/monitor_operations",
        Reply::stream(&[first.as_str(), "\n", second.as_str(), "\n"]).unterminated(),
    )])
    .await;
    let service = Service::new(RpcClient::new(node.url()).unwrap());

    let (tx, mut rx) = mpsc::channel(16);
    service
        .monitor_mempool_operations("main", Some("applied"), &tx, &CancellationToken::new())
        .await
        .unwrap();
    drop(tx);

    let mut batches = Vec::new();
    while let Some(batch) = rx.recv().await {
        batches.push(batch);
    }
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[1].len(), 2);
    assert_eq!(batches[1][1].contents[0].kind(), "endorsement");

    assert_eq!(
        node.requests()[0].target,
        "/chains/main/mempool/monitor_operations?applied=true"
    );
}

#[tokio::test]
async fn test_peer_log_monitor() {
    init_tracing();
    let node = MockNode::start(vec![(
        "/network/peers/idrnHcGMrFxiYsmxf5Cqd6NhUTUU8X/log",
        Reply::stream(&[
            r#"[{"kind":"incoming_request","timestamp":"2018-11-28T08:21:14Z","addr":"::ffff:40.119.159.28","port":9732}]"#,
            r#"[{"kind":"connection_established","timestamp":"2018-11-28T08:21:15Z","addr":"::ffff:40.119.159.28","port":9732}]"#,
        ]),
    )])
    .await;
    let service = Service::new(RpcClient::new(node.url()).unwrap());

    let (tx, mut rx) = mpsc::channel(16);
    service
        .monitor_network_peer_log("idrnHcGMrFxiYsmxf5Cqd6NhUTUU8X", &tx, &CancellationToken::new())
        .await
        .unwrap();
    drop(tx);

    let first = rx.recv().await.unwrap();
    assert_eq!(first[0].kind, "incoming_request");
    assert_eq!(first[0].address.port, 9732);
    let second = rx.recv().await.unwrap();
    assert_eq!(second[0].kind, "connection_established");
    assert!(rx.recv().await.is_none());

    assert_eq!(
        node.requests()[0].target,
        "/network/peers/idrnHcGMrFxiYsmxf5Cqd6NhUTUU8X/log?monitor"
    );
}

#[tokio::test]
async fn test_bootstrapped_within() {
    init_tracing();
    let node = MockNode::start(vec![(
        "/monitor/bootstrapped",
        Reply::stream(&[r#"{"block":"BLnoArJNPCyYFK2z3Mnomi36Jo3FwrjriJ6hvzgTJGYYDKEkDXm","timestamp":"2018-11-27T17:49:57Z"}"#])
            .held_open(),
    )])
    .await;
    let service = Service::new(RpcClient::new(node.url()).unwrap());

    let block = service
        .bootstrapped_within(Duration::from_secs(5), &CancellationToken::new())
        .await
        .unwrap()
        .expect("bootstrapped block");
    assert_eq!(block.block, "BLnoArJNPCyYFK2z3Mnomi36Jo3FwrjriJ6hvzgTJGYYDKEkDXm");
}

#[tokio::test]
async fn test_bootstrapped_within_deadline() {
    init_tracing();
    let node = MockNode::start(vec![("/monitor/bootstrapped", Reply::stream(&[]).held_open())]).await;
    let service = Service::new(RpcClient::new(node.url()).unwrap());

    let outcome = service
        .bootstrapped_within(Duration::from_millis(100), &CancellationToken::new())
        .await
        .unwrap();
    assert!(outcome.is_none());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = service
        .bootstrapped_within(Duration::from_secs(5), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}
