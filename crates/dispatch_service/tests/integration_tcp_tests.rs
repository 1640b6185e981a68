mod support;

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;

use dispatch_service::server::serve_tcp;

async fn exchange(
    lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    request: Value,
) -> Value {
    writer
        .write_all(format!("{request}\n").as_bytes())
        .await
        .expect("write");
    let line = timeout(Duration::from_secs(5), lines.next_line())
        .await
        .expect("response in time")
        .expect("read")
        .expect("line");
    serde_json::from_str(&line).expect("json")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tcp_session_queries_and_books() {
    let ctx = support::context(None);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_tcp(listener, ctx, async {
        let _ = stopped.await;
    }));

    let stream = TcpStream::connect(addr).await.expect("connect");
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let health = exchange(&mut lines, &mut writer, json!({"command": "health"})).await;
    assert_eq!(health["taxis"], json!(12));

    let query = exchange(
        &mut lines,
        &mut writer,
        json!({"command": "query", "pickup": {"x": 50.5, "y": 50.5}, "dropoff": {"x": 10, "y": 90}}),
    )
    .await;
    let taxi = query["nearestTaxi"]["location"].clone();
    assert_eq!(query["nearestTaxis"].as_array().map(Vec::len), Some(5));

    let booked = exchange(
        &mut lines,
        &mut writer,
        json!({"command": "book", "pickup": {"x": 50.5, "y": 50.5}, "taxi": taxi}),
    )
    .await;
    assert_eq!(booked["movedTo"], json!({"x": 50.5, "y": 50.5}));
    assert_eq!(booked["distance"], query["nearestTaxi"]["graphDistance"]);

    let again = exchange(
        &mut lines,
        &mut writer,
        json!({"command": "book", "pickup": {"x": 50.5, "y": 50.5}, "taxi": taxi}),
    )
    .await;
    assert!(again["error"].is_string());

    stop.send(()).expect("server running");
    timeout(Duration::from_secs(5), server)
        .await
        .expect("shutdown in time")
        .expect("join")
        .expect("serve");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connections_share_one_fleet() {
    let ctx = support::context(None);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_tcp(listener, ctx.clone(), async {
        let _ = stopped.await;
    }));

    let taxi = ctx.dispatcher().state().taxis().expect("taxis")[0];
    let first = TcpStream::connect(addr).await.expect("connect");
    let (reader, mut writer) = first.into_split();
    let mut lines = BufReader::new(reader).lines();
    let moved = exchange(
        &mut lines,
        &mut writer,
        json!({"command": "relocate", "from": taxi, "to": {"x": 123.5, "y": 0.5}}),
    )
    .await;
    assert_eq!(moved["treeSize"], json!(12));

    let second = TcpStream::connect(addr).await.expect("connect");
    let (reader, mut writer) = second.into_split();
    let mut lines = BufReader::new(reader).lines();
    let moved_back = exchange(
        &mut lines,
        &mut writer,
        json!({"command": "relocate", "from": {"x": 123.5, "y": 0.5}, "to": taxi}),
    )
    .await;
    assert_eq!(moved_back["movedTo"], serde_json::to_value(taxi).expect("json"));

    stop.send(()).expect("server running");
    server.await.expect("join").expect("serve");
}
