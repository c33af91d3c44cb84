// crates/fleet-client/tests/sync.rs
mod common;

use common::{client_config, manager, start_server};
use fleet_client::sync::push_payload;
use fleet_client::{ClientError, JsonFileCollection, SyncCoordinator};
use fleet_core::{Message, MessageKind, RecordCollection};
use fleet_protocol::{FrameCodec, ProtocolError};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

#[tokio::test]
async fn pushed_collection_reaches_another_client() {
    let server = start_server().await;
    let port = server.addr.port().to_string();
    let dir = tempfile::tempdir().unwrap();

    let (mut a, _a_events) = manager(client_config());
    let a_conn = a.connect("127.0.0.1", &port).await.unwrap();
    let mut local = JsonFileCollection::new(dir.path().join("a.json"));
    local.add(json!({"Brand": "Toyota", "Model": "Corolla", "Year": 2019}));
    local.add(json!({"Brand": "Volvo", "Model": "V70", "Year": 2007}));
    let mut a_sync = SyncCoordinator::new(local);
    a_sync.push_collection(&a_conn).await.unwrap();
    // A pull on the pushing connection is ordered after its push.
    a_sync.pull_collection(&a_conn).await.unwrap();
    assert_eq!(a_sync.collection().len(), 2);

    let (mut b, _b_events) = manager(client_config());
    let b_conn = b.connect("127.0.0.1", &port).await.unwrap();
    let b_path = dir.path().join("b.json");
    let mut b_sync = SyncCoordinator::new(JsonFileCollection::new(&b_path));
    b_sync.pull_collection(&b_conn).await.unwrap();

    assert_eq!(b_sync.collection().records(), a_sync.collection().records());
    let saved = JsonFileCollection::load(&b_path).unwrap();
    assert_eq!(saved.records()[0]["Brand"], "Toyota");
    assert_eq!(saved.len(), 2);
}

#[tokio::test]
async fn pull_from_fresh_server_empties_the_collection() {
    let server = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let (mut client, _events) = manager(client_config());
    let connection = client
        .connect("127.0.0.1", &server.addr.port().to_string())
        .await
        .unwrap();

    let mut local = JsonFileCollection::new(dir.path().join("cars.json"));
    local.add(json!({"Brand": "Saab"}));
    let mut sync = SyncCoordinator::new(local);
    sync.pull_collection(&connection).await.unwrap();

    assert!(sync.collection().is_empty());
}

#[tokio::test]
async fn raw_payloads_are_stored_verbatim() {
    let server = start_server().await;
    let (mut client, _events) = manager(client_config());
    let connection = client
        .connect("127.0.0.1", &server.addr.port().to_string())
        .await
        .unwrap();

    push_payload(&connection, bytes::Bytes::from_static(b"[{\"Brand\":\"Kia\"}]"))
        .await
        .unwrap();
    match connection.request(Message::PullRequest).await.unwrap() {
        Message::PullResponse(payload) => assert_eq!(&payload[..], b"[{\"Brand\":\"Kia\"}]"),
        other => panic!("expected pull response, got {:?}", other),
    }
}

#[tokio::test]
async fn unexpected_reply_leaves_collection_untouched() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let fake = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, FrameCodec::default());
        framed
            .send(Message::Welcome("Welcome to the server!\n".to_string()))
            .await
            .unwrap();
        let request = framed.next().await.unwrap().unwrap();
        assert_eq!(&request[..], b"REQUEST_DATA");
        framed.send(Message::push(&b"[]"[..])).await.unwrap();
        // Hold the socket until the client is done.
        let _ = framed.next().await;
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cars.json");
    let (mut client, _events) = manager(client_config());
    let connection = client.connect("127.0.0.1", &port.to_string()).await.unwrap();

    let mut local = JsonFileCollection::new(&path);
    local.add(json!({"Brand": "Fiat"}));
    let mut sync = SyncCoordinator::new(local);

    match sync.pull_collection(&connection).await {
        Err(ClientError::Protocol(ProtocolError::UnexpectedMessage { expected, got })) => {
            assert_eq!(expected, MessageKind::PullResponse);
            assert_eq!(got, MessageKind::PushPayload);
        }
        other => panic!("expected unexpected-message error, got {:?}", other),
    }
    assert_eq!(sync.collection().len(), 1);
    assert!(!path.exists());

    client.disconnect().await.unwrap();
    fake.await.unwrap();
}

#[tokio::test]
async fn garbage_reply_is_a_deserialize_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, FrameCodec::default());
        let _ = framed.next().await;
        framed
            .send(Message::pull_response(&b"not json"[..]))
            .await
            .unwrap();
        let _ = framed.next().await;
    });

    let dir = tempfile::tempdir().unwrap();
    let (mut client, _events) = manager(client_config());
    let connection = client.connect("127.0.0.1", &port.to_string()).await.unwrap();
    let mut local = JsonFileCollection::new(dir.path().join("cars.json"));
    local.add(json!({"Brand": "Fiat"}));
    let mut sync = SyncCoordinator::new(local);

    assert!(matches!(
        sync.pull_collection(&connection).await,
        Err(ClientError::Collection(_))
    ));
    assert_eq!(sync.collection().len(), 1);
}

#[tokio::test]
async fn operations_need_a_live_connection() {
    let server = start_server().await;
    let (mut client, _events) = manager(client_config());
    assert!(matches!(client.connection(), Err(ClientError::NotConnected)));

    let connection = client
        .connect("127.0.0.1", &server.addr.port().to_string())
        .await
        .unwrap();
    client.disconnect().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut sync = SyncCoordinator::new(JsonFileCollection::new(dir.path().join("cars.json")));
    assert!(matches!(
        sync.push_collection(&connection).await,
        Err(ClientError::NotConnected)
    ));
    assert!(matches!(
        sync.pull_collection(&connection).await,
        Err(ClientError::NotConnected)
    ));
    assert!(matches!(client.connection(), Err(ClientError::NotConnected)));
    assert!(sync.collection().serialize().is_ok());
}
