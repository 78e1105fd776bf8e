use std::time::Duration;

use rowhouse::{
    Block, Client, CompressionMethod, Connection, ConnectionState, Error, Type, Value,
};

use crate::common::MockServer;

#[tokio::test]
async fn ping_pong() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept(CompressionMethod::None).await;
        conn.read_ping().await;
        conn.send_pong().await;
    });

    let mut client = Connection::connect(options).await.unwrap();
    assert!(client.ping(Duration::from_secs(5)).await);
    assert_eq!(client.state(), ConnectionState::Idle);

    server_task.await.unwrap();
}

#[tokio::test]
async fn ping_timeout_is_silent_and_closes() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept(CompressionMethod::None).await;
        // never answer the ping
        conn.read_ping().await;
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let mut client = Connection::connect(options).await.unwrap();
    assert!(!client.ping(Duration::from_millis(50)).await);
    assert_eq!(client.state(), ConnectionState::Closed);

    server_task.await.unwrap();
}

#[tokio::test]
async fn handshake_reads_server_identity() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let _conn = server.accept(CompressionMethod::None).await;
    });

    let client = Connection::connect(options).await.unwrap();
    let hello = client.server_hello();
    assert_eq!(hello.server_name, "MockHouse");
    assert_eq!(hello.timezone.as_deref(), Some("UTC"));
    assert_eq!(hello.display_name.as_deref(), Some("mockhouse"));
    assert_eq!(hello.patch_version, 1);

    server_task.await.unwrap();
}

#[tokio::test]
async fn socket_closed_mid_read_never_returns_to_idle() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept(CompressionMethod::None).await;
        conn.read_query().await;
        // start a data packet, then drop the socket mid-block
        conn.send_raw_tag(1).await;
        conn.abort();
    });

    let mut client = Connection::connect(options).await.unwrap();
    let err = client.send_query("SELECT 1").await.unwrap_err();
    assert!(
        matches!(err, Error::MalformedFrame(_) | Error::ConnectionClosed(_)),
        "unexpected error: {err:?}"
    );
    assert_eq!(client.state(), ConnectionState::Closed);

    // the next operation surfaces ConnectionClosed
    let err = client.send_query("SELECT 1").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed(_)));
    assert_eq!(client.state(), ConnectionState::Closed);

    server_task.await.unwrap();
}

#[tokio::test]
async fn unknown_packet_tag_closes_connection() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept(CompressionMethod::None).await;
        conn.read_query().await;
        conn.send_raw_tag(9).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    });

    let mut client = Connection::connect(options).await.unwrap();
    let err = client.send_query("SELECT 1").await.unwrap_err();
    match err {
        Error::UnknownPacket(tag) => assert_eq!(tag, 9),
        other => panic!("expected UnknownPacket, got {other:?}"),
    }
    assert_eq!(client.state(), ConnectionState::Closed);

    server_task.await.unwrap();
}

#[tokio::test]
async fn read_timeout_surfaces_and_closes() {
    let server = MockServer::start().await;
    let mut options = server.options();
    options.query_timeout = Duration::from_millis(50);

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept(CompressionMethod::None).await;
        conn.read_query().await;
        // never respond
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let mut client = Connection::connect(options).await.unwrap();
    let err = client.send_query("SELECT sleep(3)").await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert_eq!(client.state(), ConnectionState::Closed);

    server_task.await.unwrap();
}

#[tokio::test]
async fn close_is_idempotent() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let _conn = server.accept(CompressionMethod::None).await;
    });

    let mut client = Connection::connect(options).await.unwrap();
    client.close().await;
    client.close().await;
    assert_eq!(client.state(), ConnectionState::Closed);
    let err = client.send_query("SELECT 1").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed(_)));

    server_task.await.unwrap();
}

#[tokio::test]
async fn client_swaps_in_fresh_connection_when_ping_fails() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        // first physical connection: handshake, answer one ping, then die
        let mut first = server.accept(CompressionMethod::None).await;
        first.read_ping().await;
        first.send_pong().await;
        first.read_ping().await;
        first.abort();

        // the client reconnects; a fresh connection is not pinged again
        let mut second = server.accept(CompressionMethod::None).await;
        let query = second.read_query().await;
        assert_eq!(query, "SELECT 1");
        let mut block = Block::new();
        block
            .add_column("one", Type::UInt8, vec![Value::UInt8(1)])
            .unwrap();
        second.send_data(&block).await;
        second.send_end_of_stream().await;
    });

    let mut client = Client::connect(options).await.unwrap();
    // first request: ping succeeds on the original connection
    assert!(client.ping().await);
    // second request: the ping dies, a fresh connection takes over
    let response = client.query("SELECT 1").await.unwrap();
    assert_eq!(response.total_rows(), 1);

    client.close().await;
    server_task.await.unwrap();
}

#[tokio::test]
async fn client_credentials_are_forwarded() {
    let server = MockServer::start().await;
    let mut options = server.options();
    options.username = "reader".to_string();
    options.password = "secret".to_string();
    options.default_database = "metrics".to_string();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_raw().await;
        let hello = conn.read_client_hello().await;
        assert_eq!(hello.username, "reader");
        assert_eq!(hello.password, "secret");
        assert_eq!(hello.database, "metrics");
        conn.send_hello().await;
    });

    let client = Connection::connect(options).await.unwrap();
    assert_eq!(client.state(), ConnectionState::Idle);

    server_task.await.unwrap();
}
