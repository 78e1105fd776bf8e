use rowhouse::{
    split_values_clause, Block, CompressionMethod, Connection, ConnectionState, Date, Error,
    SqlValuesSource, Type, Value, VecRowSource,
};

use crate::common::MockServer;

fn insert_header() -> Block {
    let mut header = Block::new();
    header.add_column("day", Type::Date, vec![]).unwrap();
    header.add_column("id", Type::UInt32, vec![]).unwrap();
    header.add_column("name", Type::String, vec![]).unwrap();
    header.add_column("score", Type::UInt32, vec![]).unwrap();
    header
}

#[tokio::test]
async fn insert_streams_batches_of_8192() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept(CompressionMethod::None).await;
        let query = conn.read_query().await;
        assert_eq!(query, "INSERT INTO scores VALUES ");
        conn.send_data(&insert_header()).await;

        let mut batch_sizes = vec![];
        loop {
            let block = conn.read_data_block().await;
            if block.is_empty() {
                break;
            }
            batch_sizes.push(block.rows);
        }
        conn.send_end_of_stream().await;
        batch_sizes
    });

    let rows: Vec<Vec<Value>> = (0..10_000)
        .map(|i| {
            vec![
                Value::Date(Date(10957)),
                Value::Int64(i),
                Value::string(format!("name {i}")),
                Value::Int64(i * 2),
            ]
        })
        .collect();
    let mut source = VecRowSource::from(rows);

    let mut client = Connection::connect(options).await.unwrap();
    let written = client
        .send_insert("INSERT INTO scores VALUES (?, ?, ?, ?)", &mut source)
        .await
        .unwrap();
    assert_eq!(written, 10_000);
    assert_eq!(client.state(), ConnectionState::Idle);

    let batch_sizes = server_task.await.unwrap();
    assert_eq!(batch_sizes, vec![8192, 1808]);
}

#[tokio::test]
async fn insert_coerces_rows_to_header_schema() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept(CompressionMethod::None).await;
        conn.read_query().await;
        conn.send_data(&insert_header()).await;
        let block = conn.read_data_block().await;
        let terminator = conn.read_data_block().await;
        assert!(terminator.is_empty());
        conn.send_end_of_stream().await;
        block
    });

    // date as text literal, ints as generic Int64: all coerced by the header
    let mut source = VecRowSource::from(vec![vec![
        Value::string("2000-01-01"),
        Value::Int64(7),
        Value::string("seven"),
        Value::Int64(14),
    ]]);

    let mut client = Connection::connect(options).await.unwrap();
    let written = client
        .send_insert("INSERT INTO scores VALUES (?, ?, ?, ?)", &mut source)
        .await
        .unwrap();
    assert_eq!(written, 1);

    let block = server_task.await.unwrap();
    assert_eq!(block.column("day").unwrap(), &[Value::Date(Date(10957))][..]);
    assert_eq!(block.column("id").unwrap(), &[Value::UInt32(7)][..]);
    assert_eq!(block.column("score").unwrap(), &[Value::UInt32(14)][..]);
}

#[tokio::test]
async fn insert_from_inline_values_literals() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept(CompressionMethod::None).await;
        let query = conn.read_query().await;
        assert_eq!(query, "INSERT INTO scores VALUES ");
        conn.send_data(&insert_header()).await;
        let block = conn.read_data_block().await;
        let terminator = conn.read_data_block().await;
        assert!(terminator.is_empty());
        conn.send_end_of_stream().await;
        block
    });

    let statement =
        "INSERT INTO scores VALUES ('2000-01-01', 1, 'one', 2), ('2000-01-02', 2, 'two', 4)";
    let (_, tail) = split_values_clause(statement).unwrap();
    let mut source = SqlValuesSource::new(tail);

    let mut client = Connection::connect(options).await.unwrap();
    let written = client.send_insert(statement, &mut source).await.unwrap();
    assert_eq!(written, 2);

    let block = server_task.await.unwrap();
    assert_eq!(block.rows, 2);
    assert_eq!(
        block.column("day").unwrap(),
        &[Value::Date(Date(10957)), Value::Date(Date(10958))][..]
    );
    assert_eq!(
        block.column("name").unwrap(),
        &[Value::string("one"), Value::string("two")][..]
    );
}

#[tokio::test]
async fn insert_without_values_clause_is_rejected() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let _conn = server.accept(CompressionMethod::None).await;
    });

    let mut client = Connection::connect(options).await.unwrap();
    let mut source = VecRowSource::from(vec![]);
    let err = client
        .send_insert("INSERT INTO scores FORMAT Native", &mut source)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(_)));
    // rejection happens before any packet is written
    assert_eq!(client.state(), ConnectionState::Idle);

    server_task.await.unwrap();
}

#[tokio::test]
async fn insert_exception_instead_of_header_returns_to_idle() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept(CompressionMethod::None).await;
        conn.read_query().await;
        conn.send_exception(60, "DB::Exception", "Table scores does not exist")
            .await;
        // still serving afterwards
        conn.read_query().await;
        conn.send_end_of_stream().await;
    });

    let mut client = Connection::connect(options).await.unwrap();
    let mut source = VecRowSource::from(vec![vec![Value::Int64(1)]]);
    let err = client
        .send_insert("INSERT INTO scores VALUES (1)", &mut source)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ServerException(_)));
    assert_eq!(client.state(), ConnectionState::Idle);

    client.send_query("SELECT 1").await.unwrap();

    server_task.await.unwrap();
}

#[tokio::test]
async fn insert_coercion_failure_reports_position() {
    let server = MockServer::start().await;
    let options = server.options();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept(CompressionMethod::None).await;
        conn.read_query().await;
        conn.send_data(&insert_header()).await;
        // client fails before sending any data and closes
    });

    let mut source = VecRowSource::from(vec![vec![
        Value::Date(Date(0)),
        Value::string("not a number"),
        Value::string("x"),
        Value::Int64(0),
    ]]);

    let mut client = Connection::connect(options).await.unwrap();
    let err = client
        .send_insert("INSERT INTO scores VALUES (?, ?, ?, ?)", &mut source)
        .await
        .unwrap_err();
    match err {
        Error::TypeMismatch(message) => {
            assert!(message.contains("column 1"), "{message}");
            assert!(message.contains("row 0"), "{message}");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }

    server_task.await.unwrap();
}
