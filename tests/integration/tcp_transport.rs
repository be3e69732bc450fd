//! Integration tests for the TCP transport.
//!
//! Exercises real sockets on 127.0.0.1: message boundaries, close
//! semantics seen from both ends, and concurrent read/write.
//!
//! Verification command: `cargo test --test tcp_transport`

use std::sync::Arc;
use std::time::Duration;

use rfchat::transport::tcp::{self, TcpAcceptor, TcpTransport};
use rfchat::transport::{Endpoint, Transport, TransportError, TransportType};

const WAIT: Duration = Duration::from_secs(5);

async fn connected_pair() -> (TcpTransport, TcpTransport) {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.expect("bind");
    let addr = acceptor.local_addr().expect("local addr").to_string();
    let (client, server) = tokio::join!(tcp::connect(&addr, WAIT), acceptor.accept());
    (client.expect("connect"), server.expect("accept"))
}

#[tokio::test]
async fn messages_flow_both_ways() {
    let (client, server) = connected_pair().await;
    assert_eq!(server.transport_type(), TransportType::Tcp);

    client.write(b"hello server").await.unwrap();
    assert_eq!(server.read(1024).await.unwrap().unwrap(), b"hello server");

    server.write(b"hello client").await.unwrap();
    assert_eq!(client.read(1024).await.unwrap().unwrap(), b"hello client");
}

#[tokio::test]
async fn read_returns_at_most_max_bytes() {
    let (client, server) = connected_pair().await;
    let message = vec![b'x'; 3000];
    client.write(&message).await.unwrap();

    let mut received = 0;
    while received < message.len() {
        let chunk = server.read(1024).await.unwrap().unwrap();
        assert!(chunk.len() <= 1024);
        received += chunk.len();
    }
    assert_eq!(received, message.len());
}

#[tokio::test]
async fn close_is_seen_as_end_of_stream_by_peer() {
    let (client, server) = connected_pair().await;
    client.close().await;
    assert!(client.is_closed());

    let read = tokio::time::timeout(WAIT, server.read(1024)).await.unwrap();
    assert_eq!(read.unwrap(), None);
}

#[tokio::test]
async fn close_unblocks_a_pending_read() {
    let (client, _server) = connected_pair().await;
    let client = Arc::new(client);

    let reader = Arc::clone(&client);
    let pending = tokio::spawn(async move { reader.read(1024).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    client.close().await;
    let result = tokio::time::timeout(WAIT, pending).await.unwrap().unwrap();
    assert!(matches!(result, Err(TransportError::ConnectionClosed)));
}

#[tokio::test]
async fn close_is_idempotent_and_concurrent_safe() {
    let (client, _server) = connected_pair().await;
    tokio::join!(client.close(), client.close(), client.close());
    client.close().await;
    assert!(client.is_closed());
    assert!(matches!(
        client.write(b"late").await,
        Err(TransportError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn refused_connection_reports_the_endpoint() {
    let addr = {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        acceptor.local_addr().unwrap().to_string()
    };
    match tcp::connect(&addr, WAIT).await {
        Err(TransportError::Connect { endpoint, .. }) => assert_eq!(endpoint, addr),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("connected to a closed port"),
    }
}

#[tokio::test]
async fn endpoint_parsing_feeds_connect() {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let url = format!("tcp://{}", acceptor.local_addr().unwrap());

    let Endpoint::Tcp(addr) = url.parse::<Endpoint>().unwrap() else {
        panic!("expected a TCP endpoint");
    };
    let (client, server) = tokio::join!(tcp::connect(&addr, WAIT), acceptor.accept());
    let (client, server) = (client.unwrap(), server.unwrap());

    client.write(b"via endpoint").await.unwrap();
    assert_eq!(server.read(1024).await.unwrap().unwrap(), b"via endpoint");
}
