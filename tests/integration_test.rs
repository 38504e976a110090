//! Integration tests for the shadow tunnel
//!
//! Tests the full encrypted transport over real sockets:
//! - Shadow stream round trips over TCP
//! - Large transfers with frame fragmentation
//! - SOCKS5 negotiation
//! - The complete client-to-server-to-target relay path

use shadow_tunnel::proxy::{socks5, Address};
use shadow_tunnel::relay;
use shadow_tunnel::shadow::{ShadowError, ShadowStream};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read from a shadow stream until `expected` bytes arrive
async fn read_all<S>(stream: &mut ShadowStream<S>, expected: usize) -> Vec<u8>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite,
{
    let mut out = Vec::with_capacity(expected);
    let mut buf = [0u8; 4096];
    while out.len() < expected {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

/// Test a shadow stream round trip over a real TCP connection
#[tokio::test]
async fn test_shadow_stream_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut shadow = ShadowStream::new(stream, b"integration");

        let request = read_all(&mut shadow, 4).await;
        assert_eq!(request, b"ping");

        shadow.write(b"pong").await.unwrap();
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut shadow = ShadowStream::new(stream, b"integration");

    shadow.write(b"ping").await.unwrap();
    let reply = read_all(&mut shadow, 4).await;
    assert_eq!(reply, b"pong");

    server.await.unwrap();
}

/// Test a transfer large enough to fragment into many frames
#[tokio::test]
async fn test_large_transfer() {
    let data: Vec<u8> = (0..1024 * 1024).map(|i| (i % 256) as u8).collect();
    let expected = data.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut shadow = ShadowStream::new(stream, b"integration");
        read_all(&mut shadow, 1024 * 1024).await
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut shadow = ShadowStream::new(stream, b"integration");

    // Write in uneven slices to exercise chunking on both sides.
    for chunk in data.chunks(70000) {
        shadow.write(chunk).await.unwrap();
    }
    shadow.shutdown().await.unwrap();

    let received = server.await.unwrap();
    assert_eq!(received.len(), expected.len());
    assert_eq!(received, expected);
}

/// Test the SOCKS5 exchange over a real socket
#[tokio::test]
async fn test_socks5_negotiation() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        socks5::handshake(&mut stream).await
    });

    let mut client = TcpStream::connect(addr).await.unwrap();

    // greeting: version 5, one method, no-auth
    client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut reply = [0u8; 2];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x00]);

    // request: CONNECT 127.0.0.1:80
    client
        .write_all(&[0x05, 0x01, 0x00, 0x01, 0x7F, 0x00, 0x00, 0x01, 0x00, 0x50])
        .await
        .unwrap();
    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);

    let negotiated = server.await.unwrap().unwrap();
    assert_eq!(negotiated, Address::Ipv4([127, 0, 0, 1], 80));
    assert_eq!(negotiated.to_string(), "127.0.0.1:80");
}

/// Test the full remote path: encrypted tunnel in, target address from the
/// first payload, relay to an echo server
#[tokio::test]
async fn test_end_to_end_tunnel() {
    // Echo target
    let echo_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let echo_addr = echo_listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = echo_listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if stream.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Remote endpoint: decrypt, resolve target, relay
    let tunnel_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tunnel_addr = tunnel_listener.local_addr().unwrap();
    let remote = tokio::spawn(async move {
        let (stream, _) = tunnel_listener.accept().await.unwrap();
        let mut shadow = ShadowStream::new(stream, b"integration");

        let mut buf = [0u8; shadow_tunnel::proxy::MAX_ADDRESS_LEN];
        let n = shadow.read(&mut buf).await.unwrap();
        let target_addr = Address::from_bytes(&buf[..n]).unwrap();

        let target = TcpStream::connect(target_addr.to_string()).await.unwrap();
        relay::relay(shadow, target).await.unwrap()
    });

    // Client side: open the tunnel, send the address record, then payload
    let stream = TcpStream::connect(tunnel_addr).await.unwrap();
    let mut shadow = ShadowStream::new(stream, b"integration");

    let record = match echo_addr {
        std::net::SocketAddr::V4(v4) => Address::Ipv4(v4.ip().octets(), v4.port()),
        std::net::SocketAddr::V6(v6) => Address::Ipv6(v6.ip().octets(), v6.port()),
    };
    shadow.write(&record.to_bytes()).await.unwrap();

    let payload: Vec<u8> = (0..50000).map(|i| (i % 239) as u8).collect();
    shadow.write(&payload).await.unwrap();

    let echoed = read_all(&mut shadow, payload.len()).await;
    assert_eq!(echoed, payload);

    shadow.shutdown().await.unwrap();
    remote.await.unwrap();
}

/// Test that a wrong password fails authentication instead of producing
/// garbage
#[tokio::test]
async fn test_wrong_password_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut shadow = ShadowStream::new(stream, b"right password");

        let mut buf = [0u8; 64];
        shadow.read(&mut buf).await
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut shadow = ShadowStream::new(stream, b"wrong password");
    shadow.write(b"\x01\x7f\x00\x00\x01\x00\x50").await.unwrap();

    let result = server.await.unwrap();
    assert!(matches!(result, Err(ShadowError::Crypto(_))));
}
