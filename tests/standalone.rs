//! Single-node client behavior against scripted servers.

mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use redlink::core::command;
use redlink::proto::codec::Decoder;
use redlink::{Client, ClientBuilder, Error, Reply};
use tokio::io::AsyncWriteExt;

use support::{argument, command_name, read_command};

async fn client_for(addr: &str) -> Client {
    let (host, port) = addr.rsplit_once(':').unwrap();
    ClientBuilder::new()
        .host(host)
        .port(port.parse().unwrap())
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_set_then_get() {
    let (listener, addr) = support::listener().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut decoder = Decoder::new();

        let set = read_command(&mut socket, &mut decoder).await;
        assert_eq!(command_name(&set), b"SET");
        assert_eq!(argument(&set, 1), b"greeting");
        assert_eq!(argument(&set, 2), b"hello");
        socket.write_all(b"+OK\r\n").await.unwrap();

        let get = read_command(&mut socket, &mut decoder).await;
        assert_eq!(command_name(&get), b"GET");
        socket.write_all(b"$5\r\nhello\r\n").await.unwrap();
    });

    let client = client_for(&addr).await;
    client.set("greeting", "hello".into()).await.unwrap();
    let value = client.get("greeting").await.unwrap();
    assert_eq!(value.as_deref(), Some(&b"hello"[..]));
}

#[tokio::test]
async fn test_get_after_expiry_is_none() {
    let (listener, addr) = support::listener().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut decoder = Decoder::new();

        let set = read_command(&mut socket, &mut decoder).await;
        assert_eq!(command_name(&set), b"SET");
        assert_eq!(argument(&set, 3), b"EX");
        assert_eq!(argument(&set, 4), b"1");
        socket.write_all(b"+OK\r\n").await.unwrap();

        let get = read_command(&mut socket, &mut decoder).await;
        assert_eq!(command_name(&get), b"GET");
        socket.write_all(b"$-1\r\n").await.unwrap();
    });

    let client = client_for(&addr).await;
    client
        .set_with_expiry("k", "v".into(), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(client.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn test_del_reports_partial_count() {
    let (listener, addr) = support::listener().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut decoder = Decoder::new();
        let del = read_command(&mut socket, &mut decoder).await;
        assert_eq!(command_name(&del), b"DEL");
        socket.write_all(b":2\r\n").await.unwrap();
    });

    let client = client_for(&addr).await;
    // Only 2 of the 3 keys existed; the caller sees the real count.
    assert_eq!(client.del(["a", "b", "c"]).await.unwrap(), 2);
}

#[tokio::test]
async fn test_execute_applies_count_expectation() {
    let (listener, addr) = support::listener().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut decoder = Decoder::new();
        read_command(&mut socket, &mut decoder).await;
        socket.write_all(b":3\r\n").await.unwrap();
        read_command(&mut socket, &mut decoder).await;
        socket.write_all(b":2\r\n").await.unwrap();
    });

    let client = client_for(&addr).await;
    let full = client.execute(command::del(["a", "b", "c"])).await.unwrap();
    assert_eq!(full, Reply::Matched(true));
    let partial = client.execute(command::del(["a", "b", "c"])).await.unwrap();
    assert_eq!(partial, Reply::Frame(redlink::Frame::Integer(2)));
}

#[tokio::test]
async fn test_concurrent_callers_are_serialized() {
    let (listener, addr) = support::listener().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut decoder = Decoder::new();
        // One fully-framed command at a time; interleaved writes would
        // surface here as a decode failure.
        for _ in 0..4 {
            let cmd = read_command(&mut socket, &mut decoder).await;
            assert_eq!(command_name(&cmd), b"INCR");
            socket.write_all(b":1\r\n").await.unwrap();
        }
    });

    let client = client_for(&addr).await;
    let (a, b, c, d) = tokio::join!(
        client.incr("n"),
        client.incr("n"),
        client.incr("n"),
        client.incr("n"),
    );
    assert_eq!(a.unwrap(), 1);
    assert_eq!(b.unwrap(), 1);
    assert_eq!(c.unwrap(), 1);
    assert_eq!(d.unwrap(), 1);
}

#[tokio::test]
async fn test_server_error_strips_err_prefix() {
    let (listener, addr) = support::listener().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut decoder = Decoder::new();
        read_command(&mut socket, &mut decoder).await;
        socket
            .write_all(b"-ERR value is not an integer or out of range\r\n")
            .await
            .unwrap();
    });

    let client = client_for(&addr).await;
    let err = client.incr("k").await.unwrap_err();
    match err {
        Error::Redis { message } => {
            assert_eq!(message, "value is not an integer or out of range");
        }
        other => panic!("expected redis error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_readonly_triggers_failover_to_master() {
    let (replica, replica_addr) = support::listener().await;
    let (master, _master_addr) = support::listener().await;
    let master_port = master.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut socket, _) = replica.accept().await.unwrap();
        let mut decoder = Decoder::new();

        let set = read_command(&mut socket, &mut decoder).await;
        assert_eq!(command_name(&set), b"SET");
        socket
            .write_all(b"-READONLY You can't write against a read only replica.\r\n")
            .await
            .unwrap();

        // The replication query must arrive on this same connection.
        let info = read_command(&mut socket, &mut decoder).await;
        assert_eq!(command_name(&info), b"INFO");
        assert_eq!(argument(&info, 1), b"REPLICATION");
        let payload = format!(
            "# Replication\r\nrole:slave\r\nmaster_host:127.0.0.1\r\nmaster_port:{}\r\n",
            master_port
        );
        socket.write_all(&support::bulk(&payload)).await.unwrap();
    });

    tokio::spawn(async move {
        let (mut socket, _) = master.accept().await.unwrap();
        let mut decoder = Decoder::new();

        let set = read_command(&mut socket, &mut decoder).await;
        assert_eq!(command_name(&set), b"SET");
        assert_eq!(argument(&set, 1), b"k");
        socket.write_all(b"+OK\r\n").await.unwrap();

        let get = read_command(&mut socket, &mut decoder).await;
        assert_eq!(command_name(&get), b"GET");
        socket.write_all(b"$1\r\nv\r\n").await.unwrap();
    });

    let client = client_for(&replica_addr).await;
    client.set("k", "v".into()).await.unwrap();
    // Later commands target the new master.
    assert_eq!(client.get("k").await.unwrap().as_deref(), Some(&b"v"[..]));
}

#[tokio::test]
async fn test_on_close_fires_on_unexpected_eof() {
    let (listener, addr) = support::listener().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 256];
        let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf)
            .await
            .unwrap();
        // Drop without replying.
    });

    let closed = Arc::new(AtomicBool::new(false));
    let flag = closed.clone();
    let (host, port) = addr.rsplit_once(':').unwrap();
    let client = ClientBuilder::new()
        .host(host)
        .port(port.parse().unwrap())
        .on_close(Arc::new(move || flag.store(true, Ordering::SeqCst)))
        .build()
        .await
        .unwrap();

    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, Error::Connection { .. }));
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_reconnects_after_server_drop() {
    let (listener, addr) = support::listener().await;

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 256];
        let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf)
            .await
            .unwrap();
        drop(socket);

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut decoder = Decoder::new();
        read_command(&mut socket, &mut decoder).await;
        socket.write_all(b"+PONG\r\n").await.unwrap();
    });

    let client = client_for(&addr).await;
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, Error::Connection { .. }));
    assert!(!client.is_connected().await);

    // The next command reconnects transparently.
    assert_eq!(client.ping().await.unwrap().as_ref(), b"PONG");
    assert!(client.is_connected().await);
}
