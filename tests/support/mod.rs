//! Scripted in-process servers for exercising clients without a real store.
#![allow(dead_code)]

use redlink::proto::codec::Decoder;
use redlink::Frame;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

/// Binds a throwaway listener and returns it with its `host:port` label.
pub async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("{}:{}", addr.ip(), addr.port()))
}

/// Reads one complete request frame from the socket.
pub async fn read_command(socket: &mut TcpStream, decoder: &mut Decoder) -> Frame {
    loop {
        if let Some(frame) = decoder.decode().unwrap() {
            return frame;
        }
        let mut buf = [0u8; 4096];
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed mid-command");
        decoder.append(&buf[..n]);
    }
}

/// The command name (first array element) as an owned byte vector.
pub fn command_name(frame: &Frame) -> Vec<u8> {
    argument(frame, 0)
}

/// The argument at `index` as an owned byte vector.
pub fn argument(frame: &Frame, index: usize) -> Vec<u8> {
    match frame {
        Frame::Array(args) => match &args[index] {
            Frame::BulkString(Some(bytes)) => bytes.to_vec(),
            other => panic!("unexpected argument frame {:?}", other),
        },
        other => panic!("expected array request, got {:?}", other),
    }
}

/// Renders a payload as a RESP bulk string.
pub fn bulk(payload: &str) -> Vec<u8> {
    format!("${}\r\n{}\r\n", payload.len(), payload).into_bytes()
}

/// Renders one `CLUSTER NODES` line.
pub fn topology_line(id: &str, addr: &str, flags: &str, slots: &str) -> String {
    format!("{} {}@40000 {} - 0 0 1 connected {}\n", id, addr, flags, slots)
}
