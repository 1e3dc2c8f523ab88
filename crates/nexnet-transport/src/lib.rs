//! Framed message + stream transport for the peer mesh.
//!
//! Every connection carries two kinds of frames: length-prefixed control
//! messages ([`Payload`]) and raw byte streams whose length is carried
//! out-of-band by the control message that preceded them. A
//! [`latch::SuspensionLatch`] pauses a peer's read loop for the duration of
//! a stream so the server can drain it directly off the connection without
//! racing the next frame.

#![deny(unsafe_code)]

mod error;
mod latch;
mod peer;
mod rpc;
mod tcp;

pub use error::TransportError;
pub use latch::SuspensionLatch;
pub use peer::{Handshake, NopHandshake, Peer};
pub use rpc::{Payload, Rpc};
pub use tcp::{NopOnPeer, OnPeer, TcpTransport, TransportOpts};

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[tokio::test]
    async fn dial_and_exchange_control_message() {
        let server = TcpTransport::new(TransportOpts::new(addr(18001)));
        server.listen().await.unwrap();

        let client = TcpTransport::new(TransportOpts::new(addr(18002)));
        client.dial(addr(18001)).await.unwrap();

        // allow the accept loop to register the inbound peer
        tokio::time::sleep(Duration::from_millis(20)).await;
        let server_side_addrs = server.peer_addrs().await;
        assert_eq!(server_side_addrs.len(), 1);
        let client_as_seen_by_server = server_side_addrs[0];

        server
            .send_to(
                client_as_seen_by_server,
                &Payload::GetFile { owner_id: "owner".into(), hashed_key: "abc".into() },
            )
            .await
            .unwrap();

        let rpc = client.consume().await.unwrap();
        match rpc {
            Rpc::Message { payload: Payload::GetFile { owner_id, hashed_key }, .. } => {
                assert_eq!(owner_id, "owner");
                assert_eq!(hashed_key, "abc");
            }
            other => panic!("unexpected rpc: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_announcement_suspends_until_released() {
        let server = TcpTransport::new(TransportOpts::new(addr(18011)));
        server.listen().await.unwrap();

        let client = TcpTransport::new(TransportOpts::new(addr(18012)));
        client.dial(addr(18011)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let client_as_seen_by_server = server.peer_addrs().await[0];
        let payload_bytes = b"suspended stream payload";

        let server_peer = server.peer(client_as_seen_by_server).await.unwrap();
        server_peer.send_stream(payload_bytes).await.unwrap();

        let rpc = client.consume().await.unwrap();
        let Rpc::Stream { from } = rpc else { panic!("expected stream rpc") };
        let server_seen_from_client = client.peer(from).await.unwrap();

        let bytes = server_seen_from_client.copy_stream_to(payload_bytes.len() as u64).await.unwrap();
        assert_eq!(bytes, payload_bytes);
        server_seen_from_client.close_stream();
    }
}
