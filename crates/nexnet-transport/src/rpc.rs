use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Leading byte distinguishing the two RPC envelope kinds on the wire.
pub const KIND_MESSAGE: u8 = 0x01;
pub const KIND_STREAM: u8 = 0x02;

/// Control-payload variants exchanged as length-prefixed `0x01` frames.
///
/// All on-wire key fields are the hashed (fingerprinted) form of the
/// logical key; the server always addresses the store through the
/// [`nexnet_store::cas_transform`] transform, so this hashed form survives
/// another hash transparently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Announces an inbound stream of `size` bytes (IV included) destined
    /// for `(owner_id, hashed_key)`.
    StoreFile { owner_id: String, hashed_key: String, size: u64 },
    /// Acknowledges a [`Payload::StoreFile`]: the receiver has armed its
    /// read loop for the paired stream and the sender may begin writing.
    /// Replaces the original implementation's fixed 5ms sleep (see
    /// REDESIGN FLAGS).
    StoreAck { hashed_key: String },
    /// Requests a copy of `(owner_id, hashed_key)` from every peer.
    GetFile { owner_id: String, hashed_key: String },
    /// Requests local deletion be mirrored; informational only.
    DeleteFile { owner_id: String, hashed_key: String },
}

impl Payload {
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Payload encoding is infallible for these types")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        bincode::deserialize(bytes).map_err(TransportError::Decode)
    }
}

/// A unit of work delivered to the server by [`crate::Transport::consume`].
#[derive(Debug, Clone)]
pub enum Rpc {
    /// A fully decoded control message.
    Message { from: SocketAddr, payload: Payload },
    /// Announces that `size` raw bytes are available to be drained
    /// directly from the originating peer's connection. The server must
    /// call [`crate::Peer::close_stream`] on that peer exactly once after
    /// consuming the bytes, on every exit path.
    Stream { from: SocketAddr },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_through_encode_decode() {
        let p = Payload::StoreFile {
            owner_id: "owner".into(),
            hashed_key: "deadbeef".into(),
            size: 42,
        };
        let bytes = p.encode();
        let decoded = Payload::decode(&bytes).unwrap();
        assert_eq!(p, decoded);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = Payload::decode(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }
}
