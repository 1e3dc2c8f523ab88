use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use nexnet_crypto::{hash_key, new_key, EncryptionKey};
use nexnet_server::FileServer;
use nexnet_store::Store;
use nexnet_transport::{TcpTransport, TransportOpts};

struct Node {
    server: Arc<FileServer>,
    addr: SocketAddr,
    _dir: tempfile::TempDir,
}

async fn spawn_node(port: u16, enc_key: EncryptionKey) -> Node {
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path());
    let transport = TcpTransport::new(TransportOpts::new(addr));
    let node_id = nexnet_crypto::new_id();
    let server = FileServer::new(transport, store, enc_key, node_id);
    server.listen_and_serve().await.unwrap();
    Node { server, addr, _dir: dir }
}

async fn wait_until<F: Fn() -> bool>(pred: F) {
    for _ in 0..200 {
        if pred() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn two_node_mesh_store_replicates_to_peer() {
    let key = new_key();
    let a = spawn_node(23100, key).await;
    let b = spawn_node(23101, key).await;

    b.server.bootstrap(&[a.addr]).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let payload = b"A very big data file 0";
    b.server.store("PrivateData0", payload).await.unwrap();

    // B always has its own plaintext copy immediately.
    let read_back = b.server.get("PrivateData0").await.unwrap();
    assert_eq!(read_back, payload);

    // A eventually holds a ciphertext-derived replica, stored under B's
    // owner id and the hashed key (replicas are addressed by hashed_key,
    // not the logical key).
    let a_store = Store::new(a._dir.path());
    let b_node_id = b.server.node_id().to_string();
    let hashed = hash_key("PrivateData0");
    wait_until(|| a_store.has(&b_node_id, &hashed).unwrap_or(false)).await;
}

#[tokio::test]
async fn three_node_mesh_get_recovers_removed_file() {
    let key = new_key();
    let a = spawn_node(23110, key).await;
    let b = spawn_node(23111, key).await;
    let c = spawn_node(23112, key).await;

    b.server.bootstrap(&[a.addr]).await;
    c.server.bootstrap(&[a.addr, b.addr]).await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    let payload = b"three node payload";
    c.server.store("ThreeNodeKey", payload).await.unwrap();

    let hashed = hash_key("ThreeNodeKey");
    let a_store = Store::new(a._dir.path());
    let c_node_id = c.server.node_id().to_string();
    wait_until(|| a_store.has(&c_node_id, &hashed).unwrap_or(false)).await;

    c.server.remove("ThreeNodeKey").await.unwrap();

    let recovered = c.server.get("ThreeNodeKey").await.unwrap();
    assert_eq!(recovered, payload);
}
