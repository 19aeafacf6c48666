//! TLS smoke test: the router served over HTTPS with a self-signed
//! certificate.

use std::net::SocketAddr;
use std::sync::{Arc, Once};

use rcgen::{generate_simple_self_signed, CertifiedKey};
use tempfile::TempDir;

use nebulafs_api::{create_router, AppState};
use nebulafs_core::config::Config;
use nebulafs_storage::{BlobStore, MultipartCoordinator, SqliteMetadataStore};

static INIT: Once = Once::new();

fn init_crypto_provider() {
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

fn generate_test_cert() -> CertifiedKey {
    let subject_alt_names = vec!["localhost".to_string(), "127.0.0.1".to_string()];
    generate_simple_self_signed(subject_alt_names).expect("failed to generate cert")
}

async fn start_tls_server(temp_dir: &TempDir) -> (SocketAddr, axum_server::Handle) {
    init_crypto_provider();

    let cert_key = generate_test_cert();
    let cert_path = temp_dir.path().join("cert.pem");
    let key_path = temp_dir.path().join("key.pem");
    std::fs::write(&cert_path, cert_key.cert.pem()).unwrap();
    std::fs::write(&key_path, cert_key.key_pair.serialize_pem()).unwrap();

    let mut config = Config::default();
    config.storage.base_path = temp_dir.path().join("data");
    config.storage.temp_path = temp_dir.path().join("tmp");

    let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
    let blob = Arc::new(
        BlobStore::new(config.storage.base_path.clone(), config.storage.temp_path.clone())
            .await
            .unwrap(),
    );
    let multipart = Arc::new(MultipartCoordinator::new(
        metadata.clone(),
        blob.clone(),
        config.storage.multipart.max_upload_ttl_seconds,
    ));
    let state = AppState { metadata, blob, multipart, config: Arc::new(config), metrics: None };
    let app = create_router(state);

    let rustls_config =
        axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .expect("failed to load TLS config");

    let handle = axum_server::Handle::new();
    let server_handle = handle.clone();
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    tokio::spawn(async move {
        axum_server::bind_rustls(addr, rustls_config)
            .handle(server_handle)
            .serve(app.into_make_service())
            .await
            .expect("TLS server error");
    });

    let bound = handle.listening().await.expect("server failed to start");
    (bound, handle)
}

#[tokio::test]
async fn test_https_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let (addr, handle) = start_tls_server(&temp_dir).await;

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap();

    let response = client.get(format!("https://{addr}/healthz")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["server"], "NebulaFS");

    client
        .post(format!("https://{addr}/v1/buckets"))
        .json(&serde_json::json!({ "name": "tls-bucket" }))
        .send()
        .await
        .unwrap();
    let response = client
        .put(format!("https://{addr}/v1/buckets/tls-bucket/objects/secret.txt"))
        .body("encrypted in transit")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .get(format!("https://{addr}/v1/buckets/tls-bucket/objects/secret.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "encrypted in transit");

    handle.shutdown();
}
