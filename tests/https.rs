//! HTTPS Listener Tests
//!
//! - PEM cert and key load into a working TLS listener
//! - Requests over TLS run through the middleware chain
//! - Resolved URLs use the https scheme

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use devhost::config::{DevConfig, HttpsConfig};
use devhost::server::DevServer;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

// =============================================================================
// Helper Functions
// =============================================================================

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/tls")
        .join(name)
}

/// Client trusting only the self-signed fixture certificate
fn connector() -> TlsConnector {
    let pem = std::fs::read(fixture("cert.pem")).unwrap();
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        roots.add(cert.unwrap()).unwrap();
    }
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

// =============================================================================
// TLS Listener
// =============================================================================

#[tokio::test]
async fn test_public_file_served_over_tls() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("public")).unwrap();
    std::fs::write(tmp.path().join("public/robots.txt"), "User-agent: *").unwrap();

    let mut config = DevConfig::from_json_str(
        r#"{"server": {"host": "127.0.0.1", "port": 0, "watchOptions": null}}"#,
    )
    .unwrap();
    config.root = tmp.path().to_path_buf();
    config.server.https = Some(HttpsConfig {
        cert: fixture("cert.pem"),
        key: fixture("key.pem"),
    });

    let server = DevServer::new(config).create_server().await.unwrap();
    server.listen().await.unwrap();
    let http = server.http_server().unwrap();
    assert!(http.is_https());
    let urls = server.resolved_urls().unwrap();
    assert!(urls.local[0].starts_with("https://localhost:"));

    let tcp = TcpStream::connect(http.local_addr().unwrap()).await.unwrap();
    let domain = ServerName::try_from("localhost").unwrap().to_owned();
    let mut tls = connector().connect(domain, tcp).await.unwrap();
    tls.write_all(b"GET /robots.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let read = tokio::time::timeout(Duration::from_secs(5), tls.read(&mut buf))
            .await
            .expect("timed out reading response");
        match read {
            Ok(0) | Err(_) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
        }
        if response.ends_with(b"User-agent: *") {
            break;
        }
    }

    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 200"), "unexpected response: {text}");
    assert!(text.ends_with("User-agent: *"));

    server.close().await.unwrap();
}
