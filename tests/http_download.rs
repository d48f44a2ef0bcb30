mod common;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use common::*;
use epg_import::config::DownloadConfig;
use epg_import::errors::ImportError;
use epg_import::ingestor::{EpgImporter, ExecutionMode};
use epg_import::storage::SharedStore;
use epg_import::utils::{Downloader, FixedStorageLocator, HttpDownloader};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn serve() -> SocketAddr {
    let guide = guide(&[Programme {
        channel: "bbc1.uk",
        start: 1_704_135_600,
        minutes: 30,
        title: "Served",
    }]);
    let compressed = gzip(guide.as_bytes());

    let app = Router::new()
        .route("/guide.xml", get(move || async move { guide }))
        .route("/guide.xml.gz", get(move || async move { compressed }))
        .route("/empty.xml", get(|| async { "" }))
        .route(
            "/missing.xml",
            get(|| async { (StatusCode::NOT_FOUND, "no such guide") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_streams_body_to_destination() {
    let addr = serve().await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("epgimport");

    let downloader = HttpDownloader::from_config(&DownloadConfig::default()).unwrap();
    let path = downloader
        .fetch(&format!("http://{addr}/guide.xml"), &destination)
        .await
        .unwrap();

    assert_eq!(path, destination);
    let body = std::fs::read_to_string(&path).unwrap();
    assert!(body.contains("<title>Served</title>"));
}

#[tokio::test]
async fn test_http_errors_hide_credentials() {
    let addr = serve().await;
    let dir = TempDir::new().unwrap();
    let downloader = HttpDownloader::new().unwrap();

    let err = downloader
        .fetch(
            &format!("http://epg:hunter2@{addr}/missing.xml"),
            &dir.path().join("epgimport"),
        )
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(matches!(err, ImportError::Fetch { .. }));
    assert!(message.contains("404"), "{message}");
    assert!(!message.contains("hunter2"), "{message}");
    assert!(!dir.path().join("epgimport").exists());
}

/// Announces a full guide, sends a fragment and hangs up
async fn serve_truncated() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let read = socket.read(&mut buf).await.unwrap();
            if read == 0 {
                return;
            }
            request.extend_from_slice(&buf[..read]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\n\r\n<tv><programme")
            .await
            .unwrap();
        socket.flush().await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_interrupted_body_leaves_no_file() {
    let addr = serve_truncated().await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("epgimport");
    let downloader = HttpDownloader::new().unwrap();

    let err = downloader
        .fetch(&format!("http://{addr}/guide.xml"), &destination)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::Fetch { .. }), "{err}");
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_ftp_is_rejected() {
    let dir = TempDir::new().unwrap();
    let downloader = HttpDownloader::new().unwrap();

    let err = downloader
        .fetch("ftp://mirror.example.com/guide.xml", &dir.path().join("epgimport"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not supported"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_import_over_http_with_failover() {
    let addr = serve().await;
    let dir = TempDir::new().unwrap();
    let memory = Arc::new(Mutex::new(MemoryStore::batch()));
    let store: SharedStore = memory.clone();

    let mut importer = EpgImporter::new(store, &test_config(&dir, ExecutionMode::Auto))
        .unwrap()
        .with_locator(Arc::new(FixedStorageLocator(dir.path().to_path_buf())))
        .with_seed(7);

    let plain = [
        format!("http://{addr}/empty.xml"),
        format!("http://{addr}/guide.xml"),
    ];
    let compressed = [
        format!("http://{addr}/missing.xml"),
        format!("http://{addr}/guide.xml.gz"),
    ];
    importer.queue_source(source("plain", &[plain[0].as_str(), plain[1].as_str()]));
    importer.queue_source(source(
        "compressed",
        &[compressed[0].as_str(), compressed[1].as_str()],
    ));
    let completion = importer.begin_import(None).await.unwrap();

    assert_eq!(completion.event_count, 2);
    assert_eq!(memory.lock().unwrap().titles(), vec!["Served", "Served"]);
    assert!(!dir.path().join("epgimport").exists());
    assert!(!dir.path().join("epgimport.gz").exists());
}
