use super::*;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::State,
    http::Uri,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct CdnState {
    files: Arc<HashMap<String, Vec<u8>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl CdnState {
    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests").clone()
    }
}

async fn serve(State(state): State<CdnState>, uri: Uri) -> Response {
    state
        .requests
        .lock()
        .expect("requests")
        .push(uri.path().to_string());
    match state.files.get(uri.path()) {
        Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_cdn(files: HashMap<String, Vec<u8>>) -> (Url, CdnState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = CdnState {
        files: Arc::new(files),
        ..CdnState::default()
    };
    let app = Router::new().fallback(serve).with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let base = Url::parse(&format!("http://{addr}/cdn/")).expect("base url");
    (base, state)
}

fn served(asset: &Asset) -> String {
    format!("/cdn/{}", asset.package_path)
}

#[tokio::test]
async fn downloads_every_asset_into_a_new_directory() {
    let files = ENGINE_ASSETS
        .iter()
        .map(|asset| (served(asset), asset.file_name.as_bytes().to_vec()))
        .collect();
    let (base, cdn) = spawn_cdn(files).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("site").join("ffmpeg");

    let saved = fetch_all(&Client::new(), &base, &target, &ENGINE_ASSETS)
        .await
        .expect("fetch");

    assert_eq!(saved.len(), 4);
    for asset in &ENGINE_ASSETS {
        let bytes = std::fs::read(target.join(asset.file_name)).expect("saved file");
        assert_eq!(bytes, asset.file_name.as_bytes());
    }
    let expected: Vec<String> = ENGINE_ASSETS.iter().map(served).collect();
    assert_eq!(cdn.requests(), expected);
}

#[tokio::test]
async fn first_failure_aborts_and_removes_the_partial_file() {
    let first = &ENGINE_ASSETS[0];
    let files = HashMap::from([(served(first), b"core".to_vec())]);
    let (base, cdn) = spawn_cdn(files).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let stale = dir.path().join(ENGINE_ASSETS[1].file_name);
    std::fs::write(&stale, b"half a wasm").expect("stale file");

    let err = fetch_all(&Client::new(), &base, dir.path(), &ENGINE_ASSETS)
        .await
        .expect_err("second asset is missing");

    assert!(format!("{err:#}").contains("404"), "{err:#}");
    assert!(dir.path().join(first.file_name).exists());
    assert!(!stale.exists());
    for asset in &ENGINE_ASSETS[2..] {
        assert!(!dir.path().join(asset.file_name).exists());
    }
    assert_eq!(cdn.requests().len(), 2);
}

#[test]
fn asset_urls_hang_off_the_cdn_base() {
    let default = Url::parse(DEFAULT_CDN_BASE).expect("default base");
    assert_eq!(
        ENGINE_ASSETS[1].url(&default).expect("url").as_str(),
        "https://unpkg.com/@ffmpeg/core@0.12.6/dist/umd/ffmpeg-core.wasm"
    );

    let mirror = Url::parse("https://mirror.example/npm").expect("mirror");
    assert_eq!(
        ENGINE_ASSETS[3].url(&mirror).expect("url").as_str(),
        "https://mirror.example/npm/@ffmpeg/ffmpeg@0.12.10/dist/umd/814.ffmpeg.js"
    );
}
