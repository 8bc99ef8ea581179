use std::{net::SocketAddr, path::Path};

use anyhow::Context;
use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

/// Headers the in-browser engine needs for shared memory and its workers.
const ISOLATION_HEADERS: [(&str, &str); 6] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, OPTIONS"),
    ("access-control-allow-headers", "*"),
    ("cross-origin-embedder-policy", "require-corp"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "cross-origin"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = load_settings();
    let root = settings
        .root_dir
        .canonicalize()
        .with_context(|| {
            format!(
                "root directory '{}' is not accessible",
                settings.root_dir.display()
            )
        })?;
    let app = build_router(&root);

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, root = %root.display(), "serving with cross-origin isolation headers");
    info!("open http://localhost:{}/ in a browser; stop with Ctrl+C", addr.port());
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(cross_origin_isolation))
}

async fn cross_origin_isolation(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = if method == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    for (name, value) in ISOLATION_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    if response.status().is_success() {
        if let Some(content_type) = content_type_override(&path) {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }

    info!(%method, %path, status = response.status().as_u16(), "request");
    response
}

fn content_type_override(path: &str) -> Option<&'static str> {
    let extension = path.rsplit_once('.')?.1;
    if extension.eq_ignore_ascii_case("wasm") {
        Some("application/wasm")
    } else if extension.eq_ignore_ascii_case("js") {
        Some("application/javascript")
    } else {
        None
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
