//! Throwaway HTTP net app used by the resolver and app loop tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// PNG signature followed by the start of an IHDR chunk
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";

pub fn manifest_json(app_name: &str, icon_path: &str) -> String {
    serde_json::json!({
        "info": {"app_name": app_name},
        "icon": {"64": icon_path}
    })
    .to_string()
}

struct ServerState {
    files: HashMap<String, (Vec<u8>, &'static str)>,
    hits: AtomicUsize,
}

#[derive(Default)]
pub struct NetAppServerBuilder {
    files: HashMap<String, (Vec<u8>, &'static str)>,
}

impl NetAppServerBuilder {
    pub fn manifest(mut self, path: &str, json: String) -> Self {
        self.files.insert(path.to_string(), (json.into_bytes(), "application/json"));
        self
    }

    pub fn file(mut self, path: &str, body: &[u8]) -> Self {
        self.files
            .insert(path.to_string(), (body.to_vec(), "application/octet-stream"));
        self
    }

    pub async fn spawn(self) -> NetAppServer {
        let state = Arc::new(ServerState {
            files: self.files,
            hits: AtomicUsize::new(0),
        });
        let app = Router::new().fallback(serve_file).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        NetAppServer { port, state, task }
    }
}

/// Serves a fixed set of paths; everything else is a 404.
pub struct NetAppServer {
    port: u16,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl NetAppServer {
    pub fn builder() -> NetAppServerBuilder {
        NetAppServerBuilder::default()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Requests received so far, including 404s
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

impl Drop for NetAppServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_file(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match state.files.get(uri.path()) {
        Some((body, content_type)) => {
            ([(header::CONTENT_TYPE, *content_type)], body.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A local port with nothing listening on it
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
