//! Shared helpers: a status backend on a temporary Unix socket

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::Request;
use axum::middleware::{self, Next};
use stagehand_backend::logs::LogStore;
use stagehand_backend::notify::NoopNotifier;
use stagehand_backend::{AppState, create_router, db};
use stagehand_client::StatusClient;
use tokio::sync::oneshot;

pub struct Backend {
    pub socket: PathBuf,
    pub logs_dir: PathBuf,
    pub client: StatusClient,
    requests: Arc<Mutex<Vec<String>>>,
    _dir: tempfile::TempDir,
    _shutdown: oneshot::Sender<()>,
}

impl Backend {
    /// `METHOD /path` of every request received so far, in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Received requests that changed a status
    pub fn patches(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.starts_with("PATCH "))
            .collect()
    }
}

pub async fn start_backend() -> Backend {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("backend.sock");
    let logs_dir = dir.path().join("logs");
    std::fs::create_dir_all(&logs_dir).unwrap();

    let pool = db::create_memory_pool().await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let state = AppState::new(pool, LogStore::new(&logs_dir), Arc::new(NoopNotifier));

    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();
    let app = create_router(state).layer(middleware::from_fn(
        move |req: Request, next: Next| {
            let seen = seen.clone();
            async move {
                seen.lock()
                    .unwrap()
                    .push(format!("{} {}", req.method(), req.uri().path()));
                next.run(req).await
            }
        },
    ));

    let listener = tokio::net::UnixListener::bind(&socket).unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await
    });

    Backend {
        client: StatusClient::unix(&socket).unwrap(),
        socket,
        logs_dir,
        requests,
        _dir: dir,
        _shutdown: tx,
    }
}
