//! Shared utilities for the supervisor integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::put;
use axum::{Json, Router};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use tpclash::config::SupervisorConfig;
use tpclash::proxy_mode::{ProxyMode, ProxyModeError};

/// An engine config whose controller points at `port`.
pub fn engine_config(port: u16, secret: &str, rule: &str) -> String {
    format!(
        "mixed-port: 7890\nexternal-controller: 127.0.0.1:{port}\nsecret: {secret}\nrules:\n  - {rule}\n"
    )
}

/// Supervisor settings rooted at `home` with the fastest allowed timings.
pub fn supervisor_config(home: &Path, source: &str) -> SupervisorConfig {
    SupervisorConfig {
        home: home.to_path_buf(),
        config: source.to_string(),
        check_interval_secs: 10,
        fetch_timeout_secs: 2,
        control_timeout_secs: 2,
        ..SupervisorConfig::default()
    }
}

/// Install a fake engine binary that records its pid and runs `body`.
pub fn install_engine(home: &Path, body: &str) {
    let engine = home.join("xclash");
    std::fs::write(
        &engine,
        format!("#!/bin/sh\necho $$ > \"$PWD/engine.pid\"\n{body}\n"),
    )
    .unwrap();
    std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Read the pid written by the fake engine, waiting for it to appear.
pub async fn engine_pid(home: &Path) -> Option<i32> {
    let path = home.join("engine.pid");
    for _ in 0..50 {
        if let Ok(text) = tokio::fs::read_to_string(&path).await {
            if let Ok(pid) = text.trim().parse() {
                return Some(pid);
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

pub fn is_alive(pid: i32) -> bool {
    // SAFETY: signal 0 only checks for existence.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Serve `/config` from a scripted list of `(status, body)` responses.
///
/// Status 0 closes the connection without answering. The last response is
/// repeated once the list is exhausted.
pub async fn start_config_server(responses: Vec<(u16, String)>) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let responses = Arc::new(responses);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let responses = responses.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let idx = counter.fetch_add(1, Ordering::SeqCst);
                        let (status, body) = responses
                            .get(idx)
                            .or_else(|| responses.last())
                            .cloned()
                            .unwrap_or((404, String::new()));
                        if status == 0 {
                            let _ = socket.shutdown().await;
                            return;
                        }
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, hits)
}

/// A reload request received by [`MockController`].
#[derive(Debug, Clone)]
pub struct ReloadCall {
    pub authorization: String,
    pub path: String,
}

/// Engine management API stand-in recording `PUT /configs`.
///
/// Each call appends `reload-received` and `reload-answered` to the shared
/// event log, so ordering against other recorders can be checked.
#[derive(Clone)]
pub struct MockController {
    pub port: u16,
    calls: Arc<Mutex<Vec<ReloadCall>>>,
    statuses: Arc<Mutex<Vec<u16>>>,
    delay: Duration,
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl MockController {
    /// Answer with `statuses` in order, then 204 forever.
    pub async fn start(statuses: Vec<u16>) -> Self {
        Self::start_delayed(statuses, Duration::ZERO).await
    }

    /// Like [`MockController::start`], holding every answer for `delay`.
    pub async fn start_delayed(statuses: Vec<u16>, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let controller = Self {
            port,
            calls: Arc::default(),
            statuses: Arc::new(Mutex::new(statuses)),
            delay,
            events: Arc::default(),
        };

        let app = Router::new()
            .route("/configs", put(put_configs))
            .with_state(controller.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        controller
    }

    pub fn calls(&self) -> Vec<ReloadCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn events(&self) -> Arc<Mutex<Vec<&'static str>>> {
        self.events.clone()
    }
}

async fn put_configs(
    State(controller): State<MockController>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    controller.events.lock().unwrap().push("reload-received");
    tokio::time::sleep(controller.delay).await;

    controller.calls.lock().unwrap().push(ReloadCall {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        path: body["path"].as_str().unwrap_or_default().to_string(),
    });

    let status = {
        let mut statuses = controller.statuses.lock().unwrap();
        if statuses.is_empty() {
            204
        } else {
            statuses.remove(0)
        }
    };
    controller.events.lock().unwrap().push("reload-answered");
    StatusCode::from_u16(status).unwrap()
}

/// Proxy mode that records calls and whether the engine was alive on disable.
#[derive(Clone, Default)]
pub struct RecordingProxyMode {
    pub events: Arc<Mutex<Vec<&'static str>>>,
    pub engine_alive_on_disable: Arc<Mutex<Option<bool>>>,
    pub home: Option<PathBuf>,
    pub fail_enable: bool,
}

impl RecordingProxyMode {
    pub fn watching(home: &Path) -> Self {
        Self {
            home: Some(home.to_path_buf()),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub fn engine_alive_on_disable(&self) -> Option<bool> {
        *self.engine_alive_on_disable.lock().unwrap()
    }
}

impl ProxyMode for RecordingProxyMode {
    async fn enable(&self) -> Result<(), ProxyModeError> {
        self.events.lock().unwrap().push("enable");
        if self.fail_enable {
            return Err(ProxyModeError::Timeout {
                hook: "enable",
                program: "iptables".into(),
                secs: 1,
            });
        }
        Ok(())
    }

    async fn disable(&self) -> Result<(), ProxyModeError> {
        if let Some(home) = &self.home {
            let alive = match engine_pid(home).await {
                Some(pid) => is_alive(pid),
                None => false,
            };
            *self.engine_alive_on_disable.lock().unwrap() = Some(alive);
        }
        self.events.lock().unwrap().push("disable");
        Ok(())
    }
}
