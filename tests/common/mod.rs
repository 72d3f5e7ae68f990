//! Common test utilities for launcher integration tests.
//!
//! [`ReleaseServer`] is a minimal HTTP/1.1 server on localhost serving canned
//! release responses to the real binary; [`LauncherProject`] is a temporary
//! install directory with a `launcher.toml` pointing at it.

// Not every helper is used by every test module.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use assert_cmd::Command;
use signed_launcher::test_utils::fixtures::{BUILD, BUILD_SIG, RELEASE_KEY};
use serde_json::json;
use tempfile::TempDir;

pub const EXE: &str = "tool-linux";

#[derive(Clone)]
struct Response {
    status: u16,
    body: Vec<u8>,
}

/// A request the server received.
#[derive(Debug, Clone)]
pub struct Request {
    pub path: String,
    pub user_agent: Option<String>,
}

/// Localhost server answering `GET` requests from a route table.
pub struct ReleaseServer {
    base: String,
    routes: Arc<Mutex<HashMap<String, Response>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl ReleaseServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes: Arc<Mutex<HashMap<String, Response>>> = Arc::default();
        let requests: Arc<Mutex<Vec<Request>>> = Arc::default();

        {
            let routes = Arc::clone(&routes);
            let requests = Arc::clone(&requests);
            thread::spawn(move || {
                for stream in listener.incoming().flatten() {
                    handle(stream, &routes, &requests);
                }
            });
        }

        Self {
            base,
            routes,
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn serve(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.set(path, 200, body.into());
    }

    pub fn respond(&self, path: &str, status: u16) {
        self.set(path, status, Vec::new());
    }

    fn set(&self, path: &str, status: u16, body: Vec<u8>) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Response {
                status,
                body,
            },
        );
    }

    /// Publish a release whose executable is the signed fixture build.
    pub fn publish_signed_build(&self) {
        let release = json!({
            "tag_name": "v2.0.0",
            "assets": [
                { "name": format!("{EXE}.sig"), "browser_download_url": self.url("/download/tool.sig") },
                { "name": EXE, "browser_download_url": self.url("/download/tool") },
            ]
        });
        self.serve("/releases/latest", release.to_string());
        self.serve("/download/tool.sig", BUILD_SIG);
        self.serve("/download/tool", BUILD);
        self.serve("/keys/release.pub", RELEASE_KEY);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn was_requested(&self, path: &str) -> bool {
        self.requests().iter().any(|request| request.path == path)
    }
}

fn handle(
    stream: TcpStream,
    routes: &Mutex<HashMap<String, Response>>,
    requests: &Mutex<Vec<Request>>,
) {
    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();

    let mut user_agent = None;
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header.trim().is_empty() => break,
            Ok(_) => {
                if let Some((name, value)) = header.split_once(':')
                    && name.eq_ignore_ascii_case("user-agent")
                {
                    user_agent = Some(value.trim().to_string());
                }
            }
        }
    }

    requests.lock().unwrap().push(Request {
        path: path.clone(),
        user_agent,
    });
    let response = routes.lock().unwrap().get(&path).cloned().unwrap_or(Response {
        status: 404,
        body: b"not found".to_vec(),
    });

    let mut stream = stream;
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        if response.status == 200 { "OK" } else { "Error" },
        response.body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&response.body);
    let _ = stream.flush();
}

/// Temporary install directory with a launcher configuration.
pub struct LauncherProject {
    temp: TempDir,
}

impl LauncherProject {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("launcher.toml")
    }

    pub fn executable(&self) -> PathBuf {
        self.path().join(EXE)
    }

    pub fn signature(&self) -> PathBuf {
        self.path().join(format!("{EXE}.sig"))
    }

    /// Write `launcher.toml` for `server`, installing into the project root.
    pub fn configure(&self, server: &ReleaseServer) {
        let config = format!(
            r#"release_url = "{release}"
public_key_url = "{key}"
default_executable = "{EXE}"
log_dir = "logs"
request_timeout_secs = 10

[platforms]
linux = "{EXE}"
win = "tool-win.exe"
"#,
            release = server.url("/releases/latest"),
            key = server.url("/keys/release.pub"),
        );
        std::fs::write(self.config_path(), config).unwrap();
    }

    /// Install a local executable as a shell script.
    #[cfg(unix)]
    pub fn install_script(&self, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = self.executable();
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// The launcher binary, pointed at this project's configuration.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("signed-launcher").unwrap();
        cmd.current_dir(self.path())
            .env_remove("RUST_LOG")
            .env_remove("SIGNED_LAUNCHER_CONFIG")
            .arg("--config")
            .arg(self.config_path());
        cmd
    }
}
