//! Mock backend HTTP server for testing
//!
//! Serves the [`DemoBackend`] routes over real HTTP so the reqwest transport,
//! its cookie jar, and the refresh logic can be exercised end to end.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serde_json::Value as JsonValue;

use super::demo::{DemoBackend, DemoOptions};
use crate::ports::{ApiRequest, ApiResponse, Method};

/// Mock backend server on a random local port
pub struct MockBackendServer {
    port: u16,
    backend: Arc<DemoBackend>,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockBackendServer {
    /// Start with cookie-checked reissue on top of `options`
    pub fn start(options: DemoOptions) -> std::io::Result<Self> {
        let backend = Arc::new(DemoBackend::with_options(DemoOptions {
            require_session_cookie: true,
            ..options
        }));

        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        listener.set_nonblocking(true)?;

        let running_clone = running.clone();
        let backend_clone = backend.clone();
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let backend = backend_clone.clone();
                        thread::spawn(move || handle_connection(stream, &backend));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            backend,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn backend(&self) -> &DemoBackend {
        &self.backend
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockBackendServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read one request: headers, then `Content-Length` bytes of body
fn read_request(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut data = Vec::new();
    let mut buffer = [0; 4096];

    let header_end = loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..n]);
    }

    let body = data[header_end..].to_vec();
    Some((head, body))
}

fn parse_request(head: &str, body: &[u8]) -> Option<ApiRequest> {
    let mut lines = head.lines();
    let mut parts = lines.next()?.split_whitespace();
    let method = match parts.next()? {
        "GET" => Method::Get,
        "POST" => Method::Post,
        "PUT" => Method::Put,
        "DELETE" => Method::Delete,
        _ => return None,
    };
    let path = parts.next()?;

    let mut request = ApiRequest::new(method, path);
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            request.headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    if !body.is_empty() {
        request.body = serde_json::from_slice::<JsonValue>(body).ok();
    }
    Some(request)
}

fn handle_connection(mut stream: TcpStream, backend: &DemoBackend) {
    // Accepted sockets inherit non-blocking mode on some platforms
    let _ = stream.set_nonblocking(false);

    let response = match read_request(&mut stream) {
        Some((head, body)) => match parse_request(&head, &body) {
            Some(request) => backend.handle(&request),
            None => ApiResponse::new(400, serde_json::json!({"error": "Invalid request"})),
        },
        None => return,
    };
    send_response(&mut stream, &response);
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Error",
    }
}

fn send_response(stream: &mut TcpStream, response: &ApiResponse) {
    let body = response.body.to_string();
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason(response.status),
        body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body.as_bytes());
    let _ = stream.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::adapters::{
        FileCookieJar, FileCredentialStore, InMemoryCredentialStore, ReqwestTransport,
        DEFAULT_TIMEOUT,
    };
    use crate::domain::result::Error;
    use crate::domain::{Asset, MovementForm, TransactionKind};
    use crate::ports::{CredentialStore, SessionListener};
    use crate::services::{ApiClient, PaymentService, PollConfig};

    #[derive(Default)]
    struct CountingListener(AtomicUsize);

    impl SessionListener for CountingListener {
        fn on_session_expired(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn client_for(server: &MockBackendServer) -> (Arc<ApiClient>, Arc<InMemoryCredentialStore>, Arc<CountingListener>) {
        let transport = Arc::new(ReqwestTransport::new(&server.base_url()).unwrap());
        let store = Arc::new(InMemoryCredentialStore::new());
        let listener = Arc::new(CountingListener::default());
        let client = Arc::new(ApiClient::new(transport, store.clone(), listener.clone()));
        (client, store, listener)
    }

    #[tokio::test]
    async fn test_login_stores_bearer_from_header() {
        let server = MockBackendServer::start(DemoOptions::default()).unwrap();
        let (client, store, _) = client_for(&server);

        client.login("user@example.com", "secret").await.unwrap();

        assert_eq!(store.get().unwrap().as_str(), "demo-token-1");
    }

    #[tokio::test]
    async fn test_refresh_replays_session_cookie() {
        let server = MockBackendServer::start(DemoOptions::default()).unwrap();
        let (client, store, listener) = client_for(&server);
        client.login("user@example.com", "secret").await.unwrap();

        server.backend().revoke_tokens();
        let response = client
            .post("/history/transfer", serde_json::json!({"amount": 1, "recipient": "bob"}))
            .await
            .unwrap();

        assert_eq!(response.body["status"], "COMPLETED");
        assert_eq!(store.get().unwrap().as_str(), "demo-token-2");
        assert_eq!(server.backend().request_count("/auth/reissue"), 1);
        assert_eq!(listener.0.load(Ordering::SeqCst), 0);
    }

    /// One `tp` invocation: a transport and stores opened fresh on `dir`
    fn persistent_client_for(
        server: &MockBackendServer,
        dir: &std::path::Path,
    ) -> (Arc<ApiClient>, Arc<FileCredentialStore>, Arc<CountingListener>) {
        let jar = Arc::new(FileCookieJar::open(dir).unwrap());
        let transport = Arc::new(
            ReqwestTransport::new_with_cookie_jar(&server.base_url(), DEFAULT_TIMEOUT, jar).unwrap(),
        );
        let store = Arc::new(FileCredentialStore::open(dir).unwrap());
        let listener = Arc::new(CountingListener::default());
        let client = Arc::new(ApiClient::new(transport, store.clone(), listener.clone()));
        (client, store, listener)
    }

    #[tokio::test]
    async fn test_refresh_session_survives_restart() {
        let server = MockBackendServer::start(DemoOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        {
            let (client, _, _) = persistent_client_for(&server, dir.path());
            client.login("user@example.com", "secret").await.unwrap();
        }

        server.backend().revoke_tokens();
        let (client, store, listener) = persistent_client_for(&server, dir.path());
        let response = client
            .post("/history/transfer", serde_json::json!({"amount": 1, "recipient": "bob"}))
            .await
            .unwrap();

        assert_eq!(response.body["status"], "COMPLETED");
        assert_eq!(store.get().unwrap().as_str(), "demo-token-2");
        assert_eq!(server.backend().request_count("/auth/reissue"), 1);
        assert_eq!(listener.0.load(Ordering::SeqCst), 0);

        // The rotated credential is what the next run picks up
        let reopened = FileCredentialStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get().unwrap().as_str(), "demo-token-2");
    }

    #[tokio::test]
    async fn test_reissue_without_cookie_expires_session() {
        let server = MockBackendServer::start(DemoOptions::default()).unwrap();
        let (client, store, listener) = client_for(&server);
        // Credential present but no login, so the jar holds no session cookie
        store
            .set(crate::domain::Credential::new("demo-token-0").unwrap())
            .unwrap();
        server.backend().revoke_tokens();

        let err = client.get("/transaction/deposit/demo-1").await.unwrap_err();

        assert!(matches!(err, Error::SessionExpired));
        assert!(store.get().is_none());
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deposit_flow_over_http() {
        let server = MockBackendServer::start(DemoOptions::default()).unwrap();
        let (client, _, _) = client_for(&server);
        client.login("user@example.com", "secret").await.unwrap();

        let service = PaymentService::new(
            client,
            PollConfig::default().with_interval(std::time::Duration::from_millis(10)),
        );
        let flow = service.flow(TransactionKind::Deposit);
        let id = flow.submit(&MovementForm::new("12.5", Asset::Usdt)).await.unwrap();

        assert_eq!(id.as_str(), "demo-1");
        assert_eq!(server.backend().request_count("/transaction/deposit/demo-1"), 3);
    }
}
