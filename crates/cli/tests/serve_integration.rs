//! Integration tests for the `actlog serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port with a
//! temporary config and record file, makes HTTP requests, and verifies the
//! responses.

use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

const KEY_AB: &str = "key-ab";
const KEY_CD: &str = "key-cd";
const KEY_GUEST: &str = "key-guest";

const ID_AB_1: &str = "aa000000000000000000000000000001";
const ID_AB_2: &str = "aa000000000000000000000000000002";
const ID_CD_1: &str = "cc000000000000000000000000000001";
const ID_CD_2: &str = "cc000000000000000000000000000002";
const ID_HELLO: &str = "0123456789abcdef0123456789abcdef";
const ID_BROKEN: &str = "bad00000000000000000000000000000";

fn activation(namespace: &str, name: &str, id: &str, start: i64) -> Value {
    let subject = namespace.split('/').next().unwrap_or(namespace);
    json!({
        "namespace": namespace,
        "name": name,
        "subject": subject,
        "activationId": id,
        "start": start,
        "end": start + 20,
        "response": {"status": "success", "result": {"greeting": format!("hi from {name}")}},
        "logs": [format!("{start} stdout: {name}")],
        "annotations": [{"key": "path", "value": format!("{namespace}/{name}")}],
        "publish": false
    })
}

fn write_fixture(dir: &Path, rate_limit: u64) {
    let records = [
        activation("a/b", "one", ID_AB_1, 100),
        activation("a/b", "two", ID_AB_2, 200),
        activation("c/d", "three", ID_CD_1, 300),
        activation("c/d", "four", ID_CD_2, 400),
        activation("guest", "hello", ID_HELLO, 1000),
        json!({
            "namespace": "guest",
            "name": "broken",
            "activationId": ID_BROKEN,
            "start": 5,
            "response": "garbage"
        }),
    ];
    let lines: Vec<String> = records.iter().map(Value::to_string).collect();
    std::fs::write(dir.join("records.jsonl"), lines.join("\n")).unwrap();

    let config = format!(
        r#"
bind = "127.0.0.1"
rate_limit = {rate_limit}
refresh_interval_ms = 20
records = ["records.jsonl"]

[[credentials]]
key = "{KEY_AB}"
subject = "a"
namespace = "a/b"

[[credentials]]
key = "{KEY_CD}"
subject = "c"
namespace = "c/d"

[[credentials]]
key = "{KEY_GUEST}"
subject = "guest"
namespace = "guest"
"#
    );
    std::fs::write(dir.join("actlog.toml"), config).unwrap();
}

/// Server child process, killed on drop.
struct Server {
    child: Child,
    port: u16,
    _dir: TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

fn start_server_with(rate_limit: u64) -> Server {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), rate_limit);
    let port = next_port();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_actlog"));
    cmd.arg("serve")
        .arg("--config")
        .arg(dir.path().join("actlog.toml"))
        .arg("--port")
        .arg(port.to_string());
    cmd.env_remove("ACTLOG_PORT");
    cmd.env_remove("ACTLOG_RATE_LIMIT");
    // Redirect stdout/stderr to avoid blocking
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let child = cmd.spawn().expect("failed to start actlog serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server {
        child,
        port,
        _dir: dir,
    }
}

fn start_server() -> Server {
    start_server_with(1000)
}

/// Helper: make an HTTP request and return (status, headers, body).
fn http(
    port: u16,
    method: &str,
    path: &str,
    extra_headers: &[(&str, &str)],
) -> (u16, String, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in extra_headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }

    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Content-Length: 0\r\nConnection: close\r\n\r\n",
        method, path, port, header_lines
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response_full(&response)
}

/// Authenticated GET returning (status, parsed JSON body).
fn get_as(server: &Server, key: &str, path: &str) -> (u16, Value) {
    let (status, _, body) = http(server.port, "GET", path, &[("X-API-Key", key)]);
    let json = serde_json::from_str(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Parse an HTTP response into (status_code, headers_string, body).
fn parse_http_response_full(response: &str) -> (u16, String, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status_line = headers.lines().next().unwrap_or("");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    // Handle chunked transfer encoding
    let body = if headers.to_lowercase().contains("transfer-encoding: chunked") {
        decode_chunked(&body)
    } else {
        body
    };

    (status, headers, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start + size;
        if chunk_end > remaining.len() {
            result.push_str(&remaining[chunk_start..]);
            break;
        }
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or("");
    }

    result
}

fn activation_ids(list: &Value) -> Vec<&str> {
    list.as_array()
        .expect("array body")
        .iter()
        .map(|v| v["activationId"].as_str().unwrap())
        .collect()
}

// ──────────────────────────────────────────────
// Health and authentication
// ──────────────────────────────────────────────

#[test]
fn health_needs_no_credentials() {
    let server = start_server();
    let (status, _, body) = http(server.port, "GET", "/health", &[]);
    assert_eq!(status, 200);
    let json: Value = serde_json::from_str(&body).expect("valid JSON");
    assert_eq!(json["status"], "ok");
    assert!(json.get("version").is_some());
}

#[test]
fn missing_or_unknown_credentials_are_401() {
    let server = start_server();
    let (status, _, body) = http(server.port, "GET", "/a/b/activations", &[]);
    assert_eq!(status, 401);
    assert!(body.contains("authentication required"));

    let (status, _, body) = http(
        server.port,
        "GET",
        "/a/b/activations",
        &[("Authorization", "Bearer nope")],
    );
    assert_eq!(status, 401);
    assert!(body.contains("invalid API key"));

    let bearer = format!("Bearer {KEY_AB}");
    let (status, _, _) = http(
        server.port,
        "GET",
        "/a/b/activations",
        &[("Authorization", bearer.as_str())],
    );
    assert_eq!(status, 200);
}

// ──────────────────────────────────────────────
// Tenant isolation
// ──────────────────────────────────────────────

#[test]
fn tenants_list_only_their_namespace() {
    let server = start_server();

    let (status, list) = get_as(&server, KEY_AB, "/a/b/activations");
    assert_eq!(status, 200);
    assert_eq!(activation_ids(&list), vec![ID_AB_2, ID_AB_1]);

    let (status, body) = get_as(&server, KEY_AB, "/c/d/activations");
    assert_eq!(status, 403);
    assert!(body["error"].is_string());

    let (status, list) = get_as(&server, KEY_CD, "/c/d/activations");
    assert_eq!(status, 200);
    assert_eq!(activation_ids(&list), vec![ID_CD_2, ID_CD_1]);

    let (status, _) = get_as(&server, KEY_AB, &format!("/c/d/activations/{ID_CD_1}"));
    assert_eq!(status, 403);
}

// ──────────────────────────────────────────────
// Listing
// ──────────────────────────────────────────────

#[test]
fn count_and_filters() {
    let server = start_server();

    let (status, body) = get_as(&server, KEY_AB, "/a/b/activations?count=true");
    assert_eq!(status, 200);
    assert_eq!(body, json!({"activations": 2}));

    let (_, body) = get_as(&server, KEY_AB, "/a/b/activations?count=true&since=100&upto=100");
    assert_eq!(body, json!({"activations": 1}));

    let (_, list) = get_as(&server, KEY_AB, "/a/b/activations?name=two");
    assert_eq!(activation_ids(&list), vec![ID_AB_2]);

    let (_, list) = get_as(&server, KEY_AB, "/a/b/activations?limit=1&skip=1");
    assert_eq!(activation_ids(&list), vec![ID_AB_1]);

    let (_, list) = get_as(&server, KEY_AB, "/a/b/activations");
    assert!(list[0].get("logs").is_none());
    assert_eq!(list[0]["duration"], 20);

    let (_, list) = get_as(&server, KEY_AB, "/a/b/activations?docs=true");
    assert_eq!(list[0]["logs"], json!(["200 stdout: two"]));
}

#[test]
fn invalid_parameters_are_400() {
    let server = start_server();

    let (status, body) = get_as(&server, KEY_AB, "/a/b/activations?docs=true&count=true");
    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "the parameter 'docs' is not permitted with 'count'"
    );

    let (status, body) = get_as(&server, KEY_AB, "/a/b/activations?limit=201");
    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "the value '201' is not in the range of 0 to 200 for 'activations'"
    );

    let (status, body) = get_as(&server, KEY_AB, "/a/b/activations?name=a/b/c");
    assert_eq!(status, 400);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("parameter may be a 'simple' name"));

    let (status, _) = get_as(&server, KEY_AB, "/a/b/activations?since=yesterday");
    assert_eq!(status, 400);
}

// ──────────────────────────────────────────────
// Single records
// ──────────────────────────────────────────────

#[test]
fn single_record_and_projections() {
    let server = start_server();
    let base = format!("/guest/activations/{ID_HELLO}");

    let (status, doc) = get_as(&server, KEY_GUEST, &base);
    assert_eq!(status, 200);
    assert_eq!(doc["activationId"], ID_HELLO);
    assert_eq!(doc["response"]["result"]["greeting"], "hi from hello");

    let (status, result) = get_as(&server, KEY_GUEST, &format!("{base}/result"));
    assert_eq!(status, 200);
    assert_eq!(
        result,
        json!({"status": "success", "statusCode": 0, "success": true, "result": {"greeting": "hi from hello"}})
    );

    let (status, logs) = get_as(&server, KEY_GUEST, &format!("{base}/logs"));
    assert_eq!(status, 200);
    assert_eq!(logs, json!({"logs": ["1000 stdout: hello"]}));

    let (status, body) = get_as(&server, KEY_GUEST, &format!("{base}/bogus"));
    assert_eq!(status, 404);
    assert_eq!(body["error"], "unknown sub-resource 'bogus'");

    let (status, body) = get_as(&server, KEY_GUEST, &format!("{base}/activations"));
    assert_eq!(status, 404);
    assert_eq!(body["error"], "unknown sub-resource 'activations'");
}

#[test]
fn id_errors_and_missing_records() {
    let server = start_server();

    let (status, body) = get_as(&server, KEY_GUEST, &format!("/guest/activations/{}", "a".repeat(31)));
    assert_eq!(status, 400);
    assert_eq!(body["error"], "activation id length is 31 but must be 32 bytes");

    let (status, body) = get_as(&server, KEY_GUEST, &format!("/guest/activations/{}", "a".repeat(35)));
    assert_eq!(status, 400);
    assert_eq!(body["error"], "activation id length is 35 but must be 32 bytes");

    let (status, body) = get_as(&server, KEY_GUEST, &format!("/guest/activations/{}", "g".repeat(32)));
    assert_eq!(status, 400);
    assert_eq!(body["error"], "activation id is malformed");

    let missing = "f".repeat(32);
    let (status, body) = get_as(&server, KEY_GUEST, &format!("/guest/activations/{missing}"));
    assert_eq!(status, 404);
    assert_eq!(body["error"], format!("activation '{missing}' not found"));
}

#[test]
fn corrupted_record_is_500_with_fixed_message() {
    let server = start_server();
    let (status, body) = get_as(&server, KEY_GUEST, &format!("/guest/activations/{ID_BROKEN}"));
    assert_eq!(status, 500);
    assert_eq!(body, json!({"error": "corrupted entity"}));
}

// ──────────────────────────────────────────────
// Methods, unknown routes, rate limiting
// ──────────────────────────────────────────────

#[test]
fn write_methods_are_405() {
    let server = start_server();
    for method in ["PUT", "POST", "DELETE"] {
        let (status, _, body) = http(
            server.port,
            method,
            "/a/b/activations?docs=true&count=true",
            &[("X-API-Key", KEY_AB)],
        );
        assert_eq!(status, 405, "{method}");
        assert!(body.contains("method not allowed"), "{method}: {body}");
    }
}

#[test]
fn unknown_paths_are_404() {
    let server = start_server();
    let (status, body) = get_as(&server, KEY_AB, "/a/b/actions");
    assert_eq!(status, 404);
    assert_eq!(body["error"], "not found");
}

#[test]
fn rate_limit_returns_429() {
    let server = start_server_with(2);
    let statuses: Vec<u16> = (0..3)
        .map(|_| http(server.port, "GET", "/health", &[]).0)
        .collect();
    assert_eq!(statuses, vec![200, 200, 429]);

    let (_, _, body) = http(server.port, "GET", "/health", &[]);
    let json: Value = serde_json::from_str(&body).expect("valid JSON");
    assert_eq!(json["error"], "rate limit exceeded");
    assert!(json["retry_after"].as_u64().is_some());
}
