//! Minimal HTTP/1.1 server that accepts PUT uploads for integration tests.
//!
//! Reads each request body fully, records successful uploads, and answers
//! with 200 or, for the first `fail_first` requests, with `fail_status`.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct PutServerOptions {
    /// Number of initial requests answered with `fail_status`.
    pub fail_first: usize,
    pub fail_status: u32,
}

impl Default for PutServerOptions {
    fn default() -> Self {
        Self {
            fail_first: 0,
            fail_status: 503,
        }
    }
}

/// One accepted upload.
#[derive(Debug, Clone)]
pub struct Received {
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Received {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct PutServer {
    /// e.g. "http://127.0.0.1:12345/"
    pub base_url: String,
    received: Arc<Mutex<Vec<Received>>>,
    requests: Arc<AtomicUsize>,
}

impl PutServer {
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Starts a server that accepts every PUT. Runs until the process exits.
pub fn start() -> PutServer {
    start_with_options(PutServerOptions::default())
}

pub fn start_with_options(opts: PutServerOptions) -> PutServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let received = Arc::new(Mutex::new(Vec::new()));
    let requests = Arc::new(AtomicUsize::new(0));
    {
        let received = Arc::clone(&received);
        let requests = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let received = Arc::clone(&received);
                let requests = Arc::clone(&requests);
                thread::spawn(move || handle(stream, opts, &received, &requests));
            }
        });
    }
    PutServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        received,
        requests,
    }
}

fn handle(
    mut stream: TcpStream,
    opts: PutServerOptions,
    received: &Mutex<Vec<Received>>,
    requests: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));

    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("/").to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    if headers
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("expect") && v.eq_ignore_ascii_case("100-continue"))
    {
        let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
    }

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }

    if !method.eq_ignore_ascii_case("PUT") {
        let _ = stream.write_all(
            b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        return;
    }

    let index = requests.fetch_add(1, Ordering::SeqCst);
    let status = if index < opts.fail_first {
        opts.fail_status
    } else {
        200
    };
    if status == 200 {
        received.lock().unwrap().push(Received {
            path,
            headers,
            body,
        });
    }
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status,
        reason(status)
    );
    let _ = stream.write_all(response.as_bytes());
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn reason(status: u32) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
