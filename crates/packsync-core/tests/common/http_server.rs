//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed route table: static bodies (optionally with a
//! `Content-Disposition`), redirects, and routes whose GET fails after a
//! successful HEAD. Every response closes the connection.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const EMPTY: &[u8] = &[];

#[derive(Debug, Clone)]
pub enum Route {
    File {
        body: Vec<u8>,
        disposition: Option<String>,
    },
    Redirect(String),
    /// HEAD succeeds, GET returns 500.
    BrokenBody { len: u64 },
}

impl Route {
    pub fn file(body: impl Into<Vec<u8>>) -> Self {
        Route::File {
            body: body.into(),
            disposition: None,
        }
    }

    pub fn attachment(body: impl Into<Vec<u8>>, filename: &str) -> Self {
        Route::File {
            body: body.into(),
            disposition: Some(format!("attachment; filename=\"{}\"", filename)),
        }
    }
}

/// Starts the server on a background thread. Returns the base URL
/// (e.g. "http://127.0.0.1:12345/"). Runs until the process exits.
pub fn start(routes: Vec<(&str, Route)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes: Arc<HashMap<String, Route>> = Arc::new(
        routes
            .into_iter()
            .map(|(path, route)| (path.to_string(), route))
            .collect(),
    );
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            thread::spawn(move || handle(stream, &routes));
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8(data).ok()
}

fn handle(mut stream: TcpStream, routes: &HashMap<String, Route>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(request) = read_head(&mut stream) else {
        return;
    };
    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();
    let is_head = method.eq_ignore_ascii_case("HEAD");

    let (status, headers, body): (&str, Vec<String>, &[u8]) = match routes.get(&path) {
        Some(Route::File { body, disposition }) => {
            let mut headers = vec![format!("Content-Length: {}", body.len())];
            if let Some(d) = disposition {
                headers.push(format!("Content-Disposition: {}", d));
            }
            ("200 OK", headers, body.as_slice())
        }
        Some(Route::Redirect(to)) => (
            "302 Found",
            vec![format!("Location: {}", to), "Content-Length: 0".to_string()],
            EMPTY,
        ),
        Some(Route::BrokenBody { len }) if is_head => {
            ("200 OK", vec![format!("Content-Length: {}", len)], EMPTY)
        }
        Some(Route::BrokenBody { .. }) => (
            "500 Internal Server Error",
            vec!["Content-Length: 0".to_string()],
            EMPTY,
        ),
        None => ("404 Not Found", vec!["Content-Length: 0".to_string()], EMPTY),
    };

    let mut response = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
    for h in headers {
        response.push_str(&h);
        response.push_str("\r\n");
    }
    response.push_str("\r\n");
    let _ = stream.write_all(response.as_bytes());
    if !is_head {
        let _ = stream.write_all(body);
    }
}
