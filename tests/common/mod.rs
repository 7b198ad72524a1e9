//! Shared helpers for integration tests: a local resource server and SVG
//! decoding.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

/// A canned response.
#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub delay: Duration,
    pub headers: Vec<(&'static str, String)>,
}

impl Route {
    pub fn ok(content_type: &'static str, body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.to_vec(),
            delay: Duration::ZERO,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub struct TestServer {
    pub base: String,
    /// Request target and `Cookie` header of every request
    requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl TestServer {
    /// Serve `routes` (path without query) on an ephemeral port. Unknown
    /// paths answer 404.
    pub fn start(routes: Vec<(&str, Route)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind test server");
        let port = server
            .server_addr()
            .to_ip()
            .expect("ip listener")
            .port();
        let routes: Arc<HashMap<String, Route>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, route)| (path.to_string(), route))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = requests.clone();
        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                let routes = routes.clone();
                let cookie = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Cookie"))
                    .map(|h| h.value.as_str().to_string());
                log.lock().unwrap().push((request.url().to_string(), cookie));
                std::thread::spawn(move || {
                    let path = request.url().split('?').next().unwrap_or("").to_string();
                    match routes.get(&path) {
                        Some(route) => {
                            std::thread::sleep(route.delay);
                            let header = Header::from_bytes(&b"Content-Type"[..], route.content_type.as_bytes())
                                .expect("header");
                            let mut resp = Response::from_data(route.body.clone())
                                .with_status_code(route.status)
                                .with_header(header);
                            for (name, value) in &route.headers {
                                resp.add_header(
                                    Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("header"),
                                );
                            }
                            let _ = request.respond(resp);
                        }
                        None => {
                            let _ = request.respond(Response::from_string("not found").with_status_code(404));
                        }
                    }
                });
            }
        });

        Self {
            base: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Request targets (path and query) received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }

    /// `Cookie` header sent with the last request for `path`.
    pub fn cookie(&self, path: &str) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(url, _)| url.split('?').next() == Some(path))
            .and_then(|(_, cookie)| cookie.clone())
    }
}

/// XML markup carried by an SVG data URI.
pub fn svg_markup(uri: &str) -> String {
    let decoded = rfcapture::resource::data_url::decode(uri).expect("svg data uri");
    assert_eq!(decoded.mime, "image/svg+xml");
    String::from_utf8(decoded.bytes).expect("utf-8 markup")
}
