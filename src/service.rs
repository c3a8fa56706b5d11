use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, SecondsFormat};
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use http::{Response, StatusCode};
use log::{error, info, warn};
use pingora_core::apps::http_app::ServeHttp;
use pingora_core::protocols::http::ServerSession;
use reqwest::{Client, Url};
use serde::Serialize;
use uuid::Uuid;

use crate::forwarder::{ForwardRequest, ForwardResponse, Forwarder};
use crate::selector::Selector;

const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, PUT, DELETE, OPTIONS"),
    (
        "access-control-allow-headers",
        "Accept, Content-Type, Content-Length, Authorization, accessToken",
    ),
    ("access-control-allow-credentials", "true"),
];

/// Upstream headers that describe the upstream connection's framing.
/// The relayed body is re-framed by this server.
const FRAMING_HEADERS: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

/// Largest inbound request body accepted, in bytes.
const MAX_REQUEST_BODY: usize = 1024 * 1024;

#[derive(Serialize)]
struct PingResponse {
    status: &'static str,
    #[serde(rename = "bestAPI")]
    best_api: String,
    timestamp: String,
}

/// HTTP front of the balancer: `/loadbalancer`, `/ping` and `/api-check`.
pub struct BalancerApp {
    forwarder: Forwarder,
    selector: Arc<Selector>,
    client: Client,
}

impl BalancerApp {
    pub fn new(selector: Arc<Selector>) -> Self {
        let client = Client::new();
        Self {
            forwarder: Forwarder::new(client.clone(), selector.clone()),
            selector,
            client,
        }
    }

    pub async fn route(&self, method: &str, path_and_query: &str, body: &[u8]) -> Response<Vec<u8>> {
        if method == "OPTIONS" {
            return respond(StatusCode::NO_CONTENT, Vec::new(), Vec::new());
        }

        let url = match Url::parse(&format!("http://localhost{}", path_and_query)) {
            Ok(url) => url,
            Err(_) => return text(StatusCode::BAD_REQUEST, "Invalid request path"),
        };

        match (method, url.path()) {
            ("POST", "/loadbalancer") => self.handle_forward(body).await,
            ("GET", "/ping") => self.handle_ping(),
            ("GET", "/api-check") => {
                let api = url
                    .query_pairs()
                    .find(|(k, _)| k == "api")
                    .map(|(_, v)| v.into_owned())
                    .filter(|v| !v.is_empty());
                self.handle_api_check(api.as_deref()).await
            }
            (_, "/loadbalancer" | "/ping" | "/api-check") => {
                text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
            }
            _ => text(StatusCode::NOT_FOUND, "Not found"),
        }
    }

    /// Decodes a forward envelope and relays the current best backend's answer.
    pub async fn handle_forward(&self, raw_body: &[u8]) -> Response<Vec<u8>> {
        let request: ForwardRequest = match serde_json::from_slice(raw_body) {
            Ok(request) => request,
            Err(e) => {
                warn!("⚠️ Invalid request body: {}", e);
                return text(StatusCode::BAD_REQUEST, "Invalid request body");
            }
        };

        let request_id = Uuid::new_v4().to_string();
        match self.forwarder.forward(&request, &request_id).await {
            Ok(response) => relay(response),
            Err(e) => {
                error!("🚨 [{}] Failed to handle request: {}", request_id, e);
                let status =
                    StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                text(status, &e.to_string())
            }
        }
    }

    pub fn current_best(&self) -> String {
        self.selector.current_best().unwrap_or_default()
    }

    fn handle_ping(&self) -> Response<Vec<u8>> {
        let ping = PingResponse {
            status: "ok",
            best_api: self.current_best(),
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        match serde_json::to_vec(&ping) {
            Ok(body) => respond(
                StatusCode::OK,
                vec![(CONTENT_TYPE.to_string(), b"application/json".to_vec())],
                body,
            ),
            Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        }
    }

    async fn handle_api_check(&self, api: Option<&str>) -> Response<Vec<u8>> {
        let Some(api) = api else {
            return text(StatusCode::BAD_REQUEST, "Missing api parameter");
        };

        let response = match self.client.get(api).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("🚨 Error calling API {}: {}", api, e);
                return text(StatusCode::INTERNAL_SERVER_ERROR, &format!("Error calling API: {}", e));
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.as_bytes().to_vec()))
            .collect();
        match response.bytes().await {
            Ok(body) => relay(ForwardResponse {
                status,
                headers,
                body: body.to_vec(),
            }),
            Err(e) => text(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Error reading response: {}", e),
            ),
        }
    }
}

#[async_trait]
impl ServeHttp for BalancerApp {
    async fn response(&self, session: &mut ServerSession) -> Response<Vec<u8>> {
        let method = session.req_header().method.as_str().to_string();
        let path_and_query = session
            .req_header()
            .uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        match session.client_addr() {
            Some(addr) => info!("{} {} {}", method, addr, path_and_query),
            None => info!("{} {}", method, path_and_query),
        }

        let mut body = Vec::new();
        loop {
            match session.read_request_body().await {
                Ok(Some(chunk)) => {
                    if !append_capped(&mut body, &chunk, MAX_REQUEST_BODY) {
                        warn!("⚠️ Request body exceeds {} bytes", MAX_REQUEST_BODY);
                        return text(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("⚠️ Failed to read request body: {}", e);
                    return text(StatusCode::BAD_REQUEST, "Invalid request body");
                }
            }
        }

        self.route(&method, &path_and_query, &body).await
    }
}

/// Appends `chunk` unless the body would grow past `limit`.
fn append_capped(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    if body.len() + chunk.len() > limit {
        return false;
    }
    body.extend_from_slice(chunk);
    true
}

fn relay(upstream: ForwardResponse) -> Response<Vec<u8>> {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut headers: Vec<(String, Vec<u8>)> = upstream
        .headers
        .into_iter()
        .filter(|(k, _)| !FRAMING_HEADERS.contains(&k.to_ascii_lowercase().as_str()))
        .collect();
    if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
        headers.push((CONTENT_TYPE.to_string(), b"application/json".to_vec()));
    }
    respond(status, headers, upstream.body)
}

fn text(status: StatusCode, message: &str) -> Response<Vec<u8>> {
    respond(
        status,
        vec![(CONTENT_TYPE.to_string(), b"text/plain; charset=utf-8".to_vec())],
        format!("{}\n", message).into_bytes(),
    )
}

fn respond(status: StatusCode, headers: Vec<(String, Vec<u8>)>, body: Vec<u8>) -> Response<Vec<u8>> {
    let mut response = Response::new(Vec::new());
    *response.status_mut() = status;

    let map = response.headers_mut();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(&value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => warn!("⚠️ Dropping invalid response header {:?}", name),
        }
    }
    for (name, value) in CORS_HEADERS {
        map.insert(name, HeaderValue::from_static(value));
    }
    map.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

    *response.body_mut() = body;
    response
}
