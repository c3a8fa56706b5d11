use std::sync::Arc;

use log::info;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ForwardError;
use crate::selector::Selector;

const PUBLIC_SUFFIX: &str = "PUBLIC";
const ACCESS_TOKEN_HEADER: &str = "accessToken";

/// Inbound envelope describing the call to make on the current best backend.
/// Omitted fields decode as empty.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForwardRequest {
    pub endpoint: String,
    #[serde(rename = "reqBody")]
    pub req_body: Option<Value>,
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    pub method: String,
}

impl ForwardRequest {
    /// HTTP method to use and whether the call is public. A method ending in
    /// `PUBLIC` is public and has the marker removed.
    pub fn resolve_method(&self) -> (&str, bool) {
        match self.method.strip_suffix(PUBLIC_SUFFIX) {
            Some(method) => (method, true),
            None => (self.method.as_str(), false),
        }
    }
}

/// Upstream answer, relayed without interpretation.
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardResponse {
    pub status: u16,
    /// Every header line in the order received.
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
}

pub struct Forwarder {
    client: Client,
    selector: Arc<Selector>,
}

impl Forwarder {
    pub fn new(client: Client, selector: Arc<Selector>) -> Self {
        Self { client, selector }
    }

    pub async fn forward(
        &self,
        request: &ForwardRequest,
        request_id: &str,
    ) -> Result<ForwardResponse, ForwardError> {
        let best = self
            .selector
            .current_best()
            .ok_or(ForwardError::NoBackendAvailable)?;

        let (method, is_public) = request.resolve_method();
        // An empty method means GET, as with most HTTP clients.
        let method = if method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(method.as_bytes())
                .map_err(|_| ForwardError::InvalidMethod(method.to_string()))?
        };

        let url = format!("{}{}", best, request.endpoint);
        info!("➡️ [{}] Forwarding {} request to: {}", request_id, method, url);

        let mut outbound = self
            .client
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(body) = &request.req_body {
            outbound = outbound.body(serde_json::to_vec(body)?);
        }

        if !is_public {
            if let Some(token) = request.access_token.as_deref().filter(|t| !t.is_empty()) {
                outbound = outbound.header(ACCESS_TOKEN_HEADER, token);
            }
        }

        let response = outbound.send().await.map_err(ForwardError::Send)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();
        let body = response.bytes().await.map_err(ForwardError::Body)?.to_vec();

        info!(
            "⬅️ [{}] Response Status: {}, Body Length: {}",
            request_id,
            status,
            body.len()
        );

        Ok(ForwardResponse {
            status,
            headers,
            body,
        })
    }
}
