//! HTTP system adapter

use super::{AdapterError, SystemAdapter, SystemRequest, SystemResponse};
use async_trait::async_trait;
use ratewire_core::ast::HttpMethod;
use ratewire_core::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Connection details of a named external system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEndpoint {
    pub base_url: String,

    /// Headers sent with every request; step headers override them
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Caps the step timeout when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl SystemEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: BTreeMap::new(),
            timeout_ms: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// `SystemAdapter` over HTTP + JSON
#[derive(Debug, Clone)]
pub struct HttpSystemAdapter {
    client: reqwest::Client,
    systems: BTreeMap<String, SystemEndpoint>,
}

impl HttpSystemAdapter {
    pub fn new(systems: BTreeMap<String, SystemEndpoint>) -> Self {
        Self {
            client: reqwest::Client::new(),
            systems,
        }
    }

    pub fn systems(&self) -> impl Iterator<Item = &str> {
        self.systems.keys().map(String::as_str)
    }
}

#[async_trait]
impl SystemAdapter for HttpSystemAdapter {
    async fn call(&self, request: &SystemRequest) -> Result<SystemResponse, AdapterError> {
        let endpoint = self
            .systems
            .get(&request.system)
            .ok_or_else(|| AdapterError::UnknownSystem(request.system.clone()))?;

        let timeout = match endpoint.timeout_ms {
            Some(ms) => request.timeout.min(Duration::from_millis(ms)),
            None => request.timeout,
        };
        let url = endpoint.url(&request.path);

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url).timeout(timeout);
        for (name, value) in endpoint.headers.iter().chain(request.headers.iter()) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.method != HttpMethod::Get {
            builder = builder.json(&serde_json::Value::from(request.body.clone()));
        }

        tracing::debug!(system = %request.system, %url, method = ?request.method, "Calling external system");

        let response = builder.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| classify(e, timeout))?;

        if !status.is_success() {
            return Err(AdapterError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(SystemResponse {
            status: status.as_u16(),
            body: parse_body(&text),
        })
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> AdapterError {
    if error.is_timeout() {
        AdapterError::Timeout(timeout)
    } else if error.is_connect() {
        AdapterError::Connection(error.to_string())
    } else if error.is_decode() || error.is_body() {
        AdapterError::InvalidResponse(error.to_string())
    } else {
        AdapterError::Request(error.to_string())
    }
}

/// JSON bodies are parsed; anything else is kept as a string
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}
