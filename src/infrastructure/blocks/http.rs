//! Built-in `http` block
//!
//! Config: `url` (required), `method` (get/post/put/patch/delete, default
//! get), `headers`, `query` and `failOnError` (default true). Resolved inputs
//! `url`, `headers`, `query` and `body` are applied over the config, so
//! templated values reach the request through inputs.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::HttpBlockConfig;
use crate::domain::block::{
    BlockDefinition, BlockError, BlockExecutionContext, BlockFunction, BlockHandler, BlockOutputs,
    BlockPort,
};

pub const HTTP_BLOCK_TYPE: &str = "http";

/// Default per-instance timeout in milliseconds
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn parse(value: &str) -> Result<Self, BlockError> {
        match value.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            other => Err(BlockError::invalid_config(format!(
                "Unsupported HTTP method: {}",
                other
            ))),
        }
    }

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequestConfig {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    headers: Map<String, Value>,
    #[serde(default)]
    query: Map<String, Value>,
    #[serde(default = "default_true")]
    fail_on_error: bool,
}

fn default_true() -> bool {
    true
}

/// Request after merging inputs over config
#[derive(Debug, Clone, PartialEq)]
struct HttpRequestSpec {
    url: String,
    method: HttpMethod,
    headers: Map<String, Value>,
    query: Map<String, Value>,
    body: Option<Value>,
    fail_on_error: bool,
}

impl HttpRequestSpec {
    fn build(config: &Value, inputs: &Map<String, Value>) -> Result<Self, BlockError> {
        let config: HttpRequestConfig = serde_json::from_value(config.clone())
            .map_err(|e| BlockError::invalid_config(format!("Invalid http config: {}", e)))?;

        let url = match inputs.get("url") {
            Some(Value::String(url)) => url.clone(),
            _ => config
                .url
                .ok_or_else(|| BlockError::invalid_config("http block requires a url"))?,
        };

        if url.trim().is_empty() {
            return Err(BlockError::invalid_config("http block requires a url"));
        }

        let method = match config.method.as_deref() {
            Some(method) => HttpMethod::parse(method)?,
            None => HttpMethod::default(),
        };

        let mut headers = config.headers;
        if let Some(Value::Object(overrides)) = inputs.get("headers") {
            headers.extend(overrides.clone());
        }

        let mut query = config.query;
        if let Some(Value::Object(overrides)) = inputs.get("query") {
            query.extend(overrides.clone());
        }

        let body = inputs.get("body").filter(|b| !b.is_null()).cloned();

        Ok(Self {
            url,
            method,
            headers,
            query,
            body,
            fail_on_error: config.fail_on_error,
        })
    }
}

/// Render a JSON value for a header or query string
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Handler performing one HTTP request per invocation
#[derive(Debug, Clone)]
pub struct HttpBlock {
    client: reqwest::Client,
}

impl HttpBlock {
    pub fn new(config: &HttpBlockConfig) -> Result<Self, BlockError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| BlockError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn definition() -> BlockDefinition {
        BlockDefinition::new(HTTP_BLOCK_TYPE)
            .with_description("Performs an HTTP request and exposes the response")
            .with_config(json!({
                "url": "https://example.com/resource",
                "method": "get",
                "headers": {},
                "query": {},
                "failOnError": true
            }))
            .with_input(BlockPort::new("url", "string").with_description("Overrides config.url"))
            .with_input(BlockPort::new("headers", "object"))
            .with_input(BlockPort::new("query", "object"))
            .with_input(BlockPort::new("body", "any").with_description("JSON request body"))
            .with_output(BlockPort::required("status", "number"))
            .with_output(BlockPort::required("headers", "object"))
            .with_output(BlockPort::required("body", "any"))
            .with_output(BlockPort::required("success", "boolean"))
            .with_function(BlockFunction::new("get", "HTTP GET"))
            .with_function(BlockFunction::new("post", "HTTP POST"))
            .with_function(BlockFunction::new("put", "HTTP PUT"))
            .with_function(BlockFunction::new("patch", "HTTP PATCH"))
            .with_function(BlockFunction::new("delete", "HTTP DELETE"))
            .with_timeout(DEFAULT_TIMEOUT_MS)
    }
}

#[async_trait]
impl BlockHandler for HttpBlock {
    async fn execute(
        &self,
        context: BlockExecutionContext,
        config: Value,
    ) -> Result<BlockOutputs, BlockError> {
        let spec = HttpRequestSpec::build(&config, &context.inputs)?;

        debug!(
            block_id = %context.block_id,
            method = ?spec.method,
            url = %spec.url,
            "Sending HTTP request"
        );

        let mut request = self.client.request(spec.method.as_reqwest(), &spec.url);

        for (key, value) in &spec.headers {
            request = request.header(key.as_str(), value_to_string(value));
        }

        if !spec.query.is_empty() {
            let pairs: Vec<(String, String)> = spec
                .query
                .iter()
                .map(|(key, value)| (key.clone(), value_to_string(value)))
                .collect();
            request = request.query(&pairs);
        }

        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BlockError::handler(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| BlockError::handler(format!("Failed to read HTTP response: {}", e)))?;

        if !status.is_success() && spec.fail_on_error {
            return Err(BlockError::handler(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                spec.url,
                text.chars().take(200).collect::<String>()
            )));
        }

        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        let mut outputs = BlockOutputs::new();
        outputs.insert("status".to_string(), json!(status.as_u16()));
        outputs.insert("headers".to_string(), Value::Object(headers));
        outputs.insert("body".to_string(), body);
        outputs.insert("success".to_string(), json!(status.is_success()));

        Ok(outputs)
    }
}
