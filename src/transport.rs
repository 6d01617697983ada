use crate::config::Config;
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

/// Path segment every device endpoint lives under.
pub const API_PREFIX: &str = "restful";

/// One request against the device API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    #[must_use]
    pub fn get(endpoint: &str) -> Self {
        Self::new(Method::GET, endpoint)
    }

    #[must_use]
    pub fn put(endpoint: &str, body: Value) -> Self {
        Self::new(Method::PUT, endpoint).with_body(body)
    }

    #[must_use]
    pub fn new(method: Method, endpoint: &str) -> Self {
        Self {
            method,
            endpoint: endpoint.to_string(),
            body: None,
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Anything able to execute a request against the router.
///
/// The coordinator and the command dispatcher only see this trait, so tests
/// can substitute an in-memory device.
#[async_trait]
pub trait DeviceApi: Send + Sync + 'static {
    /// Execute `request` and return the unwrapped `Result` payload.
    async fn call(&self, request: ApiRequest) -> std::result::Result<Value, TransportError>;

    async fn get(&self, endpoint: &str) -> std::result::Result<Value, TransportError> {
        self.call(ApiRequest::get(endpoint)).await
    }

    async fn put(&self, endpoint: &str, body: Value) -> std::result::Result<Value, TransportError> {
        self.call(ApiRequest::put(endpoint, body)).await
    }
}

/// HTTP transport owning the single connection pool used for the device.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    expected_status: StatusCode,
}

impl HttpTransport {
    /// Build a transport from the configured host, timeout and expected status.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not form a valid URL, the expected
    /// status is not a valid HTTP code, or the client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout())
            .build()?;

        let expected_status = StatusCode::from_u16(config.expected_status).map_err(|_| {
            crate::error::MonitorError::Generic(format!(
                "Invalid expected status: {}",
                config.expected_status
            ))
        })?;

        Self::new(client, &config.host, expected_status)
    }

    /// Build a transport around an existing client.
    ///
    /// `host` may carry a port (`192.168.1.1:8080`) or a scheme; a bare host
    /// is addressed over plain HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` does not form a valid URL.
    pub fn new(client: reqwest::Client, host: &str, expected_status: StatusCode) -> Result<Self> {
        let host = host.trim();
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };

        Url::parse(&base)
            .map_err(|e| crate::error::MonitorError::Generic(format!("Invalid host {host}: {e}")))?;

        Ok(Self {
            client,
            base_url: base.trim_end_matches('/').to_string(),
            expected_status,
        })
    }

    /// Full URL of an endpoint under the API namespace.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{API_PREFIX}/{}",
            self.base_url,
            endpoint.trim_start_matches('/')
        )
    }

    fn build_headers(request: &ApiRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in &request.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping invalid header {name} for {}", request.endpoint),
            }
        }

        headers
    }
}

#[async_trait]
impl DeviceApi for HttpTransport {
    async fn call(&self, request: ApiRequest) -> std::result::Result<Value, TransportError> {
        let url = self.endpoint_url(&request.endpoint);
        let method = request.method.clone();
        let endpoint = request.endpoint.clone();
        debug!("{method} {url}");

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .headers(Self::build_headers(&request));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!("HTTP error for {method} {endpoint}: {e}");
            TransportError::Network {
                cause: e.to_string(),
                endpoint: endpoint.clone(),
            }
        })?;

        let status = response.status();
        if status != self.expected_status {
            error!(
                "Unexpected status {status} for {method} {endpoint}. Expected: {}",
                self.expected_status
            );
            return Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint,
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            error!("Failed to read body for {method} {endpoint}: {e}");
            TransportError::Network {
                cause: e.to_string(),
                endpoint: endpoint.clone(),
            }
        })?;

        let body: Value = serde_json::from_slice(&bytes).map_err(|_| {
            error!("Invalid JSON response from {method} {endpoint}");
            TransportError::MalformedResponse {
                endpoint: endpoint.clone(),
            }
        })?;

        unwrap_envelope(body, &endpoint).map_err(|e| {
            warn!("API returned non-ok status for {method} {endpoint}: {e}");
            e
        })
    }
}

/// Validate the `{"Status": "ok", "Result": ...}` envelope and return the payload.
///
/// A body without a `Result` field is returned whole.
///
/// # Errors
///
/// Returns [`TransportError::DeviceError`] when `Status` is missing or not `"ok"`.
pub fn unwrap_envelope(
    mut body: Value,
    endpoint: &str,
) -> std::result::Result<Value, TransportError> {
    let status = match body.get("Status") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "Unknown".to_string(),
    };

    if status != "ok" {
        return Err(TransportError::DeviceError {
            status,
            endpoint: endpoint.to_string(),
        });
    }

    match body.as_object_mut().and_then(|obj| obj.remove("Result")) {
        Some(result) => Ok(result),
        None => Ok(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(host: &str) -> HttpTransport {
        HttpTransport::new(reqwest::Client::new(), host, StatusCode::OK).unwrap()
    }

    #[test]
    fn test_endpoint_url_joins_prefix() {
        let t = transport("192.168.1.1");
        assert_eq!(
            t.endpoint_url("/lte/throughput"),
            "http://192.168.1.1/restful/lte/throughput"
        );
        assert_eq!(
            t.endpoint_url("sms/send_msg"),
            "http://192.168.1.1/restful/sms/send_msg"
        );
    }

    #[test]
    fn test_endpoint_url_keeps_explicit_scheme_and_port() {
        let t = transport("http://127.0.0.1:8080/");
        assert_eq!(
            t.endpoint_url("traffic/monthly"),
            "http://127.0.0.1:8080/restful/traffic/monthly"
        );
    }

    #[test]
    fn test_unwrap_envelope_returns_result() {
        let body = json!({"Status": "ok", "ModuleCommand": "/lte/throughput", "Result": {"up": "1"}});
        assert_eq!(unwrap_envelope(body, "lte/throughput").unwrap(), json!({"up": "1"}));
    }

    #[test]
    fn test_unwrap_envelope_without_result_returns_body() {
        let body = json!({"Status": "ok", "totalcount": "3"});
        assert_eq!(unwrap_envelope(body.clone(), "x").unwrap(), body);
    }

    #[test]
    fn test_unwrap_envelope_non_ok_status() {
        let body = json!({"Status": "not support", "Result": {}});
        assert_eq!(
            unwrap_envelope(body, "lte/cellular_info_ex").unwrap_err(),
            TransportError::DeviceError {
                status: "not support".to_string(),
                endpoint: "lte/cellular_info_ex".to_string(),
            }
        );
    }

    #[test]
    fn test_unwrap_envelope_missing_status() {
        let err = unwrap_envelope(json!([1, 2, 3]), "x").unwrap_err();
        assert_eq!(err.kind(), "device_error");
    }

    #[test]
    fn test_invalid_headers_are_skipped() {
        let request = ApiRequest::get("x").with_header("bad header", "v").with_header("X-Test", "1");
        let headers = HttpTransport::build_headers(&request);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get("x-test").unwrap(), "1");
        assert_eq!(headers.len(), 2);
    }
}
