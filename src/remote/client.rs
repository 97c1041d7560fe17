use async_trait::async_trait;
use log::trace;
use reqwest::{header, Client, Method};
use serde_json::Value;
use std::sync::Arc;

use super::{ApiConnector, ApiResponse, MonitoringApi};
use crate::error::{Result, SetupError};

/// Default monitoring API root
pub const DEFAULT_API_URL: &str = "https://api.circonus.com/v2";
/// Application name sent with every request
pub const DEFAULT_APP_NAME: &str = "leo-setup";

const AUTH_TOKEN_HEADER: &str = "x-circonus-auth-token";
const APP_NAME_HEADER: &str = "x-circonus-app-name";

/// HTTP client for the Circonus v2 API
#[derive(Debug, Clone)]
pub struct CirconusClient {
    /// HTTP client carrying the authentication headers
    client: Client,
    /// API root without a trailing slash
    base_url: String,
}

impl CirconusClient {
    /// Creates a client for `base_url` authenticated with `authtoken`
    pub fn new(base_url: &str, authtoken: &str, app_name: &str) -> Result<Self> {
        if authtoken.trim().is_empty() {
            return Err(SetupError::Validation("authtoken is required to call the API".into()));
        }
        url::Url::parse(base_url)?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            AUTH_TOKEN_HEADER,
            header::HeaderValue::from_str(authtoken.trim())
                .map_err(|e| SetupError::Validation(format!("invalid authtoken: {}", e)))?,
        );
        headers.insert(
            APP_NAME_HEADER,
            header::HeaderValue::from_str(app_name)
                .map_err(|e| SetupError::Config(format!("invalid app name: {}", e)))?,
        );
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, path);
        trace!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            return Err(SetupError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Picks the most useful error text out of an error body
fn error_message(body: &Value) -> String {
    match body {
        Value::Object(map) => ["message", "error", "explanation"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Value::String(s) => s.clone(),
        Value::Null => "empty response".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl MonitoringApi for CirconusClient {
    async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::PUT, path, Some(body)).await
    }
}

/// Connects [`CirconusClient`]s to a fixed API root
#[derive(Debug, Clone)]
pub struct CirconusConnector {
    base_url: String,
    app_name: String,
}

impl CirconusConnector {
    /// Creates a connector for the given API root
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_name: DEFAULT_APP_NAME.to_string(),
        }
    }

    /// Overrides the application name reported to the API
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }
}

impl Default for CirconusConnector {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ApiConnector for CirconusConnector {
    fn connect(&self, authtoken: &str) -> Result<Arc<dyn MonitoringApi>> {
        Ok(Arc::new(CirconusClient::new(&self.base_url, authtoken, &self.app_name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_token_rejected() {
        let result = CirconusClient::new(DEFAULT_API_URL, "  ", DEFAULT_APP_NAME);
        assert!(matches!(result, Err(SetupError::Validation(_))));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let result = CirconusClient::new("not a url", "abc", DEFAULT_APP_NAME);
        assert!(matches!(result, Err(SetupError::UrlParse(_))));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(&json!({"message": "bad token"})), "bad token");
        assert_eq!(error_message(&json!({"code": 3})), r#"{"code":3}"#);
        assert_eq!(error_message(&Value::Null), "empty response");
    }
}
