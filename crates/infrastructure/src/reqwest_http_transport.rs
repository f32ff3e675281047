//! Reqwest-backed transport for the remote API.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use tramite_application::{ApiRequest, ApiResponse, HttpTransport};
use tramite_core::{AppError, AppResult};
use url::Url;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP transport resolving request paths against a base URL.
#[derive(Clone)]
pub struct ReqwestHttpTransport {
    http_client: reqwest::Client,
    base_url: Url,
}

impl ReqwestHttpTransport {
    /// Creates a transport for the API rooted at `base_url`.
    pub fn new(http_client: reqwest::Client, base_url: &str) -> AppResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|error| AppError::Validation(format!("invalid API base URL: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "API base URL '{base_url}' cannot carry paths"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Returns the normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, path: &str) -> AppResult<Url> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|error| AppError::Validation(format!("invalid endpoint '{path}': {error}")))?;

        if url.origin() != self.base_url.origin() {
            return Err(AppError::Validation(format!(
                "endpoint '{path}' leaves the API origin"
            )));
        }

        Ok(url)
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: ApiRequest) -> AppResult<ApiResponse> {
        let url = self.endpoint_url(&request.path)?;
        let request_id = Uuid::new_v4().to_string();

        let mut builder = self
            .http_client
            .request(request.method.clone(), url.clone())
            .headers(request.headers)
            .header(REQUEST_ID_HEADER, request_id.as_str());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| AppError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| AppError::Transport(format!("failed to read response body: {error}")))?;
        debug!(
            method = %request.method,
            url = %url,
            status = status.as_u16(),
            request_id = request_id.as_str(),
            "api response received"
        );

        Ok(ApiResponse {
            status,
            body: parse_body(&text),
        })
    }
}

fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(error) => {
            debug!(error = %error, "response body is not JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ReqwestHttpTransport, parse_body};

    fn transport(base_url: &str) -> ReqwestHttpTransport {
        let transport = ReqwestHttpTransport::new(reqwest::Client::new(), base_url);
        let Ok(transport) = transport else {
            panic!("'{base_url}' should be accepted");
        };
        transport
    }

    #[test]
    fn endpoints_resolve_below_the_base_path() {
        let transport = transport("http://localhost:3000/api");

        let url = transport.endpoint_url("/workspaces/7").map(String::from);

        assert_eq!(
            url.ok().as_deref(),
            Some("http://localhost:3000/api/workspaces/7")
        );
        assert_eq!(transport.base_url().as_str(), "http://localhost:3000/api/");
    }

    #[test]
    fn query_strings_survive_joining() {
        let transport = transport("https://tramite.dev/api/");

        let url = transport.endpoint_url("forms?page=2").map(String::from);

        assert_eq!(
            url.ok().as_deref(),
            Some("https://tramite.dev/api/forms?page=2")
        );
    }

    #[test]
    fn endpoints_cannot_leave_the_api_origin() {
        let transport = transport("https://tramite.dev/api");

        assert!(transport.endpoint_url("http://other.host/x").is_err());
        assert!(transport.endpoint_url("/https://other.host/x").is_err());
        assert!(transport.endpoint_url("//other.host/x").is_ok_and(|url| url.host_str() == Some("tramite.dev")));
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(ReqwestHttpTransport::new(reqwest::Client::new(), "not a url").is_err());
        assert!(ReqwestHttpTransport::new(reqwest::Client::new(), "mailto:ops@tramite.dev").is_err());
    }

    #[test]
    fn bodies_parse_only_when_json() {
        assert_eq!(parse_body(""), None);
        assert_eq!(parse_body("<html>"), None);
        assert_eq!(parse_body(r#"{"message":"x"}"#), Some(json!({ "message": "x" })));
    }
}
