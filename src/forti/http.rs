//! HTTP utilities for FortiOS REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Delay between attempts after a transport failure
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Short description for the CMDB error codes FortiOS reports most often
pub fn describe_error_code(code: i64) -> Option<&'static str> {
    match code {
        -1 => Some("Invalid length of value"),
        -3 => Some("Entry not found"),
        -5 => Some("A duplicate entry already exists"),
        -651 => Some("Input value is invalid"),
        _ => None,
    }
}

/// Status and decoded body of one API call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// FortiOS reports a missing object either as HTTP 404 or in the body
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
            || self.body.get("http_status").and_then(|v| v.as_i64()) == Some(404)
    }

    /// The body of a successful call, or an error built from the FortiOS error fields
    pub fn into_result(self) -> Result<Value> {
        let api_error = self.body.get("status").and_then(|s| s.as_str()) == Some("error");
        if self.status.is_success() && !api_error {
            return Ok(self.body);
        }

        let http_status = self
            .body
            .get("http_status")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.status.as_u16() as u64);

        let detail = match self.body.get("error").and_then(|v| v.as_i64()) {
            Some(code) => match describe_error_code(code) {
                Some(text) => format!("{} (error {})", text, code),
                None => format!("error {}", code),
            },
            None => self
                .body
                .get("cli_error")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| "no detail".to_string()),
        };

        Err(anyhow::anyhow!(
            "API request failed: {} - {}",
            http_status,
            detail
        ))
    }
}

/// HTTP client wrapper for FortiOS API calls
#[derive(Clone)]
pub struct FortiHttpClient {
    client: Client,
}

impl FortiHttpClient {
    /// Create a new HTTP client
    pub fn new(insecure: bool, ca_bundle: Option<&Path>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(concat!("fortios-provider/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(insecure);

        if let Some(path) = ca_bundle {
            let pem = std::fs::read(path)
                .with_context(|| format!("Failed to read CA bundle {}", path.display()))?;
            let cert = reqwest::Certificate::from_pem(&pem).context("Invalid CA bundle")?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Send a request, retrying transport failures up to `retries` more times.
    /// HTTP error statuses are returned as-is for the caller to interpret.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
        retries: u32,
    ) -> Result<ApiResponse> {
        tracing::debug!("{} {}", method, url);

        let mut attempt = 0;
        let response = loop {
            let mut request = self.client.request(method.clone(), url).bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => break response,
                Err(e) if attempt < retries && (e.is_connect() || e.is_timeout()) => {
                    attempt += 1;
                    tracing::warn!("{} {} failed ({}), retry {}/{}", method, url, e, attempt, retries);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e).context("Failed to send request"),
            }
        };

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else if status.is_success() {
            serde_json::from_str(&text).context("Failed to parse response JSON")?
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        Ok(ApiResponse { status, body })
    }
}

/// Format a FortiOS API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_forti_error(error: &anyhow::Error) -> String {
    let error_str = format!("{:#}", error);

    if error_str.contains("API request failed: 401") {
        return "Authentication failed. Check the API token.".to_string();
    }
    if error_str.contains("API request failed: 403") {
        return "Permission denied. Check the API administrator's access profile and trusted hosts."
            .to_string();
    }
    if error_str.contains("API request failed: 404") {
        return "Object not found.".to_string();
    }
    if error_str.contains("API request failed: 424") {
        return "Dependency failure. A referenced object does not exist.".to_string();
    }
    if error_str.contains("API request failed: 429") {
        return "Rate limit exceeded. Please try again later.".to_string();
    }
    if error_str.contains("API request failed: 503") {
        return "FortiGate temporarily unavailable. Please try again.".to_string();
    }

    // Truncate long error messages and remove potential sensitive data
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(160)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: Value) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body,
        }
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(500);
        let out = sanitize_for_log(&long);
        assert!(out.starts_with(&"x".repeat(200)));
        assert!(out.contains("500 bytes total"));
        assert_eq!(sanitize_for_log("a\nb"), "ab");
    }

    #[test]
    fn test_error_body_formatting() {
        let err = response(500, json!({"status": "error", "http_status": 500, "error": -5}))
            .into_result()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "API request failed: 500 - A duplicate entry already exists (error -5)"
        );
    }

    #[test]
    fn test_error_status_inside_success() {
        let err = response(200, json!({"status": "error", "http_status": 400, "error": -999}))
            .into_result()
            .unwrap_err();
        assert_eq!(err.to_string(), "API request failed: 400 - error -999");
    }

    #[test]
    fn test_not_found_detection() {
        assert!(response(404, Value::Null).is_not_found());
        assert!(response(200, json!({"http_status": 404})).is_not_found());
        assert!(!response(200, json!({"http_status": 200})).is_not_found());
    }

    #[test]
    fn test_format_forti_error() {
        let err = anyhow::anyhow!("API request failed: 401 - no detail");
        assert_eq!(format_forti_error(&err), "Authentication failed. Check the API token.");

        let err = anyhow::anyhow!("Error reading FirewallPolicy6 resource: boom");
        assert_eq!(format_forti_error(&err), "Error reading FirewallPolicy6 resource: boom");
    }
}
