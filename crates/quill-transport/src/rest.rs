//! Outbound REST client.
//!
//! [`HttpClient`] implements [`RestApi`] over `reqwest`. Every request
//! carries the bot token and a user agent; transient failures are retried:
//!
//! - **429**: waits the `retry_after` the platform asks for
//! - **5xx / transport errors**: exponential backoff per [`RetryConfig`]
//!
//! Other failures map to typed [`RestError`]s. A 400 body's nested
//! `errors` object is flattened into `Error @ location: message` lines.

use std::time::Duration;

use async_trait::async_trait;
use quill_core::{
    CommandSchema, CommandScope, RegisteredCommand, RestApi, RestError, RestResult, Snowflake,
};
use reqwest::{
    Client, ClientBuilder, Method, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT},
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};

/// Default API root.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Configuration
// ============================================================================

/// Retry policy for transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound of any backoff delay.
    pub max_delay: Duration,
    /// Growth factor between retries.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let seconds = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        capped_delay(seconds, self.max_delay)
    }
}

/// Converts `seconds` to a delay no longer than `cap`. Non-finite and
/// out-of-range values wait `cap`.
fn capped_delay(seconds: f64, cap: Duration) -> Duration {
    if seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).map_or(cap, |delay| delay.min(cap))
}

/// Settings of an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub api_base: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// REST client for one application.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    api_base: String,
    application_id: Snowflake,
    retry: RetryConfig,
}

impl HttpClient {
    /// Creates a client authenticating with the bot `token`.
    pub fn new(
        token: &str,
        application_id: Snowflake,
        config: HttpClientConfig,
    ) -> TransportResult<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bot {token}"))
            .map_err(|_| TransportError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!(
                "DiscordBot (https://github.com/quill-rs/quill, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            )),
        );

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            application_id,
            retry: config.retry,
        })
    }

    fn application_url(&self, path: &str) -> String {
        format!("{}/applications/{}{path}", self.api_base, self.application_id)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> RestResult<T> {
        let bytes = self.send(method, url, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| RestError::Decode(e.to_string()))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> RestResult<Vec<u8>> {
        let mut attempt = 0;
        loop {
            let result = self.send_once(method.clone(), url, body).await;
            match result {
                Err(error) if error.is_transient() && attempt < self.retry.max_retries => {
                    let delay = match &error {
                        RestError::RateLimited { retry_after } => *retry_after,
                        _ => self.retry.delay_for(attempt),
                    };
                    warn!(
                        method = %method,
                        url = %url,
                        attempt = attempt + 1,
                        delay = ?delay,
                        error = %error,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> RestResult<Vec<u8>> {
        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| RestError::Transport(e.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RestError::Transport(e.to_string()))?;

        if status.is_success() {
            debug!(method = %method, url = %url, status = status.as_u16(), "Request succeeded");
            return Ok(bytes.to_vec());
        }
        Err(error_for_status(
            status,
            retry_after,
            &bytes,
            self.retry.max_delay,
        ))
    }
}

#[async_trait]
impl RestApi for HttpClient {
    async fn register_command(
        &self,
        scope: CommandScope,
        schema: &CommandSchema,
    ) -> RestResult<RegisteredCommand> {
        let url = match scope {
            CommandScope::Global => self.application_url("/commands"),
            CommandScope::Guild(guild_id) => {
                self.application_url(&format!("/guilds/{guild_id}/commands"))
            }
        };
        self.request(Method::POST, &url, Some(schema)).await
    }

    async fn register_commands_bulk(
        &self,
        schemas: &[CommandSchema],
    ) -> RestResult<Vec<RegisteredCommand>> {
        let url = self.application_url("/commands");
        self.request(Method::PUT, &url, Some(&schemas)).await
    }

    async fn get_global_commands(&self) -> RestResult<Vec<RegisteredCommand>> {
        let url = self.application_url("/commands");
        self.request(Method::GET, &url, None::<&()>).await
    }

    async fn delete_global_command(&self, command_id: Snowflake) -> RestResult<()> {
        let url = self.application_url(&format!("/commands/{command_id}"));
        self.send(Method::DELETE, &url, None::<&()>).await.map(drop)
    }

    async fn delete_interaction_message(&self, token: &str) -> RestResult<()> {
        let url = format!(
            "{}/webhooks/{}/{token}/messages/@original",
            self.api_base, self.application_id
        );
        self.send(Method::DELETE, &url, None::<&()>).await.map(drop)
    }
}

// ============================================================================
// Error mapping
// ============================================================================

/// Maps a failed response to a [`RestError`]. Rate-limit waits are capped at
/// `max_wait`.
fn error_for_status(
    status: StatusCode,
    retry_after_header: Option<f64>,
    body: &[u8],
    max_wait: Duration,
) -> RestError {
    let json: Option<Value> = serde_json::from_slice(body).ok();
    let text = || String::from_utf8_lossy(body).into_owned();
    let message = || {
        json.as_ref()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(text)
    };

    match status.as_u16() {
        429 => {
            let seconds = json
                .as_ref()
                .and_then(|v| v.get("retry_after"))
                .and_then(Value::as_f64)
                .or(retry_after_header)
                .unwrap_or(1.0);
            RestError::RateLimited {
                retry_after: capped_delay(seconds, max_wait),
            }
        }
        400 => RestError::BadRequest {
            message: json
                .as_ref()
                .and_then(|v| v.get("errors"))
                .map(flatten_errors)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(message),
        },
        403 => RestError::Forbidden(message()),
        404 => RestError::NotFound(message()),
        code if status.is_server_error() => RestError::Server { status: code },
        code => RestError::Http {
            status: code,
            body: text(),
        },
    }
}

/// Flattens a nested `errors` object into `Error @ location: message` lines.
pub fn flatten_errors(errors: &Value) -> String {
    let mut lines = Vec::new();
    collect_errors(errors, &mut Vec::new(), &mut lines);
    lines.join("\n")
}

fn collect_errors(value: &Value, path: &mut Vec<String>, lines: &mut Vec<String>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        if key == "_errors" {
            let messages: Vec<&str> = child
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            let location = if path.is_empty() {
                "body".to_owned()
            } else {
                path.join(".")
            };
            lines.push(format!("Error @ {location}: {}", messages.join(", ")));
        } else {
            path.push(key.clone());
            collect_errors(child, path, lines);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WAIT: Duration = Duration::from_secs(30);

    #[test]
    fn backoff_grows_and_caps() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.delay_for(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for(3), Duration::from_millis(500));
    }

    #[test]
    fn steep_backoff_saturates_at_max_delay() {
        let retry = RetryConfig {
            max_retries: 30,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1e6,
        };
        assert_eq!(retry.delay_for(29), Duration::from_secs(30));
        assert_eq!(retry.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn oversized_retry_after_is_capped() {
        let huge = error_for_status(
            StatusCode::TOO_MANY_REQUESTS,
            None,
            br#"{"retry_after": 1e300}"#,
            WAIT,
        );
        assert!(matches!(huge, RestError::RateLimited { retry_after } if retry_after == WAIT));

        let infinite = error_for_status(StatusCode::TOO_MANY_REQUESTS, Some(f64::INFINITY), b"", WAIT);
        assert!(matches!(infinite, RestError::RateLimited { retry_after } if retry_after == WAIT));

        let negative = error_for_status(StatusCode::TOO_MANY_REQUESTS, Some(-3.0), b"", WAIT);
        assert!(matches!(negative, RestError::RateLimited { retry_after } if retry_after == Duration::ZERO));
    }

    #[test]
    fn nested_errors_are_flattened() {
        let errors = json!({
            "name": { "_errors": [{ "code": "BASE_TYPE_BAD_LENGTH", "message": "Must be between 1 and 32 in length." }] },
            "options": { "0": { "description": { "_errors": [
                { "code": "A", "message": "Too long." },
                { "code": "B", "message": "Invalid." }
            ] } } }
        });
        let flat = flatten_errors(&errors);
        assert!(flat.contains("Error @ name: Must be between 1 and 32 in length."));
        assert!(flat.contains("Error @ options.0.description: Too long., Invalid."));
        assert_eq!(flat.lines().count(), 2);
    }

    #[test]
    fn statuses_map_to_typed_errors() {
        let limited = error_for_status(
            StatusCode::TOO_MANY_REQUESTS,
            None,
            br#"{"message":"You are being rate limited.","retry_after":0.25,"global":false}"#,
            WAIT,
        );
        assert!(
            matches!(limited, RestError::RateLimited { retry_after } if retry_after == Duration::from_millis(250))
        );
        assert!(limited.is_transient());

        let header_only = error_for_status(StatusCode::TOO_MANY_REQUESTS, Some(2.0), b"", WAIT);
        assert!(
            matches!(header_only, RestError::RateLimited { retry_after } if retry_after == Duration::from_secs(2))
        );

        let bad = error_for_status(
            StatusCode::BAD_REQUEST,
            None,
            br#"{"code":50035,"message":"Invalid Form Body","errors":{"name":{"_errors":[{"message":"Bad name."}]}}}"#,
            WAIT,
        );
        assert!(matches!(bad, RestError::BadRequest { message } if message == "Error @ name: Bad name."));

        let missing = error_for_status(StatusCode::NOT_FOUND, None, br#"{"message":"Unknown Webhook"}"#, WAIT);
        assert!(matches!(missing, RestError::NotFound(m) if m == "Unknown Webhook"));

        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, None, b"<html>", WAIT),
            RestError::Server { status: 502 }
        ));
        assert!(matches!(
            error_for_status(StatusCode::CONFLICT, None, b"nope", WAIT),
            RestError::Http { status: 409, .. }
        ));
    }

    #[test]
    fn urls() {
        let client = tokio_test::assert_ok!(HttpClient::new(
            "token",
            Snowflake::new(42),
            HttpClientConfig {
                api_base: "http://localhost:9/api/".into(),
                ..HttpClientConfig::default()
            },
        ));
        assert_eq!(
            client.application_url("/commands"),
            "http://localhost:9/api/applications/42/commands"
        );
        assert!(matches!(
            HttpClient::new("bad\ntoken", Snowflake::new(1), HttpClientConfig::default()),
            Err(TransportError::InvalidToken)
        ));
    }
}
