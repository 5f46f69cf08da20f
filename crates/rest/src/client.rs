use std::time::Duration;

use parley_core::response::{FileAttachment, InteractionResponse};
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{classify_failure, RestError};
use crate::ratelimit::BucketTable;
use crate::route::Route;

const USER_AGENT: &str = "DiscordBot (parley, 0.1.0)";

/// Rate-limit-aware REST client. One instance per process; the bucket table
/// is shared across every concurrent caller.
pub struct RestClient {
    http: reqwest::Client,
    api_base: String,
    token: SecretString,
    application_id: String,
    buckets: BucketTable,
    max_retries: u32,
}

impl RestClient {
    pub fn new(
        api_base: impl Into<String>,
        token: SecretString,
        application_id: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            token,
            application_id: application_id.into(),
            buckets: BucketTable::new(),
            max_retries: max_retries.max(1),
        }
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn buckets(&self) -> &BucketTable {
        &self.buckets
    }

    /// Issues `route` with an optional JSON body, honoring bucket state and
    /// the retry policy. Returns the decoded response body (`Null` for
    /// bodyless replies).
    pub async fn request(&self, route: &Route, json: Option<&Value>) -> Result<Value, RestError> {
        self.run(route, json, &[]).await
    }

    /// Same call with file attachments: the body becomes multipart with a
    /// `payload_json` field plus one `file{i}` part per attachment.
    pub async fn request_multipart(
        &self,
        route: &Route,
        json: &Value,
        files: &[FileAttachment],
    ) -> Result<Value, RestError> {
        self.run(route, Some(json), files).await
    }

    async fn run(
        &self,
        route: &Route,
        json: Option<&Value>,
        files: &[FileAttachment],
    ) -> Result<Value, RestError> {
        let mut rate_limit_retried = false;
        let mut attempt: u32 = 0;

        loop {
            self.buckets.acquire(route.bucket()).await;

            let error = match self.perform(route, json, files).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let Some(delay) =
                next_retry_delay(&error, attempt, self.max_retries, rate_limit_retried)
            else {
                return Err(error);
            };

            // The single 429 retry does not consume the 5xx attempt budget.
            if matches!(error, RestError::RateLimited { .. }) {
                rate_limit_retried = true;
            } else {
                attempt += 1;
            }

            warn!(
                event_name = "rest.request.retry",
                method = %route.method,
                path = %route.path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "request failed, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn perform(
        &self,
        route: &Route,
        json: Option<&Value>,
        files: &[FileAttachment],
    ) -> Result<Value, RestError> {
        let url = format!("{}{}", self.api_base, route.path);
        let mut request = self
            .http
            .request(route.method.clone(), &url)
            .header(AUTHORIZATION, format!("Bot {}", self.token.expose_secret()))
            .header(reqwest::header::USER_AGENT, USER_AGENT);

        if files.is_empty() {
            if let Some(json) = json {
                request = request.header(CONTENT_TYPE, "application/json").json(json);
            }
        } else {
            // Multipart bodies are rebuilt per attempt; a Form is consumed
            // by the send.
            let mut form = Form::new();
            if let Some(json) = json {
                form = form.text("payload_json", json.to_string());
            }
            for (index, file) in files.iter().enumerate() {
                let part = Part::bytes(file.bytes.clone())
                    .file_name(file.filename.clone())
                    .mime_str("application/octet-stream")?;
                form = form.part(format!("file{index}"), part);
            }
            request = request.multipart(form);
        }

        let response = request.send().await?;
        let status = response.status();
        let remaining = header_u32(response.headers(), "x-ratelimit-remaining");
        let reset_after = header_f64(response.headers(), "x-ratelimit-reset-after");
        let retry_after = header_f64(response.headers(), "retry-after");
        self.buckets.record(route.bucket(), remaining, reset_after, Instant::now());

        let text = response.text().await?;
        if status.is_success() {
            debug!(
                event_name = "rest.request.ok",
                method = %route.method,
                path = %route.path,
                status = status.as_u16(),
                "request completed"
            );
            if text.is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)));
        }

        Err(classify_failure(status.as_u16(), &text, retry_after))
    }

    pub async fn create_followup_message(
        &self,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<Value, RestError> {
        let route = Route::create_followup_message(&self.application_id, token);
        self.send_response(&route, response).await
    }

    pub async fn edit_original_response(
        &self,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<Value, RestError> {
        let route = Route::edit_original_response(&self.application_id, token);
        self.send_response(&route, response).await
    }

    pub async fn delete_original_response(&self, token: &str) -> Result<Value, RestError> {
        let route = Route::delete_original_response(&self.application_id, token);
        self.request(&route, None).await
    }

    pub async fn fetch_original_response(&self, token: &str) -> Result<Value, RestError> {
        let route = Route::fetch_original_response(&self.application_id, token);
        self.request(&route, Some(&Value::Object(Default::default()))).await
    }

    pub async fn replace_global_commands(&self, payloads: &Value) -> Result<Value, RestError> {
        let route = Route::replace_global_commands(&self.application_id);
        self.request(&route, Some(payloads)).await
    }

    pub async fn replace_guild_commands(
        &self,
        guild_id: &str,
        payloads: &Value,
    ) -> Result<Value, RestError> {
        let route = Route::replace_guild_commands(&self.application_id, guild_id);
        self.request(&route, Some(payloads)).await
    }

    async fn send_response(
        &self,
        route: &Route,
        response: &InteractionResponse,
    ) -> Result<Value, RestError> {
        let body = response.body_value();
        if response.files.is_empty() {
            self.request(route, Some(&body)).await
        } else {
            self.request_multipart(route, &body, &response.files).await
        }
    }
}

/// The retry policy in one place: terminal errors never retry, a 429
/// retries exactly once after the server-provided delay, 5xx/transport
/// failures retry with a linearly increasing backoff until the attempt
/// budget is spent.
fn next_retry_delay(
    error: &RestError,
    attempt: u32,
    max_retries: u32,
    rate_limit_retried: bool,
) -> Option<Duration> {
    if error.is_terminal() {
        return None;
    }

    match error {
        RestError::RateLimited { retry_after_secs, .. } => {
            if rate_limit_retried {
                None
            } else {
                Some(Duration::from_secs_f64(retry_after_secs.max(0.0)))
            }
        }
        // Unlisted non-5xx statuses are client mistakes, not flakiness.
        RestError::Server { status, .. } if *status < 500 => None,
        _ if attempt + 1 >= max_retries => None,
        _ => Some(Duration::from_secs(u64::from(attempt))),
    }
}

fn header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}
