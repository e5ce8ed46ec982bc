use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode, Url};
use tracing::{debug, warn};

use chat_stream::{
    await_or_cancel, drive_stream, is_cancelled, CancelSignal, RenderTarget, SessionController,
    SessionObserver, SessionReport,
};

use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::headers::build_headers;
use crate::payload::ChatRequest;
use crate::retry::{is_transient_failure, parse_retry_after};
use crate::url::normalize_stream_url;

/// Ordered response body chunks of one streaming send.
pub type ChunkStream = BoxStream<'static, Result<Bytes, ChatApiError>>;

#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let endpoint = normalize_stream_url(&config.base_url, &config.stream_path);
        Url::parse(&endpoint)
            .map_err(|error| ChatApiError::InvalidBaseUrl(format!("{endpoint}: {error}")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn endpoint(&self) -> String {
        normalize_stream_url(&self.config.base_url, &self.config.stream_path)
    }

    pub fn build_headers(&self, user_agent: Option<&str>) -> Result<HeaderMap, ChatApiError> {
        let headers = build_headers(&self.config, user_agent);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    ChatApiError::InvalidRequestPayload(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    ChatApiError::InvalidRequestPayload(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, ChatApiError> {
        validate_request(request)?;

        let headers = self.build_headers(self.config.user_agent.as_deref())?;
        Ok(self.http.post(self.endpoint()).headers(headers).json(request))
    }

    /// Issue the request, retrying transient failures before any body byte is read.
    pub async fn send_with_retry(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancelSignal>,
    ) -> Result<Response, ChatApiError> {
        let policy = self.config.retry;
        let mut attempt = 0;
        let mut last_status: Option<StatusCode> = None;

        loop {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }

            let response = self.build_request(request)?.send();
            let last_error = match await_or_cancel(response, cancellation).await? {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|value| value.to_str().ok())
                        .and_then(parse_retry_after);
                    let body = await_or_cancel(response.text(), cancellation)
                        .await?
                        .unwrap_or_default();
                    let message = parse_error_message(status, &body);

                    if !is_transient_failure(status, &body) {
                        return Err(ChatApiError::Status(status, message));
                    }
                    last_status = Some(status);
                    if !policy.allows_retry_after(attempt) {
                        return Err(ChatApiError::Status(status, message));
                    }

                    let delay = policy.delay_with_hint(attempt, retry_after);
                    warn!(%status, attempt, %message, ?delay, "retrying chat stream request");
                    await_or_cancel(tokio::time::sleep(delay), cancellation).await?;
                    attempt += 1;
                    continue;
                }
                Err(error) => error.to_string(),
            };

            if !policy.allows_retry_after(attempt) {
                return Err(ChatApiError::RetryExhausted {
                    status: last_status,
                    last_error: Some(last_error),
                });
            }
            let delay = policy.delay(attempt);
            warn!(attempt, error = %last_error, ?delay, "retrying chat stream request");
            await_or_cancel(tokio::time::sleep(delay), cancellation).await?;
            attempt += 1;
        }
    }

    /// Open the streaming endpoint and expose the response body as ordered chunks.
    pub async fn open_stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancelSignal>,
    ) -> Result<ChunkStream, ChatApiError> {
        let response = self.send_with_retry(request, cancellation).await?;
        debug!(status = %response.status(), endpoint = %self.endpoint(), "chat stream opened");
        Ok(response.bytes_stream().map_err(ChatApiError::from).boxed())
    }

    /// Send one message and drive its streamed response through `controller`.
    ///
    /// Failing to open the stream fails the session; a raised `cancellation`
    /// abandons it.
    pub async fn send<R, O>(
        &self,
        request: &ChatRequest,
        controller: &mut SessionController<R, O>,
        cancellation: Option<&CancelSignal>,
    ) -> Result<SessionReport, ChatApiError>
    where
        R: RenderTarget,
        O: SessionObserver,
    {
        let chunks = match self.open_stream(request, cancellation).await {
            Ok(chunks) => chunks,
            Err(ChatApiError::Cancelled) => {
                controller.abandon();
                return Err(ChatApiError::Cancelled);
            }
            Err(error) => {
                controller.fail(&error.to_string());
                return Err(error);
            }
        };

        Ok(drive_stream(chunks, controller, cancellation).await?)
    }
}

fn validate_request(request: &ChatRequest) -> Result<(), ChatApiError> {
    if request.message.trim().is_empty() {
        return Err(ChatApiError::InvalidRequestPayload(
            "'message' must not be empty".to_owned(),
        ));
    }
    Ok(())
}
