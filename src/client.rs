use std::env;
use std::time::Duration;

use futures::stream;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::ndjson::decode_bytes;
use crate::observability::{CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::transport::{EventStream, Transport};
use crate::types::{
    ChatRequest, ErrorEvent, FlowListing, FlowResponse, HistoryEntry, HistoryListing, StreamEvent,
};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7860/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const CHAT_PATH: &str = "api/chat";
const CHAT_STREAM_PATH: &str = "api/chat/stream";
const HISTORY_PATH: &str = "api/chat/history/";
const FLOWS_PATH: &str = "api/v1/flows/";

/// HTTP client for a conversational-flow backend.
#[derive(Debug, Clone)]
pub struct FlowClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl FlowClient {
    /// Create a new client.
    ///
    /// The base URL can be provided directly or read from the
    /// FLOWCHAT_BASE_URL environment variable; it defaults to a local backend.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `timeout` bounds connecting and non-streaming requests. Streamed bodies
    /// are not bounded here; the chat processor applies an idle timeout.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = base_url
            .or_else(|| env::var("FLOWCHAT_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn history_url(&self, session_id: &str) -> Result<Url> {
        let mut url = self.endpoint(HISTORY_PATH)?;
        url.path_segments_mut()
            .map_err(|_| Error::url(format!("{} cannot be a base URL", self.base_url), None))?
            .pop_if_empty()
            .push(session_id);
        Ok(url)
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Read a non-success response body and convert it to our Error type.
    async fn process_error_response(response: Response) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(body) => error_from_body(status_code, &body),
            Err(e) => Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            ),
        }
    }

    fn validate(request: &ChatRequest) -> Result<()> {
        if request.flow_id.trim().is_empty() {
            return Err(Error::validation(
                "a flow id is required",
                Some("flowId".to_string()),
            ));
        }
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        CLIENT_REQUESTS.click();
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .headers(self.default_headers())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        response.json::<T>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }
}

#[async_trait::async_trait]
impl Transport for FlowClient {
    /// Send a message and wait for the complete response.
    ///
    /// An error status whose body is itself a flow response carrying `error`
    /// is returned as `Ok`, so the caller can show the backend's message.
    async fn send(&self, request: &ChatRequest) -> Result<FlowResponse> {
        Self::validate(request)?;
        let url = self.endpoint(CHAT_PATH)?;
        let mut request = request.clone();
        request.stream = false;

        CLIENT_REQUESTS.click();
        tracing::debug!(%url, flow_id = %request.flow_id, session_id = ?request.session_id, "sending chat request");
        let response = self
            .client
            .post(url)
            .headers(self.default_headers())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        if !status.is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return match serde_json::from_str::<FlowResponse>(&body) {
                Ok(flow_response) if flow_response.error_text().is_some() => Ok(flow_response),
                _ => Err(error_from_body(status.as_u16(), &body)),
            };
        }

        serde_json::from_str::<FlowResponse>(&body).map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// Send a message and get a streaming response.
    async fn send_streaming(&self, request: &ChatRequest) -> Result<EventStream> {
        Self::validate(request)?;
        let url = self.endpoint(CHAT_STREAM_PATH)?;
        let mut request = request.clone();
        request.stream = true;

        let mut headers = self.default_headers();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/x-ndjson"),
        );

        CLIENT_REQUESTS.click();
        tracing::debug!(%url, flow_id = %request.flow_id, session_id = ?request.session_id, "opening chat stream");
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let body = response.text().await.map_err(|e| self.map_send_error(e))?;
            // An application error before streaming began is reported in-band.
            if let Ok(flow_response) = serde_json::from_str::<FlowResponse>(&body)
                && let Some(error) = flow_response.error
                && !error.trim().is_empty()
            {
                let event = StreamEvent::Error(ErrorEvent {
                    message: error,
                    detail: flow_response.detail,
                    code: Some(i64::from(status.as_u16())),
                });
                return Ok(Box::pin(stream::once(async move { Ok::<_, Error>(event) })));
            }
            return Err(error_from_body(status.as_u16(), &body));
        }

        Ok(Box::pin(decode_bytes(response.bytes_stream())))
    }

    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>> {
        let url = self.history_url(session_id)?;
        let listing: Option<HistoryListing> = self.get_json(url).await?;
        Ok(listing.map(HistoryListing::into_entries).unwrap_or_default())
    }

    async fn list_flows(&self) -> Result<FlowListing> {
        let url = self.endpoint(FLOWS_PATH)?;
        self.get_json(url).await
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut base_url = base_url.trim().to_string();
    // Url::join replaces the last path segment unless the base ends in '/'.
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    let url = Url::parse(&base_url)?;
    if url.cannot_be_a_base() {
        return Err(Error::url(format!("{base_url} cannot be a base URL"), None));
    }
    Ok(url)
}

/// Map an error status and its body to our Error type.
fn error_from_body(status_code: u16, body: &str) -> Error {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        detail: Option<serde_json::Value>,
        message: Option<String>,
    }

    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let detail = parsed
        .as_ref()
        .and_then(|b| b.detail.as_ref())
        .map(|d| match d {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    let message = parsed
        .as_ref()
        .and_then(|b| b.error.clone().or_else(|| b.message.clone()))
        .or_else(|| detail.clone())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {status_code}")
            } else {
                body.trim().to_string()
            }
        });
    // Avoid repeating the detail when it was promoted to the message.
    let detail = detail.filter(|d| *d != message);

    match status_code {
        404 => Error::not_found(message, None),
        408 => Error::timeout(message, None),
        502..=504 => Error::service_unavailable(message),
        _ => Error::api(status_code, message, detail),
    }
}
