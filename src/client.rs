use bytes::Bytes;
use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use std::env;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use crate::observability;
use crate::types::{CompletionChunk, CompletionRequest};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAi {
    api_key: String,
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
}

impl OpenAi {
    /// Create a new client.
    ///
    /// The API key can be provided directly or read from the
    /// COLLOQUY_API_KEY environment variable. A missing or malformed key is
    /// rejected here, before any network attempt.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var("COLLOQUY_API_KEY").map_err(|_| {
                Error::authentication(
                    "API key not provided and COLLOQUY_API_KEY environment variable not set",
                )
            })?,
        };
        if api_key.trim().is_empty() {
            return Err(Error::authentication("API key must not be empty"));
        }
        HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;

        let base_url = match base_url {
            Some(url) => {
                Url::parse(&url)?;
                url
            }
            None => DEFAULT_API_URL.to_string(),
        };

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
        })
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .expect("API key was validated at construction"),
        );
        headers
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        // Headers we might need for error processing
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        classify_error_body(status_code, request_id, retry_after, &error_body)
    }

    /// Send a completion request and get a streaming response.
    ///
    /// Returns a stream of [`CompletionChunk`]s that can be processed
    /// incrementally. One call means one outbound connection; retries are
    /// the caller's business.
    pub async fn stream(
        &self,
        mut params: CompletionRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<CompletionChunk>> + Send>>> {
        params.stream = true;

        let url = format!("{}chat/completions", self.base_url);

        let mut headers = self.default_headers();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );

        observability::CLIENT_REQUESTS.click();
        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&params)
            .send()
            .await
            .map_err(|e| {
                observability::CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            observability::CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        // Get the byte stream from the response
        let stream = response.bytes_stream();

        // Create an SSE processor
        let event_stream = process_sse(stream);

        Ok(Box::pin(event_stream))
    }
}

/// Classify an error response body into our Error type.
///
/// The service returns structured `{"error": {...}}` payloads for most
/// failures; when the body is not that shape it is surfaced verbatim so the
/// underlying cause is never swallowed.
fn classify_error_body(
    status_code: u16,
    request_id: Option<String>,
    retry_after: Option<u64>,
    body: &str,
) -> Error {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
        param: Option<String>,
    }

    let parsed_error = serde_json::from_str::<ErrorResponse>(body).ok();
    let error_type = parsed_error
        .as_ref()
        .and_then(|e| e.error.as_ref())
        .and_then(|e| e.error_type.clone());
    let error_message = parsed_error
        .as_ref()
        .and_then(|e| e.error.as_ref())
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| body.to_string());
    let error_param = parsed_error
        .as_ref()
        .and_then(|e| e.error.as_ref())
        .and_then(|e| e.param.clone());

    // Map HTTP status code to appropriate error type
    match status_code {
        400 => Error::bad_request(error_message, error_param),
        401 => Error::authentication(error_message),
        403 => Error::permission(error_message),
        404 => Error::not_found(error_message, error_param),
        408 => Error::timeout(error_message, None),
        429 => Error::rate_limit(error_message, retry_after),
        500 => Error::internal_server(error_message, request_id),
        502..=504 => Error::service_unavailable(error_message, retry_after),
        _ => Error::api(status_code, error_type, error_message, request_id),
    }
}

/// An item parsed out of the SSE buffer.
enum SseItem {
    Chunk(Result<CompletionChunk>),
    Done,
}

/// Process a stream of bytes into a stream of completion chunks
fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<CompletionChunk>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result.map_err(|e| {
            observability::STREAM_ERRORS.click();
            Error::streaming(format!("Error in HTTP stream: {}", e), Some(Box::new(e)))
        })
    });

    // Use a state machine to process the SSE stream
    let buffer = String::new();

    stream::unfold(
        (stream, buffer),
        move |(mut stream, mut buffer)| async move {
            loop {
                // First check if we have a complete event in the buffer
                if let Some((item, remaining)) = extract_event(&buffer) {
                    buffer = remaining;
                    match item {
                        SseItem::Chunk(chunk) => return Some((chunk, (stream, buffer))),
                        SseItem::Done => return None,
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => buffer.push_str(&text),
                        Err(e) => {
                            return Some((
                                Err(Error::encoding(
                                    format!("Invalid UTF-8 in stream: {}", e),
                                    Some(Box::new(e)),
                                )),
                                (stream, buffer),
                            ));
                        }
                    },
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer)));
                    }
                    None => {
                        // End of stream
                        if !buffer.is_empty() {
                            if let Some((SseItem::Chunk(chunk), _)) = extract_event(&buffer) {
                                buffer.clear();
                                return Some((chunk, (stream, buffer)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Extract a complete SSE event from a buffer string
fn extract_event(buffer: &str) -> Option<(SseItem, String)> {
    // Simple SSE parsing - each event is delimited by double newlines
    let parts: Vec<&str> = buffer.splitn(2, "\n\n").collect();
    if parts.len() != 2 {
        return None;
    }

    let event_text = parts[0];
    let rest = parts[1].to_string();

    // Process the event data
    let mut data = None;
    for line in event_text.lines() {
        if line.starts_with("data: ") {
            data = Some(line.trim_start_matches("data: "));
        }
    }

    // Process the data field
    match data {
        Some("[DONE]") => Some((SseItem::Done, rest)),
        Some(json_str) => {
            // Parse the JSON
            match serde_json::from_str::<CompletionChunk>(json_str) {
                Ok(chunk) => Some((SseItem::Chunk(Ok(chunk)), rest)),
                Err(e) => Some((
                    SseItem::Chunk(Err(Error::serialization(
                        format!("Failed to parse event JSON: {}", e),
                        Some(Box::new(e)),
                    ))),
                    rest,
                )),
            }
        }
        None => {
            // Skip events with no data field (comments, keep-alives)
            Some((SseItem::Chunk(Ok(CompletionChunk::default())), rest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        // Test with explicit API key
        let client = OpenAi::new(Some("test-key".to_string())).unwrap();
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.base_url, DEFAULT_API_URL);
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        // Test with custom options
        let client = OpenAi::with_options(
            Some("test-key".to_string()),
            Some("https://custom-api.example.com/".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.base_url, "https://custom-api.example.com/");
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn client_rejects_bad_credentials() {
        let err = OpenAi::new(Some("".to_string())).unwrap_err();
        assert!(err.is_authentication());

        let err = OpenAi::new(Some("key\nwith\nnewlines".to_string())).unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn client_rejects_bad_base_url() {
        let err = OpenAi::with_options(
            Some("test-key".to_string()),
            Some("not a url".to_string()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn extract_event_parses_chunk() {
        let buffer = concat!(
            r#"data: {"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#,
            "\n\ndata: more"
        );
        let (item, rest) = extract_event(buffer).unwrap();
        match item {
            SseItem::Chunk(Ok(chunk)) => assert_eq!(chunk.content_fragment(), Some("Hi")),
            _ => panic!("Expected a parsed chunk"),
        }
        assert_eq!(rest, "data: more");
    }

    #[test]
    fn extract_event_handles_done() {
        let buffer = "data: [DONE]\n\n";
        let (item, rest) = extract_event(buffer).unwrap();
        assert!(matches!(item, SseItem::Done));
        assert_eq!(rest, "");
    }

    #[test]
    fn extract_event_waits_for_complete_event() {
        let buffer = r#"data: {"id":"chatcmpl-1","choices":[]}"#;
        assert!(extract_event(buffer).is_none());
    }

    #[test]
    fn extract_event_reports_malformed_json() {
        let buffer = "data: {not json}\n\n";
        let (item, _) = extract_event(buffer).unwrap();
        match item {
            SseItem::Chunk(Err(err)) => assert!(matches!(err, Error::Serialization { .. })),
            _ => panic!("Expected a serialization error"),
        }
    }

    #[test]
    fn classify_structured_error_payload() {
        let body = r#"{"error":{"message":"You exceeded your current quota.","type":"insufficient_quota","param":null,"code":"insufficient_quota"}}"#;
        let err = classify_error_body(429, None, Some(7), body);
        match err {
            Error::RateLimit {
                message,
                retry_after,
            } => {
                assert_eq!(message, "You exceeded your current quota.");
                assert_eq!(retry_after, Some(7));
            }
            other => panic!("Expected RateLimit, got {:?}", other),
        }
    }

    #[test]
    fn classify_opaque_error_body_verbatim() {
        let body = "upstream proxy had a bad day";
        let err = classify_error_body(500, Some("req_9".to_string()), None, body);
        match err {
            Error::InternalServer {
                message,
                request_id,
            } => {
                assert_eq!(message, body);
                assert_eq!(request_id.as_deref(), Some("req_9"));
            }
            other => panic!("Expected InternalServer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn process_sse_ends_at_done_marker() {
        let frames: Vec<std::result::Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from(
                "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"a\"},\"finish_reason\":null}]}\n\n",
            )),
            Ok(Bytes::from(
                "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"b\"},\"finish_reason\":null}]}\n\ndata: [DONE]\n\n",
            )),
        ];
        let stream = process_sse(stream::iter(frames));
        futures::pin_mut!(stream);

        let mut fragments = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.expect("chunk should parse");
            if let Some(fragment) = chunk.content_fragment() {
                fragments.push(fragment.to_string());
            }
        }
        assert_eq!(fragments, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn process_sse_handles_split_frames() {
        // An event split across two network reads must be reassembled.
        let frames: Vec<std::result::Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from(
                "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"con",
            )),
            Ok(Bytes::from("tent\":\"ab\"},\"finish_reason\":null}]}\n\n")),
            Ok(Bytes::from("data: [DONE]\n\n")),
        ];
        let stream = process_sse(stream::iter(frames));
        futures::pin_mut!(stream);

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.content_fragment(), Some("ab"));
        assert!(stream.next().await.is_none());
    }
}
