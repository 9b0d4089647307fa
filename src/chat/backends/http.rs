//! HTTP implementation of the reply-fetch collaborator.
//!
//! The endpoint receives `POST {"message": "..."}` and may answer with JSON,
//! plain text, an HTML document or a PDF. Binary PDF bodies are base64
//! encoded so every [`Reply`] carries text content.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::debug;

use crate::chat::backends::contracts::{BackendFuture, ReplyFetcher};
use crate::chat::core::config::ReplyConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::message::{MessageKind, Reply};

/// Filename used when a PDF reply has no `Content-Disposition`.
const DEFAULT_PDF_NAME: &str = "document.pdf";
/// Filename used when an HTML reply has no `Content-Disposition`.
const DEFAULT_HTML_NAME: &str = "document.html";

#[derive(Serialize)]
struct ReplyRequest<'a> {
    message: &'a str,
}

/// Reply fetcher talking to an HTTP endpoint.
pub struct HttpReplyFetcher {
    client: reqwest::Client,
    endpoint: String,
    filename_pattern: Regex,
}

impl HttpReplyFetcher {
    /// Build a fetcher from configuration.
    ///
    /// # Errors
    /// Returns an error if the endpoint is invalid or the client cannot be built.
    pub fn new(config: &ReplyConfig) -> ChatResult<Self> {
        url::Url::parse(&config.endpoint)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/html, application/pdf, text/plain"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            filename_pattern: Regex::new(r#"filename\*?=(?:UTF-8'')?"?([^";]+)"?"#)?,
        })
    }

    fn attachment_name(&self, disposition: Option<&str>) -> Option<String> {
        let captures = self.filename_pattern.captures(disposition?)?;
        let name = captures.get(1)?.as_str().trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Turn a response's headers and body into a reply.
    ///
    /// # Errors
    /// Returns an error if a JSON body has no usable text field or is malformed.
    pub fn parse_reply(
        &self,
        content_type: &str,
        disposition: Option<&str>,
        body: &[u8],
    ) -> ChatResult<Reply> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "application/pdf" => Ok(Reply {
                kind: MessageKind::Pdf,
                content: STANDARD.encode(body),
                filename: Some(
                    self.attachment_name(disposition)
                        .unwrap_or_else(|| DEFAULT_PDF_NAME.to_string()),
                ),
            }),
            "text/html" => Ok(Reply {
                kind: MessageKind::Html,
                content: String::from_utf8_lossy(body).into_owned(),
                filename: Some(
                    self.attachment_name(disposition)
                        .unwrap_or_else(|| DEFAULT_HTML_NAME.to_string()),
                ),
            }),
            "application/json" => {
                let value: serde_json::Value = serde_json::from_slice(body)?;
                ["response", "message", "content"]
                    .iter()
                    .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
                    .map(Reply::text)
                    .ok_or_else(|| {
                        ChatError::ReplyFetchFailure("json reply has no text field".to_string())
                    })
            }
            _ => Ok(Reply::text(String::from_utf8_lossy(body))),
        }
    }
}

impl ReplyFetcher for HttpReplyFetcher {
    fn fetch_reply(&self, text: String) -> BackendFuture<'_, ChatResult<Reply>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&ReplyRequest { message: &text })
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(ChatError::ReplyFetchFailure(format!(
                    "reply service returned {status}"
                )));
            }

            let headers = response.headers().clone();
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("text/plain")
                .to_string();
            let disposition = headers
                .get(CONTENT_DISPOSITION)
                .and_then(|value| value.to_str().ok());
            let body = response.bytes().await?;

            debug!("Reply received ({content_type}, {} bytes)", body.len());
            self.parse_reply(&content_type, disposition, &body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpReplyFetcher {
        HttpReplyFetcher::new(&ReplyConfig::default()).unwrap()
    }

    #[test]
    fn test_json_reply_uses_response_field() {
        let reply = fetcher()
            .parse_reply(
                "application/json; charset=utf-8",
                None,
                br#"{"response":"hi there"}"#,
            )
            .unwrap();
        assert_eq!(reply, Reply::text("hi there"));
    }

    #[test]
    fn test_json_reply_without_text_is_error() {
        let result = fetcher().parse_reply("application/json", None, br#"{"status":"ok"}"#);
        assert!(matches!(result, Err(ChatError::ReplyFetchFailure(_))));
    }

    #[test]
    fn test_pdf_reply_is_base64_with_filename() {
        let reply = fetcher()
            .parse_reply(
                "application/pdf",
                Some(r#"attachment; filename="trip.pdf""#),
                b"%PDF-1.4",
            )
            .unwrap();
        assert_eq!(reply.kind, MessageKind::Pdf);
        assert_eq!(reply.content, STANDARD.encode(b"%PDF-1.4"));
        assert_eq!(reply.filename.as_deref(), Some("trip.pdf"));
    }

    #[test]
    fn test_html_reply_defaults_filename() {
        let reply = fetcher()
            .parse_reply("text/html", None, b"<p>plan</p>")
            .unwrap();
        assert_eq!(reply.kind, MessageKind::Html);
        assert_eq!(reply.content, "<p>plan</p>");
        assert_eq!(reply.filename.as_deref(), Some(DEFAULT_HTML_NAME));
    }

    #[test]
    fn test_unknown_content_type_is_text() {
        let reply = fetcher().parse_reply("text/plain", None, b"plain").unwrap();
        assert_eq!(reply, Reply::text("plain"));
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let config = ReplyConfig {
            endpoint: "::nope".to_string(),
            ..ReplyConfig::default()
        };
        assert!(HttpReplyFetcher::new(&config).is_err());
    }
}
