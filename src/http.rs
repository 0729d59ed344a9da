//! HTTP client utilities for talking to the account hub server.
//!
//! This module provides reqwest client construction and the header logic
//! shared by every request.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;

use crate::options::{ClientOptions, SecretString};

/// Header carrying the passkey on every request.
pub const PASSKEY_HEADER: &str = "X-Passkey";

/// Media type announcing a streamed delete response.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Build a configured HTTP client from client options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(options: &ClientOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &options.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    builder.build()
}

/// Attach the passkey header when a passkey is configured.
pub fn add_passkey(request: RequestBuilder, passkey: &Option<SecretString>) -> RequestBuilder {
    match passkey {
        Some(key) => request.header(PASSKEY_HEADER, key.expose_secret()),
        None => request,
    }
}

/// Add extra headers to a request if specified in the options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Whether a response announces `text/event-stream`, ignoring parameters and case.
pub fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(is_event_stream_media_type)
        .unwrap_or(false)
}

fn is_event_stream_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(EVENT_STREAM))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_build_http_client() {
        let options = ClientOptions::default().with_timeout(Duration::from_secs(30));
        assert!(build_http_client(&options).is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let options = ClientOptions::default().with_proxy("http://proxy.example.com:8080".to_string());
        assert!(build_http_client(&options).is_ok());
    }

    #[test]
    fn test_event_stream_media_type() {
        assert!(is_event_stream_media_type("text/event-stream"));
        assert!(is_event_stream_media_type("text/event-stream; charset=utf-8"));
        assert!(is_event_stream_media_type("Text/Event-Stream"));
        assert!(!is_event_stream_media_type("application/json"));
        assert!(!is_event_stream_media_type("text/plain"));
        assert!(!is_event_stream_media_type(""));
    }

    #[test]
    fn test_passkey_header_only_when_configured() {
        let client = Client::new();

        let with = add_passkey(client.get("http://localhost/"), &Some(SecretString::from("pk")))
            .build()
            .unwrap();
        assert_eq!(with.headers().get(PASSKEY_HEADER).unwrap(), "pk");

        let without = add_passkey(client.get("http://localhost/"), &None).build().unwrap();
        assert!(without.headers().get(PASSKEY_HEADER).is_none());
    }
}
