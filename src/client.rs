use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::Request;
use reqwest::blocking::Response;
use reqwest::header::HeaderMap;

use crate::config::Config;
use crate::errors::Result;
use crate::propagation;
use crate::tags;
use crate::tracer::format_http_path;
use crate::tracer::Tracer;


/// Outbound HTTP client with tracing built in.
///
/// Every executed request runs inside a client span named after the
/// normalised path. Trace state is injected into the request headers so
/// downstream services join the trace, and the request and response are
/// tagged onto the span.
pub struct TracedClient {
    client: Client,
}

impl TracedClient {
    pub fn new(config: &Config) -> Result<TracedClient> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(TracedClient { client })
    }

    /// Execute `request` inside a client span on `tracer`.
    ///
    /// Transport failures are tagged as the span's `error` and returned
    /// to the caller unchanged.
    pub fn execute(&self, tracer: &mut Tracer, mut request: Request) -> Result<Response> {
        let url = request.url().clone();
        let path = format_http_path(url.path());
        let name = match url.query() {
            Some(query) => format!("Call api:{}?{}", path, query),
            None => format!("Call api:{}", path),
        };
        tracer.client_span(&name, |tracer, span| {
            if let Some(host) = url.host_str() {
                span.tag(tags::HTTP_HOST, host);
            }
            span.tag(tags::HTTP_PATH, path.as_str());
            span.tag(tags::HTTP_METHOD, request.method().as_str());
            span.tag(tags::HTTP_REQUEST_SCHEME, url.scheme());
            if let Some(query) = url.query() {
                span.tag(tags::HTTP_QUERY_STRING, query);
            }
            span.tag(
                tags::HTTP_REQUEST_HEADERS,
                header_document(request.headers()),
            );
            let body = request
                .body()
                .and_then(|body| body.as_bytes())
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
            if let Some(body) = body {
                span.tag(
                    tags::HTTP_REQUEST_BODY,
                    tracer.format_http_body(&body, None),
                );
                span.tag(tags::HTTP_REQUEST_BODY_SIZE, body.len() as u64);
            }

            propagation::inject(span.context(), request.headers_mut());
            let response = self.client.execute(request)?;

            span.tag(tags::HTTP_STATUS_CODE, response.status().as_str());
            span.tag(
                tags::HTTP_RESPONSE_HEADERS,
                header_document(response.headers()),
            );
            Ok(response)
        })
    }
}


fn header_document(headers: &HeaderMap) -> String {
    let mut document: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = value.to_str().unwrap_or("").to_string();
        document.insert(name.as_str().to_string(), value);
    }
    serde_json::to_string(&document).unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use reqwest::header::HeaderMap;
    use reqwest::header::HeaderValue;

    use super::header_document;

    #[test]
    fn headers_serialise_to_a_json_object() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("x-request-id", HeaderValue::from_static("abc-123"));
        let document = header_document(&headers);
        let parsed: serde_json::Value = serde_json::from_str(&document).unwrap();
        assert_eq!(parsed["content-type"], "application/json");
        assert_eq!(parsed["x-request-id"], "abc-123");
    }

    #[test]
    fn empty_headers_serialise_to_an_empty_object() {
        assert_eq!(header_document(&HeaderMap::new()), "{}");
    }
}
