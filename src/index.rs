use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;
use serde_json::Value;

use crate::config::Config;
use crate::errors::Error;
use crate::errors::Result;


/// Search-index collaborator: bulk writes of (index name, document).
pub trait SpanIndex: Send {
    fn bulk(&self, items: &[(String, Value)]) -> Result<()>;
}


/// Elasticsearch-style bulk sink over HTTP.
///
/// Documents are framed as newline-delimited action/source pairs and
/// posted to the `_bulk` endpoint with the configured timeout.
pub struct ElasticIndex {
    bulk_url: String,
    client: Client,
}

impl ElasticIndex {
    pub fn new(config: &Config) -> Result<ElasticIndex> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        let base = config.index_url.trim_end_matches('/');
        Ok(ElasticIndex {
            bulk_url: format!("{}/_bulk", base),
            client,
        })
    }

    fn body(items: &[(String, Value)]) -> String {
        let mut body = String::new();
        for (index, document) in items {
            let action = json!({"index": {"_index": index}});
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&document.to_string());
            body.push('\n');
        }
        body
    }
}

impl SpanIndex for ElasticIndex {
    fn bulk(&self, items: &[(String, Value)]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let response = self
            .client
            .post(&self.bulk_url)
            .header("content-type", "application/x-ndjson")
            .body(ElasticIndex::body(items))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::IndexStatus(status.as_u16()));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ElasticIndex;

    #[test]
    fn bulk_body_framing() {
        let items = vec![
            (
                String::from("zipkin:span:processed-2024-05-01"),
                json!({"name": "a"}),
            ),
            (
                String::from("zipkin:span:processed-2024-05-02"),
                json!({"name": "b"}),
            ),
        ];
        let body = ElasticIndex::body(&items);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            r#"{"index":{"_index":"zipkin:span:processed-2024-05-01"}}"#
        );
        assert_eq!(lines[1], r#"{"name":"a"}"#);
        assert_eq!(
            lines[2],
            r#"{"index":{"_index":"zipkin:span:processed-2024-05-02"}}"#
        );
        assert!(body.ends_with('\n'));
    }
}
