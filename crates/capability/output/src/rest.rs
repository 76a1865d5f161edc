//! REST 输出插件：以 JSON 形式 POST/PUT 到任意 HTTP 端点。
//!
//! ```json
//! { "url": "https://example.org/ingest", "method": "post",
//!   "headers": { "x-api-key": "..." }, "timeout_ms": 10000 }
//! ```

use crate::error::OutputError;
use crate::plugin::{FieldMapping, OutputPlugin, parse_config};
use async_trait::async_trait;
use domain::Record;
use relay_storage::OutputRecord;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestMethod {
    #[default]
    #[serde(alias = "POST")]
    Post,
    #[serde(alias = "PUT")]
    Put,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestOutputConfig {
    pub url: String,
    #[serde(default)]
    pub method: RestMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub mappings: FieldMapping,
}

fn default_timeout_ms() -> u64 {
    10_000
}

pub struct RestOutput {
    client: reqwest::Client,
    config: RestOutputConfig,
}

impl RestOutput {
    pub fn from_record(record: &OutputRecord) -> Result<Self, OutputError> {
        Self::new(parse_config(record)?)
    }

    pub fn new(config: RestOutputConfig) -> Result<Self, OutputError> {
        reqwest::Url::parse(&config.url)
            .map_err(|err| OutputError::Config(format!("invalid url {}: {}", config.url, err)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| OutputError::Config(err.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl OutputPlugin for RestOutput {
    async fn send_data(&self, record: &Record) -> Result<(), OutputError> {
        let payload = self.config.mappings.payload(record);
        let mut request = match self.config.method {
            RestMethod::Post => self.client.post(&self.config.url),
            RestMethod::Put => self.client.put(&self.config.url),
        };
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .json(&payload)
            .send()
            .await
            .map_err(|err| OutputError::Send(err.to_string()))?;
        let status = response.status();
        debug!(target: "relay.output", url = %self.config.url, status = %status, "rest_response");
        if !status.is_success() {
            return Err(OutputError::Send(format!(
                "{} responded with {}",
                self.config.url, status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    // 单次应答的 HTTP 服务，返回收到的请求文本
    async fn serve_once(status_line: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ingest", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|value| value.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status_line
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());
        });
        (url, rx)
    }

    fn output(url: String, mappings: serde_json::Value) -> RestOutput {
        let record = OutputRecord {
            output_id: "out-rest".to_string(),
            instrument_id: "geiger-1".to_string(),
            enabled: true,
            output_type: "rest".to_string(),
            config: json!({
                "url": url,
                "method": "PUT",
                "headers": { "x-api-key": "secret" },
                "mappings": mappings
            }),
        };
        RestOutput::from_record(&record).unwrap()
    }

    #[tokio::test]
    async fn test_send_mapped_payload() {
        let (url, request) = serve_once("200 OK").await;
        let output = output(url, json!({ "cpm": "cpm.value" }));
        let record = Record::with_field("cpm", json!({ "value": 150, "valid": true }));

        output.send_data(&record).await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("PUT /ingest"));
        assert!(request.to_ascii_lowercase().contains("x-api-key: secret"));
        assert!(request.ends_with(r#"{"cpm":150}"#));
    }

    #[tokio::test]
    async fn test_error_status_is_send_failure() {
        let (url, _request) = serve_once("500 Internal Server Error").await;
        let output = output(url, json!({}));
        let result = output.send_data(&Record::with_field("version", "v1")).await;
        assert!(matches!(result, Err(OutputError::Send(_))));
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let config = RestOutputConfig {
            url: "not a url".to_string(),
            method: RestMethod::Post,
            headers: BTreeMap::new(),
            timeout_ms: 1000,
            mappings: FieldMapping::default(),
        };
        assert!(matches!(RestOutput::new(config), Err(OutputError::Config(_))));
    }
}
