use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

use super::Enricher;
use crate::common::config::EnricherConfig;
use crate::common::model::WordData;

/// 百炼应用调用失败
#[derive(Error, Debug)]
pub enum EnrichError {
    /// 连接失败、超时、读取响应失败
    #[error("BaiLian request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// 非 2xx 响应
    #[error("BaiLian API HTTP {0}")]
    Http(u16),

    /// 响应里没有 `output.text`，或者文本不是合法的单词 JSON
    #[error("BaiLian API returned malformed output: {0}")]
    Malformed(String),

    /// 缺少 app_id / api_key
    #[error("BaiLian API is not configured (BAILIAN_APP_ID / BAILIAN_API_KEY)")]
    NotConfigured,
}

#[derive(Deserialize)]
struct CompletionResponse {
    output: Option<CompletionOutput>,
}

#[derive(Deserialize)]
struct CompletionOutput {
    text: Option<String>,
}

/// 阿里云百炼 (DashScope) 应用调用
///
/// 单词作为 prompt 发给一个预先配置好的应用，应用返回的 `output.text` 就是单词 JSON。
#[derive(Clone)]
pub struct BaiLianEnricher {
    config: EnricherConfig,
    client: reqwest::Client,
}

impl BaiLianEnricher {
    pub fn new(config: EnricherConfig) -> Result<Self, EnrichError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { config, client })
    }

    /// 从环境变量读取配置
    pub fn from_env() -> Result<Self, EnrichError> {
        Self::new(EnricherConfig::from_env())
    }

    fn completion_url(&self) -> String {
        format!(
            "{}/apps/{}/completion",
            self.config.endpoint.trim_end_matches('/'),
            self.config.app_id
        )
    }

    async fn call(&self, word: &str) -> Result<WordData, EnrichError> {
        if !self.config.is_configured() {
            return Err(EnrichError::NotConfigured);
        }

        let response = self
            .client
            .post(self.completion_url())
            .bearer_auth(&self.config.api_key)
            .json(&json!({ "input": { "prompt": word }, "parameters": {} }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::Http(status.as_u16()));
        }

        let body = response.text().await?;
        trace!("[BaiLian] '{}' answered {} bytes", word, body.len());
        parse_completion(&body)
    }
}

/// 解析应用响应：`output.text` 里是序列化后的单词 JSON
fn parse_completion(body: &str) -> Result<WordData, EnrichError> {
    let response: CompletionResponse =
        serde_json::from_str(body).map_err(|e| EnrichError::Malformed(e.to_string()))?;

    let text = response
        .output
        .and_then(|o| o.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| EnrichError::Malformed("missing output.text".into()))?;

    serde_json::from_str(&text).map_err(|e| EnrichError::Malformed(e.to_string()))
}

#[async_trait]
impl Enricher for BaiLianEnricher {
    async fn lookup(&self, word: &str) -> anyhow::Result<WordData> {
        self.call(word)
            .await
            .with_context(|| format!("lookup '{word}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_word_json() {
        let body = r#"{"output":{"text":"{\"word\":\"quench\",\"definitions\":[{\"partOfSpeech\":\"verb\",\"translation\":\"扑灭\"}]}"},"request_id":"x"}"#;
        let data = parse_completion(body).unwrap();
        assert_eq!(data.word, "quench");
        assert_eq!(data.definitions.len(), 1);
        assert_eq!(data.definitions[0].translation.as_deref(), Some("扑灭"));
    }

    #[test]
    fn missing_text_is_malformed() {
        let err = parse_completion(r#"{"output":{}}"#).unwrap_err();
        assert!(matches!(err, EnrichError::Malformed(_)));

        let err = parse_completion(r#"{"output":{"text":"not json"}}"#).unwrap_err();
        assert!(matches!(err, EnrichError::Malformed(_)));
    }

    #[test]
    fn url_tolerates_trailing_slash() {
        let config = EnricherConfig {
            endpoint: "https://example.test/api/v1/".into(),
            app_id: "app".into(),
            api_key: "key".into(),
            ..Default::default()
        };
        let enricher = BaiLianEnricher::new(config).unwrap();
        assert_eq!(
            enricher.completion_url(),
            "https://example.test/api/v1/apps/app/completion"
        );
    }

    #[tokio::test]
    async fn unconfigured_lookup_fails_without_network() {
        let enricher = BaiLianEnricher::new(EnricherConfig::default()).unwrap();
        let err = enricher.lookup("quench").await.unwrap_err();
        assert!(format!("{err:#}").contains("not configured"));
    }
}
