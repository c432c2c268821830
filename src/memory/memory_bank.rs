//! Vertex AI Memory Bank REST 客户端（RemoteMemory 的云端实现）
//!
//! - 写：POST {base}/{engine}/memories:generate，directContentsSource 为两轮对话事件
//! - 读：POST {base}/{engine}/memories:retrieve，similaritySearchParams.searchQuery
//!
//! 鉴权由外部负责：此处只携带调用方提供的 Bearer access token。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::memory::remote::{MemoryError, RemoteFact, RemoteMemory};

/// Memory Bank 连接参数（由配置解析而来）
#[derive(Debug, Clone)]
pub struct MemoryBankSettings {
    pub project: String,
    pub location: String,
    pub agent_engine_id: String,
    pub access_token: String,
    /// 覆盖默认端点（测试 / 代理）
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl MemoryBankSettings {
    /// 资源名：projects/{p}/locations/{l}/reasoningEngines/{id}
    pub fn engine_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/reasoningEngines/{}",
            self.project, self.location, self.agent_engine_id
        )
    }

    pub fn endpoint(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| {
                format!("https://{}-aiplatform.googleapis.com/v1beta1", self.location)
            })
            .trim_end_matches('/')
            .to_string()
    }
}

/// Memory Bank 客户端：持有 reqwest Client 与完整的 engine URL
pub struct MemoryBankClient {
    client: Client,
    engine_url: String,
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieved_memories: Vec<Value>,
}

impl MemoryBankClient {
    pub fn new(settings: &MemoryBankSettings) -> Result<Self, MemoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| MemoryError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            engine_url: format!("{}/{}", settings.endpoint(), settings.engine_name()),
            access_token: settings.access_token.clone(),
        })
    }

    async fn post(&self, action: &str, body: Value) -> Result<Value, MemoryError> {
        let url = format!("{}/memories:{}", self.engine_url, action);
        tracing::debug!(url = %url, "memory bank request");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MemoryError::Timeout
                } else {
                    MemoryError::Http(e.to_string())
                }
            })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MemoryError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| MemoryError::Decode(e.to_string()))
    }
}

/// 从单条 retrievedMemories 元素取出事实；结构不符时返回 None（跳过而非报错）
fn fact_from_entry(entry: &Value) -> Option<RemoteFact> {
    let memory = entry.get("memory").unwrap_or(entry);
    let text = memory.get("fact")?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    Some(RemoteFact {
        text: text.to_string(),
        distance: entry.get("distance").and_then(|d| d.as_f64()),
    })
}

#[async_trait]
impl RemoteMemory for MemoryBankClient {
    async fn generate_fact(
        &self,
        scope_id: &str,
        user_utterance: &str,
        system_ack: &str,
    ) -> Result<(), MemoryError> {
        let body = json!({
            "directContentsSource": {
                "events": [
                    { "content": { "role": "user", "parts": [{ "text": user_utterance }] } },
                    { "content": { "role": "model", "parts": [{ "text": system_ack }] } }
                ]
            },
            "scope": { "user_id": scope_id }
        });
        self.post("generate", body).await?;
        Ok(())
    }

    async fn retrieve_facts(
        &self,
        scope_id: &str,
        query_text: &str,
    ) -> Result<Vec<RemoteFact>, MemoryError> {
        let body = json!({
            "scope": { "user_id": scope_id },
            "similaritySearchParams": { "searchQuery": query_text }
        });
        let value = self.post("retrieve", body).await?;
        let parsed: RetrieveResponse =
            serde_json::from_value(value).map_err(|e| MemoryError::Decode(e.to_string()))?;
        Ok(parsed
            .retrieved_memories
            .iter()
            .filter_map(fact_from_entry)
            .collect())
    }

    fn name(&self) -> &str {
        "vertex_ai_memory_bank"
    }
}
