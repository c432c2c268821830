//! 远端长期记忆：按 scope（每用户一个）分区、只追加的语义事实库
//!
//! 写入是间接的：提交一段「用户陈述偏好 + 助手确认」的两轮对话，由服务端归纳事实；
//! 读取为相似度检索。核心逻辑只依赖 RemoteMemory trait，具体后端见 memory_bank。

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

/// 远端记忆调用错误；在 PreferenceStore 边界被吞掉并降级为仅本地
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory service request failed: {0}")]
    Http(String),

    #[error("Memory service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed memory service response: {0}")]
    Decode(String),

    #[error("Memory service timed out")]
    Timeout,

    #[error("Memory service unavailable: {0}")]
    Unavailable(String),
}

/// 检索返回的一条事实；distance 为服务端给出的相关度信号（越小越相关）
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteFact {
    pub text: String,
    pub distance: Option<f64>,
}

impl RemoteFact {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            distance: None,
        }
    }
}

/// 远端记忆 trait：归纳事实（写）与相似度检索（读）
#[async_trait]
pub trait RemoteMemory: Send + Sync {
    /// 提交两轮对话，由服务端在 scope 下归纳并存储事实
    async fn generate_fact(
        &self,
        scope_id: &str,
        user_utterance: &str,
        system_ack: &str,
    ) -> Result<(), MemoryError>;

    /// 相似度检索，返回零或多条事实；不保证完整或精确
    async fn retrieve_facts(
        &self,
        scope_id: &str,
        query_text: &str,
    ) -> Result<Vec<RemoteFact>, MemoryError>;

    /// 后端名称（日志 / 指标用）
    fn name(&self) -> &str {
        "remote_memory"
    }
}

const UTTERANCE_PREFIX: &str = "Please remember this about my clothing preferences: ";

/// 为一条偏好构造合成的用户陈述
pub fn preference_utterance(value: &str) -> String {
    format!("{}{}", UTTERANCE_PREFIX, value)
}

/// 为一条偏好构造合成的助手确认
pub fn preference_ack(value: &str) -> String {
    format!(
        "Got it! I'll remember that you {}. I'll use this when making outfit recommendations.",
        value
    )
}

/// 将文本切分为小写词集合，用于简单相似度（词重叠数）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 1)
        .collect()
}

struct StoredFact {
    scope: String,
    text: String,
    tokens: HashSet<String>,
}

/// 进程内实现：按 scope 存储，检索按词重叠排序（无真实向量）；用于测试与离线演示
#[derive(Clone)]
pub struct InMemoryRemoteMemory {
    store: Arc<RwLock<Vec<StoredFact>>>,
    max_results: usize,
    fail: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryRemoteMemory {
    pub fn new(max_results: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(Vec::new())),
            max_results,
            fail: Arc::new(AtomicBool::new(false)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 所有调用都返回 Unavailable 的实例
    pub fn failing() -> Self {
        let memory = Self::default();
        memory.set_failing(true);
        memory
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// 直接写入一条事实（跳过归纳），用于预置数据
    pub fn seed(&self, scope_id: &str, fact: &str) {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.push(StoredFact {
            scope: scope_id.to_string(),
            text: fact.to_string(),
            tokens: tokenize_lower(fact),
        });
    }

    /// generate_fact 被调用（含失败）的次数
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn facts(&self, scope_id: &str) -> Vec<String> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store
            .iter()
            .filter(|f| f.scope == scope_id)
            .map(|f| f.text.clone())
            .collect()
    }

    fn check(&self) -> Result<(), MemoryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MemoryError::Unavailable("in-memory backend set to fail".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryRemoteMemory {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl RemoteMemory for InMemoryRemoteMemory {
    async fn generate_fact(
        &self,
        scope_id: &str,
        user_utterance: &str,
        _system_ack: &str,
    ) -> Result<(), MemoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let fact = user_utterance
            .strip_prefix(UTTERANCE_PREFIX)
            .unwrap_or(user_utterance)
            .trim();
        if fact.is_empty() {
            return Ok(());
        }
        self.seed(scope_id, &format!("User prefers: {}", fact));
        Ok(())
    }

    async fn retrieve_facts(
        &self,
        scope_id: &str,
        query_text: &str,
    ) -> Result<Vec<RemoteFact>, MemoryError> {
        self.check()?;
        let query_tokens = tokenize_lower(query_text);
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<(usize, &StoredFact)> = store
            .iter()
            .filter(|f| f.scope == scope_id)
            .map(|f| (query_tokens.intersection(&f.tokens).count(), f))
            .collect();
        // 稳定排序：同分保持写入顺序
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(self.max_results)
            .map(|(score, f)| RemoteFact {
                text: f.text.clone(),
                distance: Some(1.0 / (1.0 + score as f64)),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_then_retrieve_is_scoped() {
        let memory = InMemoryRemoteMemory::default();
        memory
            .generate_fact(
                "alice",
                &preference_utterance("wears wool in winter"),
                &preference_ack("wears wool in winter"),
            )
            .await
            .unwrap();
        memory.seed("bob", "Bob prefers shorts");

        let facts = memory.retrieve_facts("alice", "wool clothing").await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].text, "User prefers: wears wool in winter");
        assert_eq!(memory.write_count(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_overlap() {
        let memory = InMemoryRemoteMemory::default();
        memory.seed("u", "likes hats");
        memory.seed("u", "prefers formal style outfit");
        let facts = memory.retrieve_facts("u", "outfit style").await.unwrap();
        assert_eq!(facts[0].text, "prefers formal style outfit");
        assert_eq!(facts.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let memory = InMemoryRemoteMemory::failing();
        assert!(memory.retrieve_facts("u", "q").await.is_err());
        assert!(memory.generate_fact("u", "a", "b").await.is_err());
        assert_eq!(memory.write_count(), 1);
    }

    #[test]
    fn test_synthetic_exchange_text() {
        assert_eq!(
            preference_utterance("prefers Celsius"),
            "Please remember this about my clothing preferences: prefers Celsius"
        );
        assert!(preference_ack("prefers Celsius")
            .starts_with("Got it! I'll remember that you prefers Celsius."));
    }
}
