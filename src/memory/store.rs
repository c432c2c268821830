//! 偏好存储：本地文件（权威、同步写穿）+ 远端长期记忆（尽力而为）
//!
//! 状态：LocalLoaded（构造时从本地加载）→ Synced（sync 合并远端事实，可重复进入，只增不替换）。
//! 远端写入与本地写入解耦：`add` 只写本地；`remote_write` 返回独立的 RemoteWrite，
//! 由调用方 await 或交给 tokio::spawn；`add_and_sync_remote` 为两者的 await 组合。

use std::sync::Arc;
use std::time::Duration;

use crate::memory::extractor::{FactExtractor, FACT_QUERY};
use crate::memory::remote::{preference_ack, preference_utterance, MemoryError, RemoteMemory};
use crate::memory::{LocalStore, PreferenceSet, SourceAttribution};

/// sync 的默认超时
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// 存储生命周期状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreState {
    LocalLoaded,
    Synced,
}

/// 一次 sync 的结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// 远端返回的事实数
    pub retrieved: usize,
    /// 通过筛选的事实数（含本地已存在的）
    pub accepted: usize,
    /// 新增到本地的 key
    pub added_keys: Vec<String>,
    /// 失败原因；Some 时集合未被修改
    pub error: Option<String>,
}

impl SyncReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// 一次待执行的远端写入：拥有所需的全部数据，可 await 也可 spawn
pub struct RemoteWrite {
    remote: Arc<dyn RemoteMemory>,
    scope_id: String,
    value: String,
}

impl RemoteWrite {
    pub fn value(&self) -> &str {
        &self.value
    }

    /// 执行写入；失败只记日志，返回是否成功
    pub async fn run(self) -> bool {
        let utterance = preference_utterance(&self.value);
        let ack = preference_ack(&self.value);
        match self
            .remote
            .generate_fact(&self.scope_id, &utterance, &ack)
            .await
        {
            Ok(()) => {
                tracing::info!(backend = self.remote.name(), "Preference saved to remote memory");
                true
            }
            Err(e) => {
                tracing::warn!(
                    backend = self.remote.name(),
                    "Could not save to remote memory: {}",
                    e
                );
                false
            }
        }
    }
}

/// 偏好存储：单一所有者，通过 &mut self 变更，无内部锁
pub struct PreferenceStore {
    local: LocalStore,
    remote: Option<Arc<dyn RemoteMemory>>,
    scope_id: String,
    preferences: PreferenceSet,
    source: SourceAttribution,
    state: StoreState,
    sync_timeout: Duration,
}

impl PreferenceStore {
    /// 构造即加载本地文件；remote 为启动时解析好的能力（None 表示仅本地）
    pub fn new(
        local: LocalStore,
        remote: Option<Arc<dyn RemoteMemory>>,
        scope_id: impl Into<String>,
    ) -> Self {
        let preferences = local.load();
        tracing::debug!(
            count = preferences.len(),
            path = ?local.path(),
            "Loaded local preferences"
        );
        Self {
            local,
            remote,
            scope_id: scope_id.into(),
            preferences,
            source: SourceAttribution::LocalFile,
            state: StoreState::LocalLoaded,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }

    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// 本地新增 / 覆盖一条偏好，立即写入文件；返回实际使用的 key
    ///
    /// key 以 `pref_` 开头时自动生成，否则原样使用（覆盖已有值）。
    pub fn add(&mut self, key: &str, value: &str) -> String {
        let key = if FactExtractor::is_auto_key(key) {
            self.next_auto_key()
        } else {
            key.to_string()
        };
        self.preferences.insert(key.clone(), value);
        self.local.save(&self.preferences);
        key
    }

    /// 构造对应的远端写入；无远端能力或为无信息量偏好时返回 None
    pub fn remote_write(&self, value: &str) -> Option<RemoteWrite> {
        let remote = self.remote.as_ref()?;
        if FactExtractor::is_generic_preference(value) {
            tracing::debug!("Skipping generic preference for remote memory");
            return None;
        }
        Some(RemoteWrite {
            remote: Arc::clone(remote),
            scope_id: self.scope_id.clone(),
            value: value.to_string(),
        })
    }

    /// add + 等待远端写入完成；远端失败不影响返回
    pub async fn add_and_sync_remote(&mut self, key: &str, value: &str) -> String {
        let key = self.add(key, value);
        if let Some(write) = self.remote_write(value) {
            write.run().await;
        }
        key
    }

    /// 从远端拉取事实并增量合并；任何错误 / 超时都降级为保持本地状态
    pub async fn sync(&mut self) -> SyncReport {
        let Some(remote) = self.remote.clone() else {
            return SyncReport::default();
        };

        let retrieved = match tokio::time::timeout(
            self.sync_timeout,
            remote.retrieve_facts(&self.scope_id, FACT_QUERY),
        )
        .await
        {
            Ok(Ok(facts)) => facts,
            Ok(Err(e)) => return self.sync_failed(e),
            Err(_) => return self.sync_failed(MemoryError::Timeout),
        };

        let mut report = SyncReport {
            retrieved: retrieved.len(),
            ..SyncReport::default()
        };
        for fact in retrieved {
            let text = fact.text.trim();
            if text.is_empty() || !FactExtractor::looks_like_preference(text) {
                continue;
            }
            report.accepted += 1;
            if self.preferences.contains_value(text) {
                continue;
            }
            let key = self.next_auto_key();
            self.preferences.insert(key.clone(), text);
            report.added_keys.push(key);
        }

        if !report.added_keys.is_empty() {
            self.local.save(&self.preferences);
        }
        if report.accepted > 0 {
            self.source = SourceAttribution::RemoteMemory;
            tracing::info!(
                accepted = report.accepted,
                added = report.added_keys.len(),
                "Loaded preferences from remote memory"
            );
        } else {
            self.source = SourceAttribution::LocalFile;
            tracing::info!("No preferences found in remote memory (new user or first run)");
        }
        self.state = StoreState::Synced;
        report
    }

    /// 失败时集合保持不变，来源回落为本地文件
    fn sync_failed(&mut self, e: MemoryError) -> SyncReport {
        self.source = SourceAttribution::LocalFile;
        tracing::warn!("Could not load from remote memory, using local preferences: {}", e);
        SyncReport {
            error: Some(e.to_string()),
            ..SyncReport::default()
        }
    }

    /// 所有 value，按当前迭代顺序
    pub fn list(&self) -> Vec<String> {
        self.preferences.values()
    }

    pub fn all(&self) -> &PreferenceSet {
        &self.preferences
    }

    pub fn len(&self) -> usize {
        self.preferences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preferences.is_empty()
    }

    /// 清空本地（写入空对象）；不删除远端记忆
    pub fn clear(&mut self) {
        self.preferences.clear();
        self.source = SourceAttribution::LocalFile;
        self.local.save(&self.preferences);
    }

    pub fn source(&self) -> SourceAttribution {
        self.source
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// `pref_{len+1}` 起向后探测第一个未占用的 key，保证自动 key 不覆盖已有条目
    fn next_auto_key(&self) -> String {
        let mut n = self.preferences.len();
        loop {
            let key = FactExtractor::synthesize_key(n);
            if !self.preferences.contains_key(&key) {
                return key;
            }
            n += 1;
        }
    }
}
