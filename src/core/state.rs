//! 状态定义：UiState 投影
//!
//! UI 只持有轻量的 UiState（阶段、对话记录、偏好来源、锁、错误）；完整状态由编排器维护并投影到 UiState。

use serde::Serialize;

use crate::memory::{Message, SourceAttribution};

/// UI 看到的「投影」状态，轻量且易于渲染
#[derive(Clone, Debug, Serialize)]
pub struct UiState {
    pub phase: AgentPhase,
    pub history: Vec<Message>,
    pub preference_source: SourceAttribution,
    pub preference_count: usize,
    pub input_locked: bool,
    pub error_message: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            phase: AgentPhase::Initializing,
            history: Vec::new(),
            preference_source: SourceAttribution::LocalFile,
            preference_count: 0,
            input_locked: true,
            error_message: None,
        }
    }
}

/// Agent 阶段（UI 投影用）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AgentPhase {
    /// 启动时同步远端偏好
    Initializing,
    Idle,
    Recommending,
    Chatting,
    Syncing,
}

impl AgentPhase {
    /// 除 Idle 外均在处理请求
    pub fn is_busy(&self) -> bool {
        !matches!(self, AgentPhase::Idle)
    }
}
