//! Attire - Rust 穿搭推荐智能体
//!
//! 模块划分：
//! - **agent**: 推荐与对话（天气 + 日程 + 偏好 → LLM）
//! - **calendar**: 今日日程读取与活动分类
//! - **config**: 应用配置加载（TOML + 环境变量）与凭据校验
//! - **core**: 错误分类、Agent 构建、状态投影、主控循环
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **location**: IP 定位与手动位置解析
//! - **memory**: 偏好存储（本地文件 + 远端长期记忆）与对话记录
//! - **observability**: 日志初始化、请求追踪与调用指标
//! - **weather**: 当前天气
//! - **ui**: Ratatui TUI 界面

pub mod agent;
pub mod calendar;
pub mod config;
pub mod core;
pub mod llm;
pub mod location;
pub mod memory;
pub mod observability;
pub mod ui;
pub mod weather;
