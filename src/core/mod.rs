//! 核心编排层：错误分类、Agent 构建、状态投影、主控循环

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use builder::{create_llm_from_config, AgentBuilder};
pub use error::AgentError;
pub use orchestrator::{create_agent, parse_input, spawn_session, Action, Command};
pub use state::{AgentPhase, UiState};
