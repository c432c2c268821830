//! Agent 编排器：主控循环
//!
//! 负责：加载配置、构建 OutfitAgent、建立 cmd/state 两通道，
//! 并在后台任务中消费用户命令（Submit/Cancel/Clear/Quit），解析文本命令、驱动 Agent 并更新 UI 状态。
//! 请求执行期间仍监听命令通道，Cancel 会丢弃正在进行的请求。

use std::path::PathBuf;

use tokio::sync::{mpsc, watch};

use crate::agent::OutfitAgent;
use crate::config::{load_config, AppConfig, Credentials};
use crate::core::{AgentBuilder, AgentPhase, UiState};
use crate::location::LocationDetector;
use crate::memory::{Message, Transcript};

/// 界面保留的对话轮数
const TRANSCRIPT_TURNS: usize = 50;

pub const HELP_TEXT: &str = "Commands:\n  \
recommend [city]  - Get outfit recommendation\n  \
pref <text>       - Add a preference\n  \
prefs             - List saved preferences\n  \
forget            - Clear local preferences\n  \
sync              - Reload preferences from remote memory\n  \
metrics           - Show agent metrics\n  \
quit              - Exit\n\
Anything else is sent to the assistant (preferences are detected automatically).";

/// 从 UI 发往编排器的用户命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 提交用户输入
    Submit(String),
    /// 取消当前请求
    Cancel,
    /// 清空对话记录（偏好保留）
    Clear,
    /// 退出应用
    Quit,
}

/// 一行用户输入解析后的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Recommend(Option<String>),
    AddPreference(String),
    ListPreferences,
    Forget,
    Sync,
    Metrics,
    Help,
    Quit,
    Chat(String),
}

/// 首词（忽略大小写）为命令名时解析为命令，其余文本作为对话
pub fn parse_input(input: &str) -> Option<Action> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let (head, rest) = match input.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (input, ""),
    };
    let action = match head.to_lowercase().as_str() {
        "recommend" => Action::Recommend((!rest.is_empty()).then(|| rest.to_string())),
        "pref" if !rest.is_empty() => Action::AddPreference(rest.to_string()),
        "prefs" if rest.is_empty() => Action::ListPreferences,
        "forget" if rest.is_empty() => Action::Forget,
        "sync" if rest.is_empty() => Action::Sync,
        "metrics" if rest.is_empty() => Action::Metrics,
        "help" if rest.is_empty() => Action::Help,
        "quit" | "exit" if rest.is_empty() => Action::Quit,
        _ => Action::Chat(input.to_string()),
    };
    Some(action)
}

/// 编排循环需要的配置片段
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub default_location: String,
    pub detect_location: bool,
    pub metrics_enabled: bool,
}

impl SessionOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            default_location: cfg.app.default_location.clone(),
            detect_location: cfg.app.detect_location,
            metrics_enabled: cfg.metrics.enabled,
        }
    }
}

struct Session {
    agent: OutfitAgent,
    transcript: Transcript,
    options: SessionOptions,
    detector: LocationDetector,
}

impl Session {
    fn project(&self, phase: AgentPhase, error_message: Option<String>) -> UiState {
        let store = self.agent.preferences();
        UiState {
            phase,
            history: self.transcript.messages().to_vec(),
            preference_source: store.source(),
            preference_count: store.len(),
            input_locked: phase.is_busy(),
            error_message,
        }
    }

    /// 显式城市 > IP 定位（若开启） > 默认城市
    async fn resolve_location(&self, city: Option<String>) -> Result<String, String> {
        if let Some(city) = city {
            LocationDetector::validate(&city).map_err(str::to_string)?;
            return Ok(city);
        }
        if self.options.detect_location {
            if let Some(loc) = self.detector.detect().await {
                return Ok(loc.location_string);
            }
        }
        Ok(self.options.default_location.clone())
    }

    async fn execute(&mut self, action: Action) -> String {
        match action {
            Action::Recommend(city) => match self.resolve_location(city).await {
                Ok(location) => {
                    let units = self.agent.settings().units;
                    self.agent.recommend(&location, units).await
                }
                Err(reason) => format!("❌ {}", reason),
            },
            Action::AddPreference(text) => {
                self.agent.save_preference(&text);
                format!("✅ Saved preference: \"{}\"", text)
            }
            Action::ListPreferences => {
                let store = self.agent.preferences();
                if store.is_empty() {
                    "No preferences set yet.".to_string()
                } else {
                    let header = format!("Preferences (source: {}):", store.source().label());
                    let mut lines = vec![header];
                    lines.extend(store.all().iter().map(|p| format!("  {}: {}", p.key, p.value)));
                    lines.join("\n")
                }
            }
            Action::Forget => {
                self.agent.preferences_mut().clear();
                "🗑️ Local preferences cleared (remote memory is kept).".to_string()
            }
            Action::Sync => {
                let report = self.agent.sync_preferences().await;
                match (&report.error, self.agent.preferences().has_remote()) {
                    (Some(e), _) => format!("⚠️ Sync failed, local preferences kept: {}", e),
                    (None, false) => {
                        "Remote memory is not configured; using local preferences only.".to_string()
                    }
                    (None, true) => format!(
                        "☁️ Retrieved {} facts, {} accepted, {} new.",
                        report.retrieved,
                        report.accepted,
                        report.added_keys.len()
                    ),
                }
            }
            Action::Metrics => {
                if self.options.metrics_enabled {
                    self.agent.metrics().snapshot().format()
                } else {
                    "Metrics are disabled.".to_string()
                }
            }
            Action::Help => HELP_TEXT.to_string(),
            Action::Chat(text) => self.agent.chat(&text).await,
            Action::Quit => String::new(),
        }
    }
}

fn phase_for(action: &Action) -> AgentPhase {
    match action {
        Action::Recommend(_) => AgentPhase::Recommending,
        Action::Sync => AgentPhase::Syncing,
        Action::Chat(_) => AgentPhase::Chatting,
        _ => AgentPhase::Idle,
    }
}

/// 启动会话循环：先 initialize（远端同步），再逐条处理命令
pub fn spawn_session(
    agent: OutfitAgent,
    options: SessionOptions,
) -> (mpsc::UnboundedSender<Command>, watch::Receiver<UiState>) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(UiState::default());

    let mut session = Session {
        agent,
        transcript: Transcript::new(TRANSCRIPT_TURNS),
        options,
        detector: LocationDetector::new(),
    };

    tokio::spawn(async move {
        let report = session.agent.initialize().await;
        if let Some(e) = &report.error {
            tracing::warn!("Initial preference sync failed: {}", e);
        }
        let _ = state_tx.send(session.project(AgentPhase::Idle, None));

        loop {
            tokio::select! {
                Some(cmd) = cmd_rx.recv() => {
                    match cmd {
                        Command::Submit(input) => {
                            let Some(action) = parse_input(&input) else { continue };
                            if action == Action::Quit {
                                break;
                            }
                            session.transcript.push(Message::user(input.trim()));
                            let _ = state_tx.send(session.project(phase_for(&action), None));

                            let mut quit = false;
                            let reply = {
                                let fut = session.execute(action);
                                tokio::pin!(fut);
                                loop {
                                    tokio::select! {
                                        reply = &mut fut => break Some(reply),
                                        Some(cmd) = cmd_rx.recv() => match cmd {
                                            Command::Cancel => break None,
                                            Command::Quit => {
                                                quit = true;
                                                break None;
                                            }
                                            other => {
                                                tracing::debug!("Ignoring {:?} while busy", other)
                                            }
                                        },
                                    }
                                }
                            };
                            if quit {
                                break;
                            }
                            match reply {
                                Some(reply) => {
                                    session.transcript.push(Message::assistant(reply));
                                    let _ = state_tx.send(session.project(AgentPhase::Idle, None));
                                }
                                None => {
                                    tracing::info!("Request cancelled by user");
                                    let notice = Some("Request cancelled".to_string());
                                    let _ = state_tx
                                        .send(session.project(AgentPhase::Idle, notice));
                                }
                            }
                        }
                        Command::Cancel => {}
                        Command::Clear => {
                            session.transcript.clear();
                            let _ = state_tx.send(session.project(AgentPhase::Idle, None));
                        }
                        Command::Quit => break,
                    }
                }
                else => break,  // cmd_tx 已关闭，退出循环
            }
        }
    });

    (cmd_tx, state_rx)
}

/// 创建 Agent 运行时：加载并校验配置、构建 Agent、启动会话循环
pub async fn create_agent(
    config_path: Option<PathBuf>,
) -> anyhow::Result<(mpsc::UnboundedSender<Command>, watch::Receiver<UiState>)> {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let creds = Credentials::from_env();
    cfg.validate(&creds)?;

    let options = SessionOptions::from_config(&cfg);
    let agent = AgentBuilder::new(cfg, creds).build().await?;
    Ok(spawn_session(agent, options))
}
