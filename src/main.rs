//! Attire - Rust 穿搭推荐智能体
//!
//! 入口：加载配置、初始化文件日志、创建 Agent 编排器与 TUI，并运行主循环。

use std::path::PathBuf;

use anyhow::Context;
use attire::{
    config::{load_config, AppConfig, Credentials},
    core::create_agent,
    observability,
    ui::run_app,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path.clone()).unwrap_or_else(|e| {
        eprintln!("⚠️  Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    // 缺少凭据时在进入 TUI 之前报错
    if let Err(e) = cfg.validate(&Credentials::from_env()) {
        eprintln!("❌ {}", e);
        if let Some(hint) = e.remediation() {
            eprintln!("   {}", hint);
        }
        std::process::exit(1);
    }

    // TUI 占用 stdout，日志写入文件
    let _log_guard = observability::init_file(&cfg.app.log_level, &cfg.app.log_file)
        .context("Failed to initialize logging")?;

    let (cmd_tx, state_rx) = create_agent(config_path)
        .await
        .context("Failed to create agent")?;

    run_app(state_rx, cmd_tx).await.context("App run failed")?;

    Ok(())
}
