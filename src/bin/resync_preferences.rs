//! 重新同步：从远端合并偏好到本地，再把全部本地偏好推回远端

use std::path::PathBuf;

use anyhow::{bail, Context};
use attire::{
    config::{load_config, Credentials},
    core::AgentBuilder,
    observability,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config(std::env::args().nth(1).map(PathBuf::from))
        .context("Failed to load config")?;
    observability::init_console(&cfg.app.log_level);

    let builder = AgentBuilder::new(cfg, Credentials::from_env());
    let mut store = builder.build_store().await;
    if !store.has_remote() {
        bail!(
            "Remote memory is not configured \
             (GOOGLE_CLOUD_PROJECT, AGENT_ENGINE_ID, GOOGLE_CLOUD_ACCESS_TOKEN)"
        );
    }
    println!("🔄 Resync preferences for {}", store.scope_id());

    let report = store.sync().await;
    if let Some(e) = &report.error {
        println!("⚠️  Could not load from remote memory: {}", e);
    } else {
        println!(
            "☁️  Retrieved {} facts, {} accepted, {} new",
            report.retrieved,
            report.accepted,
            report.added_keys.len()
        );
    }

    println!("📋 Current preferences ({}):", store.source().label());
    for pref in store.all().iter() {
        println!("   {}: {}", pref.key, pref.value);
    }

    let mut failed = 0usize;
    for value in store.list() {
        if let Some(write) = store.remote_write(&value) {
            if !write.run().await {
                failed += 1;
            }
        }
    }
    println!("✅ Re-pushed {} preferences ({} failed)", store.len(), failed);
    Ok(())
}
