//! 将本地偏好单向推送到远端记忆（不先从远端加载，避免覆盖本地）

use std::path::PathBuf;

use anyhow::{bail, Context};
use attire::{
    config::{load_config, Credentials},
    core::AgentBuilder,
    memory::FactExtractor,
    observability,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config(std::env::args().nth(1).map(PathBuf::from))
        .context("Failed to load config")?;
    observability::init_console(&cfg.app.log_level);

    println!("📤 Push local preferences to remote memory");

    let builder = AgentBuilder::new(cfg, Credentials::from_env());
    let store = builder.build_store().await;
    if !store.has_remote() {
        bail!(
            "Remote memory is not configured \
             (GOOGLE_CLOUD_PROJECT, AGENT_ENGINE_ID, GOOGLE_CLOUD_ACCESS_TOKEN)"
        );
    }
    println!("👤 Scope: {}", store.scope_id());

    if store.is_empty() {
        println!("No local preferences to push.");
        return Ok(());
    }

    println!("📋 Found {} local preferences to push:", store.len());
    let (mut pushed, mut skipped, mut failed) = (0usize, 0usize, 0usize);
    for value in store.list() {
        if FactExtractor::is_generic_preference(&value) {
            println!("   ⏭️  Skipping: {}", value);
            skipped += 1;
            continue;
        }
        let Some(write) = store.remote_write(&value) else {
            continue;
        };
        println!("   💾 Saving: {}", value);
        if write.run().await {
            pushed += 1;
        } else {
            failed += 1;
        }
    }

    println!("✅ Push complete: {} saved, {} skipped, {} failed", pushed, skipped, failed);
    if failed > 0 {
        bail!("{} preferences could not be saved", failed);
    }
    Ok(())
}
