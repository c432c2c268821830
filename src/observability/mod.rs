//! 可观测性：日志初始化、请求 / 组件追踪、调用指标

pub mod metrics;

use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use metrics::{MetricsCollector, MetricsSnapshot, ResponseTimes};

/// RUST_LOG 优先，否则使用配置中的级别（如 "INFO"）
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()))
}

/// 控制台日志（维护类二进制使用）
pub fn init_console(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// 文件日志（TUI 占用 stdout 时使用）；返回的 guard 需持有到进程结束
pub fn init_file(level: &str, path: &Path) -> anyhow::Result<WorkerGuard> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log file path has no file name: {:?}", path))?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()?;
    Ok(guard)
}

const SENSITIVE_KEYS: &[&str] = &["api_key", "apikey", "appid", "token", "password", "secret"];

/// 日志前遮盖敏感参数（api_key / token / password / secret 等）
pub fn mask_sensitive<'a>(params: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
    params
        .iter()
        .map(|(k, v)| {
            let lower = k.to_lowercase();
            if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                (*k, "***MASKED***")
            } else {
                (*k, *v)
            }
        })
        .collect()
}

/// 单次请求追踪：8 位 trace id + span，结束时记录成功 / 失败与耗时
pub struct RequestTrace {
    trace_id: String,
    operation: &'static str,
    started: Instant,
    span: tracing::Span,
    metrics: Arc<MetricsCollector>,
}

impl RequestTrace {
    pub fn start(operation: &'static str, detail: &str, metrics: &Arc<MetricsCollector>) -> Self {
        let trace_id: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let span = tracing::info_span!("request", trace_id = %trace_id, operation);
        span.in_scope(|| tracing::info!("→ START {} | {}", operation, detail));
        Self {
            trace_id,
            operation,
            started: Instant::now(),
            span,
            metrics: Arc::clone(metrics),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span(&self) -> tracing::Span {
        self.span.clone()
    }

    pub fn succeed(self) {
        let elapsed = self.started.elapsed();
        self.span.in_scope(|| {
            tracing::info!(
                "✓ SUCCESS {} | Duration: {:.2}s",
                self.operation,
                elapsed.as_secs_f64()
            )
        });
        self.metrics.record_request(true, elapsed);
    }

    pub fn fail(self, kind: &str, error: &dyn Display) {
        let elapsed = self.started.elapsed();
        self.span.in_scope(|| {
            tracing::error!(
                "✗ FAILED {} | Error: {} | Duration: {:.2}s",
                self.operation,
                error,
                elapsed.as_secs_f64()
            )
        });
        self.metrics.record_error(kind);
        self.metrics.record_request(false, elapsed);
    }
}

/// 追踪请求内的一个组件执行；成功时计入组件调用数
pub async fn trace_component<T, E, F>(
    component: &str,
    metrics: &MetricsCollector,
    fut: F,
) -> Result<T, E>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    tracing::info!("  → {}", component);
    let result = fut.await;
    let elapsed = started.elapsed().as_secs_f64();
    match &result {
        Ok(_) => {
            tracing::debug!("  ✓ {} completed | Duration: {:.2}s", component, elapsed);
            metrics.record_component_call(component);
        }
        Err(e) => {
            tracing::error!(
                "  ✗ {} failed | Error: {} | Duration: {:.2}s",
                component,
                e,
                elapsed
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_sensitive() {
        let masked = mask_sensitive(&[("q", "Manila"), ("appid", "abc123"), ("API_KEY", "x")]);
        assert_eq!(masked[0], ("q", "Manila"));
        assert_eq!(masked[1], ("appid", "***MASKED***"));
        assert_eq!(masked[2], ("API_KEY", "***MASKED***"));
    }

    #[test]
    fn test_request_trace_records_metrics() {
        let metrics = Arc::new(MetricsCollector::new());
        let trace = RequestTrace::start("recommendation", "location=Manila", &metrics);
        assert_eq!(trace.trace_id().len(), 8);
        trace.succeed();

        let trace = RequestTrace::start("chat", "", &metrics);
        trace.fail("LlmError", &"boom");

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.failed_requests, 1);
        assert_eq!(snap.errors.get("LlmError"), Some(&1));
    }

    #[tokio::test]
    async fn test_trace_component_counts_success_only() {
        let metrics = MetricsCollector::new();
        let ok: Result<u8, String> =
            trace_component("WeatherAgent", &metrics, async { Ok(1) }).await;
        let err: Result<u8, String> =
            trace_component("WeatherAgent", &metrics, async { Err("down".to_string()) }).await;
        assert!(ok.is_ok() && err.is_err());
        assert_eq!(metrics.snapshot().component_calls.get("WeatherAgent"), Some(&1));
    }
}
