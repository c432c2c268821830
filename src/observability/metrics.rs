//! 调用指标：请求数 / 成功率 / 耗时、外部 API 调用、组件执行、错误计数
//!
//! 显式构造、以 Arc 注入需要记录的组件；生命周期为 new → record_* → snapshot / reset。

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug)]
struct MetricsState {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    response_times: ResponseTimes,
    /// 累计耗时，average 由此计算
    response_time_total: f64,
    api_calls: BTreeMap<String, u64>,
    component_calls: BTreeMap<String, u64>,
    errors: BTreeMap<String, u64>,
    started_at: DateTime<Local>,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            response_times: ResponseTimes::default(),
            response_time_total: 0.0,
            api_calls: BTreeMap::new(),
            component_calls: BTreeMap::new(),
            errors: BTreeMap::new(),
            started_at: Local::now(),
        }
    }
}

/// 指标收集器（线程安全，内部 Mutex）
#[derive(Debug)]
pub struct MetricsCollector {
    state: Mutex<MetricsState>,
}

/// 耗时统计（秒）
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResponseTimes {
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

/// 某一时刻的指标快照
#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// 百分比；无请求时为 0
    pub success_rate: f64,
    pub response_times: ResponseTimes,
    pub api_calls: BTreeMap<String, u64>,
    pub component_calls: BTreeMap<String, u64>,
    pub errors: BTreeMap<String, u64>,
    pub uptime_since: String,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MetricsState::new()),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MetricsState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn record_request(&self, success: bool, elapsed: Duration) {
        self.with_state(|s| {
            s.total_requests += 1;
            if success {
                s.successful_requests += 1;
            } else {
                s.failed_requests += 1;
            }
            let secs = elapsed.as_secs_f64();
            let times = &mut s.response_times;
            if times.count == 0 {
                times.min = secs;
                times.max = secs;
            } else {
                times.min = times.min.min(secs);
                times.max = times.max.max(secs);
            }
            times.count += 1;
            s.response_time_total += secs;
            times.average = s.response_time_total / times.count as f64;
        });
    }

    pub fn record_api_call(&self, api_name: &str) {
        self.with_state(|s| *s.api_calls.entry(api_name.to_string()).or_default() += 1);
    }

    pub fn record_component_call(&self, component: &str) {
        self.with_state(|s| *s.component_calls.entry(component.to_string()).or_default() += 1);
    }

    pub fn record_error(&self, kind: &str) {
        self.with_state(|s| *s.errors.entry(kind.to_string()).or_default() += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.with_state(|s| {
            MetricsSnapshot {
                total_requests: s.total_requests,
                successful_requests: s.successful_requests,
                failed_requests: s.failed_requests,
                success_rate: if s.total_requests > 0 {
                    s.successful_requests as f64 / s.total_requests as f64 * 100.0
                } else {
                    0.0
                },
                response_times: s.response_times.clone(),
                api_calls: s.api_calls.clone(),
                component_calls: s.component_calls.clone(),
                errors: s.errors.clone(),
                uptime_since: s.started_at.to_rfc3339(),
            }
        })
    }

    /// 清零并重置起始时间
    pub fn reset(&self) {
        self.with_state(|s| *s = MetricsState::new());
        tracing::info!("Metrics have been reset");
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSnapshot {
    /// 文本报告（metrics 命令展示）
    pub fn format(&self) -> String {
        let rule = "=".repeat(60);
        let mut lines = vec![
            rule.clone(),
            "AGENT METRICS".to_string(),
            rule.clone(),
            format!("Total Requests:       {}", self.total_requests),
            format!(
                "Success Rate:         {:.1}% ({}/{})",
                self.success_rate, self.successful_requests, self.total_requests
            ),
            format!("Failed Requests:      {}", self.failed_requests),
            String::new(),
            "Response Times:".to_string(),
            format!("  Average:            {:.2}s", self.response_times.average),
            format!("  Min:                {:.2}s", self.response_times.min),
            format!("  Max:                {:.2}s", self.response_times.max),
            String::new(),
            "API Calls:".to_string(),
        ];
        for (name, count) in &self.api_calls {
            lines.push(format!("  {:20} {}", name, count));
        }
        lines.push(String::new());
        lines.push("Component Executions:".to_string());
        for (name, count) in &self.component_calls {
            lines.push(format!("  {:20} {}", name, count));
        }
        if !self.errors.is_empty() {
            lines.push(String::new());
            lines.push("Errors:".to_string());
            for (kind, count) in &self.errors {
                lines.push(format!("  {:20} {}", kind, count));
            }
        }
        lines.push(String::new());
        lines.push(format!("Uptime Since:         {}", self.uptime_since));
        lines.push(rule);
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_aggregates() {
        let metrics = MetricsCollector::new();
        metrics.record_request(true, Duration::from_millis(500));
        metrics.record_request(false, Duration::from_millis(1500));
        metrics.record_api_call("OpenWeather");
        metrics.record_api_call("OpenWeather");
        metrics.record_component_call("WeatherAgent");
        metrics.record_error("WeatherError");

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.success_rate, 50.0);
        assert_eq!(snap.response_times.count, 2);
        assert!((snap.response_times.average - 1.0).abs() < 1e-9);
        assert!((snap.response_times.min - 0.5).abs() < 1e-9);
        assert_eq!(snap.api_calls.get("OpenWeather"), Some(&2));
        assert_eq!(snap.errors.get("WeatherError"), Some(&1));
    }

    #[test]
    fn test_response_times_track_running_extremes() {
        let metrics = MetricsCollector::new();
        for ms in [300, 100, 800, 400] {
            metrics.record_request(true, Duration::from_millis(ms));
        }
        let times = metrics.snapshot().response_times;
        assert_eq!(times.count, 4);
        assert!((times.min - 0.1).abs() < 1e-9);
        assert!((times.max - 0.8).abs() < 1e-9);
        assert!((times.average - 0.4).abs() < 1e-9);

        metrics.reset();
        metrics.record_request(false, Duration::from_millis(2000));
        let times = metrics.snapshot().response_times;
        assert_eq!(times.count, 1);
        assert!((times.min - 2.0).abs() < 1e-9);
        assert!((times.max - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_everything() {
        let metrics = MetricsCollector::new();
        metrics.record_request(true, Duration::from_secs(1));
        metrics.record_api_call("Gemini");
        metrics.reset();

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.success_rate, 0.0);
        assert!(snap.api_calls.is_empty());
    }

    #[test]
    fn test_format_lists_sections() {
        let metrics = MetricsCollector::new();
        metrics.record_api_call("Google Calendar");
        let text = metrics.snapshot().format();
        assert!(text.contains("AGENT METRICS"));
        assert!(text.contains("Google Calendar"));
        assert!(!text.contains("Errors:"));
    }
}
