//! 天气：WeatherSource 抽象、报告结构与 OpenWeatherMap 实现

pub mod openweather;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openweather::{WeatherFetcher, OPENWEATHER_BASE_URL};

/// 温度单位：metric（°C）/ imperial（°F）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnits {
    #[default]
    Metric,
    Imperial,
}

impl TemperatureUnits {
    /// OpenWeatherMap `units` 参数
    pub fn as_api_str(&self) -> &'static str {
        match self {
            TemperatureUnits::Metric => "metric",
            TemperatureUnits::Imperial => "imperial",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnits::Metric => "C",
            TemperatureUnits::Imperial => "F",
        }
    }

    /// 宽松解析：imperial / f / fahrenheit → Imperial，其余为 Metric
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "imperial" | "f" | "fahrenheit" => TemperatureUnits::Imperial,
            _ => TemperatureUnits::Metric,
        }
    }
}

/// 扁平天气记录
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub conditions: String,
    pub description: String,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_direction: Option<f64>,
    /// "C" 或 "F"
    pub units: String,
}

/// 天气查询失败；Display 文本直接展示给用户
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeatherError {
    #[error("City '{0}' not found")]
    CityNotFound(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("API error: {0}")]
    Api(u16),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// 天气数据源；不重试，不解释成功标志以外的状态
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn get_weather(
        &self,
        city: &str,
        units: TemperatureUnits,
    ) -> Result<WeatherReport, WeatherError>;
}

/// 可读的天气摘要
pub fn format_weather_message(report: &WeatherReport) -> String {
    let wind = match report.wind_direction {
        Some(deg) => format!("{} m/s, {}°", report.wind_speed, deg),
        None => format!("{} m/s", report.wind_speed),
    };
    format!(
        "Location: {}, {}\nTemperature: {}°{}\nFeels Like: {}°{}\n\
         Conditions: {} ({})\nHumidity: {}%\nWind: {}",
        report.city,
        report.country,
        report.temperature,
        report.units,
        report.feels_like,
        report.units,
        report.conditions,
        report.description,
        report.humidity,
        wind
    )
}

impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_weather_message(self))
    }
}
