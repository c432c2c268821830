//! OpenWeatherMap 当前天气
//!
//! GET {base}/data/2.5/weather?q=&appid=&units=；404 / 401 / 其它状态码与超时分别映射为 WeatherError。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::observability::mask_sensitive;
use crate::weather::{TemperatureUnits, WeatherError, WeatherReport, WeatherSource};

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Deserialize)]
struct ApiResponse {
    name: String,
    sys: ApiSys,
    main: ApiMain,
    weather: Vec<ApiCondition>,
    wind: ApiWind,
}

#[derive(Deserialize)]
struct ApiSys {
    #[serde(default)]
    country: String,
}

#[derive(Deserialize)]
struct ApiMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Deserialize)]
struct ApiCondition {
    main: String,
    description: String,
}

#[derive(Deserialize)]
struct ApiWind {
    speed: f64,
    deg: Option<f64>,
}

/// 天气客户端：持有 reqwest Client、API Key 与 base_url
pub struct WeatherFetcher {
    client: Client,
    api_key: String,
    base_url: String,
}

impl WeatherFetcher {
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or(OPENWEATHER_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn to_report(
        data: ApiResponse,
        units: TemperatureUnits,
    ) -> Result<WeatherReport, WeatherError> {
        let condition = data
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| {
                WeatherError::Unexpected("response has no weather conditions".to_string())
            })?;
        Ok(WeatherReport {
            city: data.name,
            country: data.sys.country,
            temperature: data.main.temp,
            feels_like: data.main.feels_like,
            conditions: condition.main,
            description: condition.description,
            humidity: data.main.humidity,
            wind_speed: data.wind.speed,
            wind_direction: data.wind.deg,
            units: units.symbol().to_string(),
        })
    }
}

#[async_trait]
impl WeatherSource for WeatherFetcher {
    async fn get_weather(
        &self,
        city: &str,
        units: TemperatureUnits,
    ) -> Result<WeatherReport, WeatherError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let params = [
            ("q", city),
            ("appid", self.api_key.as_str()),
            ("units", units.as_api_str()),
        ];
        tracing::debug!("API Call: OpenWeather → {} | Params: {:?}", url, mask_sensitive(&params));

        let resp = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WeatherError::Timeout
                } else {
                    WeatherError::Unexpected(e.to_string())
                }
            })?;

        match resp.status() {
            StatusCode::OK => {
                let data: ApiResponse = resp
                    .json()
                    .await
                    .map_err(|e| WeatherError::Unexpected(e.to_string()))?;
                Self::to_report(data, units)
            }
            StatusCode::NOT_FOUND => Err(WeatherError::CityNotFound(city.to_string())),
            StatusCode::UNAUTHORIZED => Err(WeatherError::InvalidApiKey),
            other => Err(WeatherError::Api(other.as_u16())),
        }
    }
}
