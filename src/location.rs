//! 位置检测：IP 定位（ipapi.co → ip-api.com）与手动输入解析

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const IPAPI_URL: &str = "https://ipapi.co/json/";
pub const IP_API_URL: &str = "http://ip-api.com/json/";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DetectionMethod {
    Ip,
    IpAlternative,
    Manual,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocationInfo {
    pub city: String,
    pub region: String,
    pub country: String,
    pub country_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: String,
    /// 展示与天气查询使用的字符串
    pub location_string: String,
    pub method: DetectionMethod,
}

#[derive(Deserialize)]
struct IpapiResponse {
    city: Option<String>,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country_name: String,
    #[serde(default)]
    country_code: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    timezone: String,
}

#[derive(Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    status: String,
    city: Option<String>,
    #[serde(default, rename = "regionName")]
    region_name: String,
    #[serde(default)]
    country: String,
    #[serde(default, rename = "countryCode")]
    country_code: String,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    timezone: String,
}

/// "City, Region"；无 region 且非 US 时附加国家代码
pub fn format_location_string(city: &str, region: &str, country_code: &str) -> String {
    let mut parts = vec![city];
    if !region.is_empty() {
        parts.push(region);
    } else if !country_code.is_empty() && country_code != "US" {
        parts.push(country_code);
    }
    parts.join(", ")
}

pub struct LocationDetector {
    client: Client,
    primary_url: String,
    alternative_url: String,
}

impl Default for LocationDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationDetector {
    pub fn new() -> Self {
        Self::with_endpoints(IPAPI_URL, IP_API_URL)
    }

    pub fn with_endpoints(primary_url: &str, alternative_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            primary_url: primary_url.to_string(),
            alternative_url: alternative_url.to_string(),
        }
    }

    /// 依次尝试两个 IP 定位服务；都失败返回 None
    pub async fn detect(&self) -> Option<LocationInfo> {
        tracing::info!("Starting automatic location detection...");
        if let Some(loc) = self.from_ipapi().await {
            return Some(loc);
        }
        tracing::info!("Primary IP detection failed, trying alternative...");
        if let Some(loc) = self.from_ip_api().await {
            return Some(loc);
        }
        tracing::warn!("All automatic location detection methods failed");
        None
    }

    async fn from_ipapi(&self) -> Option<LocationInfo> {
        let resp = match self.client.get(&self.primary_url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("IP location detection failed: {}", e);
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!("IP location API returned status code: {}", resp.status());
            return None;
        }
        let data: IpapiResponse = resp.json().await.ok()?;
        let city = data.city.unwrap_or_else(|| "Unknown".to_string());
        let location_string = format_location_string(&city, &data.region, &data.country_code);
        tracing::info!("IP-based location detected: {}", location_string);
        Some(LocationInfo {
            city,
            region: data.region,
            country: data.country_name,
            country_code: data.country_code,
            latitude: data.latitude,
            longitude: data.longitude,
            timezone: data.timezone,
            location_string,
            method: DetectionMethod::Ip,
        })
    }

    async fn from_ip_api(&self) -> Option<LocationInfo> {
        let resp = match self.client.get(&self.alternative_url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Alternative IP location detection failed: {}", e);
                return None;
            }
        };
        if !resp.status().is_success() {
            return None;
        }
        let data: IpApiResponse = resp.json().await.ok()?;
        if data.status != "success" {
            return None;
        }
        let city = data.city.unwrap_or_else(|| "Unknown".to_string());
        let location_string = format_location_string(&city, &data.region_name, &data.country_code);
        tracing::info!("Alternative IP location detected: {}", location_string);
        Some(LocationInfo {
            city,
            region: data.region_name,
            country: data.country,
            country_code: data.country_code,
            latitude: data.lat,
            longitude: data.lon,
            timezone: data.timezone,
            location_string,
            method: DetectionMethod::IpAlternative,
        })
    }

    /// 解析 "City, Region, Country"
    pub fn manual(text: &str) -> LocationInfo {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        let part = |i: usize| parts.get(i).map(|s| s.to_string()).unwrap_or_default();
        LocationInfo {
            city: part(0),
            region: part(1),
            country: part(2),
            country_code: String::new(),
            latitude: None,
            longitude: None,
            timezone: String::new(),
            location_string: text.to_string(),
            method: DetectionMethod::Manual,
        }
    }

    /// 基本格式校验；Err 为给用户看的原因
    pub fn validate(text: &str) -> Result<(), &'static str> {
        if text.trim().is_empty() {
            return Err("Location cannot be empty");
        }
        let len = text.chars().count();
        if len < 2 {
            return Err("Location is too short");
        }
        if len > 200 {
            return Err("Location is too long");
        }
        if !text.chars().any(char::is_alphabetic) {
            return Err("Location must contain letters");
        }
        Ok(())
    }
}
