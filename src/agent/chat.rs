//! 偏好抽取结果解析
//!
//! 模型偶尔会用 ```json 代码块包裹输出，解析前先剥离。

use serde::Deserialize;

#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct Extraction {
    #[serde(default)]
    pub is_preference: bool,
    #[serde(default)]
    pub preference: Option<String>,
}

impl Extraction {
    /// 识别为偏好且文本非空时返回偏好文本
    pub fn preference(&self) -> Option<&str> {
        if !self.is_preference {
            return None;
        }
        self.preference
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != "null")
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let s = raw.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// 无法解析时视为非偏好
pub fn parse_extraction(raw: &str) -> Extraction {
    serde_json::from_str(strip_code_fence(raw)).unwrap_or_else(|e| {
        tracing::debug!("Extraction reply is not valid JSON: {}", e);
        Extraction::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_fenced() {
        let e = parse_extraction(r#"{"is_preference": true, "preference": "dislikes shorts"}"#);
        assert_eq!(e.preference(), Some("dislikes shorts"));

        let fenced = "```json\n{\"is_preference\": true, \"preference\": \"prefers Celsius\"}\n```";
        assert_eq!(parse_extraction(fenced).preference(), Some("prefers Celsius"));
    }

    #[test]
    fn test_not_a_preference() {
        let declined = parse_extraction(r#"{"is_preference": false, "preference": null}"#);
        assert_eq!(declined.preference(), None);
        let empty = parse_extraction(r#"{"is_preference": true, "preference": ""}"#);
        assert_eq!(empty.preference(), None);
        assert_eq!(parse_extraction("sure thing!").preference(), None);
    }
}
