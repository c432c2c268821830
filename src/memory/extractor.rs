//! 远端事实筛选与 key 合成
//!
//! 关键词启发式，不是分类器：误判可以接受，目的只是避免无关记忆污染本地偏好。

/// 调用方传入以此开头的 key 时自动生成 key
pub const AUTO_KEY_PREFIX: &str = "pref_";

/// 同步时向远端发起相似度检索的固定查询
pub const FACT_QUERY: &str = "clothing preferences outfit style";

/// 判定「像偏好」的关键词（小写）
const PREFERENCE_KEYWORDS: &[&str] = &["prefer", "style", "casual", "formal"];

/// 无信息量的回声式偏好，不推送到远端
const GENERIC_PREFERENCE_MARKER: &str = "remember my clothing preferences";

/// 事实筛选器：无状态，全部为关联函数
#[derive(Debug, Clone, Copy, Default)]
pub struct FactExtractor;

impl FactExtractor {
    /// 大小写不敏感的子串匹配
    pub fn looks_like_preference(fact_text: &str) -> bool {
        let lower = fact_text.to_lowercase();
        PREFERENCE_KEYWORDS.iter().any(|k| lower.contains(k))
    }

    /// `pref_{existing_count + 1}`
    pub fn synthesize_key(existing_count: usize) -> String {
        format!("{}{}", AUTO_KEY_PREFIX, existing_count + 1)
    }

    pub fn is_auto_key(key: &str) -> bool {
        key.starts_with(AUTO_KEY_PREFIX)
    }

    /// 所有远端写入路径共用的过滤
    pub fn is_generic_preference(value: &str) -> bool {
        value.to_lowercase().contains(GENERIC_PREFERENCE_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_preference() {
        assert!(FactExtractor::looks_like_preference("User PREFERS wool sweaters"));
        assert!(FactExtractor::looks_like_preference("likes a casual look"));
        assert!(FactExtractor::looks_like_preference("Formal attire for work"));
        assert!(FactExtractor::looks_like_preference("minimalist Style"));
        assert!(!FactExtractor::looks_like_preference("lives in Manila"));
        assert!(!FactExtractor::looks_like_preference(""));
    }

    #[test]
    fn test_synthesize_key() {
        assert_eq!(FactExtractor::synthesize_key(0), "pref_1");
        assert_eq!(FactExtractor::synthesize_key(41), "pref_42");
        assert!(FactExtractor::is_auto_key("pref_"));
        assert!(!FactExtractor::is_auto_key("style"));
    }

    #[test]
    fn test_generic_preference_any_case() {
        assert!(FactExtractor::is_generic_preference("Please REMEMBER MY CLOTHING PREFERENCES"));
        assert!(FactExtractor::is_generic_preference("remember my clothing preferences"));
        assert!(!FactExtractor::is_generic_preference("prefers Celsius"));
    }
}
