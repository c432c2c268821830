//! 提示词：推荐 system instruction、推荐 prompt、偏好抽取 prompt
//!
//! 可放在 config/prompts/{recommendation,extraction}.txt 覆盖内置文本；
//! 模板中的 `{context}` / `{message}` 在调用时替换。

/// 推荐的 system instruction
pub const RECOMMENDATION_SYSTEM: &str = r#"You are an expert outfit recommendation assistant. Provide highly specific,
contextual outfit suggestions that reference actual weather data, activities,
and user preferences.

CRITICAL REQUIREMENTS:
1. ALWAYS mention the exact temperature and weather conditions in your opening
2. ALWAYS reference specific user preferences when making recommendations
3. ALWAYS explain WHY each item is recommended based on the context
4. Be SPECIFIC - mention fabrics, colors, and practical details

OUTPUT FORMAT:

Opening line format: "For your [activity] in [temperature]°[C/F] [conditions] weather:"

Then provide:
- SPECIFIC clothing items (not generic categories)
- For EACH item, explain WHY (reference weather, activity, or preference)
- Accessories with reasoning
- Practical considerations (sun exposure time, indoor/outdoor transitions, etc.)

End with:
"Reasoning: [Comprehensive explanation that ties together weather + activities + preferences]"

KEY PRINCIPLES:
- Reference EXACT temperature and conditions
- Quote or paraphrase user preferences when relevant
- Explain time-based factors (duration outdoors, time of day)
- Account for transitions (outdoor→indoor, sun→shade)
- Be conversational but professional
- Give specific fabric/color suggestions when relevant to weather"#;

const RECOMMENDATION_TEMPLATE: &str = r#"{context}

Based on this information, provide a detailed outfit recommendation following this format:

1. Start with: "For your [activity/day] in [exact temperature]°[C/F] [weather conditions]:"
2. List specific clothing items with explanations for each
3. Include accessories with reasoning
4. End with "Reasoning:" paragraph that ties everything together

Remember to:
- Quote the exact temperature and weather conditions
- Reference user preferences when making choices
- Explain WHY each item is recommended
- Consider practical details like sun exposure, indoor/outdoor transitions
- Be specific about fabrics, colors, and styles"#;

const EXTRACTION_TEMPLATE: &str = r#"Is this message expressing a clothing or weather preference?
Message: "{message}"

Respond with JSON:
{"is_preference": true/false, "preference": "extracted text or null"}

Examples:
- "I prefer Celsius" → {"is_preference": true, "preference": "prefers Celsius"}
- "I don't like shorts" → {"is_preference": true, "preference": "dislikes shorts"}
- "What should I wear?" → {"is_preference": false, "preference": null}"#;

fn load_template(name: &str, default: &str) -> String {
    [
        format!("config/prompts/{}.txt", name),
        format!("../config/prompts/{}.txt", name),
    ]
    .iter()
    .find_map(|p| std::fs::read_to_string(p).ok())
    .unwrap_or_else(|| default.to_string())
}

pub fn recommendation_prompt(context: &str) -> String {
    load_template("recommendation", RECOMMENDATION_TEMPLATE).replace("{context}", context)
}

pub fn extraction_prompt(message: &str) -> String {
    load_template("extraction", EXTRACTION_TEMPLATE).replace("{message}", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_fill_placeholders() {
        let p = recommendation_prompt("## Weather\n- Location: Manila, PH");
        assert!(p.starts_with("## Weather"));
        assert!(!p.contains("{context}"));

        let e = extraction_prompt("I run cold");
        assert!(e.contains(r#"Message: "I run cold""#));
        assert!(e.contains(r#"{"is_preference": true/false"#));
    }
}
