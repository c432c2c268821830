//! 推荐上下文：Weather / Activities / User Preferences 三段 Markdown

use std::fmt::Write;

use crate::calendar::Activity;
use crate::memory::SourceAttribution;
use crate::weather::WeatherReport;

pub fn build_context(
    weather: &WeatherReport,
    activities: &[Activity],
    preferences: &[String],
    source: SourceAttribution,
) -> String {
    let mut ctx = String::from("# Outfit Recommendation Context\n\n");
    let u = &weather.units;

    ctx.push_str("## Weather\n");
    let _ = writeln!(ctx, "- Location: {}, {}", weather.city, weather.country);
    let _ = writeln!(ctx, "- Temperature: {}°{}", weather.temperature, u);
    let _ = writeln!(ctx, "- Feels like: {}°{}", weather.feels_like, u);
    let _ = writeln!(ctx, "- Conditions: {} ({})", weather.conditions, weather.description);
    let _ = writeln!(ctx, "- Humidity: {}%", weather.humidity);
    let _ = writeln!(ctx, "- Wind: {} m/s\n", weather.wind_speed);

    if activities.is_empty() {
        ctx.push_str("## Activities\n- No specific activities scheduled\n\n");
    } else {
        ctx.push_str("## Today's Activities\n");
        for (i, a) in activities.iter().enumerate() {
            let _ = writeln!(ctx, "\n### Activity {}: {}", i + 1, a.title);
            let _ = writeln!(ctx, "- Time: {}", a.start_time);
            let _ = writeln!(ctx, "- Type: {}", a.location_type.as_str());
            let _ = writeln!(ctx, "- Formality: {}", a.formality.as_str());
            if a.is_exercise {
                ctx.push_str("- Includes exercise\n");
            }
            if a.is_outdoor {
                ctx.push_str("- Outdoor activity\n");
            }
        }
        ctx.push('\n');
    }

    if preferences.is_empty() {
        ctx.push_str("## User Preferences\n- No preferences set yet\n");
    } else {
        let _ = writeln!(ctx, "## User Preferences (Loaded from: {})", source.label());
        for p in preferences {
            let _ = writeln!(ctx, "- {}", p);
        }
    }
    ctx
}
