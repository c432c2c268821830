//! 活动分类：按关键词推断地点类型、正式程度、是否运动 / 户外

use serde::Serialize;

use super::CalendarEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Office,
    Outdoor,
    Indoor,
    Home,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Formality {
    Casual,
    BusinessCasual,
    Formal,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Office => "office",
            LocationType::Outdoor => "outdoor",
            LocationType::Indoor => "indoor",
            LocationType::Home => "home",
        }
    }
}

impl Formality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Formality::Casual => "casual",
            Formality::BusinessCasual => "business_casual",
            Formality::Formal => "formal",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Activity {
    pub title: String,
    pub start_time: String,
    pub raw_location: String,
    pub location_type: LocationType,
    pub formality: Formality,
    pub is_exercise: bool,
    pub is_outdoor: bool,
}

const OUTDOOR_PLACES: &[&str] = &["park", "outdoor", "trail", "beach"];
const OFFICE_PLACES: &[&str] = &["office", "workplace"];
const HOME_PLACES: &[&str] = &["home", "house"];
const FORMAL_WORDS: &[&str] = &["meeting", "presentation", "interview", "client"];
const BUSINESS_WORDS: &[&str] = &["work", "office", "business"];
const EXERCISE_WORDS: &[&str] = &["gym", "workout", "run", "exercise", "yoga", "fitness"];
const OUTDOOR_WORDS: &[&str] = &["outdoor", "outside", "park", "hike"];

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

pub struct ActivityDetector;

impl ActivityDetector {
    /// 纯函数；子串匹配，忽略大小写
    pub fn analyze_event(event: &CalendarEvent) -> Activity {
        let summary = event.summary.to_lowercase();
        let location = event.location.to_lowercase();

        let location_type = if contains_any(&location, OUTDOOR_PLACES) {
            LocationType::Outdoor
        } else if contains_any(&location, OFFICE_PLACES) {
            LocationType::Office
        } else if contains_any(&location, HOME_PLACES) {
            LocationType::Home
        } else {
            LocationType::Indoor
        };

        let formality = if contains_any(&summary, FORMAL_WORDS) {
            Formality::Formal
        } else if contains_any(&summary, BUSINESS_WORDS) {
            Formality::BusinessCasual
        } else {
            Formality::Casual
        };

        let title = if event.summary.is_empty() {
            "Event".to_string()
        } else {
            event.summary.clone()
        };

        Activity {
            title,
            start_time: event.start.clone(),
            raw_location: event.location.clone(),
            location_type,
            formality,
            is_exercise: contains_any(&summary, EXERCISE_WORDS),
            is_outdoor: location_type == LocationType::Outdoor
                || contains_any(&summary, OUTDOOR_WORDS),
        }
    }
}
