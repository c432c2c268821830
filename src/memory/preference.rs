//! 偏好数据模型：Preference、PreferenceSet（按插入顺序的 key→文本映射）、SourceAttribution
//!
//! PreferenceSet 序列化为 JSON 对象，键顺序即插入顺序；反序列化时重复键以后者为准。

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 单条偏好：key 唯一，value 为自由文本（如 "prefers Celsius"）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preference {
    pub key: String,
    pub value: String,
}

impl Preference {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 偏好集合：保持插入顺序，key 唯一（重复 insert 覆盖 value，位置不变）
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreferenceSet {
    entries: Vec<Preference>,
}

impl PreferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖；返回被覆盖的旧值
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|p| p.key == key) {
            Some(existing) => Some(std::mem::replace(&mut existing.value, value)),
            None => {
                self.entries.push(Preference { key, value });
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|p| p.key == key)
    }

    pub fn contains_value(&self, value: &str) -> bool {
        self.entries.iter().any(|p| p.value == value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preference> {
        self.entries.iter()
    }

    /// 所有 value，按插入顺序
    pub fn values(&self) -> Vec<String> {
        self.entries.iter().map(|p| p.value.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PreferenceSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = PreferenceSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

impl Serialize for PreferenceSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for p in &self.entries {
            map.serialize_entry(&p.key, &p.value)?;
        }
        map.end()
    }
}

struct PreferenceSetVisitor;

impl<'de> Visitor<'de> for PreferenceSetVisitor {
    type Value = PreferenceSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping preference keys to text")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut set = PreferenceSet::new();
        while let Some((key, value)) = access.next_entry::<String, String>()? {
            set.insert(key, value);
        }
        Ok(set)
    }
}

impl<'de> Deserialize<'de> for PreferenceSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PreferenceSetVisitor)
    }
}

/// 当前偏好集合最近一次的来源（仅用于展示 / 遥测，不影响正确性）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceAttribution {
    #[default]
    LocalFile,
    RemoteMemory,
}

impl SourceAttribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceAttribution::LocalFile => "local_file",
            SourceAttribution::RemoteMemory => "remote_memory",
        }
    }

    /// 推荐上下文中展示的来源标签
    pub fn label(&self) -> &'static str {
        match self {
            SourceAttribution::LocalFile => "💾 Local File",
            SourceAttribution::RemoteMemory => "☁️ Cloud (Vertex AI)",
        }
    }
}

impl fmt::Display for SourceAttribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
