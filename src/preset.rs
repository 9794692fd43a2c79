use crate::identifier::{display_label, is_stable_id};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 3.0;
pub const DEFAULT_CATEGORY: &str = "default";

pub fn clamp_scale(scale: f32) -> f32 {
    if scale.is_nan() {
        return 1.0;
    }
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

/// A stored rule pinning one entity, by stable ID or by name, to a scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub identifier: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    pub scale: f32,
    #[serde(default = "OverrideRecord::default_enabled")]
    pub enabled: bool,
    #[serde(default = "OverrideRecord::default_category")]
    pub category: String,
}

impl OverrideRecord {
    pub fn new(identifier: impl Into<String>, scale: f32) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: None,
            scale: clamp_scale(scale),
            enabled: true,
            category: Self::default_category(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_category() -> String {
        DEFAULT_CATEGORY.to_string()
    }

    /// Index key: the lower-cased identifier.
    pub fn key(&self) -> String {
        self.identifier.to_lowercase()
    }

    pub fn is_stable_id(&self) -> bool {
        is_stable_id(&self.key())
    }

    /// Display name, else a shortened stable ID, else the identifier as written.
    pub fn label(&self) -> String {
        if self.is_stable_id() {
            display_label(&self.key(), self.display_name.as_deref())
        } else {
            display_label(&self.identifier, self.display_name.as_deref())
        }
    }

    pub fn kind_label(&self) -> &'static str {
        if self.is_stable_id() {
            "UUID"
        } else {
            "Username"
        }
    }

    /// Clamps the scale and trims the category, falling back to the default label.
    pub(crate) fn normalized(mut self) -> Self {
        self.scale = clamp_scale(self.scale);
        let category = self.category.trim();
        self.category = if category.is_empty() { Self::default_category() } else { category.to_string() };
        self
    }

    fn matches_search(&self, needle: &str) -> bool {
        self.label().to_lowercase().contains(needle)
            || self.identifier.to_lowercase().contains(needle)
            || self.category.to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresetSort {
    #[default]
    Name,
    Category,
    Scale,
    Enabled,
}

impl PresetSort {
    pub fn label(self) -> &'static str {
        match self {
            PresetSort::Name => "Name",
            PresetSort::Category => "Category",
            PresetSort::Scale => "Scale",
            PresetSort::Enabled => "Enabled",
        }
    }
}

fn compare_labels(a: &OverrideRecord, b: &OverrideRecord) -> Ordering {
    a.label().to_lowercase().cmp(&b.label().to_lowercase())
}

/// Applies a search term, a category filter (`"all"` disables it) and a sort order.
pub fn filter_records(
    records: Vec<OverrideRecord>,
    search: Option<&str>,
    category: Option<&str>,
    sort: PresetSort,
) -> Vec<OverrideRecord> {
    let needle = search.map(|term| term.trim().to_lowercase()).filter(|term| !term.is_empty());
    let category = category.filter(|label| *label != "all");
    let mut filtered: Vec<OverrideRecord> = records
        .into_iter()
        .filter(|record| needle.as_deref().map_or(true, |needle| record.matches_search(needle)))
        .filter(|record| category.map_or(true, |label| record.category == label))
        .collect();
    match sort {
        PresetSort::Name => filtered.sort_by(compare_labels),
        PresetSort::Category => filtered.sort_by(|a, b| {
            a.category.to_lowercase().cmp(&b.category.to_lowercase()).then_with(|| compare_labels(a, b))
        }),
        PresetSort::Scale => filtered.sort_by(|a, b| b.scale.total_cmp(&a.scale)),
        PresetSort::Enabled => {
            filtered.sort_by(|a, b| b.enabled.cmp(&a.enabled).then_with(|| compare_labels(a, b)))
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_defaults_fill_missing_fields() {
        let json = r#"[{"identifier":"Notch","scale":1.2}]"#;
        let records: Vec<OverrideRecord> = serde_json::from_str(json).expect("parse records");
        assert_eq!(records[0].display_name, None);
        assert!(records[0].enabled);
        assert_eq!(records[0].category, "default");
    }

    #[test]
    fn serializes_display_name_field_as_camel_case() {
        let record = OverrideRecord::new("Notch", 1.0).with_display_name("The Creator");
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["displayName"], "The Creator");
        assert!(value.get("display_name").is_none());
    }

    #[test]
    fn scale_is_clamped_on_creation() {
        assert_eq!(OverrideRecord::new("big", 10.0).scale, MAX_SCALE);
        assert_eq!(OverrideRecord::new("small", 0.0).scale, MIN_SCALE);
        assert_eq!(OverrideRecord::new("nan", f32::NAN).scale, 1.0);
    }

    #[test]
    fn upper_case_stable_id_is_labelled_like_its_kind() {
        let record = OverrideRecord::new("A1B2C3D4-0000-4000-8000-000000000000", 1.0);
        assert_eq!(record.kind_label(), "UUID");
        assert_eq!(record.label(), "a1b2c3d4...");
        assert_eq!(OverrideRecord::new("Notch", 1.0).label(), "Notch");
    }

    #[test]
    fn filter_searches_and_sorts() {
        let records = vec![
            OverrideRecord::new("zed", 1.5).with_category("friends"),
            OverrideRecord::new("amy", 2.5).with_category("guild"),
            OverrideRecord::new("bob", 0.5).with_category("friends").with_enabled(false),
        ];
        let by_name = filter_records(records.clone(), None, None, PresetSort::Name);
        let names: Vec<_> = by_name.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(names, ["amy", "bob", "zed"]);

        let by_scale = filter_records(records.clone(), None, Some("all"), PresetSort::Scale);
        assert_eq!(by_scale[0].identifier, "amy");

        let friends = filter_records(records.clone(), None, Some("friends"), PresetSort::Enabled);
        let names: Vec<_> = friends.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(names, ["zed", "bob"]);

        let searched = filter_records(records, Some(" GUI "), None, PresetSort::Name);
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].identifier, "amy");
    }
}
