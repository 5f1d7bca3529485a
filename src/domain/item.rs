use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical item shape written to cache artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub title: Option<String>,
    pub link: Option<String>,
    /// RFC 3339 date, or the verbatim `dc:date` when it could not be parsed.
    pub last_modified: Option<String>,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_tags: BTreeMap<String, ExtraValue>,
}

/// Captured value of a configured extra tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Text(Option<String>),
    Attributes(BTreeMap<String, Option<String>>),
}

/// Parser output for one entry, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: Option<String>,
    pub description: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub published: Option<DateTime<Utc>>,
    /// Text of the item's `dc:date` element, if any.
    pub dc_date: Option<String>,
    pub author: Option<String>,
    pub categories: Vec<String>,
    pub extra_tags: BTreeMap<String, ExtraValue>,
}

/// Parser output for a whole document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeed {
    pub title: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub items: Vec<RawItem>,
}

impl Item {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_item() -> Item {
        Item {
            title: None,
            link: None,
            last_modified: None,
            content: None,
            author: None,
            categories: Vec::new(),
            extra_tags: BTreeMap::new(),
        }
    }

    #[test]
    fn test_display_title_with_title() {
        let mut item = bare_item();
        item.title = Some("My Article".into());
        assert_eq!(item.display_title(), "My Article");
    }

    #[test]
    fn test_display_title_without_title() {
        assert_eq!(bare_item().display_title(), "(Untitled)");
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let json = serde_json::to_value(bare_item()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("lastModified"));
        assert!(!obj.contains_key("extraTags"));
        assert!(!obj.contains_key("categories"));
    }

    #[test]
    fn test_extra_value_shapes() {
        let mut item = bare_item();
        item.extra_tags
            .insert("dc:creator".into(), ExtraValue::Text(Some("Ada".into())));
        let mut attrs = BTreeMap::new();
        attrs.insert("url".to_string(), Some("https://example.com/a.mp3".to_string()));
        attrs.insert("type".to_string(), None);
        item.extra_tags
            .insert("enclosure".into(), ExtraValue::Attributes(attrs));

        let json = serde_json::to_string(&item).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
