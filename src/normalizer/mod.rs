use chrono::{DateTime, Utc};
use html_escape::decode_html_entities;

use crate::domain::{Item, RawItem};

/// Map a raw parser item onto the canonical [`Item`].
///
/// `content` prefers the item body and falls back to its description.
/// `last_modified` resolves in order: the item's own updated/published date,
/// its `dc:date` element, then `parent_last_modified`.
pub fn normalize(raw: RawItem, parent_last_modified: Option<DateTime<Utc>>) -> Item {
    let last_modified = raw
        .updated
        .or(raw.published)
        .map(|dt| dt.to_rfc3339())
        .or_else(|| raw.dc_date.as_deref().and_then(normalize_date_text))
        .or_else(|| parent_last_modified.map(|dt| dt.to_rfc3339()));

    let content = non_empty(raw.content)
        .or_else(|| non_empty(raw.description))
        .map(|c| decode_html_entities(&c).to_string());

    Item {
        title: non_empty(raw.title).map(|t| decode_html_entities(t.trim()).to_string()),
        link: non_empty(raw.link),
        last_modified,
        content,
        author: non_empty(raw.author),
        categories: raw.categories,
        extra_tags: raw.extra_tags,
    }
}

/// Normalize the first `amount` items, keeping feed order.
pub fn normalize_all(
    items: Vec<RawItem>,
    parent_last_modified: Option<DateTime<Utc>>,
    amount: usize,
) -> Vec<Item> {
    items
        .into_iter()
        .take(amount)
        .map(|raw| normalize(raw, parent_last_modified))
        .collect()
}

/// Parse a dialect date element; unparseable text is kept verbatim.
fn normalize_date_text(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let parsed = DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339());
    Some(parsed.unwrap_or_else(|_| text.to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
