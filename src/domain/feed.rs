use serde::{Deserialize, Serialize};

use super::Item;

/// One cache artifact: a normalized feed as last fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFeed {
    pub title: String,
    pub name: String,
    pub etag: Option<String>,
    /// RFC 3339 form of the response `Last-Modified`, or of the fetch time.
    pub last_modified: String,
    /// Unix form of `last_modified`.
    pub timestamp: i64,
    pub last_checked_at: i64,
    pub amount: usize,
    pub items: Vec<Item>,
}

impl CachedFeed {
    pub fn display_title(&self) -> &str {
        if self.name.is_empty() {
            &self.title
        } else {
            &self.name
        }
    }
}
