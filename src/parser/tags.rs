use std::collections::{BTreeMap, HashMap};

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::config::ExtraTag;
use crate::domain::ExtraValue;

const DC_DATE: &str = "dc:date";

/// Tags captured from one `<item>`/`<entry>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScannedItem {
    pub dc_date: Option<String>,
    pub extras: BTreeMap<String, ExtraValue>,
}

/// Walks the raw XML once and captures `dc:date` plus the configured extra
/// tags for every item, in document order.
///
/// Tag names are matched on their qualified form (`media:thumbnail`). Only
/// the first occurrence of a tag within an item is kept.
#[derive(Debug, Clone, Default)]
pub struct TagScanner {
    text_tags: Vec<String>,
    attr_tags: Vec<(String, Vec<String>)>,
}

#[derive(Default)]
struct ItemState {
    depth: usize,
    capture: Option<Capture>,
    texts: HashMap<String, Option<String>>,
    attrs: HashMap<String, BTreeMap<String, Option<String>>>,
}

struct Capture {
    name: String,
    depth: usize,
    text: String,
}

impl TagScanner {
    pub fn new(extra_tags: &[ExtraTag]) -> Self {
        let mut scanner = Self::default();
        for tag in extra_tags {
            match tag {
                ExtraTag::Element(name) => scanner.text_tags.push(name.clone()),
                ExtraTag::Attributes(map) => {
                    for (name, attributes) in map {
                        scanner.attr_tags.push((name.clone(), attributes.clone()));
                    }
                }
            }
        }
        scanner
    }

    pub fn scan(&self, body: &[u8]) -> Result<Vec<ScannedItem>, quick_xml::Error> {
        let mut reader = Reader::from_reader(body);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut items = Vec::new();
        let mut current: Option<ItemState> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match current.as_mut() {
                    None => {
                        if is_item(&e) {
                            current = Some(ItemState::default());
                        }
                    }
                    Some(state) => {
                        state.depth += 1;
                        self.open(state, &e, false);
                    }
                },
                Event::Empty(e) => match current.as_mut() {
                    None => {
                        if is_item(&e) {
                            items.push(self.finish(ItemState::default()));
                        }
                    }
                    Some(state) => self.open(state, &e, true),
                },
                Event::Text(t) => {
                    if let Some(capture) = current.as_mut().and_then(|s| s.capture.as_mut()) {
                        capture.text.push_str(&unescape_text(&t));
                    }
                }
                Event::CData(c) => {
                    if let Some(capture) = current.as_mut().and_then(|s| s.capture.as_mut()) {
                        capture.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::End(_) => {
                    let finished = match current.as_mut() {
                        Some(state) if state.depth == 0 => true,
                        Some(state) => {
                            state.close();
                            false
                        }
                        None => false,
                    };
                    if finished {
                        if let Some(state) = current.take() {
                            items.push(self.finish(state));
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(items)
    }

    fn wants_text(&self, name: &str) -> bool {
        name == DC_DATE || self.text_tags.iter().any(|t| t == name)
    }

    fn open(&self, state: &mut ItemState, e: &BytesStart<'_>, empty: bool) {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

        if let Some((_, wanted)) = self.attr_tags.iter().find(|(tag, _)| *tag == name) {
            if !state.attrs.contains_key(&name) {
                let mut values: BTreeMap<String, Option<String>> =
                    wanted.iter().map(|a| (a.clone(), None)).collect();
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    if let Some(slot) = values.get_mut(&key) {
                        *slot = attr.unescape_value().ok().map(|v| v.into_owned());
                    }
                }
                state.attrs.insert(name.clone(), values);
            }
        }

        if self.wants_text(&name) && !state.texts.contains_key(&name) && state.capture.is_none() {
            if empty {
                state.texts.insert(name, None);
            } else {
                state.capture = Some(Capture {
                    name,
                    depth: state.depth,
                    text: String::new(),
                });
            }
        }
    }

    fn finish(&self, mut state: ItemState) -> ScannedItem {
        let mut extras = BTreeMap::new();
        for tag in &self.text_tags {
            let text = state.texts.get(tag).cloned().flatten();
            extras.insert(tag.clone(), ExtraValue::Text(text));
        }
        for (tag, wanted) in &self.attr_tags {
            let values = state
                .attrs
                .remove(tag)
                .unwrap_or_else(|| wanted.iter().map(|a| (a.clone(), None)).collect());
            extras.insert(tag.clone(), ExtraValue::Attributes(values));
        }

        ScannedItem {
            dc_date: state.texts.remove(DC_DATE).flatten(),
            extras,
        }
    }
}

impl ItemState {
    fn close(&mut self) {
        if self.capture.as_ref().is_some_and(|c| c.depth == self.depth) {
            if let Some(capture) = self.capture.take() {
                let text = Some(capture.text).filter(|t| !t.is_empty());
                self.texts.entry(capture.name).or_insert(text);
            }
        }
        self.depth = self.depth.saturating_sub(1);
    }
}

fn is_item(e: &BytesStart<'_>) -> bool {
    matches!(e.local_name().as_ref(), b"item" | b"entry")
}

fn unescape_text(t: &BytesText<'_>) -> String {
    t.unescape()
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(t).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Tagged</title>
    <item>
      <title>First</title>
      <dc:date>2024-01-01T10:00:00Z</dc:date>
      <dc:creator><![CDATA[Ada Lovelace]]></dc:creator>
      <enclosure url="https://example.com/1.mp3" type="audio/mpeg" length="10"/>
      <media:thumbnail url="https://example.com/1.png"/>
    </item>
    <item>
      <title>Second</title>
      <dc:creator>Grace &amp; Co</dc:creator>
    </item>
  </channel>
</rss>"#;

    fn scanner() -> TagScanner {
        let mut attrs = BTreeMap::new();
        attrs.insert("enclosure".to_string(), vec!["url".to_string(), "type".to_string()]);
        TagScanner::new(&[
            ExtraTag::Element("dc:creator".into()),
            ExtraTag::Attributes(attrs),
        ])
    }

    #[test]
    fn test_scan_captures_per_item() {
        let items = scanner().scan(RSS.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.dc_date.as_deref(), Some("2024-01-01T10:00:00Z"));
        assert_eq!(
            first.extras["dc:creator"],
            ExtraValue::Text(Some("Ada Lovelace".into()))
        );
        match &first.extras["enclosure"] {
            ExtraValue::Attributes(map) => {
                assert_eq!(map["url"].as_deref(), Some("https://example.com/1.mp3"));
                assert_eq!(map["type"].as_deref(), Some("audio/mpeg"));
                assert!(!map.contains_key("length"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_tags_are_reported_empty() {
        let items = scanner().scan(RSS.as_bytes()).unwrap();
        let second = &items[1];
        assert_eq!(second.dc_date, None);
        assert_eq!(
            second.extras["dc:creator"],
            ExtraValue::Text(Some("Grace & Co".into()))
        );
        match &second.extras["enclosure"] {
            ExtraValue::Attributes(map) => {
                assert_eq!(map.len(), 2);
                assert!(map.values().all(Option::is_none));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_atom_entries_are_items() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title>A</title>
  <entry><title>One</title></entry>
  <entry><title>Two</title></entry>
  <entry/>
</feed>"#;
        let items = TagScanner::default().scan(atom.as_bytes()).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.extras.is_empty()));
    }

    #[test]
    fn test_malformed_xml_errors() {
        let broken = "<rss><channel><item><title>x</item></channel></rss>";
        assert!(TagScanner::default().scan(broken.as_bytes()).is_err());
    }
}
