// src/news/parser.rs
//! RSS 2.0 / RSS 1.0 / Atom entry extraction on top of the `quick-xml` pull reader.
//!
//! Only the first occurrence of each field inside an entry is considered; text of
//! nested elements and CDATA sections inside a field is concatenated.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use std::borrow::Cow;

use crate::news::types::{NewsError, NewsItem, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    PubDate,
    Published,
    Updated,
    Description,
    Summary,
    Content,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"pubDate" => Some(Field::PubDate),
            b"published" => Some(Field::Published),
            b"updated" => Some(Field::Updated),
            b"description" => Some(Field::Description),
            b"summary" => Some(Field::Summary),
            b"content" => Some(Field::Content),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct EntryDraft {
    title: Option<String>,
    link: Option<String>,
    link_href: Option<String>,
    pub_date: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    description: Option<String>,
    summary: Option<String>,
    content: Option<String>,
}

impl EntryDraft {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::PubDate => &mut self.pub_date,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::Description => &mut self.description,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
        }
    }

    fn finish(self, source_name: &str) -> Option<NewsItem> {
        let title = self.title.unwrap_or_default();
        let link = self
            .link
            .filter(|l| !l.is_empty())
            .or(self.link_href)
            .unwrap_or_default();
        if title.is_empty() || !is_absolute_http(&link) {
            return None;
        }

        let published_at = first_non_empty([self.pub_date, self.published, self.updated])
            .as_deref()
            .and_then(parse_timestamp);
        let description =
            first_non_empty([self.description, self.summary, self.content]).unwrap_or_default();

        Some(NewsItem {
            title,
            link,
            published_at,
            description,
            source_name: source_name.to_string(),
        })
    }
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates.into_iter().flatten().find(|s| !s.is_empty())
}

fn is_absolute_http(link: &str) -> bool {
    let lower = link.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")) && link.len() > "http://".len()
}

/// Best-effort timestamp parsing: RFC 2822, RFC 3339, then bare ISO dates (UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn text_of(t: &BytesText<'_>) -> String {
    match t.unescape() {
        Ok(s) => s.into_owned(),
        // HTML entities such as &nbsp; are not valid XML; decode them leniently.
        Err(_) => html_escape::decode_html_entities(&String::from_utf8_lossy(t)).into_owned(),
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(Cow::into_owned))
}

/// Atom readers pick `rel="alternate"` (or no `rel`) as the article link.
fn is_article_link(e: &BytesStart<'_>) -> bool {
    attr_value(e, b"rel").map_or(true, |rel| rel.eq_ignore_ascii_case("alternate"))
}

struct Capture {
    field: Field,
    depth: usize,
    buf: String,
}

fn push_fragment(buf: &mut String, fragment: &str) {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(fragment);
}

/// Parse a feed document into items tagged with `source_name`.
///
/// Entries without a title or an absolute http(s) link are skipped. Malformed XML and
/// documents without any `item`/`entry` element yield `NewsError::ParseFailure`.
pub fn parse_feed(raw: &str, source_name: &str) -> Result<Vec<NewsItem>> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut entries_seen = 0usize;
    // (depth of the entry element, fields collected so far)
    let mut entry: Option<(usize, EntryDraft)> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                let name = name.as_ref();
                if entry.is_none() {
                    if name == b"item" || name == b"entry" {
                        entries_seen += 1;
                        entry = Some((depth, EntryDraft::default()));
                    }
                } else if let (Some((_, draft)), false) = (entry.as_mut(), capture.is_some()) {
                    if let Some(field) = Field::from_local_name(name) {
                        if field == Field::Link && draft.link_href.is_none() && is_article_link(&e)
                        {
                            draft.link_href = attr_value(&e, b"href");
                        }
                        if draft.slot(field).is_none() {
                            capture = Some(Capture {
                                field,
                                depth,
                                buf: String::new(),
                            });
                        }
                    }
                }
            }
            Event::Empty(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"item" || name == b"entry" {
                    if entry.is_none() {
                        entries_seen += 1;
                    }
                    continue;
                }
                // Self-closing fields carry no text; a later element of the same name
                // may still fill the slot.
                if let (Some((_, draft)), false) = (entry.as_mut(), capture.is_some()) {
                    if name == b"link" && draft.link_href.is_none() && is_article_link(&e) {
                        draft.link_href = attr_value(&e, b"href");
                    }
                }
            }
            Event::Text(t) => {
                if let Some(c) = capture.as_mut() {
                    push_fragment(&mut c.buf, &text_of(&t));
                }
            }
            Event::CData(c) => {
                if let Some(cap) = capture.as_mut() {
                    push_fragment(&mut cap.buf, &String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if capture.as_ref().is_some_and(|c| c.depth == depth) {
                    if let (Some(c), Some((_, draft))) = (capture.take(), entry.as_mut()) {
                        *draft.slot(c.field) = Some(c.buf);
                    }
                }
                if entry.as_ref().is_some_and(|(d, _)| *d == depth) {
                    if let Some((_, draft)) = entry.take() {
                        if let Some(item) = draft.finish(source_name) {
                            out.push(item);
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(NewsError::ParseFailure(format!(
            "unexpected end of document ({depth} unclosed elements)"
        )));
    }
    if entries_seen == 0 {
        return Err(NewsError::ParseFailure("no item/entry elements".into()));
    }

    tracing::debug!(
        target: "news",
        source = source_name,
        entries = entries_seen,
        kept = out.len(),
        "feed parsed"
    );
    Ok(out)
}
