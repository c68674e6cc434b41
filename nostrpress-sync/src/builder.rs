//! Record Builder: document → unsigned long-form article event.
//!
//! Pure: no I/O, no clock. The caller passes `now` so tests are stable.
//!
//! Tag order is fixed and part of the wire format:
//!
//! 1. `["d", slug]`
//! 2. `["title", title]`
//! 3. optional `author`, `blog_url`, `image`, `summary`, `published_at`
//! 4. one `["t", topic]` per normalized tag

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde_json::Value;

use nostrpress_core::types::{IMAGE_KEYS, KEY_DATE, KEY_NOSTR_IMAGE};
use nostrpress_core::{Document, SiteConfig};
use nostrpress_nostr::{Tag, UnsignedEvent, KIND_ARTICLE};

pub const DEFAULT_TITLE: &str = "Untitled";
pub const READ_MORE_MARKER: &str = "<!--more-->";

/// Build the article event for `doc` as configured for `site`.
///
/// Never fails: missing optional fields simply drop their tag, and an
/// unusable `date` falls back to `now` with a warning.
pub fn build_article(doc: &Document, site: &SiteConfig, now: DateTime<Local>) -> UnsignedEvent {
    let slug = doc.slug();
    let title = doc.title().unwrap_or_else(|| DEFAULT_TITLE.to_owned());
    let content = strip_markers(&doc.body);

    let published = match doc.str_value(KEY_DATE) {
        Some(raw) => {
            let parsed = parse_date(&raw);
            if parsed.is_none() {
                tracing::warn!("{}: could not parse date {raw:?}, using now", doc.file_name());
            }
            parsed
        }
        None => {
            tracing::warn!("{}: no date, using now", doc.file_name());
            None
        }
    };
    let created_at = unix(published.unwrap_or(now));

    let mut tags = vec![Tag::new("d", slug.as_str()), Tag::new("title", title)];

    if let Some(author) = non_empty(site.author_id.as_deref()) {
        tags.push(Tag::new("author", author));
    }
    if let Some(base) = non_empty(site.blog_url.as_deref()) {
        tags.push(Tag::new(
            "blog_url",
            format!("{}/posts/{slug}", base.trim_end_matches('/')),
        ));
    }
    if let Some(image) = image_url(doc, site.blog_url.as_deref()) {
        tags.push(Tag::new("image", image));
    }
    let summary = doc
        .str_value("summary")
        .or_else(|| doc.str_value("description"))
        .or_else(|| first_line(&content));
    if let Some(summary) = summary {
        tags.push(Tag::new("summary", summary));
    }
    if let Some(published) = published {
        tags.push(Tag::new("published_at", unix(published).to_string()));
    }

    tags.extend(topics(doc).into_iter().map(|t| Tag::new("t", t)));

    UnsignedEvent {
        kind: KIND_ARTICLE,
        created_at,
        tags,
        content,
    }
}

// ---------------------------------------------------------------------------
// Field normalization
// ---------------------------------------------------------------------------

/// Merged `tags` + `topics`, `#` stripped, deduplicated in first-seen order.
pub fn topics(doc: &Document) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for key in ["tags", "topics"] {
        for topic in normalize_tags(doc.metadata.get(key)) {
            if !out.contains(&topic) {
                out.push(topic);
            }
        }
    }
    out
}

/// Arrays keep their entries; strings split on whitespace and commas.
pub fn normalize_tags(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s
            .split(|c: char| c.is_whitespace() || c == ',')
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    };
    raw.iter()
        .map(|t| t.trim().strip_prefix('#').unwrap_or(t.trim()).trim().to_owned())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Parse a front-matter date.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DD[T ]HH:MM[:SS]` read as local time,
/// or a bare `YYYY-MM-DD` which is placed at 08:00 local.
pub fn parse_date(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Local.from_local_datetime(&naive).earliest();
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let morning = NaiveTime::from_hms_opt(8, 0, 0)?;
    Local.from_local_datetime(&date.and_time(morning)).earliest()
}

/// `path` made absolute against `base` unless it already has a scheme.
pub fn resolve_url(path: &str, base: Option<&str>) -> String {
    let Some(base) = non_empty(base) else {
        return path.to_owned();
    };
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_owned();
    }
    let base = base.trim_end_matches('/');
    match path.strip_prefix('/') {
        Some(rest) => format!("{base}/{rest}"),
        None => format!("{base}/{path}"),
    }
}

/// First non-blank line, trimmed.
pub fn first_line(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_owned)
}

fn image_url(doc: &Document, blog_url: Option<&str>) -> Option<String> {
    if let Some(cached) = doc.str_value(KEY_NOSTR_IMAGE) {
        return Some(cached);
    }
    IMAGE_KEYS
        .iter()
        .find_map(|key| doc.str_value(key))
        .map(|path| resolve_url(&path, blog_url))
}

fn strip_markers(body: &str) -> String {
    body.replace(READ_MORE_MARKER, "").trim().to_owned()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn unix(dt: DateTime<Local>) -> u64 {
    u64::try_from(dt.timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use nostrpress_core::Format;
    use rstest::rstest;
    use serde_json::json;
    use std::path::PathBuf;

    fn site() -> SiteConfig {
        SiteConfig {
            name: "blog".into(),
            posts_dir: PathBuf::from("posts"),
            blog_url: None,
            author_id: None,
            relays: vec![],
            published_index: None,
        }
    }

    fn doc(name: &str, metadata: Value, body: &str) -> Document {
        let Value::Object(map) = metadata else {
            panic!("metadata must be an object");
        };
        Document::new(format!("posts/{name}"), map, body.to_owned(), Format::Yaml)
    }

    fn now() -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn pairs(event: &UnsignedEvent) -> Vec<(String, String)> {
        event
            .tags
            .iter()
            .map(|t| (t.0[0].clone(), t.0[1].clone()))
            .collect()
    }

    #[test]
    fn hello_has_slug_and_title_first() {
        let event = build_article(&doc("hello.md", json!({"title": "Hello"}), ""), &site(), now());
        assert_eq!(event.kind, KIND_ARTICLE);
        assert_eq!(
            pairs(&event),
            vec![
                ("d".to_string(), "hello".to_string()),
                ("title".to_string(), "Hello".to_string())
            ]
        );
        assert_eq!(event.created_at, 1_700_000_000);
    }

    #[test]
    fn full_tag_order() {
        let mut site = site();
        site.blog_url = Some("https://blog.example/".into());
        site.author_id = Some("me@blog.example".into());
        let d = doc(
            "post.md",
            json!({
                "title": "Post",
                "slug": "custom",
                "date": "2024-01-05T10:00:00Z",
                "hero_image": "/img/hero.png",
                "description": "A post",
                "tags": ["#rust", "nostr"],
                "topics": "nostr, web"
            }),
            "Intro line\n<!--more-->\nRest\n",
        );
        let event = build_article(&d, &site, now());
        let keys: Vec<_> = pairs(&event).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["d", "title", "author", "blog_url", "image", "summary", "published_at", "t", "t", "t"]
        );
        assert_eq!(event.tag_value("d"), Some("custom"));
        assert_eq!(event.tag_value("blog_url"), Some("https://blog.example/posts/custom"));
        assert_eq!(event.tag_value("image"), Some("https://blog.example/img/hero.png"));
        assert_eq!(event.tag_value("summary"), Some("A post"));
        assert_eq!(event.tag_value("published_at"), Some("1704448800"));
        assert_eq!(event.created_at, 1_704_448_800);
        assert_eq!(event.content, "Intro line\n\nRest");
    }

    #[test]
    fn missing_title_and_date_fall_back() {
        let event = build_article(&doc("x.md", json!({}), "\n\nFirst words\nmore"), &site(), now());
        assert_eq!(event.tag_value("title"), Some(DEFAULT_TITLE));
        assert_eq!(event.tag_value("summary"), Some("First words"));
        assert_eq!(event.tag_value("published_at"), None);
        assert_eq!(event.created_at, 1_700_000_000);
    }

    #[test]
    fn unparseable_date_uses_now() {
        let event = build_article(&doc("x.md", json!({"date": "last tuesday"}), ""), &site(), now());
        assert_eq!(event.created_at, 1_700_000_000);
        assert_eq!(event.tag_value("published_at"), None);
    }

    #[test]
    fn cached_nostr_image_wins() {
        let mut site = site();
        site.blog_url = Some("https://blog.example".into());
        let d = doc(
            "x.md",
            json!({"image": "a.png", "nostr_image": "https://cdn.example/a.png"}),
            "",
        );
        let event = build_article(&d, &site, now());
        assert_eq!(event.tag_value("image"), Some("https://cdn.example/a.png"));
    }

    #[test]
    fn topics_are_merged_and_deduplicated() {
        let d = doc(
            "x.md",
            json!({"tags": "#one two,three  one", "topics": ["two", " #four "]}),
            "",
        );
        assert_eq!(topics(&d), vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn date_only_is_eight_am_local() {
        let dt = parse_date("2024-03-10").unwrap();
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.minute(), 0);
        assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    }

    #[test]
    fn naive_datetime_is_local() {
        let dt = parse_date("2024-03-10 14:30:00").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (14, 30));
    }

    #[rstest]
    #[case("/images/foo.png", Some("https://blog.com"), "https://blog.com/images/foo.png")]
    #[case("images/foo.png", Some("https://blog.com/"), "https://blog.com/images/foo.png")]
    #[case("https://cdn.com/x.png", Some("https://blog.com"), "https://cdn.com/x.png")]
    #[case("/images/foo.png", None, "/images/foo.png")]
    #[case("/images/foo.png", Some(""), "/images/foo.png")]
    fn resolves_urls(#[case] path: &str, #[case] base: Option<&str>, #[case] expected: &str) {
        assert_eq!(resolve_url(path, base), expected);
    }
}
