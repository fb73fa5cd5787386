//! `rel` relations declared in HTML markup (`<link>` and `<a>` elements).

use std::sync::OnceLock;

use regex::Regex;

static COMMENT_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static TAG_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static ATTR_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn comment_regex() -> Option<&'static Regex> {
    COMMENT_REGEX.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").ok()).as_ref()
}

fn tag_regex() -> Option<&'static Regex> {
    TAG_REGEX.get_or_init(|| Regex::new(r"(?is)<(?:link|a)\s[^>]*>").ok()).as_ref()
}

fn attr_regex() -> Option<&'static Regex> {
    ATTR_REGEX
        .get_or_init(|| {
            Regex::new(r#"(?i)([a-z][a-z0-9_:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#).ok()
        })
        .as_ref()
}

/// `href` values of `<link>`/`<a>` elements whose `rel` contains `relation`,
/// in document order. Values are returned as written (possibly relative).
#[must_use]
pub fn rel_values(html: &str, relation: &str) -> Vec<String> {
    let (Some(comments), Some(tags), Some(attrs)) = (comment_regex(), tag_regex(), attr_regex())
    else {
        return Vec::new();
    };

    let html = comments.replace_all(html, "");
    let mut values = Vec::new();

    for tag in tags.find_iter(&html) {
        let mut rel = None;
        let mut href = None;

        for cap in attrs.captures_iter(tag.as_str()) {
            let value = cap.get(2).or_else(|| cap.get(3)).or_else(|| cap.get(4)).map_or("", |m| m.as_str());
            match cap.get(1).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
                Some("rel") if rel.is_none() => rel = Some(value),
                Some("href") if href.is_none() => href = Some(value),
                _ => {}
            }
        }

        let matches = rel.is_some_and(|r| r.split_whitespace().any(|r| r.eq_ignore_ascii_case(relation)));
        if let (true, Some(href)) = (matches, href) {
            values.push(decode_entities(href.trim()));
        }
    }

    values
}

/// Decode the character references that commonly appear inside URLs.
fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_owned();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
