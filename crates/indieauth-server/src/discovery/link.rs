//! RFC 8288 `Link` header parsing.

/// One link-value: a target and its relation types (lowercased).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target: String,
    pub rels: Vec<String>,
}

impl Link {
    /// Whether `relation` is one of this link's relation types.
    #[must_use]
    pub fn has_rel(&self, relation: &str) -> bool {
        self.rels.iter().any(|r| r.eq_ignore_ascii_case(relation))
    }
}

/// Parse one `Link` header value into its link-values, in order.
///
/// Malformed link-values are skipped; parsing resumes at the next comma.
#[must_use]
pub fn parse(header: &str) -> Vec<Link> {
    let mut links = Vec::new();
    let mut rest = header;

    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        if rest.is_empty() {
            break;
        }

        let Some(after) = rest.strip_prefix('<') else {
            rest = &rest[segment_end(rest)..];
            continue;
        };
        let Some(close) = after.find('>') else { break };

        let target = after[..close].trim().to_owned();
        let params = &after[close + 1..];
        let end = segment_end(params);
        rest = &params[end..];

        // Only the first `rel` parameter counts.
        let rels = split_unquoted(&params[..end], ';')
            .into_iter()
            .filter_map(|param| param.split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("rel"))
            .map(|(_, value)| {
                unquote(value.trim()).split_whitespace().map(str::to_ascii_lowercase).collect()
            })
            .unwrap_or_default();

        links.push(Link { target, rels });
    }

    links
}

/// Targets of every link in `headers` carrying `relation`, in order.
#[must_use]
pub fn targets<'a>(headers: impl IntoIterator<Item = &'a str>, relation: &str) -> Vec<String> {
    headers
        .into_iter()
        .flat_map(parse)
        .filter(|link| link.has_rel(relation))
        .map(|link| link.target)
        .collect()
}

/// Index of the first comma outside a quoted string, or the input length.
fn segment_end(input: &str) -> usize {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ',' if !quoted => return i,
            _ => {}
        }
    }
    input.len()
}

fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == separator && !quoted => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_link() {
        let links = parse(r#"<https://auth.example.org/token>; rel="token_endpoint""#);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "https://auth.example.org/token");
        assert!(links[0].has_rel("token_endpoint"));
    }

    #[test]
    fn test_multiple_links_and_rels() {
        let links = parse(
            r#"<https://a.example/auth>; rel="authorization_endpoint", <https://a.example/t>; rel="token_endpoint TICKET_endpoint""#,
        );
        assert_eq!(links.len(), 2);
        assert!(links[1].has_rel("token_endpoint"));
        assert!(links[1].has_rel("ticket_endpoint"));
    }

    #[test]
    fn test_comma_inside_target_and_quotes() {
        let links = parse(r#"<https://a.example/x,y>; title="a, b"; rel=me, </rel>; rel=next"#);
        assert_eq!(links[0].target, "https://a.example/x,y");
        assert!(links[0].has_rel("me"));
        assert_eq!(links[1].target, "/rel");
        assert!(links[1].has_rel("next"));
    }

    #[test]
    fn test_only_first_rel_counts() {
        let links = parse(r#"<https://a.example/>; rel="one"; rel="two""#);
        assert_eq!(links[0].rels, vec!["one"]);
    }

    #[test]
    fn test_malformed_values_skipped() {
        let links = parse(r#"garbage; rel=x, <https://a.example/>; rel=ok, <unterminated"#);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "https://a.example/");
    }

    #[test]
    fn test_targets_across_headers_in_order() {
        let headers = [
            r#"<https://one.example/>; rel="token_endpoint""#,
            r#"<https://two.example/>; rel="token_endpoint", <https://x.example/>; rel=other"#,
        ];
        assert_eq!(
            targets(headers, "token_endpoint"),
            vec!["https://one.example/", "https://two.example/"]
        );
    }
}
