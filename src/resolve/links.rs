//! Link spans: discovery for front ends without pre-identified entities, and
//! removal before the free-text scan.

use super::types::LinkSpan;
use regex::Regex;
use std::sync::OnceLock;

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)\bhttps?://[^\s<>"'`]+"#).expect("link regex is valid"))
}

/// Find `http(s)://` links in `text`. Trailing sentence punctuation and an
/// unbalanced closing bracket are not part of the link.
pub fn find_links(text: &str) -> Vec<LinkSpan> {
    link_regex()
        .find_iter(text)
        .filter_map(|m| {
            let link = trim_trailing(m.as_str());
            (!link.is_empty()).then(|| LinkSpan::new(m.start(), m.start() + link.len()))
        })
        .collect()
}

fn trim_trailing(mut link: &str) -> &str {
    loop {
        let Some(last) = link.chars().last() else {
            return link;
        };
        let drop = match last {
            '.' | ',' | ';' | ':' | '!' | '?' => true,
            ')' => link.matches('(').count() < link.matches(')').count(),
            ']' => link.matches('[').count() < link.matches(']').count(),
            _ => false,
        };
        if !drop {
            return link;
        }
        link = &link[..link.len() - last.len_utf8()];
    }
}

/// Normalize spans against `text`: drop empty, out-of-bounds and
/// non-char-boundary spans, sort, and merge overlaps. Spans that only touch
/// stay separate links.
pub fn normalize_spans(text: &str, spans: &[LinkSpan]) -> Vec<LinkSpan> {
    let mut valid: Vec<LinkSpan> = spans
        .iter()
        .copied()
        .filter(|s| {
            let ok = s.slice(text).is_some();
            if !ok {
                tracing::warn!(start = s.start, end = s.end, "ignoring invalid link span");
            }
            ok
        })
        .collect();
    valid.sort();

    let mut merged: Vec<LinkSpan> = Vec::with_capacity(valid.len());
    for s in valid {
        match merged.last_mut() {
            Some(prev) if s.start < prev.end => prev.end = prev.end.max(s.end),
            _ => merged.push(s),
        }
    }
    merged
}

/// `text` with every span replaced by a single space, so the text on either
/// side of a link never fuses into one token.
pub fn strip_spans(text: &str, spans: &[LinkSpan]) -> String {
    let spans = normalize_spans(text, spans);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for s in spans {
        out.push_str(&text[cursor..s.start]);
        out.push(' ');
        cursor = s.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(text: &str) -> Vec<&str> {
        find_links(text).iter().map(|s| s.slice(text).unwrap()).collect()
    }

    #[test]
    fn test_find_links() {
        let text = "Here: https://maps.example/?ll=50.087451,14.420671 and http://osm.org/go/0EEQjE--.";
        assert_eq!(
            links(text),
            vec!["https://maps.example/?ll=50.087451,14.420671", "http://osm.org/go/0EEQjE--"]
        );
    }

    #[test]
    fn test_find_links_brackets() {
        assert_eq!(links("(see https://a.example/x)"), vec!["https://a.example/x"]);
        assert_eq!(
            links("https://en.wikipedia.org/wiki/Prague_(city)"),
            vec!["https://en.wikipedia.org/wiki/Prague_(city)"]
        );
    }

    #[test]
    fn test_find_links_none() {
        assert!(find_links("50.087451, 14.420671 no links here").is_empty());
    }

    #[test]
    fn test_strip_spans() {
        let text = "Here: https://maps.example/?ll=1,2 ok";
        let spans = find_links(text);
        assert_eq!(strip_spans(text, &spans), "Here:   ok");
    }

    #[test]
    fn test_normalize_merges_and_drops() {
        let text = "0123456789";
        let spans = [
            LinkSpan::new(5, 8),
            LinkSpan::new(1, 3),
            LinkSpan::new(2, 4),
            LinkSpan::new(7, 50),
            LinkSpan::new(9, 9),
        ];
        assert_eq!(normalize_spans(text, &spans), vec![LinkSpan::new(1, 4), LinkSpan::new(5, 8)]);
        assert_eq!(strip_spans(text, &spans), "0 4 89");
    }

    #[test]
    fn test_normalize_keeps_adjacent_spans() {
        let text = "https://a.example/https://b.example/";
        let spans = [LinkSpan::new(18, 36), LinkSpan::new(0, 18)];
        let out = normalize_spans(text, &spans);
        assert_eq!(out, vec![LinkSpan::new(0, 18), LinkSpan::new(18, 36)]);
        assert_eq!(out[0].slice(text), Some("https://a.example/"));
        assert_eq!(strip_spans(text, &spans), "  ");
    }

    #[test]
    fn test_strip_no_spans() {
        assert_eq!(strip_spans("plain text", &[]), "plain text");
    }
}
