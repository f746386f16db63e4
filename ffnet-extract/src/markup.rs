//! String level helpers for the parts of a page that are easier to match as
//! text than as a tree.

use std::sync::LazyLock;

use regex::Regex;

/// Separator between the fields of a description line.
pub const DELIMITER: &str = " - ";

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<.*?>").expect("tag pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\u{a0}]+").expect("whitespace pattern is valid"));

pub fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, "").into_owned()
}

pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Undoes the escaping of a single quoted JavaScript string literal.
pub fn unescape_js(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some(escaped @ ('\'' | '"' | '\\')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// Splits a plain text description line into trimmed, non empty tokens.
pub fn tokenize(line: &str) -> Vec<String> {
    let line = WHITESPACE.replace_all(line, " ");

    line.split(DELIMITER)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

/// First capture group of `re` in `source`.
pub fn capture<'s>(re: &Regex, source: &'s str) -> Option<&'s str> {
    re.captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parses a count rendered with `,` thousands separators.
pub fn parse_count(text: &str) -> Option<u64> {
    text.trim().replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_keeps_hyphenated_words() {
        assert_eq!(
            tokenize("Rated: T  -  English - Sci-Fi/Drama -\u{a0}Words: 1,024"),
            vec!["Rated: T", "English", "Sci-Fi/Drama", "Words: 1,024"]
        );
    }

    #[test]
    fn strip_and_decode() {
        let html = "Rated: <a class='xcontrast_txt' href='https://www.fictionratings.com/'>Fiction  T</a> - Tom &amp; Jerry";

        assert_eq!(
            decode_entities(&strip_tags(html)),
            "Rated: Fiction  T - Tom & Jerry"
        );
    }

    #[test]
    fn unescape_js_literals() {
        assert_eq!(unescape_js(r#"Harry\'s \"Year\" \\ 2\n"#), r#"Harry's "Year" \ 2\n"#);
    }

    #[test]
    fn counts_drop_separators() {
        assert_eq!(parse_count("131,097"), Some(131_097));
        assert_eq!(parse_count(" 12 "), Some(12));
        assert_eq!(parse_count("lots"), None);
    }
}
