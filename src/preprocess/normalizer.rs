use std::sync::LazyLock;

use regex::{NoExpand, Regex};

/// RFC 2822 style address: dot-atom or quoted local part, host name or
/// bracketed IP literal.
const EMAIL_PATTERN: &str = r#"(?:[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*|"(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21\x23-\x5b\x5d-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*")@(?:(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?|\[(?:(?:(2(5[0-5]|[0-4][0-9])|1[0-9][0-9]|[1-9]?[0-9]))\.){3}(?:(2(5[0-5]|[0-4][0-9])|1[0-9][0-9]|[1-9]?[0-9])|[a-z0-9-]*[a-z0-9]:(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21-\x5a\x53-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])+)\])"#;

/// Ordered substitutions. Each pattern runs over the output of the previous one.
static SUBSTITUTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\d{4}", " DATE "),
        (r"\d+", " "),
        (r"©", " COPYRIGHTSYMBOL "),
        (r"\(c\)", " COPYRIGHTSYMBOL "),
        (r"\(C\)", " COPYRIGHTSYMBOL "),
        (EMAIL_PATTERN, " EMAIL "),
        (r"[^a-zA-Z0-9]", " "),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        let regex = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("Failed to compile regex '{}': {}", pattern, e));
        (regex, replacement)
    })
    .collect()
});

/// Normalize a single sentence: placeholder tokens for years, copyright
/// symbols and email addresses, digits and punctuation blanked, lowercased
/// and trimmed. Internal runs of spaces are left in place.
pub fn normalize_one(sentence: &str) -> String {
    let mut text = sentence.to_string();
    for (regex, replacement) in SUBSTITUTIONS.iter() {
        text = regex.replace_all(&text, NoExpand(replacement)).into_owned();
    }
    text.to_lowercase().trim().to_string()
}

/// Normalize every sentence, preserving order and length.
pub fn normalize<S: AsRef<str>>(sentences: &[S]) -> Vec<String> {
    sentences.iter().map(|s| normalize_one(s.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    #[test]
    fn test_paren_c_notice() {
        let out = normalize(&["Copyright (c) 2021 Jane Doe <j@x.com>"]);
        assert_eq!(
            tokens(&out[0]),
            vec!["copyright", "copyrightsymbol", "date", "jane", "doe", "email"]
        );
        assert!(out[0].chars().all(|c| c.is_ascii_lowercase() || c == ' '));
    }

    #[test]
    fn test_symbol_and_upper_c() {
        let out = normalize(&["© 1999 Foo", "(C) 2005 Bar"]);
        assert_eq!(tokens(&out[0]), vec!["copyrightsymbol", "date", "foo"]);
        assert_eq!(tokens(&out[1]), vec!["copyrightsymbol", "date", "bar"]);
    }

    #[test]
    fn test_digit_runs() {
        // The first four digits of a longer run become DATE, the remainder is blanked.
        assert_eq!(tokens(&normalize_one("v123456 build 7")), vec!["v", "date", "build"]);
        assert_eq!(tokens(&normalize_one("2001-2003")), vec!["date", "date"]);
    }

    #[test]
    fn test_internal_whitespace_not_collapsed() {
        assert_eq!(normalize_one("a, b"), "a  b");
        assert_eq!(normalize_one("  --x--  "), "x");
    }

    #[test]
    fn test_email_is_case_sensitive() {
        assert_eq!(tokens(&normalize_one("mail dev@example.org now")), vec!["mail", "email", "now"]);
        // Upper-case addresses fall through to punctuation stripping.
        assert_eq!(tokens(&normalize_one("DEV@EXAMPLE.ORG")), vec!["dev", "example", "org"]);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "Copyright (c) 2021 Jane Doe <j@x.com>",
            "© 2010-2015 The Foo Authors. All rights reserved.",
            "see http://example.com/2019/index.html #42",
            "",
        ];
        for once in normalize(&inputs) {
            assert_eq!(normalize_one(&once), once);
        }
    }

    #[test]
    fn test_preserves_length_and_order() {
        let out = normalize(&["b 1", "a"]);
        assert_eq!(out, vec!["b", "a"]);
    }
}
