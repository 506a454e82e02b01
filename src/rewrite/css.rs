//! `url(...)` references inside CSS text

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("Invalid CSS url() regex")
});

/// Every `url(...)` target in `css`, in order, without quotes; `data:` URIs are skipped
pub fn css_urls(css: &str) -> Vec<String> {
    CSS_URL
        .captures_iter(css)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|target| !target.to_ascii_lowercase().starts_with("data:"))
        .collect()
}

/// Replaces the targets of `url(...)` references found in `replacements`
///
/// Quoting and whitespace of each reference are preserved; unknown targets are left alone.
pub fn replace_css_urls(css: &str, replacements: &HashMap<String, String>) -> String {
    CSS_URL
        .replace_all(css, |caps: &Captures<'_>| {
            let whole = &caps[0];
            match replacements.get(&caps[1]) {
                Some(local) => whole.replacen(&caps[1], local, 1),
                None => whole.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_urls_handles_quoting() {
        let css = r#"
            @font-face { src: url('/fonts/a.woff2') format('woff2'), url("b.ttf"); }
            .x { background: url( /img/bg.png ) no-repeat; }
            .y { background: url(data:image/png;base64,AAAA); }
        "#;
        assert_eq!(
            css_urls(css),
            vec!["/fonts/a.woff2", "b.ttf", "/img/bg.png"]
        );
    }

    #[test]
    fn test_replace_css_urls_keeps_unknown() {
        let mut replacements = HashMap::new();
        replacements.insert("/img/bg.png".to_string(), "../assets/bg.png".to_string());

        let css = r#"a { background: url("/img/bg.png"); } b { background: url(/img/other.png); }"#;
        assert_eq!(
            replace_css_urls(css, &replacements),
            r#"a { background: url("../assets/bg.png"); } b { background: url(/img/other.png); }"#
        );
    }
}
