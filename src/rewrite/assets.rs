//! Asset reference collection
//!
//! Runs before any download so the (non-`Send`) parsed document never lives across an
//! `.await`.

use crate::crawler::AssetKind;
use crate::rewrite::css::css_urls;
use scraper::{Html, Selector};
use std::collections::HashSet;

/// One asset reference exactly as written in the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub raw: String,
    pub kind: AssetKind,
}

/// Asset kind of a `<link>` element, or `None` if it does not load an asset
///
/// # Arguments
///
/// * `rel` - The `rel` attribute (space-separated tokens)
/// * `as_hint` - The `as` attribute of preload/prefetch links
pub fn link_kind(rel: &str, as_hint: Option<&str>) -> Option<AssetKind> {
    let rels: Vec<String> = rel.split_whitespace().map(str::to_ascii_lowercase).collect();
    let has = |token: &str| rels.iter().any(|r| r == token);

    if has("stylesheet") {
        return Some(AssetKind::Stylesheet);
    }
    if rels.iter().any(|r| r.contains("icon")) {
        return Some(AssetKind::Image);
    }
    if has("preload") || has("prefetch") {
        let kind = match as_hint.map(str::to_ascii_lowercase).as_deref() {
            Some("style") => AssetKind::Stylesheet,
            Some("script") => AssetKind::Script,
            Some("font") => AssetKind::Font,
            Some("image") => AssetKind::Image,
            _ => AssetKind::Other,
        };
        return Some(kind);
    }
    None
}

/// URLs of a `srcset` attribute (`a.jpg 1x, b.jpg 2x`)
pub fn srcset_urls(srcset: &str) -> Vec<String> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Collects every distinct asset reference of a page, in document order
///
/// Covers asset-loading `<link>` elements, `<script src>`, `<img src>`, `<input src>`,
/// `<source srcset>`, `url(...)` in `style` attributes (images) and in `<style>` blocks
/// (fonts). The first kind seen for a reference wins.
pub fn collect_asset_refs(html: &str) -> Vec<AssetRef> {
    let document = Html::parse_document(html);
    let mut refs = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |raw: &str, kind: AssetKind| {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') || raw.to_ascii_lowercase().starts_with("data:") {
            return;
        }
        if seen.insert(raw.to_string()) {
            refs.push(AssetRef {
                raw: raw.to_string(),
                kind,
            });
        }
    };

    let Ok(selector) = Selector::parse(
        "link[href], script[src], img[src], input[src], source[srcset], [style], style",
    ) else {
        return Vec::new();
    };

    for element in document.select(&selector) {
        let node = element.value();
        match node.name() {
            "link" => {
                let kind = link_kind(node.attr("rel").unwrap_or_default(), node.attr("as"));
                if let (Some(kind), Some(href)) = (kind, node.attr("href")) {
                    push(href, kind);
                }
            }
            "script" => {
                if let Some(src) = node.attr("src") {
                    push(src, AssetKind::Script);
                }
            }
            "img" | "input" => {
                if let Some(src) = node.attr("src") {
                    push(src, AssetKind::Image);
                }
            }
            "source" => {
                for url in srcset_urls(node.attr("srcset").unwrap_or_default()) {
                    push(&url, AssetKind::Image);
                }
            }
            "style" => {
                let css: String = element.text().collect();
                for url in css_urls(&css) {
                    push(&url, AssetKind::Font);
                }
            }
            _ => {}
        }

        if let Some(style) = node.attr("style") {
            for url in css_urls(style) {
                push(&url, AssetKind::Image);
            }
        }
    }

    refs
}
