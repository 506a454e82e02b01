//! Streaming HTML localization with `lol_html`

use crate::adblock::AdBlocklist;
use crate::rewrite::assets::link_kind;
use crate::rewrite::css::replace_css_urls;
use crate::{MirrorError, Result};
use lol_html::html_content::ContentType;
use lol_html::{element, text, HtmlRewriter, Settings};
use std::collections::HashMap;
use url::Url;

/// Decides the local target of an internal anchor
pub trait AnchorResolver {
    /// Returns the replacement `href` for an anchor, or `None` to leave it unchanged
    fn resolve_anchor(&self, href: &str) -> Option<String>;
}

/// Everything the localization pass substitutes
pub struct Localization<'a> {
    /// URL of the page, used to resolve references before the ad-block check
    pub page_url: &'a Url,

    /// Raw asset reference -> link relative to the page
    pub assets: &'a HashMap<String, String>,

    pub blocklist: &'a AdBlocklist,

    pub anchors: &'a dyn AnchorResolver,
}

impl Localization<'_> {
    fn asset(&self, raw: &str) -> Option<&String> {
        self.assets.get(raw.trim())
    }

    fn is_blocked(&self, raw: &str) -> bool {
        self.page_url
            .join(raw.trim())
            .map(|url| self.blocklist.is_blocked_url(&url))
            .unwrap_or(false)
    }

    fn localize_srcset(&self, srcset: &str) -> String {
        srcset
            .split(',')
            .map(|candidate| {
                let trimmed = candidate.trim();
                let url = trimmed.split_whitespace().next().unwrap_or_default();
                match self.asset(url) {
                    Some(local) if !url.is_empty() => trimmed.replacen(url, local, 1),
                    _ => trimmed.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Rewrites a page in one streaming pass
///
/// Substitutes localized asset references, removes `<link>`/`<script>` elements pointing at
/// blocked hosts, and rewrites anchors through the [`AnchorResolver`]. Everything else is
/// passed through byte for byte.
pub fn localize_html(html: &str, localization: &Localization<'_>) -> Result<String> {
    let mut output = Vec::with_capacity(html.len());
    let mut style_text = String::new();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("link[href]", |el| {
                    let Some(href) = el.get_attribute("href") else {
                        return Ok(());
                    };
                    let rel = el.get_attribute("rel").unwrap_or_default();
                    if link_kind(&rel, el.get_attribute("as").as_deref()).is_none() {
                        return Ok(());
                    }
                    if localization.is_blocked(&href) {
                        el.remove();
                    } else if let Some(local) = localization.asset(&href) {
                        el.set_attribute("href", local)?;
                    }
                    Ok(())
                }),
                element!("script[src]", |el| {
                    let Some(src) = el.get_attribute("src") else {
                        return Ok(());
                    };
                    if localization.is_blocked(&src) {
                        el.remove();
                    } else if let Some(local) = localization.asset(&src) {
                        el.set_attribute("src", local)?;
                    }
                    Ok(())
                }),
                element!("img[src]", |el| {
                    if let Some(local) = el.get_attribute("src").and_then(|src| localization.asset(&src)) {
                        el.set_attribute("src", local)?;
                    }
                    Ok(())
                }),
                element!("input[src]", |el| {
                    if let Some(local) = el.get_attribute("src").and_then(|src| localization.asset(&src)) {
                        el.set_attribute("src", local)?;
                    }
                    Ok(())
                }),
                element!("source[srcset]", |el| {
                    if let Some(srcset) = el.get_attribute("srcset") {
                        el.set_attribute("srcset", &localization.localize_srcset(&srcset))?;
                    }
                    Ok(())
                }),
                element!("[style]", |el| {
                    if let Some(style) = el.get_attribute("style") {
                        let localized = replace_css_urls(&style, localization.assets);
                        if localized != style {
                            el.set_attribute("style", &localized)?;
                        }
                    }
                    Ok(())
                }),
                text!("style", |chunk| {
                    style_text.push_str(chunk.as_str());
                    if chunk.last_in_text_node() {
                        let localized = replace_css_urls(&style_text, localization.assets);
                        chunk.replace(&localized, ContentType::Html);
                        style_text.clear();
                    } else {
                        chunk.remove();
                    }
                    Ok(())
                }),
                element!("a[href]", |el| {
                    if let Some(href) = el.get_attribute("href") {
                        if let Some(local) = localization.anchors.resolve_anchor(&href) {
                            el.set_attribute("href", &local)?;
                        }
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    let rewrite_error = |e: lol_html::errors::RewritingError| MirrorError::Rewrite {
        url: localization.page_url.to_string(),
        message: e.to_string(),
    };
    rewriter.write(html.as_bytes()).map_err(rewrite_error)?;
    rewriter.end().map_err(rewrite_error)?;

    String::from_utf8(output).map_err(|e| MirrorError::Rewrite {
        url: localization.page_url.to_string(),
        message: e.to_string(),
    })
}
