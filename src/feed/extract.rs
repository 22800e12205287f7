use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

use crate::config::{ConfigError, Target};
use crate::feed::Item;
use crate::util::{collapse_whitespace, is_web_url, sniff_date, strip_xml_illegal};

/// Heuristics deciding which anchors on a page become feed items.
///
/// The filter is deliberately loose: a regulator's page mixes navigation,
/// document links and notices without any markup that tells them apart, so
/// some boilerplate links get through and some terse document links do not.
#[derive(Debug, Clone)]
pub struct ExtractRules {
    /// Relative hrefs are joined onto this URL.
    pub base: Url,
    /// `id` of the element that bounds the search.
    pub content_id: String,
    /// Lower-case substrings; a link containing any of them is kept.
    pub keywords: Vec<String>,
    /// Lower-case prefixes; a title starting with any of them is kept.
    pub title_prefixes: Vec<String>,
    /// A title longer than this many characters is kept.
    pub min_title_len: usize,
}

impl ExtractRules {
    pub fn for_target(target: &Target) -> Result<Self, ConfigError> {
        Ok(Self {
            base: target.resolve_base()?,
            content_id: target.content_id.clone(),
            keywords: lowercase_non_empty(&target.keywords),
            title_prefixes: lowercase_non_empty(&target.title_prefixes),
            min_title_len: target.min_title_len,
        })
    }

    /// Keyword in the link, OR title prefix match, OR a long enough title.
    pub fn is_relevant(&self, link: &str, title: &str) -> bool {
        let link_lower = link.to_lowercase();
        if self.keywords.iter().any(|k| link_lower.contains(k.as_str())) {
            return true;
        }

        let title_lower = title.to_lowercase();
        if self
            .title_prefixes
            .iter()
            .any(|p| title_lower.starts_with(p.as_str()))
        {
            return true;
        }

        title.chars().count() > self.min_title_len
    }
}

fn lowercase_non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Extracts candidate items from page HTML, in the order their anchors appear.
///
/// The search is scoped to the element whose `id` is `rules.content_id`,
/// or the whole document when the page has none. Links are de-duplicated
/// after resolution; the first anchor for a given link wins.
///
/// Never fails: the HTML parser recovers from any markup, and a page with
/// nothing recognisable simply yields no items.
pub fn extract(html: &str, rules: &ExtractRules) -> Vec<Item> {
    let document = Html::parse_document(html);
    if !document.errors.is_empty() {
        tracing::debug!(errors = document.errors.len(), "HTML parsed with recoverable errors");
    }

    let Ok(anchor_sel) = Selector::parse("a[href]") else {
        tracing::warn!("Anchor selector failed to parse, extracting nothing");
        return Vec::new();
    };

    let scope = find_by_id(&document, &rules.content_id);
    if scope.is_none() {
        tracing::debug!(
            id = %rules.content_id,
            "Content region not found, scanning whole document"
        );
    }
    let scope = scope.unwrap_or_else(|| document.root_element());

    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::new();
    let mut skipped = 0usize;

    for anchor in scope.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if is_pseudo_link(href) {
            continue;
        }

        let Some(link) = resolve_href(href, &rules.base) else {
            skipped += 1;
            continue;
        };

        let text = anchor_text(anchor);
        let title = if text.is_empty() { link.clone() } else { text };

        if !rules.is_relevant(&link, &title) {
            continue;
        }

        if !seen.insert(link.clone()) {
            continue;
        }

        let mut item = Item::new(title, link);
        item.pub_date = anchor
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|parent| sniff_date(&parent.text().collect::<Vec<_>>().join(" ")));
        items.push(item);
    }

    if skipped > 0 {
        tracing::debug!(skipped, "Anchors skipped for non-web or unresolvable hrefs");
    }
    tracing::info!(items = items.len(), "Extracted items");
    items
}

fn find_by_id<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    if id.is_empty() {
        return None;
    }
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(id))
}

/// Script pseudo-links and same-page fragments never point at a document.
fn is_pseudo_link(href: &str) -> bool {
    href.starts_with('#')
        || href
            .get(..11)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript:"))
}

/// Resolves an href to an absolute http(s) link.
///
/// Absolute hrefs are only normalised; everything else (root-relative,
/// protocol-relative, bare relative) is joined onto `base`. Returns `None`
/// for hrefs that end up with a non-web scheme such as `mailto:` or `tel:`.
pub fn resolve_href(href: &str, base: &Url) -> Option<String> {
    let resolved = match Url::parse(href) {
        Ok(absolute) => absolute,
        Err(url::ParseError::RelativeUrlWithoutBase) => base.join(href).ok()?,
        Err(_) => return None,
    };
    is_web_url(&resolved).then(|| resolved.into())
}

/// Visible text of an anchor with whitespace collapsed.
fn anchor_text(anchor: ElementRef<'_>) -> String {
    let raw: String = anchor.text().collect();
    collapse_whitespace(&strip_xml_illegal(&raw))
}
