use chrono::{DateTime, FixedOffset};

/// Channel-level metadata of a generated feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    /// The scraped page, used as the channel `<link>`.
    pub link: String,
    pub description: String,
    /// RFC 1766 language tag, e.g. `en-IN`.
    pub language: String,
}

/// Identity of a feed entry.
///
/// Readers use the guid to decide whether they have seen an entry before.
/// `permalink` becomes the `isPermaLink` attribute: `true` when the value is
/// the entry's own URL, `false` for opaque identifiers such as content hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guid {
    pub value: String,
    pub permalink: bool,
}

impl Guid {
    pub fn permalink(link: impl Into<String>) -> Self {
        Self {
            value: link.into(),
            permalink: true,
        }
    }

    pub fn opaque(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            permalink: false,
        }
    }
}

/// A single link extracted from the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Anchor text, or the link itself when the anchor has no text.
    pub title: String,
    /// Absolute http(s) URL.
    pub link: String,
    pub guid: Guid,
    /// Date found next to the link, if any. The builder substitutes the
    /// generation time when this is `None`.
    pub pub_date: Option<DateTime<FixedOffset>>,
    pub description: String,
}

impl Item {
    /// Creates an item whose guid is its own link.
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        let link = link.into();
        Self {
            title: title.into(),
            guid: Guid::permalink(link.clone()),
            link,
            pub_date: None,
            description: String::new(),
        }
    }
}

/// Which path produced a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// At least one link survived extraction.
    Items,
    /// Nothing was recognised; a single snapshot-hash entry was written.
    Snapshot,
    /// The page could not be fetched or the feed could not be rendered.
    Error,
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FeedKind::Items => "items",
            FeedKind::Snapshot => "snapshot",
            FeedKind::Error => "error",
        };
        f.write_str(s)
    }
}
