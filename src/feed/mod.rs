//! Page-to-feed conversion: fetch, extract, build.
//!
//! - [`fetcher`] - HTTP retrieval with browser-like headers and retry/backoff
//! - [`extract`] - Heuristic link extraction from page HTML
//! - [`builder`] - RSS 2.0 rendering, including the placeholder and error feeds
//! - [`types`] - The `Item` / `Channel` data model shared by all three
//!
//! # Example
//!
//! ```ignore
//! use pagefeed::feed::{build, extract, snapshot_hash, ExtractRules, Fetcher};
//!
//! let page = fetcher.fetch(&target.url).await?;
//! let items = extract(&page, &ExtractRules::for_target(&target)?);
//! let xml = build(&target.channel(), &items, &snapshot_hash(&page), Utc::now())?;
//! ```

mod builder;
mod extract;
mod fetcher;
mod types;

pub use builder::{build, build_error_feed, render, snapshot_hash, verify, ERROR_ITEM_TITLE};
pub use extract::{extract, resolve_href, ExtractRules};
pub use fetcher::{FetchError, Fetcher, RetryPolicy};
pub use types::{Channel, FeedKind, Guid, Item};
