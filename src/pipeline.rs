//! One run for one target: fetch → extract → build → write.
//!
//! Every failure after configuration is turned into feed content rather than
//! an error: an unreachable page or an unrenderable feed produces an
//! error-notice feed, and a page with nothing recognisable produces the
//! snapshot placeholder. The only error [`run_target`] returns is a failure
//! to render the error-notice feed itself.
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::config::Target;
use crate::feed::{
    build, build_error_feed, extract, snapshot_hash, verify, Channel, ExtractRules, FeedKind,
    Fetcher,
};

/// Outcome of a single target run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub target: String,
    pub kind: FeedKind,
    /// Extracted items written; zero for the placeholder and error feeds.
    pub items: usize,
    /// The rendered RSS document.
    pub xml: String,
}

/// Fetches the target page and renders its feed.
///
/// `now` is used both as the channel `lastBuildDate` and as the `pubDate` of
/// items that have no date of their own.
pub async fn run_target(
    fetcher: &Fetcher,
    target: &Target,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    let channel = target.channel();

    let page = match fetcher.fetch(&target.url).await {
        Ok(page) => page,
        Err(e) => {
            tracing::error!(target = %target.name, error = %e, "Fetch failed, writing error feed");
            return error_report(target, &channel, &e.to_string(), now);
        }
    };

    match render_page(&page, target, &channel, now) {
        Ok((kind, items, xml)) => {
            tracing::info!(target = %target.name, kind = %kind, items, "Feed rendered");
            Ok(RunReport {
                target: target.name.clone(),
                kind,
                items,
                xml,
            })
        }
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::error!(
                target = %target.name,
                error = %message,
                "Rendering failed, writing error feed"
            );
            error_report(target, &channel, &message, now)
        }
    }
}

fn render_page(
    page: &str,
    target: &Target,
    channel: &Channel,
    now: DateTime<Utc>,
) -> Result<(FeedKind, usize, String)> {
    let rules = ExtractRules::for_target(target)?;
    let items = extract(page, &rules);
    let hash = snapshot_hash(page);

    let kind = if items.is_empty() {
        tracing::warn!(
            target = %target.name,
            hash = %hash,
            "No items recognised, writing snapshot placeholder"
        );
        FeedKind::Snapshot
    } else {
        FeedKind::Items
    };

    let xml = build(channel, &items, &hash, now)?;
    match verify(&xml) {
        Ok(entries) => tracing::debug!(entries, "Rendered feed parses"),
        Err(e) => bail!("rendered feed does not parse: {}", e),
    }

    Ok((kind, items.len(), xml))
}

fn error_report(
    target: &Target,
    channel: &Channel,
    message: &str,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    let xml = build_error_feed(channel, message, now)
        .with_context(|| format!("Failed to render error feed for target '{}'", target.name))?;
    Ok(RunReport {
        target: target.name.clone(),
        kind: FeedKind::Error,
        items: 0,
        xml,
    })
}

/// Writes the feed to `path`, replacing any existing file.
///
/// Writes to a temporary file in the same directory, syncs it to disk, then
/// renames it over the destination, so a reader polling the file never sees
/// a partial document. Missing parent directories are created.
pub fn write_feed(path: &Path, xml: &str) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory '{}'", parent.display()))?;
    }

    // Randomized temp filename so concurrent runs never share one
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    std::io::Write::write_all(&mut file, xml.as_bytes()).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to write feed to temporary file '{}'", temp_path.display())
    })?;

    file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk",
            temp_path.display()
        )
    })?;

    drop(file);

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if path.exists() {
        std::fs::remove_file(path).with_context(|| {
            let _ = std::fs::remove_file(&temp_path);
            format!("Failed to remove existing '{}' before replace", path.display())
        })?;
    }

    std::fs::rename(&temp_path, path).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            path.display()
        )
    })?;

    tracing::info!(path = %path.display(), bytes = xml.len(), "Wrote feed");
    Ok(())
}
