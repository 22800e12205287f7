use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, Utc};
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use sha2::{Digest, Sha256};
use std::io::Cursor;

use crate::feed::{Channel, Guid, Item};
use crate::util::{or_now, strip_xml_illegal};

/// Title of the single entry written when the page could not be turned into a feed.
pub const ERROR_ITEM_TITLE: &str = "Feed generation failed";

/// Lower-case hex SHA-256 of the fetched page.
///
/// Used as the guid of the placeholder entry when nothing was extracted, so
/// readers still see a new entry whenever the page content changes.
pub fn snapshot_hash(page: &str) -> String {
    format!("{:x}", Sha256::digest(page.as_bytes()))
}

/// Renders an RSS 2.0 document for `items`.
///
/// When `items` is empty a single placeholder entry is written instead; its
/// guid is `snapshot_hash` (not a permalink) and its description embeds the
/// hash. Items without a publication date are stamped with `now`.
pub fn build(
    channel: &Channel,
    items: &[Item],
    snapshot_hash: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    if items.is_empty() {
        let placeholder = snapshot_item(channel, snapshot_hash, now);
        return render(channel, std::slice::from_ref(&placeholder), now);
    }
    render(channel, items, now)
}

/// Renders a feed with one entry describing why the real feed is missing.
///
/// Readers polling the output file keep receiving a valid document, and the
/// failure shows up in their item list instead of going unnoticed.
pub fn build_error_feed(
    channel: &Channel,
    message: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let item = Item {
        title: ERROR_ITEM_TITLE.to_string(),
        link: channel.link.clone(),
        guid: Guid::opaque(format!("error-{}", now.timestamp())),
        pub_date: Some(now.fixed_offset()),
        description: format!(
            "Could not build the feed for {} at {}: {}",
            channel.link,
            now.to_rfc2822(),
            message
        ),
    };
    render(channel, std::slice::from_ref(&item), now)
}

fn snapshot_item(channel: &Channel, snapshot_hash: &str, now: DateTime<Utc>) -> Item {
    Item {
        title: format!(
            "Page snapshot changed at {}",
            now.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        link: channel.link.clone(),
        guid: Guid::opaque(snapshot_hash),
        pub_date: Some(now.fixed_offset()),
        description: format!(
            "No individual items were recognised on {}. Page content hash (SHA-256): {}",
            channel.link, snapshot_hash
        ),
    }
}

/// Writes the RSS 2.0 document exactly as given, with no placeholder logic.
///
/// Every text node is stripped of characters XML cannot carry and then
/// entity-escaped (`&`, `<`, `>`, `"`, `'`), links and guids included.
pub fn render(channel: &Channel, items: &[Item], now: DateTime<Utc>) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    writer
        .write_event(Event::Start(rss))
        .context("Failed to write rss element")?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .context("Failed to write channel element")?;

    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "description", &channel.description)?;
    write_text_element(&mut writer, "lastBuildDate", &now.to_rfc2822())?;
    write_text_element(&mut writer, "language", &channel.language)?;

    for item in items {
        write_item(&mut writer, item, now)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .context("Failed to write channel end")?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .context("Failed to write rss end")?;

    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).context("Generated feed contains invalid UTF-8")
}

fn write_item(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    item: &Item,
    now: DateTime<Utc>,
) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("item")))
        .context("Failed to write item element")?;

    write_text_element(writer, "title", &item.title)?;
    write_text_element(writer, "link", &item.link)?;
    write_text_element(writer, "description", &item.description)?;
    write_text_element(writer, "pubDate", &pub_date(item, now).to_rfc2822())?;

    let mut guid = BytesStart::new("guid");
    let permalink = if item.guid.permalink { "true" } else { "false" };
    guid.push_attribute(("isPermaLink", permalink));
    writer
        .write_event(Event::Start(guid))
        .context("Failed to write guid element")?;
    writer
        .write_event(Event::Text(xml_text(&item.guid.value)))
        .context("Failed to write guid text")?;
    writer
        .write_event(Event::End(BytesEnd::new("guid")))
        .context("Failed to write guid end")?;

    writer
        .write_event(Event::End(BytesEnd::new("item")))
        .context("Failed to write item end")?;
    Ok(())
}

/// Publication date as written to the feed. RFC 2822 only has room for
/// four-digit years, so anything outside `0..=9999` is replaced by `now`.
fn pub_date(item: &Item, now: DateTime<Utc>) -> DateTime<FixedOffset> {
    let date = item.pub_date.filter(|d| (0..=9999).contains(&d.year()));
    if date.is_none() && item.pub_date.is_some() {
        tracing::warn!(link = %item.link, "Publication date out of range, using build time");
    }
    or_now(date, now)
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .with_context(|| format!("Failed to write {} element", name))?;
    writer
        .write_event(Event::Text(xml_text(text)))
        .with_context(|| format!("Failed to write {} text", name))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write {} end", name))?;
    Ok(())
}

fn xml_text(text: &str) -> BytesText<'static> {
    let clean = strip_xml_illegal(text);
    BytesText::from_escaped(escape(&*clean).into_owned())
}

/// Parses a rendered document the way a feed reader would and returns its
/// entry count.
pub fn verify(xml: &str) -> Result<usize, feed_rs::parser::ParseFeedError> {
    let feed = feed_rs::parser::parse(xml.as_bytes())?;
    Ok(feed.entries.len())
}
