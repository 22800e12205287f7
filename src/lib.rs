//! pagefeed - turns a regulator's announcement page into an RSS 2.0 feed.
//!
//! Each run fetches one page per configured target, picks out the links that
//! look like documents or notices, and writes a feed file that feed readers
//! can poll. Runs are independent snapshots; scheduling is left to cron or CI.

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod util;
