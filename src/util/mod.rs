//! Utility functions shared by the extractor and the feed builder.
//!
//! - **Text**: whitespace collapsing and removal of characters XML cannot carry
//! - **Dates**: best-effort date sniffing from free text
//! - **URLs**: validation of configured target URLs
//!
//! # Examples
//!
//! ```
//! use pagefeed::util::{collapse_whitespace, sniff_date, validate_url};
//!
//! let url = validate_url("https://cdsco.gov.in/").unwrap();
//! let title = collapse_whitespace("  Minutes of\n the meeting ");
//! let date = sniff_date("Uploaded on 2024-05-02 (PDF 1.2 MB)");
//! assert!(date.is_some());
//! ```

mod date;
mod text;
mod url_validator;

pub use date::{or_now, parse_date_token, sniff_date};
pub use text::{collapse_whitespace, strip_xml_illegal};
pub use url_validator::{is_web_url, validate_url, UrlValidationError};
