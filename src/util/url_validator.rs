use thiserror::Error;
use url::Url;

/// Errors that can occur when validating a configured page or base URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a URL string for use as a scrape target or link resolution base.
///
/// # Errors
///
/// Returns [`UrlValidationError`] if:
/// - The URL cannot be parsed ([`UrlValidationError::InvalidUrl`])
/// - The scheme is not `http` or `https` ([`UrlValidationError::UnsupportedScheme`])
/// - The URL has no host ([`UrlValidationError::MissingHost`])
///
/// # Examples
///
/// ```
/// use pagefeed::util::validate_url;
///
/// let url = validate_url("https://cdsco.gov.in/opencms/opencms/en/Committees/SEC/").unwrap();
/// assert_eq!(url.host_str(), Some("cdsco.gov.in"));
///
/// assert!(validate_url("file:///etc/passwd").is_err());
/// assert!(validate_url("/relative/path").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

/// Returns `true` if `url` is an absolute http(s) URL, the only kind of link
/// the feed ever emits.
pub fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.has_host()
}
