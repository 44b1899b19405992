//! URL helpers for submission validation and link classification.

use url::Url;

/// Parse a submitted URL, accepting only absolute http(s) URLs with a host
///
/// Leading and trailing whitespace is ignored. Returns a human-readable
/// reason on rejection.
pub fn parse_audit_url(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("URL must not be empty".to_string());
    }

    let parsed = Url::parse(trimmed).map_err(|e| format!("invalid URL '{trimmed}': {e}"))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!(
            "unsupported URL scheme '{}': only http and https are audited",
            parsed.scheme()
        ));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(format!("URL '{trimmed}' has no host"));
    }

    Ok(parsed)
}

/// Check whether `href` points at the same origin as `page`
///
/// Relative hrefs resolve against `page` and are therefore internal.
/// Non-navigational schemes (mailto, tel, javascript) are never internal.
#[must_use]
pub fn is_internal_link(page: &Url, href: &str) -> bool {
    match page.join(href) {
        Ok(resolved) => {
            matches!(resolved.scheme(), "http" | "https") && resolved.origin() == page.origin()
        }
        Err(_) => false,
    }
}
