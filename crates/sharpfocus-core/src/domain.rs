//! Domain resolution and whitelist matching

use url::Url;

/// URL schemes whose tabs take part in overlay decisions
const WEB_SCHEMES: &[&str] = &["http", "https"];

/// Lowercase and drop a single leading `www.`
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.to_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

/// Check whether `domain` equals, or is a subdomain of, any whitelist entry.
///
/// This is a plain suffix match on normalized names; it knows nothing about
/// public suffixes.
pub fn is_domain_whitelisted<S: AsRef<str>>(domain: &str, whitelist: &[S]) -> bool {
    let domain = normalize_domain(domain);
    whitelist.iter().any(|entry| {
        let allowed = normalize_domain(entry.as_ref());
        domain == allowed || domain.ends_with(&format!(".{}", allowed))
    })
}

/// Resolve the host of a tab URL.
///
/// Returns `None` for missing or unparsable URLs and for anything that is not
/// a web page (`about:`, `chrome://`, `moz-extension://`, `file://`, ...).
pub fn tab_domain(url: Option<&str>) -> Option<String> {
    let parsed = Url::parse(url?).ok()?;
    if !WEB_SCHEMES.contains(&parsed.scheme()) {
        return None;
    }
    parsed.host_str().map(|host| host.to_string())
}

/// Whether `url` is the site's watch page
pub fn is_watch_page(url: &str, marker: &str) -> bool {
    url.contains(marker)
}
