//! URL normalization applied before purging
//!
//! Draft renders carry a reading-mode query parameter (`?stage=Stage`) that
//! the CDN would treat as a different cache key. It is stripped so that draft
//! and live variants collapse to the same URL. Relative paths are turned into
//! absolute URLs because the purge API only accepts absolute ones.

use url::{Position, Url};

/// Base relative URLs are parsed against; it never appears in the output
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Parse a URL that carries its own host
///
/// Protocol-relative URLs (`//host/path`) are given the https scheme.
fn parse_absolute(url: &str) -> Option<Url> {
    let parsed = match url.strip_prefix("//") {
        Some(rest) => Url::parse(&format!("https://{}", rest)),
        None => Url::parse(url),
    };
    parsed.ok().filter(|parsed| parsed.has_host())
}

/// Append a path, query or fragment to `base`, keeping the base path
fn join_relative(base: &Url, relative: &str) -> Option<String> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(relative.trim_start_matches('/'))
        .ok()
        .map(|joined| joined.to_string())
}

/// Remove a query parameter from a URL, keeping every other parameter in order
///
/// Keys are compared after percent-decoding. URLs without the parameter are
/// returned unchanged. Relative URLs and fragments are supported.
pub fn remove_query_param(url: &str, param: &str) -> String {
    let (mut parsed, relative) = match Url::parse(url) {
        Ok(parsed) => (parsed, false),
        Err(_) => match Url::parse(RELATIVE_BASE).and_then(|base| base.join(url)) {
            Ok(parsed) => (parsed, true),
            Err(_) => return url.to_string(),
        },
    };

    let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    let kept: Vec<(&str, &str)> = pairs
        .iter()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    if kept.len() == pairs.len() {
        return url.to_string();
    }

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    if !relative {
        return parsed.to_string();
    }
    let tail = &parsed[Position::BeforePath..];
    if url.starts_with('/') {
        tail.to_string()
    } else {
        tail.strip_prefix('/').unwrap_or(tail).to_string()
    }
}

/// Remove the reading-mode parameter from every URL
pub fn remove_reading_mode(urls: &[String], param: &str) -> Vec<String> {
    urls.iter().map(|url| remove_query_param(url, param)).collect()
}

/// Whether the URL carries its own scheme and host
pub fn is_absolute(url: &str) -> bool {
    Url::parse(url).map(|parsed| parsed.has_host()).unwrap_or(false)
}

/// Replace the scheme and host of a URL with `base_url`
///
/// Absolute URLs keep their path, query and fragment; relative URLs are
/// appended to `base_url`. An unparseable `base_url` leaves the URL as is.
pub fn replace_with_base_url(url: &str, base_url: &str) -> String {
    let base = match Url::parse(base_url) {
        Ok(base) if base.has_host() => base,
        _ => return url.to_string(),
    };

    let mut parsed = match parse_absolute(url) {
        Some(parsed) => parsed,
        None => return join_relative(&base, url).unwrap_or_else(|| url.to_string()),
    };

    let base_path = base.path().trim_end_matches('/');
    if !base_path.is_empty() {
        let path = format!("{}{}", base_path, parsed.path());
        parsed.set_path(&path);
    }

    let rewritten = parsed.set_scheme(base.scheme()).is_ok()
        && parsed.set_host(base.host_str()).is_ok()
        && parsed.set_port(base.port()).is_ok();
    if rewritten {
        parsed.to_string()
    } else {
        join_relative(&base, &parsed[Position::BeforePath..]).unwrap_or_else(|| url.to_string())
    }
}

/// Make a URL absolute against `site_url`, leaving absolute URLs untouched
///
/// Protocol-relative URLs (`//host/path`) are given the https scheme.
pub fn absolute_url(url: &str, site_url: &str) -> String {
    if is_absolute(url) {
        return url.to_string();
    }
    if let Some(parsed) = parse_absolute(url) {
        return parsed.to_string();
    }
    match Url::parse(site_url) {
        Ok(site) => join_relative(&site, url).unwrap_or_else(|| url.to_string()),
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_reading_mode() {
        let cases = [
            (
                "https://example.com/record.html?stage=Stage&alternateformat=1",
                "https://example.com/record.html?alternateformat=1",
            ),
            (
                "/record.html?stage=Stage&alternateformat=1",
                "/record.html?alternateformat=1",
            ),
            ("https://example.com/record.html?stage=Stage", "https://example.com/record.html"),
            ("example.com/record.html?stage=Stage", "example.com/record.html"),
            (
                "https://example.org/record.html?alternateformat=1",
                "https://example.org/record.html?alternateformat=1",
            ),
            ("https://example.org/record/", "https://example.org/record/"),
            ("https://example.org/", "https://example.org/"),
            ("/page?a=1&stage=Live#top", "/page?a=1#top"),
        ];

        for (input, expected) in cases {
            assert_eq!(remove_query_param(input, "stage"), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_similar_param_names_are_kept() {
        assert_eq!(
            remove_query_param("/page?stages=2&stage", "stage"),
            "/page?stages=2"
        );
    }

    #[test]
    fn test_replace_with_base_url() {
        let base = "https://alt.example.com";
        let cases = [
            (
                "https://example.com/record.html?stage=Stage&alternateformat=1",
                "https://alt.example.com/record.html?stage=Stage&alternateformat=1",
            ),
            (
                "/record.html?alternateformat=1",
                "https://alt.example.com/record.html?alternateformat=1",
            ),
            ("https://example.org/record/", "https://alt.example.com/record/"),
            ("https://example.org/", "https://alt.example.com/"),
            ("https://example.org", "https://alt.example.com/"),
            ("record.html", "https://alt.example.com/record.html"),
        ];

        for (input, expected) in cases {
            assert_eq!(replace_with_base_url(input, base), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_encoded_param_name_is_removed() {
        assert_eq!(remove_query_param("/p?st%61ge=Stage", "stage"), "/p");
        assert_eq!(
            remove_query_param("https://example.com/p?a=1&st%61ge=Live", "stage"),
            "https://example.com/p?a=1"
        );
    }

    #[test]
    fn test_replace_with_base_url_port_and_path() {
        assert_eq!(
            replace_with_base_url("https://origin.example.com/a?x=1", "http://localhost:8080"),
            "http://localhost:8080/a?x=1"
        );
        assert_eq!(
            replace_with_base_url("https://origin.example.com/a", "https://www.example.com/site/"),
            "https://www.example.com/site/a"
        );
        assert_eq!(
            replace_with_base_url("/a", "https://www.example.com/site"),
            "https://www.example.com/site/a"
        );
    }

    #[test]
    fn test_replace_with_base_url_trailing_slash() {
        assert_eq!(
            replace_with_base_url("/test-page-one/", "https://another.example.com/"),
            "https://another.example.com/test-page-one/"
        );
    }

    #[test]
    fn test_absolute_url() {
        let site = "https://site.example.com/";
        assert_eq!(absolute_url("/b", site), "https://site.example.com/b");
        assert_eq!(absolute_url("b/c", site), "https://site.example.com/b/c");
        assert_eq!(absolute_url("https://other.example.com/a", site), "https://other.example.com/a");
        assert_eq!(absolute_url("//cdn.example.com/x.js", site), "https://cdn.example.com/x.js");
    }

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("http://example.com"));
        assert!(!is_absolute("/path?next=https://example.com"));
        assert!(!is_absolute("example.com/path"));
    }
}
