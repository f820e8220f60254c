//! Link canonicalization.
//!
//! Every link the engine compares, stores or whitelists goes through
//! [`normalize`] first, so one canonical key exists per host+path+query.

use url::Url;

/// Canonicalize a raw link into a comparable key.
///
/// Strips an optional `http://`/`https://` scheme and a single leading `/`,
/// then reassembles `host + escaped path [+ ?query]` and strips a single
/// trailing `/`. Pure and deterministic; unparsable input degrades to the
/// stripped-but-unparsed string instead of failing.
pub fn normalize(raw: &str) -> String {
    let stripped = strip_scheme(raw.trim());
    let stripped = stripped.strip_prefix('/').unwrap_or(stripped);

    let Ok(parsed) = Url::parse(&format!("http://{stripped}")) else {
        return stripped.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return stripped.to_string();
    };

    let mut out = format!("{host}{}", parsed.path());
    if let Some(q) = parsed.query() {
        out.push('?');
        out.push_str(q);
    }

    match out.strip_suffix('/') {
        Some(trimmed) => trimmed.to_string(),
        None => out,
    }
}

/// Extract the full lower-cased host of a (normalized or raw) link.
///
/// No label collapsing happens here; suffix matching against the whitelist is
/// done at compare time so multi-level whitelist entries keep working.
pub fn extract_host(link: &str) -> String {
    let stripped = strip_scheme(link.trim());
    match Url::parse(&format!("http://{stripped}")) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| h.to_lowercase())
            .unwrap_or_else(|| stripped.to_lowercase()),
        Err(_) => stripped.to_lowercase(),
    }
}

fn strip_scheme(s: &str) -> &str {
    for scheme in ["https://", "http://"] {
        if s.len() >= scheme.len() && s[..scheme.len()].eq_ignore_ascii_case(scheme) {
            return &s[scheme.len()..];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_host_case_and_trailing_slash() {
        assert_eq!(normalize("https://Example.com/Path/"), "example.com/Path");
    }

    #[test]
    fn keeps_query_verbatim() {
        assert_eq!(
            normalize("http://example.com/p?a=1&B=2"),
            "example.com/p?a=1&B=2"
        );
    }

    #[test]
    fn drops_port() {
        assert_eq!(normalize("example.com:8080/x"), "example.com/x");
    }

    #[test]
    fn bare_host_has_no_trailing_slash() {
        assert_eq!(normalize("HTTP://example.com"), "example.com");
        assert_eq!(normalize("example.com/"), "example.com");
    }

    #[test]
    fn normalization_is_a_fixed_point() {
        for raw in [
            "https://Example.com/Path/",
            "t.me/somechannel",
            "example.com/p?a=1",
            "shop.example.co.uk/deal/",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not a fixed point: {raw}");
        }
    }

    #[test]
    fn leading_slash_is_stripped() {
        assert_eq!(normalize("/example.com/x"), "example.com/x");
    }

    #[test]
    fn host_extraction_lowercases_whole_host() {
        assert_eq!(extract_host("Shop.Example.COM/deal"), "shop.example.com");
        assert_eq!(extract_host("https://T.me/ch"), "t.me");
    }
}
