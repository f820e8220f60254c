//! Whitelist domain matching.

use crate::normalize::extract_host;

/// Right-aligned label match: every label of `white` must equal the label at
/// the same position counting from the end of `host`. `shop.example.com`
/// matches whitelist `example.com`; `notexample.com` does not.
pub fn domain_match(host: &str, white: &str) -> bool {
    let host_labels: Vec<&str> = host.split('.').collect();
    let white_labels: Vec<&str> = white.split('.').collect();

    if host_labels.len() < white_labels.len() {
        return false;
    }

    host_labels
        .iter()
        .rev()
        .zip(white_labels.iter().rev())
        .all(|(h, w)| h == w)
}

/// Check a normalized link against the whitelist. First match wins.
pub fn is_whitelisted(link: &str, whitelist: &[String]) -> bool {
    let host = extract_host(link);
    whitelist.iter().any(|white| domain_match(&host, white))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_domain_matches() {
        assert!(domain_match("example.com", "example.com"));
    }

    #[test]
    fn subdomain_matches_suffix() {
        assert!(domain_match("shop.example.com", "example.com"));
        assert!(domain_match("a.b.example.com", "example.com"));
    }

    #[test]
    fn substring_is_not_a_suffix() {
        assert!(!domain_match("notexample.com", "example.com"));
    }

    #[test]
    fn whitelisted_domain_in_the_middle_does_not_match() {
        assert!(!domain_match("example.com.evil.net", "example.com"));
    }

    #[test]
    fn shorter_host_never_matches_longer_whitelist_entry() {
        assert!(!domain_match("example.com", "shop.example.com"));
    }

    #[test]
    fn link_whitelisting_uses_the_host_only() {
        let whitelist = vec!["example.com".to_string()];
        assert!(is_whitelisted("shop.example.com/deal?x=1", &whitelist));
        assert!(!is_whitelisted("evil.net/example.com", &whitelist));
        assert!(!is_whitelisted("example.com.evil.net/x", &whitelist));
    }

    #[test]
    fn empty_whitelist_matches_nothing() {
        assert!(!is_whitelisted("example.com", &[]));
    }
}
