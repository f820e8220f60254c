//! Input validation for admin-supplied keywords, domains and prompt replies.
//!
//! Rejections happen before anything reaches the store.

use regex::Regex;
use std::sync::OnceLock;

use crate::{errors::Error, Result};

const MAX_KEYWORD_LEN: usize = 100;
const MAX_DOMAIN_LEN: usize = 253;
const MAX_PROMPT_LEN: usize = 100;
const MAX_REPLY_LEN: usize = 1000;

const DISALLOWED: &[char] = &['\'', '"', ';', '\\'];

pub fn validate_keyword(keyword: &str) -> Result<()> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(Error::Validation("keyword must not be empty".to_string()));
    }
    if keyword.chars().count() > MAX_KEYWORD_LEN {
        return Err(Error::Validation(format!(
            "keyword must be at most {MAX_KEYWORD_LEN} characters"
        )));
    }
    if keyword.contains(DISALLOWED) {
        return Err(Error::Validation(
            "keyword contains disallowed characters".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_domain(domain: &str) -> Result<()> {
    let domain = domain.trim().to_lowercase();
    if domain.is_empty() {
        return Err(Error::Validation("domain must not be empty".to_string()));
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(Error::Validation(format!(
            "domain must be at most {MAX_DOMAIN_LEN} characters"
        )));
    }
    if !domain_pattern().is_match(&domain) {
        return Err(Error::Validation(format!("invalid domain: {domain}")));
    }
    Ok(())
}

pub fn validate_prompt(prompt: &str, reply: &str) -> Result<()> {
    let prompt = prompt.trim();
    let reply = reply.trim();
    if prompt.is_empty() || reply.is_empty() {
        return Err(Error::Validation(
            "prompt and reply must not be empty".to_string(),
        ));
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err(Error::Validation(format!(
            "prompt must be at most {MAX_PROMPT_LEN} characters"
        )));
    }
    if reply.chars().count() > MAX_REPLY_LEN {
        return Err(Error::Validation(format!(
            "reply must be at most {MAX_REPLY_LEN} characters"
        )));
    }
    if prompt.contains(DISALLOWED) || reply.contains(DISALLOWED) {
        return Err(Error::Validation(
            "prompt or reply contains disallowed characters".to_string(),
        ));
    }
    Ok(())
}

fn domain_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("domain pattern")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_blank_keywords() {
        assert!(validate_keyword("").is_err());
        assert!(validate_keyword("   ").is_err());
        assert!(validate_keyword("spam").is_ok());
    }

    #[test]
    fn rejects_overlong_keyword() {
        assert!(validate_keyword(&"x".repeat(101)).is_err());
        assert!(validate_keyword(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn rejects_quote_characters() {
        assert!(validate_keyword("a'b").is_err());
        assert!(validate_keyword(r#"a"b"#).is_err());
        assert!(validate_keyword(r"a\b").is_err());
    }

    #[test]
    fn validates_domains() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("shop.example.co.uk").is_ok());
        assert!(validate_domain("EXAMPLE.COM").is_ok());
        assert!(validate_domain("-bad.com").is_err());
        assert!(validate_domain("bad-.com").is_err());
        assert!(validate_domain("ex ample.com").is_err());
        assert!(validate_domain("").is_err());
    }

    #[test]
    fn validates_prompt_and_reply_lengths() {
        assert!(validate_prompt("hi", "hello there").is_ok());
        assert!(validate_prompt("", "reply").is_err());
        assert!(validate_prompt("p", "").is_err());
        assert!(validate_prompt(&"p".repeat(101), "r").is_err());
        assert!(validate_prompt("p", &"r".repeat(1001)).is_err());
    }
}
