//! Direct URL validation.

use crate::errors::{PortalError, Result};
use url::Url;

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "blob"];

/// Fragments that show up when binary image metadata was stringified into a URL.
const CORRUPTED_MARKERS: &[&str] = &["Exif", "<?xpacket", "xmlns:", "JFIF", "ICC_PROFILE", "\0"];

/// Accept `raw` as a direct image URL, or explain why not.
pub fn validate_direct_url(raw: &str, max_len: usize) -> Result<String> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return Err(PortalError::invalid_resource("empty URL"));
    }
    if candidate.len() >= max_len {
        return Err(PortalError::invalid_resource(format!(
            "URL length {} exceeds limit {max_len}",
            candidate.len()
        )));
    }
    if let Some(marker) = CORRUPTED_MARKERS.iter().find(|m| candidate.contains(**m)) {
        return Err(PortalError::invalid_resource(format!(
            "URL contains corrupted metadata marker {marker:?}"
        )));
    }

    let parsed = Url::parse(candidate)
        .map_err(|e| PortalError::invalid_resource(format!("unparseable URL: {e}")))?;
    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(PortalError::invalid_resource(format!(
            "scheme {} not allowed",
            parsed.scheme()
        )));
    }
    Ok(candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 2_000;

    #[test]
    fn test_accepts_allowed_schemes() {
        assert!(validate_direct_url("https://cdn.example.org/a.png", MAX).is_ok());
        assert!(validate_direct_url("http://localhost:4943/a?canisterId=x", MAX).is_ok());
        assert!(validate_direct_url("blob:https://app.example.org/0b7e", MAX).is_ok());
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(validate_direct_url("data:image/png;base64,AAAA", MAX).is_err());
        assert!(validate_direct_url("javascript:alert(1)", MAX).is_err());
        assert!(validate_direct_url("not a url", MAX).is_err());
        assert!(validate_direct_url("  ", MAX).is_err());
    }

    #[test]
    fn test_length_limit_is_exclusive() {
        let base = "https://x.org/";
        let at_limit = format!("{base}{}", "a".repeat(MAX - base.len()));
        assert_eq!(at_limit.len(), MAX);
        assert!(validate_direct_url(&at_limit, MAX).is_err());
        assert!(validate_direct_url(&at_limit[..MAX - 1], MAX).is_ok());
    }

    #[test]
    fn test_rejects_corrupted_metadata() {
        assert!(validate_direct_url("https://x.org/Exif/MM", MAX).is_err());
        assert!(validate_direct_url("https://x.org/<?xpacket begin", MAX).is_err());
        assert!(validate_direct_url("https://x.org/a\0b", MAX).is_err());
    }
}
