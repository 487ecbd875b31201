//! Token URI normalization.
//!
//! Collections publish metadata URIs in several shapes: `ipfs://CID`, HTTP
//! URLs pointing at arbitrary IPFS gateways, plain HTTP URLs, and inline
//! `data:` URIs. Everything IPFS-shaped is rewritten onto the configured
//! gateway so fetches go through one host.

use url::Url;

/// Default public gateway used when none is configured.
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io";

/// Rewrite a raw token URI onto the configured IPFS gateway.
///
/// - `ipfs://CID` becomes `<gateway>/ipfs/CID`
/// - URLs whose path starts with `/ipfs` are re-hosted on the gateway
/// - anything else passes through trimmed (including `data:` URIs)
pub fn normalize_token_uri(raw: &str, gateway: &str) -> String {
    let trimmed = raw.trim();
    let gateway = gateway.trim_end_matches('/');

    if let Some(cid) = trimmed.strip_prefix("ipfs://") {
        // Some URIs carry a redundant `ipfs/` segment after the scheme.
        let cid = cid.strip_prefix("ipfs/").unwrap_or(cid);
        return format!("{gateway}/ipfs/{cid}");
    }

    if let Ok(parsed) = Url::parse(trimmed) {
        if parsed.path().starts_with("/ipfs") {
            let mut rewritten = format!("{gateway}{}", parsed.path());
            if let Some(query) = parsed.query() {
                rewritten.push('?');
                rewritten.push_str(query);
            }
            return rewritten;
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipfs_scheme_rewritten() {
        assert_eq!(
            normalize_token_uri("ipfs://QmabcDEF/1.json", "https://gateway.example"),
            "https://gateway.example/ipfs/QmabcDEF/1.json"
        );
    }

    #[test]
    fn test_foreign_gateway_rehosted() {
        assert_eq!(
            normalize_token_uri(
                "https://other.gateway.io/ipfs/Qmabc/2.json",
                DEFAULT_IPFS_GATEWAY
            ),
            "https://ipfs.io/ipfs/Qmabc/2.json"
        );
    }

    #[test]
    fn test_plain_http_passes_through() {
        assert_eq!(
            normalize_token_uri("  https://api.example.com/token/3 ", DEFAULT_IPFS_GATEWAY),
            "https://api.example.com/token/3"
        );
    }

    #[test]
    fn test_trailing_gateway_slash() {
        assert_eq!(
            normalize_token_uri("ipfs://Qmabc", "https://ipfs.io/"),
            "https://ipfs.io/ipfs/Qmabc"
        );
    }

    #[test]
    fn test_data_uri_untouched() {
        let uri = "data:application/json;base64,eyJ9";
        assert_eq!(normalize_token_uri(uri, DEFAULT_IPFS_GATEWAY), uri);
    }
}
