//! Inline `data:` URI decoding.
//!
//! Some collections embed the whole metadata document in the token URI
//! instead of hosting it. These never touch the network: the body is decoded
//! in place and handed straight to the parser.

/// Decode a `data:` URI into its body, if the input is one.
///
/// Supports base64 and URL-encoded payloads with any media type; returns
/// `None` for non-`data:` inputs and for malformed payloads.
pub fn decode_data_uri(uri: &str) -> Option<String> {
    if !uri.starts_with("data:") {
        return None;
    }

    // `#` inside inline JSON would be treated as a fragment by URL parsers.
    let uri = uri.replace('#', "%23");

    let comma_pos = uri.find(',')?;
    let header = &uri[5..comma_pos];
    let body = &uri[comma_pos + 1..];

    if header.contains("base64") {
        return base64_decode(body);
    }

    let decoded = urlencoding::decode(body)
        .unwrap_or_else(|_| body.into())
        .into_owned();
    Some(decoded)
}

fn base64_decode(input: &str) -> Option<String> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(input)
        .ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_json() {
        let uri = "data:application/json;base64,eyJuYW1lIjoidGVzdCJ9";
        assert_eq!(decode_data_uri(uri), Some(r#"{"name":"test"}"#.to_string()));
    }

    #[test]
    fn test_url_encoded_json() {
        let uri = "data:application/json,%7B%22name%22%3A%22test%22%7D";
        assert_eq!(decode_data_uri(uri), Some(r#"{"name":"test"}"#.to_string()));
    }

    #[test]
    fn test_not_a_data_uri() {
        assert_eq!(decode_data_uri("https://example.com/1.json"), None);
    }

    #[test]
    fn test_missing_comma() {
        assert_eq!(decode_data_uri("data:application/json;base64"), None);
    }
}
