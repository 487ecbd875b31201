//! Minimal ABI encoding/decoding for the three read-only calls the
//! publisher makes. Selectors are the standard ERC721/ERC721Enumerable
//! ones, precomputed so no hashing dependency is needed.

use anyhow::{bail, Context, Result};
use primitive_types::U256;

/// `totalSupply()`
pub const SELECTOR_TOTAL_SUPPLY: &str = "18160ddd";
/// `tokenByIndex(uint256)`
pub const SELECTOR_TOKEN_BY_INDEX: &str = "4f6ccce7";
/// `tokenURI(uint256)`
pub const SELECTOR_TOKEN_URI: &str = "c87b56dd";

/// Encode a function call: 4-byte selector followed by 32-byte words.
pub fn encode_call(selector: &str, args: &[U256]) -> String {
    let mut data = String::with_capacity(2 + 8 + 64 * args.len());
    data.push_str("0x");
    data.push_str(selector);
    for arg in args {
        let word: [u8; 32] = arg.to_big_endian();
        data.push_str(&hex::encode(word));
    }
    data
}

fn decode_hex(data: &str) -> Result<Vec<u8>> {
    let stripped = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(stripped).context("eth_call returned invalid hex")
}

/// Decode a single `uint256` return value.
pub fn decode_uint(data: &str) -> Result<U256> {
    let bytes = decode_hex(data)?;
    if bytes.len() < 32 {
        bail!("eth_call returned {} bytes, expected a uint256 word", bytes.len());
    }
    Ok(U256::from_big_endian(&bytes[..32]))
}

/// Decode a 32-byte word that indexes into the payload. The word is checked
/// against the payload size before narrowing, so a hostile response cannot
/// panic the decoder.
fn decode_index_word(bytes: &[u8], at: usize, what: &str) -> Result<usize> {
    let word = U256::from_big_endian(&bytes[at..at + 32]);
    if word > U256::from(bytes.len()) {
        bail!("{what} {word} out of bounds");
    }
    Ok(word.as_usize())
}

/// Decode a single dynamically-sized `string` return value.
pub fn decode_string(data: &str) -> Result<String> {
    let bytes = decode_hex(data)?;
    if bytes.len() < 64 {
        bail!("eth_call returned {} bytes, expected a string head", bytes.len());
    }

    let offset = decode_index_word(&bytes, 0, "string offset")?;
    if offset + 32 > bytes.len() {
        bail!("string offset {offset} out of bounds");
    }

    let len = decode_index_word(&bytes, offset, "string length")?;
    let start = offset + 32;
    if start + len > bytes.len() {
        bail!("string length {len} out of bounds");
    }

    String::from_utf8(bytes[start..start + len].to_vec())
        .context("eth_call returned a non-UTF-8 string")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_no_args() {
        assert_eq!(encode_call(SELECTOR_TOTAL_SUPPLY, &[]), "0x18160ddd");
    }

    #[test]
    fn test_encode_uint_arg() {
        let encoded = encode_call(SELECTOR_TOKEN_URI, &[U256::from(5u64)]);
        assert_eq!(
            encoded,
            "0xc87b56dd0000000000000000000000000000000000000000000000000000000000000005"
        );
    }

    #[test]
    fn test_decode_uint() {
        let word = format!("0x{:064x}", 1234u64);
        assert_eq!(decode_uint(&word).unwrap(), U256::from(1234u64));
    }

    #[test]
    fn test_decode_string_roundtrip() {
        // abi.encode("ipfs://Qm/7") — offset 0x20, length 11, padded data
        let payload = "ipfs://Qm/7";
        let mut data = String::from("0x");
        data.push_str(&format!("{:064x}", 0x20));
        data.push_str(&format!("{:064x}", payload.len()));
        let mut body = hex::encode(payload.as_bytes());
        while body.len() % 64 != 0 {
            body.push('0');
        }
        data.push_str(&body);

        assert_eq!(decode_string(&data).unwrap(), payload);
    }

    #[test]
    fn test_decode_uint_too_short() {
        assert!(decode_uint("0x1234").is_err());
    }

    #[test]
    fn test_decode_string_bad_offset() {
        let data = format!("0x{:064x}{:064x}", 0x4000, 0);
        assert!(decode_string(&data).is_err());
    }

    #[test]
    fn test_decode_string_offset_word_above_usize() {
        // an offset word that cannot narrow to usize must error, not panic
        let data = format!("0x{:064x}{:064x}", u128::MAX, 0u64);
        assert!(decode_string(&data).is_err());
    }

    #[test]
    fn test_decode_string_length_word_above_usize() {
        let data = format!("0x{:064x}{:064x}", 0x20, u128::MAX);
        assert!(decode_string(&data).is_err());
    }
}
