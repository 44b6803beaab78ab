// # Shared State Codec
//
// Turns the JSON text of the shared document into the TXT record value and
// back.
//
// ## Wire Format
//
// ```text
// encode: JSON -> encrypt (optional) -> DEFLATE -> base64 -> "..."
// decode: "..." -> base64 -> INFLATE -> decrypt (optional) -> JSON
// ```
//
// One pair of surrounding quotes is stripped on decode when present; DNS
// providers return TXT values quoted. A value that is empty after stripping
// decodes to an empty string.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use super::cipher;
use crate::error::{Error, Result};

/// Encode a JSON document as a quoted TXT record value
///
/// `password` enables encryption; `None` stores the compressed plaintext.
pub fn encode(plaintext: &str, password: Option<&str>) -> Result<String> {
    let bytes = match password {
        Some(password) => cipher::encrypt(password, plaintext.as_bytes())?,
        None => plaintext.as_bytes().to_vec(),
    };

    let compressed = compress(&bytes)?;
    Ok(format!("\"{}\"", STANDARD.encode(compressed)))
}

/// Decode a TXT record value produced by [`encode`]
///
/// # Errors
///
/// [`Error::SharedState`] if any step fails: invalid base64, invalid DEFLATE
/// stream, failed decryption or non UTF-8 plaintext.
pub fn decode(value: &str, password: Option<&str>) -> Result<String> {
    let value = strip_quotes(value.trim());
    if value.is_empty() {
        return Ok(String::new());
    }

    let compressed = STANDARD
        .decode(value)
        .map_err(|e| Error::shared_state(format!("Shared state is not valid base64: {e}")))?;

    let bytes = decompress(&compressed)?;

    let plaintext = match password {
        Some(password) => cipher::decrypt(password, &bytes)?,
        None => bytes,
    };

    String::from_utf8(plaintext)
        .map_err(|e| Error::shared_state(format!("Shared state is not valid UTF-8: {e}")))
}

/// Strip one pair of surrounding literal quotes
pub fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::shared_state(format!("Compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| Error::shared_state(format!("Compression failed: {e}")))
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::shared_state(format!("Shared state is not valid DEFLATE data: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_including_empty() {
        for text in ["", "[]", "[{\"name\":\"a\",\"ip\":\"1.2.3.4\"}]", "ünïcødé ✓"] {
            let encrypted = encode(text, Some("pw")).unwrap();
            assert_eq!(decode(&encrypted, Some("pw")).unwrap(), text);

            let plain = encode(text, None).unwrap();
            assert_eq!(decode(&plain, None).unwrap(), text);
        }
    }

    #[test]
    fn test_value_is_quoted_base64() {
        let value = encode("[]", Some("pw")).unwrap();
        assert!(value.starts_with('"') && value.ends_with('"'));
        assert!(STANDARD.decode(strip_quotes(&value)).is_ok());
    }

    #[test]
    fn test_empty_values_decode_to_empty() {
        assert_eq!(decode("", Some("pw")).unwrap(), "");
        assert_eq!(decode("\"\"", Some("pw")).unwrap(), "");
        assert_eq!(decode("  ", None).unwrap(), "");
    }

    #[test]
    fn test_strip_quotes_only_strips_one_pair() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("\"\"abc\"\""), "\"abc\"");
        assert_eq!(strip_quotes("abc"), "abc");
        assert_eq!(strip_quotes("\"abc"), "\"abc");
    }

    #[test]
    fn test_garbage_is_fatal() {
        assert!(decode("\"not base64!!\"", Some("pw")).is_err());

        let not_deflate = format!("\"{}\"", STANDARD.encode([0xffu8; 32]));
        assert!(decode(&not_deflate, Some("pw")).is_err());

        let value = encode("[]", Some("right")).unwrap();
        assert!(decode(&value, Some("wrong")).is_err());
    }
}
