//! `data:` URI encoding and decoding

use base64::Engine;

/// Encode bytes as a base64 data URI
#[must_use]
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    let encoded_capacity = base64::encoded_len(bytes.len(), true).unwrap_or(0);
    let mut encoded = String::with_capacity(encoded_capacity + 16 + mime.len());

    encoded.push_str("data:");
    encoded.push_str(mime);
    encoded.push_str(";base64,");
    base64::engine::general_purpose::STANDARD.encode_string(bytes, &mut encoded);

    encoded
}

/// Encode SVG markup as a base64 data URI
#[must_use]
pub fn encode_svg(markup: &str) -> String {
    encode("image/svg+xml", markup.as_bytes())
}

/// Decode a data URI into its MIME type and bytes
///
/// Non-base64 payloads are percent-decoded. Returns `None` for anything that is
/// not a well-formed data URI.
#[must_use]
pub fn decode(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.trim().strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;

    let mut parts = meta.split(';');
    let mime = match parts.next() {
        Some(m) if !m.is_empty() => m.to_ascii_lowercase(),
        _ => "text/plain".to_string(),
    };
    let is_base64 = parts.any(|p| p.eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .ok()?
    } else {
        urlencoding::decode_binary(data.as_bytes()).into_owned()
    };

    Some((mime, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_png_header() {
        let bytes = [0x89, b'P', b'N', b'G'];
        let uri = encode("image/png", &bytes);
        assert_eq!(uri, "data:image/png;base64,iVBORw==");
        let (mime, decoded) = decode(&uri).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_decode_percent_encoded_svg() {
        let (mime, bytes) = decode("data:image/svg+xml,%3Csvg%2F%3E").unwrap();
        assert_eq!(mime, "image/svg+xml");
        assert_eq!(bytes, b"<svg/>");
    }

    #[test]
    fn test_decode_rejects_non_data_uri() {
        assert!(decode("https://example.com/a.png").is_none());
        assert!(decode("data:image/png;base64").is_none());
    }
}
