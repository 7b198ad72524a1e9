//! `data:` URIs: building them from fetched payloads and decoding them back.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const DATA_URL_PREFIX: &str = "data:";

/// MIME types for the extensions capture knows how to embed.
const MIME_TYPES: [(&str, &str); 10] = [
    ("woff", "application/font-woff"),
    ("woff2", "application/font-woff"),
    ("ttf", "application/font-truetype"),
    ("eot", "application/vnd.ms-fontobject"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("tiff", "image/tiff"),
    ("svg", "image/svg+xml"),
];

pub fn is_data_url(url: &str) -> bool {
    url.trim_start()
        .get(..DATA_URL_PREFIX.len())
        .map(|p| p.eq_ignore_ascii_case(DATA_URL_PREFIX))
        .unwrap_or(false)
}

/// Extension of the last path segment, lower-cased, ignoring query and
/// fragment. Empty when there is none.
pub fn extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let segment = path.rsplit('/').next().unwrap_or("");
    match segment.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// MIME type inferred from the URL's extension; empty when unknown.
pub fn mime_type(url: &str) -> &'static str {
    let ext = extension(url);
    MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("")
}

/// `data:<mime>;base64,<payload>`
pub fn data_as_url(base64_payload: &str, mime: &str) -> String {
    format!("data:{};base64,{}", mime, base64_payload)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Payload part of a data URI (everything after the first comma).
pub fn payload(data_url: &str) -> Option<&str> {
    data_url.split_once(',').map(|(_, payload)| payload)
}

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Decode a `data:` URI following RFC 2397 (base64 or percent-encoded).
pub fn decode(url: &str) -> Result<DataUrl> {
    let url = url.trim_start();
    if !is_data_url(url) {
        return Err(Error::DecodeError("URL does not start with 'data:'".into()));
    }
    let rest = &url[DATA_URL_PREFIX.len()..];
    let (metadata, data) = rest
        .split_once(',')
        .ok_or_else(|| Error::DecodeError("missing comma in data URL".into()))?;

    let mut parts = metadata.split(';');
    let mime = parts.next().unwrap_or("").trim().to_ascii_lowercase();
    let is_base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let cleaned: String = percent_decode(data)
            .into_iter()
            .filter(|b| !b.is_ascii_whitespace())
            .map(char::from)
            .collect();
        STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| Error::DecodeError(format!("invalid base64 payload: {}", e)))?
    } else {
        percent_decode(data)
    };

    Ok(DataUrl {
        mime: if mime.is_empty() {
            "text/plain".to_string()
        } else {
            mime
        },
        bytes,
    })
}

/// Percent-decoding as URL parsers do it: a `%` not followed by two hex
/// digits is kept literally.
fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_type("http://a.com/f/font.WOFF2?v=3"), "application/font-woff");
        assert_eq!(mime_type("img/photo.jpeg#frag"), "image/jpeg");
        assert_eq!(mime_type("http://a.com/icon.svg"), "image/svg+xml");
        assert_eq!(mime_type("http://a.com/blob"), "");
        assert_eq!(mime_type("http://a.com/x.webp"), "");
    }

    #[test]
    fn builds_and_detects_data_urls() {
        let url = data_as_url(&encode_base64(b"hi"), "image/png");
        assert_eq!(url, "data:image/png;base64,aGk=");
        assert!(is_data_url(&url));
        assert!(is_data_url("DATA:,x"));
        assert!(!is_data_url("http://a.com/data:x"));
        assert_eq!(payload(&url), Some("aGk="));
    }

    #[test]
    fn decodes_base64_and_percent_encoded_payloads() {
        let decoded = decode("data:image/png;base64,aGk=").unwrap();
        assert_eq!(decoded.mime, "image/png");
        assert_eq!(decoded.bytes, b"hi");

        let decoded = decode("data:image/svg+xml;charset=utf-8,<svg>%23a%25%0A</svg>").unwrap();
        assert_eq!(decoded.mime, "image/svg+xml");
        assert_eq!(decoded.bytes, b"<svg>#a%\n</svg>");

        assert_eq!(decode("data:text/plain,100%\" %zz").unwrap().bytes, b"100%\" %zz");
        assert_eq!(decode("data:text/plain,%4").unwrap().bytes, b"%4");
        assert!(decode("http://a.com").is_err());
    }
}
