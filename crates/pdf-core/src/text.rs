//! PDF text string encoding
//!
//! Field names and values are PDF text strings: either PDFDocEncoding
//! (a Latin-1 superset for our purposes) or UTF-16BE prefixed with a
//! byte order mark.

use lopdf::{Object, StringFormat};

const UTF16_BOM: [u8; 2] = [0xFE, 0xFF];
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Encode a Rust string as a PDF text string object
///
/// ASCII text is written as a literal string. Anything else is written as
/// UTF-16BE with a byte order mark so viewers decode it unambiguously.
pub fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }

    let mut bytes = Vec::with_capacity(2 + text.len() * 2);
    bytes.extend_from_slice(&UTF16_BOM);
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Decode the raw bytes of a PDF text string
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&UTF16_BOM) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    if let Some(rest) = bytes.strip_prefix(&UTF8_BOM) {
        return String::from_utf8_lossy(rest).into_owned();
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// Read a string or name object as text
pub(crate) fn object_to_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_literal() {
        let obj = encode_text_string("Jane Doe");
        assert!(matches!(
            obj,
            Object::String(ref bytes, StringFormat::Literal) if bytes == b"Jane Doe"
        ));
    }

    #[test]
    fn test_non_ascii_uses_utf16() {
        let obj = encode_text_string("José");
        match obj {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(&bytes[..2], &UTF16_BOM);
                assert_eq!(decode_text_string(&bytes), "José");
            }
            other => panic!("unexpected object: {:?}", other),
        }
    }

    #[test]
    fn test_decode_pdfdoc_bytes() {
        assert_eq!(decode_text_string(b"Name"), "Name");
        assert_eq!(decode_text_string(&[0x43, 0x61, 0x66, 0xE9]), "Café");
    }

    #[test]
    fn test_decode_utf8_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("สวัสดี".as_bytes());
        assert_eq!(decode_text_string(&bytes), "สวัสดี");
    }

    #[test]
    fn test_object_to_text() {
        assert_eq!(
            object_to_text(&Object::Name(b"Yes".to_vec())),
            Some("Yes".to_string())
        );
        assert_eq!(object_to_text(&Object::Integer(3)), None);
    }
}
