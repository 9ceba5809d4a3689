//! Input encoding detection
//!
//! The parser reads UTF-8. Other inputs are transcoded first, going by the
//! byte order mark, then by the `encoding` pseudo-attribute of the XML
//! declaration. Without either the input is taken to be UTF-8.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use tracing::debug;

use crate::error::{Error, ErrorKind, Result, Span};

/// UTF-8 view of `bytes`, borrowed when no transcoding is needed
pub fn transcode(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    if let Some((encoding, bom)) = Encoding::for_bom(bytes) {
        if encoding == UTF_8 {
            return Ok(Cow::Borrowed(bytes));
        }
        let body = bytes.get(bom..).unwrap_or_default();
        let (text, _) = encoding.decode_without_bom_handling(body);
        return Ok(Cow::Owned(text.into_owned().into_bytes()));
    }

    let encoding = match bytes.get(..4) {
        Some([0x3C, 0x00, 0x3F, 0x00]) => UTF_16LE,
        Some([0x00, 0x3C, 0x00, 0x3F]) => UTF_16BE,
        _ => {
            let Some(label) = declared_encoding(bytes) else {
                return Ok(Cow::Borrowed(bytes));
            };
            let encoding = Encoding::for_label(label.as_bytes())
                .ok_or_else(|| malformed(&format!("Unsupported encoding {label}")))?;
            // UTF-16 labels on input that reads as ASCII are ignored
            if encoding.output_encoding() == UTF_8 {
                return Ok(Cow::Borrowed(bytes));
            }
            encoding
        }
    };

    debug!(encoding = encoding.name(), "transcoding input");
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| Cow::Owned(text.into_owned().into_bytes()))
        .ok_or_else(|| malformed("input conversion failed due to input error"))
}

/// Value of `encoding="..."` in a leading XML declaration
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let rest = bytes.strip_prefix(b"<?xml")?;
    let end = rest.windows(2).position(|pair| pair == b"?>")?;
    let decl = std::str::from_utf8(rest.get(..end)?).ok()?;
    let (_, after) = decl.split_once("encoding")?;
    let after = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = after.get(1..)?;
    value.split_once(quote).map(|(label, _)| label.to_owned())
}

fn malformed(message: &str) -> Error {
    Error::with_message(ErrorKind::MalformedXml, Span::line(1), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_input_is_borrowed() -> Result<()> {
        let input = "<?xml version=\"1.0\" encoding=\"utf-8\"?><a>é</a>".as_bytes();
        assert!(matches!(transcode(input)?, Cow::Borrowed(_)));
        assert!(matches!(transcode(b"<a/>")?, Cow::Borrowed(_)));
        Ok(())
    }

    #[test]
    fn test_declared_latin1_is_transcoded() -> Result<()> {
        let input = b"<?xml version='1.0' encoding = 'ISO-8859-1'?><a>\xe9</a>";
        let output = transcode(input)?;
        assert_eq!(
            std::str::from_utf8(&output).ok(),
            Some("<?xml version='1.0' encoding = 'ISO-8859-1'?><a>é</a>")
        );
        Ok(())
    }

    #[test]
    fn test_utf16_with_bom() -> Result<()> {
        let mut input = vec![0xFF, 0xFE];
        input.extend("<a>ü</a>".encode_utf16().flat_map(u16::to_le_bytes));
        let output = transcode(&input)?;
        assert_eq!(std::str::from_utf8(&output).ok(), Some("<a>ü</a>"));
        Ok(())
    }

    #[test]
    fn test_utf16_label_on_ascii_input_is_ignored() -> Result<()> {
        let input = b"<?xml version=\"1.0\" encoding=\"UTF-16\"?><a/>";
        assert!(matches!(transcode(input)?, Cow::Borrowed(_)));
        Ok(())
    }

    #[test]
    fn test_unknown_label() {
        let err = transcode(b"<?xml version=\"1.0\" encoding=\"X-NOPE\"?><a/>").err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("Unsupported encoding X-NOPE at line 1")
        );
    }

    #[test]
    fn test_declared_label_extraction() {
        assert_eq!(
            declared_encoding(b"<?xml version=\"1.0\" encoding=\"Shift_JIS\"?>").as_deref(),
            Some("Shift_JIS")
        );
        assert_eq!(declared_encoding(b"<?xml version=\"1.0\"?><a/>"), None);
        assert_eq!(declared_encoding(b"<a encoding=\"x\"/>"), None);
    }
}
