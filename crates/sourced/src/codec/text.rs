use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

use super::Codec;
use crate::{CodecError, ConfigError};

const FORMAT: &str = "text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Encode and decode strictly with one encoding.
    Fixed(&'static Encoding),
    /// Decode using the BOM, falling back to chardetng; encode as UTF-8.
    Detect,
}

/// Text stored in a configurable encoding (UTF-8 by default).
#[derive(Debug, Clone, Copy)]
pub struct TextCodec {
    encoding: TextEncoding,
}

impl Default for TextCodec {
    fn default() -> Self {
        Self {
            encoding: TextEncoding::Fixed(UTF_8),
        }
    }
}

impl TextCodec {
    pub fn new(encoding: TextEncoding) -> Self {
        Self { encoding }
    }

    /// Look up a WHATWG encoding label such as `"latin1"` or `"shift_jis"`.
    pub fn for_label(label: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(TextEncoding::Fixed(writable_encoding(label)?)))
    }

    pub fn detect() -> Self {
        Self::new(TextEncoding::Detect)
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }
}

impl Codec for TextCodec {
    type Artifact = String;

    fn serialize(&self, artifact: &String) -> Result<Vec<u8>, CodecError> {
        let encoding = match self.encoding {
            TextEncoding::Fixed(encoding) => encoding,
            TextEncoding::Detect => UTF_8,
        };
        let (bytes, _, had_errors) = encoding.encode(artifact);
        if had_errors {
            return Err(CodecError::encode(
                FORMAT,
                format!("text is not representable in {}", encoding.name()),
            ));
        }
        Ok(bytes.into_owned())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<String, CodecError> {
        match self.encoding {
            TextEncoding::Fixed(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned())
                .ok_or_else(|| {
                    CodecError::decode(FORMAT, format!("malformed {} input", encoding.name()))
                }),
            TextEncoding::Detect => detect_and_decode(bytes),
        }
    }
}

/// Resolve a WHATWG label to an encoding that can be both read and written.
pub(crate) fn writable_encoding(label: &str) -> Result<&'static Encoding, ConfigError> {
    let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        ConfigError::InvalidEncoding {
            label: label.to_string(),
            message: "unknown label".to_string(),
        }
    })?;
    // encoding_rs can only encode to encodings that are their own output encoding.
    if encoding.output_encoding() != encoding {
        return Err(ConfigError::InvalidEncoding {
            label: label.to_string(),
            message: format!("{} cannot be used for writing", encoding.name()),
        });
    }
    Ok(encoding)
}

/// BOM first, then chardetng.
fn detect_and_decode(bytes: &[u8]) -> Result<String, CodecError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(&bytes[bom_len..], encoding);
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    decode_with(bytes, encoding)
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<String, CodecError> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(CodecError::decode(
            FORMAT,
            format!("malformed {} input", encoding.name()),
        ));
    }
    Ok(text.into_owned())
}
