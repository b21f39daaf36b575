use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

use super::Codec;
use crate::CodecError;

const FORMAT: &str = "json";

/// JSON documents, compact unless an indent width is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec {
    indent: Option<usize>,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(indent: usize) -> Self {
        Self {
            indent: Some(indent),
        }
    }
}

impl Codec for JsonCodec {
    type Artifact = Value;

    fn serialize(&self, artifact: &Value) -> Result<Vec<u8>, CodecError> {
        let Some(width) = self.indent else {
            return serde_json::to_vec(artifact).map_err(|err| CodecError::encode(FORMAT, err));
        };
        let indent = " ".repeat(width);
        let mut out = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
        artifact
            .serialize(&mut serializer)
            .map_err(|err| CodecError::encode(FORMAT, err))?;
        Ok(out)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        serde_json::from_slice(bytes).map_err(|err| CodecError::decode(FORMAT, err))
    }
}
