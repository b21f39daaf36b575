use super::Codec;
use crate::CodecError;

/// Raw bytes, stored as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    type Artifact = Vec<u8>;

    fn serialize(&self, artifact: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(artifact.clone())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}
