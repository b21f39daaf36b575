//! Format adapters turning artifacts into cache-file bytes and back.
mod binary;
mod csv;
mod ini;
mod json;
mod text;

pub use self::binary::BinaryCodec;
pub use self::csv::CsvCodec;
pub use self::ini::IniCodec;
pub use self::json::JsonCodec;
pub use self::text::{TextCodec, TextEncoding};

use crate::CodecError;

/// Serialize/deserialize pair for one on-disk format.
///
/// `deserialize(serialize(x))` must give back a value equal to `x`.
pub trait Codec {
    type Artifact;

    fn serialize(&self, artifact: &Self::Artifact) -> Result<Vec<u8>, CodecError>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Artifact, CodecError>;
}
