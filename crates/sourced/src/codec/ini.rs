use ini::Ini;

use super::Codec;
use crate::CodecError;

const FORMAT: &str = "ini";

/// INI configuration files, UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct IniCodec;

impl IniCodec {
    /// Build a document from default sections, for use as a compute function
    /// when there is no remote copy to fetch.
    pub fn defaults<'a, S, E>(sections: S) -> Ini
    where
        S: IntoIterator<Item = (&'a str, E)>,
        E: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut doc = Ini::new();
        for (section, entries) in sections {
            for (key, value) in entries {
                doc.with_section(Some(section)).set(key, value);
            }
        }
        doc
    }
}

impl Codec for IniCodec {
    type Artifact = Ini;

    fn serialize(&self, artifact: &Ini) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        artifact
            .write_to(&mut out)
            .map_err(|err| CodecError::encode(FORMAT, err))?;
        Ok(out)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Ini, CodecError> {
        let text = std::str::from_utf8(bytes).map_err(|err| CodecError::decode(FORMAT, err))?;
        Ini::load_from_str(text).map_err(|err| CodecError::decode(FORMAT, err))
    }
}
