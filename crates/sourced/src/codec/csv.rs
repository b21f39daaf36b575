use std::collections::BTreeMap;
use std::io::Read;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use encoding_rs::{Encoding, UTF_8};
use serde::de::DeserializeOwned;

use super::text::writable_encoding;
use super::Codec;
use crate::{CodecError, ConfigError};

const FORMAT: &str = "csv";

/// Delimited rows. Rows may differ in length.
///
/// As a [`Codec`] every row, including any header row, is a plain record. The
/// `read_*` helpers are meant for file actions that consume the open cache
/// file directly. Files are UTF-8 unless another encoding is set; decoding is
/// strict in either case.
#[derive(Debug, Clone, Copy)]
pub struct CsvCodec {
    delimiter: u8,
    encoding: &'static Encoding,
}

impl Default for CsvCodec {
    fn default() -> Self {
        Self {
            delimiter: b',',
            encoding: UTF_8,
        }
    }
}

impl CsvCodec {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            ..Self::default()
        }
    }

    /// Read and write the cache file in the encoding named by a WHATWG label.
    pub fn encoding_label(mut self, label: &str) -> Result<Self, ConfigError> {
        self.encoding = writable_encoding(label)?;
        Ok(self)
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn reader<R: Read>(&self, input: R, has_headers: bool) -> csv::Reader<R> {
        ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(has_headers)
            .flexible(true)
            .from_reader(input)
    }

    /// The whole input as UTF-8 bytes.
    fn utf8(&self, mut input: impl Read) -> Result<Vec<u8>, CodecError> {
        let mut raw = Vec::new();
        input
            .read_to_end(&mut raw)
            .map_err(|err| CodecError::decode(FORMAT, err))?;
        if self.encoding == UTF_8 {
            return Ok(raw);
        }
        self.encoding
            .decode_without_bom_handling_and_without_replacement(&raw)
            .map(|text| text.into_owned().into_bytes())
            .ok_or_else(|| {
                CodecError::decode(FORMAT, format!("malformed {} input", self.encoding.name()))
            })
    }

    /// All rows, header included.
    pub fn read_records(&self, input: impl Read) -> Result<Vec<StringRecord>, CodecError> {
        let bytes = self.utf8(input)?;
        self.reader(bytes.as_slice(), false)
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| CodecError::decode(FORMAT, err))
    }

    /// One map per data row, keyed by the header row.
    pub fn read_dicts(
        &self,
        input: impl Read,
    ) -> Result<Vec<BTreeMap<String, String>>, CodecError> {
        self.read_typed(input)
    }

    /// Data rows deserialized with serde, matching fields by header name.
    pub fn read_typed<T: DeserializeOwned>(&self, input: impl Read) -> Result<Vec<T>, CodecError> {
        let bytes = self.utf8(input)?;
        self.reader(bytes.as_slice(), true)
            .deserialize()
            .collect::<Result<Vec<T>, _>>()
            .map_err(|err| CodecError::decode(FORMAT, err))
    }
}

impl Codec for CsvCodec {
    type Artifact = Vec<StringRecord>;

    fn serialize(&self, artifact: &Vec<StringRecord>) -> Result<Vec<u8>, CodecError> {
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_writer(Vec::new());
        for record in artifact {
            writer
                .write_record(record)
                .map_err(|err| CodecError::encode(FORMAT, err))?;
        }
        let utf8 = writer
            .into_inner()
            .map_err(|err| CodecError::encode(FORMAT, err))?;
        if self.encoding == UTF_8 {
            return Ok(utf8);
        }
        let text = String::from_utf8(utf8).map_err(|err| CodecError::encode(FORMAT, err))?;
        let (bytes, _, had_errors) = self.encoding.encode(&text);
        if had_errors {
            return Err(CodecError::encode(
                FORMAT,
                format!("rows are not representable in {}", self.encoding.name()),
            ));
        }
        Ok(bytes.into_owned())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vec<StringRecord>, CodecError> {
        self.read_records(bytes)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<StringRecord> {
        data.iter().map(|row| StringRecord::from(row.to_vec())).collect()
    }

    #[test]
    fn records_round_trip_with_quoting() {
        let codec = CsvCodec::default();
        let table = rows(&[
            &["company", "raised"],
            &["Acme, Inc.", "100"],
            &["\"Quoted\"", ""],
            &["short"],
        ]);
        let bytes = codec.serialize(&table).unwrap();
        assert_eq!(codec.deserialize(&bytes).unwrap(), table);
    }

    #[test]
    fn custom_delimiter() {
        let codec = CsvCodec::with_delimiter(b';');
        let bytes = codec.serialize(&rows(&[&["a", "b"]])).unwrap();
        assert_eq!(bytes, b"a;b\n");
    }

    #[test]
    fn dicts_are_keyed_by_header() {
        let data = "name,city\nada,london\n";
        let dicts = CsvCodec::default().read_dicts(data.as_bytes()).unwrap();
        assert_eq!(dicts.len(), 1);
        assert_eq!(dicts[0]["name"], "ada");
        assert_eq!(dicts[0]["city"], "london");
    }

    #[test]
    fn latin1_file_reads_as_dicts() {
        let codec = CsvCodec::default().encoding_label("latin1").unwrap();
        let data: &[u8] = b"name,city\nJos\xe9,M\xe1laga\n";
        let dicts = codec.read_dicts(data).unwrap();
        assert_eq!(dicts[0]["name"], "José");
        assert_eq!(dicts[0]["city"], "Málaga");
    }

    #[test]
    fn latin1_rows_are_written_in_latin1() {
        let codec = CsvCodec::default().encoding_label("latin1").unwrap();
        let table = rows(&[&["café", "1"]]);
        let bytes = codec.serialize(&table).unwrap();
        assert_eq!(bytes, b"caf\xe9,1\n");
        assert_eq!(codec.deserialize(&bytes).unwrap(), table);
    }

    #[test]
    fn utf8_codec_rejects_latin1_bytes() {
        let err = CsvCodec::default()
            .read_records(&b"Jos\xe9\n"[..])
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode { format: "csv", .. }));
        assert!(CsvCodec::default().encoding_label("klingon").is_err());
    }

    #[test]
    fn typed_rows_use_serde() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Funding {
            company: String,
            raised: u64,
        }

        let data = "company,raised\nacme,100\nglobex,250\n";
        let typed: Vec<Funding> = CsvCodec::default().read_typed(data.as_bytes()).unwrap();
        assert_eq!(
            typed,
            vec![
                Funding {
                    company: "acme".into(),
                    raised: 100
                },
                Funding {
                    company: "globex".into(),
                    raised: 250
                },
            ]
        );
    }
}
