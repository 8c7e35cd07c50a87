//! Built-in encoders/decoders

use super::AssetCodec;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::io::{Read, Write};
use std::marker::PhantomData;

/// Raw byte arrays, stored verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl AssetCodec for BytesCodec {
    type Asset = Vec<u8>;

    fn read_from(&self, reader: &mut dyn Read) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn write_to(&self, asset: &Vec<u8>, writer: &mut dyn Write) -> anyhow::Result<()> {
        writer.write_all(asset)?;
        Ok(())
    }

    fn load_from_bytes(&self, bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl AssetCodec for TextCodec {
    type Asset = String;

    fn read_from(&self, reader: &mut dyn Read) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        String::from_utf8(buffer).context("text asset is not valid UTF-8")
    }

    fn write_to(&self, asset: &String, writer: &mut dyn Write) -> anyhow::Result<()> {
        writer.write_all(asset.as_bytes())?;
        Ok(())
    }
}

/// Any serde type, encoded with bincode
pub struct BincodeCodec<T>(PhantomData<fn() -> T>);

impl<T> BincodeCodec<T> {
    pub fn new() -> Self {
        BincodeCodec(PhantomData)
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AssetCodec for BincodeCodec<T>
where
    T: Serialize + DeserializeOwned + Any + Send + Sync,
{
    type Asset = T;

    fn read_from(&self, reader: &mut dyn Read) -> anyhow::Result<T> {
        Ok(bincode::deserialize_from(reader)?)
    }

    fn write_to(&self, asset: &T, writer: &mut dyn Write) -> anyhow::Result<()> {
        bincode::serialize_into(writer, asset)?;
        Ok(())
    }
}

/// Any serde type, encoded as JSON
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        JsonCodec(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AssetCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Any + Send + Sync,
{
    type Asset = T;

    fn read_from(&self, reader: &mut dyn Read) -> anyhow::Result<T> {
        Ok(serde_json::from_reader(reader)?)
    }

    fn write_to(&self, asset: &T, writer: &mut dyn Write) -> anyhow::Result<()> {
        serde_json::to_writer(writer, asset)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Stats {
        level: i64,
        speed: f64,
    }

    #[test]
    fn test_bytes_round_trip() {
        for payload in [vec![], vec![0u8], (0..=255u8).collect::<Vec<_>>()] {
            let encoded = BytesCodec.serialize(&payload).unwrap();
            assert_eq!(BytesCodec.load_from_bytes(&encoded).unwrap(), payload);
        }
    }

    #[test]
    fn test_text_round_trip() {
        let text = String::from("héllo wörld");
        let encoded = TextCodec.serialize(&text).unwrap();
        assert_eq!(TextCodec.load_from_bytes(&encoded).unwrap(), text);
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        assert!(TextCodec.load_from_bytes(&[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn test_bincode_round_trip() {
        let codec = BincodeCodec::<Stats>::new();
        let stats = Stats {
            level: 42,
            speed: 3.5,
        };
        let encoded = codec.serialize(&stats).unwrap();
        assert_eq!(codec.load_from_bytes(&encoded).unwrap(), stats);
        assert!(codec.load_from_bytes(&encoded[..4]).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let codec = JsonCodec::<Stats>::new();
        let stats = Stats {
            level: -1,
            speed: 0.125,
        };
        let encoded = codec.serialize(&stats).unwrap();
        assert!(std::str::from_utf8(&encoded).unwrap().contains("\"level\":-1"));
        assert_eq!(codec.load_from_bytes(&encoded).unwrap(), stats);
    }
}
