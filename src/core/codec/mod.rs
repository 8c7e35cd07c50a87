//! Asset read/write protocol
//!
//! Every asset class is paired with an encoder/decoder implementing
//! [`AssetCodec`]. Implementations only need the stream pair
//! ([`AssetCodec::read_from`] / [`AssetCodec::write_to`]); the byte-buffer
//! variants are provided on top of them.
//!
//! The mapping registry stores codecs behind [`ErasedCodec`], a thin
//! non-generic view produced by [`erase`]. The erased view performs exactly
//! one runtime type check before downcasting and delegating to the typed
//! codec, so there is no duplicated logic between the two.

pub mod builtin;

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

pub use builtin::{BincodeCodec, BytesCodec, JsonCodec, TextCodec};

/// Runtime identity of an asset type
#[derive(Clone, Copy)]
pub struct AssetClass {
    type_id: TypeId,
    name: &'static str,
}

impl AssetClass {
    pub fn of<T: Any>() -> Self {
        AssetClass {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for AssetClass {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for AssetClass {}

impl std::hash::Hash for AssetClass {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetClass({})", self.name)
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// An owned, materialized asset of any registered class
pub struct AssetValue {
    class: AssetClass,
    value: Box<dyn Any + Send + Sync>,
}

impl AssetValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        AssetValue {
            class: AssetClass::of::<T>(),
            value: Box::new(value),
        }
    }

    pub fn class(&self) -> AssetClass {
        self.class
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the concrete value out, or get `self` back on mismatch
    pub fn downcast<T: Any>(self) -> std::result::Result<T, AssetValue> {
        let class = self.class;
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(AssetValue { class, value }),
        }
    }

    pub fn into_shared(self) -> SharedAsset {
        SharedAsset {
            class: self.class,
            value: Arc::from(self.value),
        }
    }

    pub(crate) fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &*self.value
    }
}

impl fmt::Debug for AssetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetValue")
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// A materialized asset shared between a lazy handle and its callers
#[derive(Clone)]
pub struct SharedAsset {
    class: AssetClass,
    value: Arc<dyn Any + Send + Sync>,
}

impl SharedAsset {
    pub fn class(&self) -> AssetClass {
        self.class
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for SharedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedAsset")
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// Encoder/decoder for one asset class
///
/// # Examples
///
/// ```
/// use iyamf::codec::AssetCodec;
/// use std::io::{Read, Write};
///
/// struct Counter(u32);
///
/// struct CounterCodec;
///
/// impl AssetCodec for CounterCodec {
///     type Asset = Counter;
///
///     fn read_from(&self, reader: &mut dyn Read) -> anyhow::Result<Counter> {
///         let mut raw = [0u8; 4];
///         reader.read_exact(&mut raw)?;
///         Ok(Counter(u32::from_le_bytes(raw)))
///     }
///
///     fn write_to(&self, asset: &Counter, writer: &mut dyn Write) -> anyhow::Result<()> {
///         writer.write_all(&asset.0.to_le_bytes())?;
///         Ok(())
///     }
/// }
///
/// let bytes = CounterCodec.serialize(&Counter(7)).unwrap();
/// assert_eq!(CounterCodec.load_from_bytes(&bytes).unwrap().0, 7);
/// ```
pub trait AssetCodec: Send + Sync + 'static {
    type Asset: Any + Send + Sync;

    fn read_from(&self, reader: &mut dyn Read) -> anyhow::Result<Self::Asset>;

    fn write_to(&self, asset: &Self::Asset, writer: &mut dyn Write) -> anyhow::Result<()>;

    fn load_from_bytes(&self, bytes: &[u8]) -> anyhow::Result<Self::Asset> {
        self.read_from(&mut Cursor::new(bytes))
    }

    fn serialize(&self, asset: &Self::Asset) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(asset, &mut buffer)?;
        Ok(buffer)
    }
}

/// Non-generic view of an [`AssetCodec`]
pub trait ErasedCodec: Send + Sync {
    /// Asset class this codec reads and writes
    fn asset_class(&self) -> AssetClass;

    /// Type name of the concrete codec
    fn codec_name(&self) -> &'static str;

    fn read_erased(&self, reader: &mut dyn Read) -> anyhow::Result<AssetValue>;

    fn load_erased(&self, bytes: &[u8]) -> anyhow::Result<AssetValue>;

    fn write_erased(&self, asset: &(dyn Any + Send + Sync), writer: &mut dyn Write)
        -> anyhow::Result<()>;

    fn serialize_erased(&self, asset: &(dyn Any + Send + Sync)) -> anyhow::Result<Vec<u8>>;
}

struct Erased<C>(C);

impl<C: AssetCodec> Erased<C> {
    fn typed<'a>(&self, asset: &'a (dyn Any + Send + Sync)) -> anyhow::Result<&'a C::Asset> {
        asset.downcast_ref::<C::Asset>().ok_or_else(|| {
            anyhow::anyhow!(
                "{} cannot encode a value that is not {}",
                type_name::<C>(),
                type_name::<C::Asset>()
            )
        })
    }
}

impl<C: AssetCodec> ErasedCodec for Erased<C> {
    fn asset_class(&self) -> AssetClass {
        AssetClass::of::<C::Asset>()
    }

    fn codec_name(&self) -> &'static str {
        type_name::<C>()
    }

    fn read_erased(&self, reader: &mut dyn Read) -> anyhow::Result<AssetValue> {
        self.0.read_from(reader).map(AssetValue::new)
    }

    fn load_erased(&self, bytes: &[u8]) -> anyhow::Result<AssetValue> {
        self.0.load_from_bytes(bytes).map(AssetValue::new)
    }

    fn write_erased(
        &self,
        asset: &(dyn Any + Send + Sync),
        writer: &mut dyn Write,
    ) -> anyhow::Result<()> {
        self.0.write_to(self.typed(asset)?, writer)
    }

    fn serialize_erased(&self, asset: &(dyn Any + Send + Sync)) -> anyhow::Result<Vec<u8>> {
        self.0.serialize(self.typed(asset)?)
    }
}

/// Wrap a typed codec for storage in the mapping registry
pub fn erase<C: AssetCodec>(codec: C) -> Arc<dyn ErasedCodec> {
    Arc::new(Erased(codec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pair {
        count: i32,
        ratio: f32,
    }

    struct PairCodec;

    impl AssetCodec for PairCodec {
        type Asset = Pair;

        fn read_from(&self, reader: &mut dyn Read) -> anyhow::Result<Pair> {
            let mut raw = [0u8; 8];
            reader.read_exact(&mut raw)?;
            Ok(Pair {
                count: i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
                ratio: f32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            })
        }

        fn write_to(&self, asset: &Pair, writer: &mut dyn Write) -> anyhow::Result<()> {
            writer.write_all(&asset.count.to_le_bytes())?;
            writer.write_all(&asset.ratio.to_le_bytes())?;
            Ok(())
        }
    }

    #[test]
    fn test_defaults_stream_through_buffer() {
        let pair = Pair {
            count: -12,
            ratio: 0.25,
        };
        let bytes = PairCodec.serialize(&pair).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(PairCodec.load_from_bytes(&bytes).unwrap(), pair);
    }

    #[test]
    fn test_decode_failure_is_reported() {
        assert!(PairCodec.load_from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_erased_round_trip() {
        let codec = erase(PairCodec);
        assert!(codec.asset_class().is::<Pair>());
        assert!(codec.codec_name().ends_with("PairCodec"));

        let value = AssetValue::new(Pair {
            count: 3,
            ratio: 1.5,
        });
        let bytes = codec.serialize_erased(value.as_any()).unwrap();
        let back = codec.load_erased(&bytes).unwrap();
        assert_eq!(back.class(), AssetClass::of::<Pair>());
        assert_eq!(
            back.downcast::<Pair>().unwrap(),
            Pair {
                count: 3,
                ratio: 1.5
            }
        );
    }

    #[test]
    fn test_erased_rejects_wrong_type() {
        let codec = erase(PairCodec);
        let wrong = AssetValue::new(String::from("not a pair"));
        assert!(codec.serialize_erased(wrong.as_any()).is_err());
    }

    #[test]
    fn test_asset_value_downcast_mismatch_returns_self() {
        let value = AssetValue::new(5u64);
        let value = value.downcast::<String>().unwrap_err();
        assert!(value.is::<u64>());
        assert_eq!(*value.downcast_ref::<u64>().unwrap(), 5);
    }

    #[test]
    fn test_shared_asset() {
        let shared = AssetValue::new(vec![1u8, 2, 3]).into_shared();
        let again = shared.clone();
        assert_eq!(*again.downcast::<Vec<u8>>().unwrap(), vec![1, 2, 3]);
        assert!(shared.downcast::<String>().is_none());
    }
}
