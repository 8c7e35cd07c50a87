//! Mapping registry policy tests: compatibility gate and conflict modes

use iyamf::codec::{erase, BytesCodec, JsonCodec, TextCodec};
use iyamf::mapping::{MappingItem, MappingSource};
use iyamf::{
    AssetClass, AssetValue, ConflictMode, ErrorKind, IyamfError, MappingBuilder, MappingRegistry,
};
use std::sync::Arc;
use std::thread;

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct Palette {
    colors: Vec<u32>,
}

fn first_and_second() -> (MappingItem, MappingItem) {
    (
        MappingItem::of("asset", BytesCodec),
        MappingItem::of("asset", TextCodec),
    )
}

#[test]
fn test_incompatible_set_keeps_prior_entry() {
    let registry = MappingRegistry::new();
    registry
        .set("palette", AssetClass::of::<Palette>(), erase(JsonCodec::<Palette>::new()))
        .unwrap();

    // Text codec cannot handle palettes
    let err = registry
        .set("palette", AssetClass::of::<Palette>(), erase(TextCodec))
        .unwrap_err();
    assert!(matches!(err, IyamfError::IncompatibleCodec { .. }));
    assert_eq!(err.kind(), ErrorKind::Mapping);

    let entry = registry.get("palette").unwrap();
    assert!(entry.asset_class().is::<Palette>());
    assert!(entry.codec_name().contains("JsonCodec"));
}

#[test]
fn test_incompatible_set_on_empty_key() {
    let registry = MappingRegistry::new();
    assert!(registry
        .set("blob", AssetClass::of::<Vec<u8>>(), erase(TextCodec))
        .is_err());
    let err = registry.get("blob").unwrap_err();
    assert!(matches!(err, IyamfError::UnknownAssetType(ref key) if key == "blob"));
    assert_eq!(err.kind(), ErrorKind::Mapping);
}

#[test]
fn test_conflict_override_keeps_second() {
    let registry = MappingRegistry::new();
    let (first, second) = first_and_second();
    registry.append(vec![first], ConflictMode::RaiseError).unwrap();

    let report = registry.append(vec![second], ConflictMode::Override).unwrap();
    assert_eq!(report.overridden, vec!["asset".to_string()]);
    assert!(registry.get("asset").unwrap().asset_class().is::<String>());
}

#[test]
fn test_conflict_ignore_keeps_first() {
    let registry = MappingRegistry::new();
    let (first, second) = first_and_second();
    registry.append(vec![first], ConflictMode::RaiseError).unwrap();

    let report = registry.append(vec![second], ConflictMode::Ignore).unwrap();
    assert_eq!(report.ignored, vec!["asset".to_string()]);
    assert!(registry.get("asset").unwrap().asset_class().is::<Vec<u8>>());
}

#[test]
fn test_conflict_raise_leaves_registry_unchanged() {
    let registry = MappingRegistry::new();
    let (first, second) = first_and_second();
    registry.append(vec![first], ConflictMode::RaiseError).unwrap();

    let batch = vec![MappingItem::of("fresh", TextCodec), second];
    let err = registry.append(batch, ConflictMode::RaiseError).unwrap_err();
    assert!(matches!(err, IyamfError::MappingConflict(ref key) if key == "asset"));

    // Neither the conflicting nor the fresh key was applied
    assert!(registry.get("asset").unwrap().asset_class().is::<Vec<u8>>());
    assert!(!registry.contains("fresh"));
    assert_eq!(registry.len(), 1);
}

struct ThemePlugin;

impl MappingSource for ThemePlugin {
    fn name(&self) -> &str {
        "theme-plugin"
    }

    fn mappings(&self) -> Vec<MappingItem> {
        MappingBuilder::new()
            .codec("palette", JsonCodec::<Palette>::new())
            .codec("text", BytesCodec)
            .build()
    }
}

#[test]
fn test_plugin_source_merge() {
    let registry = MappingRegistry::with_builtin();

    assert!(registry
        .append_source(&ThemePlugin, ConflictMode::RaiseError)
        .is_err());
    assert!(!registry.contains("palette"));

    let report = registry
        .append_source(&ThemePlugin, ConflictMode::Ignore)
        .unwrap();
    assert_eq!(report.inserted, vec!["palette".to_string()]);
    assert_eq!(report.ignored, vec!["text".to_string()]);
    assert!(registry.get("text").unwrap().asset_class().is::<String>());
}

#[test]
fn test_facade_round_trip() {
    let registry = MappingRegistry::with_builtin();
    registry.register("palette", JsonCodec::<Palette>::new());

    let palette = AssetValue::new(Palette {
        colors: vec![0xFF0000, 0x00FF00],
    });
    let bytes = registry.encode("palette", &palette).unwrap();
    let back = registry.decode_bytes("palette", &bytes).unwrap();
    assert_eq!(
        back.downcast::<Palette>().unwrap(),
        Palette {
            colors: vec![0xFF0000, 0x00FF00]
        }
    );

    let mut stream = Vec::new();
    registry
        .encode_to("bytes", &AssetValue::new(Vec::<u8>::new()), &mut stream)
        .unwrap();
    let empty = registry.decode("bytes", &mut stream.as_slice()).unwrap();
    assert!(empty.downcast_ref::<Vec<u8>>().unwrap().is_empty());
}

#[test]
fn test_facade_rejects_compatible_but_different_type() {
    let registry = MappingRegistry::with_builtin();
    // &str is not String: the façade does not coerce
    let err = registry
        .encode("text", &AssetValue::new("borrowed"))
        .unwrap_err();
    assert!(matches!(err, IyamfError::TypeMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::Codec);
}

#[test]
fn test_presentation_lookup_by_class() {
    let registry = MappingRegistry::with_builtin();
    registry.register("palette", JsonCodec::<Palette>::new());
    registry.register("palette.alt", JsonCodec::<Palette>::new());

    assert_eq!(
        registry.keys_for_class(AssetClass::of::<Palette>()),
        vec!["palette".to_string(), "palette.alt".to_string()]
    );
}

#[test]
fn test_concurrent_lookups_during_registration() {
    let registry = Arc::new(MappingRegistry::with_builtin());

    let writer = {
        let registry = registry.clone();
        thread::spawn(move || {
            for i in 0..200 {
                registry.register(format!("extra-{}", i), BytesCodec);
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    assert!(registry.get("text").is_ok());
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(registry.len(), 202);
}
