//! Versioned reader dispatch through real containers

use iyamf::manifest::Manifest;
use iyamf::reader::{JsonManifestV1, ManifestReader, ReaderFactory};
use iyamf::{
    ApplicationMarker, AssetContext, AssetValue, ContainerConfig, ContainerReader,
    ContainerWriter, ErrorKind, IyamfError, ManifestHead, MappingRegistry, Placement,
    ReaderRegistry, Result,
};
use semver::Version;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// JSON reader that tags the remark so tests can see which reader ran
#[derive(Default)]
struct TaggingReader;

impl ManifestReader for TaggingReader {
    fn format_version(&self) -> u8 {
        1
    }

    fn read_manifest(&self, region: &[u8], mappings: &MappingRegistry) -> Result<Manifest> {
        let mut manifest = JsonManifestV1.read_manifest(region, mappings)?;
        manifest.head.remark = "read by application reader".to_string();
        Ok(manifest)
    }
}

fn container_with_marker(context: &AssetContext, marker: u32) -> Vec<u8> {
    let head = ManifestHead::new("dispatch", "Dispatch", Version::new(1, 0, 0)).unwrap();
    let mut writer = ContainerWriter::new(context, head)
        .with_config(ContainerConfig::default().with_application_marker(marker));
    writer
        .add_asset("a", "text", &AssetValue::new(String::from("x")), Placement::Data)
        .unwrap();
    writer.to_bytes().unwrap()
}

#[test]
fn test_wildcard_resolves_any_marker() {
    let registry = ReaderRegistry::new();
    registry.register_default::<JsonManifestV1>(1, ApplicationMarker::Any);

    assert_eq!(registry.resolve(1, 77).unwrap().format_version(), 1);
    assert_eq!(registry.resolve(1, 0).unwrap().format_version(), 1);

    let err = match registry.resolve(2, 77) {
        Ok(_) => panic!("version 2 has no reader"),
        Err(e) => e,
    };
    assert!(matches!(
        err,
        IyamfError::NoMatchingImplementation {
            version: 2,
            marker: 77
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Dispatch);
}

#[test]
fn test_exact_marker_overrides_wildcard() {
    let context = AssetContext::with_builtin();
    context
        .readers
        .register_default::<TaggingReader>(1, ApplicationMarker::Exact(77));

    let marked = ContainerReader::from_bytes(container_with_marker(&context, 77), &context).unwrap();
    assert_eq!(marked.manifest().head.remark, "read by application reader");

    let other = ContainerReader::from_bytes(container_with_marker(&context, 5), &context).unwrap();
    assert_eq!(other.manifest().head.remark, "");
}

#[test]
fn test_missing_reader_is_recoverable() {
    let context = AssetContext::new(
        Arc::new(MappingRegistry::with_builtin()),
        Arc::new(ReaderRegistry::new()),
    );
    let bytes = container_with_marker(&context, 9);

    let err = ContainerReader::from_bytes(bytes.clone(), &context).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dispatch);

    // Register the missing reader and retry
    context
        .readers
        .register_default::<JsonManifestV1>(1, ApplicationMarker::Exact(9));
    let container = ContainerReader::from_bytes(bytes, &context).unwrap();
    assert_eq!(container.manifest().len(), 1);
}

#[test]
fn test_factory_invoked_per_read() {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory: ReaderFactory = {
        let calls = calls.clone();
        Arc::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::new(JsonManifestV1) as Box<dyn ManifestReader>
        })
    };

    let context = AssetContext::new(
        Arc::new(MappingRegistry::with_builtin()),
        Arc::new(ReaderRegistry::new()),
    );
    context.readers.register(1, ApplicationMarker::Any, factory);

    let bytes = container_with_marker(&context, 0);
    ContainerReader::from_bytes(bytes.clone(), &context).unwrap();
    ContainerReader::from_bytes(bytes, &context).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_wrong_format_for_version_is_structural() {
    let context = AssetContext::with_builtin();
    let bytes = container_with_marker(&context, 0);

    // A binary reader registered for version 1 cannot parse the JSON region
    context.readers.register_default::<iyamf::reader::BinaryManifestV2>(
        1,
        ApplicationMarker::Exact(0),
    );
    let err = ContainerReader::from_bytes(bytes, &context).unwrap_err();
    assert!(matches!(err, IyamfError::InvalidManifest(_)));
    assert_eq!(err.kind(), ErrorKind::Structural);
}
