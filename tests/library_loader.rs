use evskim::*;

use test_harness::*;

#[test]
fn generates_once_then_reuses() {
    let harness = TestHarness::new();
    let input = harness.standard_input("in.evc", 1, 0, &[1, 2]);
    let loader = LibraryLoader::new(harness.path("cache"));
    let path = loader.library_path("_prod5");
    assert!(!path.exists());

    let library = loader.ensure(&input, "_prod5").unwrap();
    assert!(path.is_file());
    assert_eq!(library.name(), "libReadEvents_prod5");
    assert_eq!(library.len(), 2);
    assert_eq!(library.schema(&key(TRACKER)), Some(&tracker_schema()));

    // The cached copy is used even once the input is gone.
    std::fs::remove_dir_all(&input).unwrap();
    let again = loader.ensure(&input, "_prod5").unwrap();
    assert_eq!(again, library);
}

#[test]
fn suffixes_are_independent_caches() {
    let harness = TestHarness::new();
    let plain = harness.standard_input("plain.evc", 1, 0, &[1]);
    let with_truth = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(1, 0..1))
        .stream(VERTICES, vertices_schema(), vertices_records(0..1))
        .write(&harness.path("truth.evc"));
    let loader = LibraryLoader::new(harness.path("cache"));

    let a = loader.ensure(&plain, "").unwrap();
    let b = loader.ensure(&with_truth, "_truth").unwrap();
    assert_eq!(a.name(), "libReadEvents");
    assert!(a.schema(&key(VERTICES)).is_none());
    assert_eq!(b.schema(&key(VERTICES)), Some(&vertices_schema()));
}

#[test]
fn missing_input_is_schema_generation_error() {
    let harness = TestHarness::new();
    let loader = LibraryLoader::new(harness.path("cache"));
    let err = loader.ensure(harness.path("nope.evc"), "").unwrap_err();
    assert!(matches!(err, Error::SchemaGeneration { .. }));
    assert!(!loader.library_path("").exists());
}

#[test]
fn check_compares_known_streams_only() {
    let harness = TestHarness::new();
    let input = harness.standard_input("in.evc", 1, 0, &[1]);
    let library = LibraryLoader::new(harness.path("cache"))
        .ensure(&input, "")
        .unwrap();

    assert!(library.check(&key(TRACKER), &tracker_schema()).is_ok());
    assert!(matches!(
        library.check(&key(TRACKER), &tracker_schema_reordered()),
        Err(Error::SchemaMismatch { .. })
    ));
    assert!(library.check(&key(VERTICES), &vertices_schema()).is_ok());
}
