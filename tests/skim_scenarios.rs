use evskim::*;

use test_harness::*;

fn skimmer<S: Selection>(inputs: Vec<std::path::PathBuf>, output: &std::path::Path, selection: S) -> Skimmer<S> {
    Skimmer::builder(inputs, output, selection)
        .catalog(small_catalog())
        .report_progress(false)
        .build()
}

fn min_tracks(min: f64) -> FieldThreshold {
    FieldThreshold::new(key(TRACKER), "NTracks", min)
}

#[test]
fn accept_all_concatenates_inputs_in_order() {
    let harness = TestHarness::new();
    let tracks = vec![2; 100];
    let first = harness.standard_input("a.evc", 6001, 0, &tracks);
    let second = harness.standard_input("b.evc", 6002, 100, &tracks);
    let output = harness.path("out.evc");

    let summary = skimmer(vec![first, second], &output, AcceptAll).run().unwrap();
    assert_eq!(summary.inputs_used, 2);
    assert_eq!(summary.events_read, 200);
    assert_eq!(summary.events_selected, 200);
    assert_eq!(
        summary.stream_entries,
        vec![(key(HEADER), 200), (key(TRACKER), 200)]
    );

    let expected: Vec<i64> = (0..200).collect();
    assert_eq!(read_i64_branch(&output, HEADER, "EventID"), expected);
    assert_eq!(read_i64_branch(&output, TRACKER, "EventID"), expected);
    let runs = read_i64_branch(&output, HEADER, "RunID");
    assert!(runs[..100].iter().all(|&r| r == 6001));
    assert!(runs[100..].iter().all(|&r| r == 6002));

    let manifest = Container::open(&output).unwrap().manifest().clone();
    assert_eq!(manifest.state, ContainerState::Finalized);
}

#[test]
fn only_input_missing_required_stream_produces_nothing() {
    let harness = TestHarness::new();
    let input = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(1, 0..10))
        .write(&harness.path("no_tracker.evc"));
    let output = harness.path("out.evc");

    let err = skimmer(vec![input], &output, AcceptAll).run().unwrap_err();
    assert!(matches!(err, Error::NoUsableInput { .. }));
    assert!(!output.exists());
}

#[test]
fn threshold_selects_matching_positions() {
    let harness = TestHarness::new();
    let input = harness.standard_input("in.evc", 1, 0, &[1, 5, 2, 3]);
    let output = harness.path("out.evc");

    let summary = skimmer(vec![input], &output, min_tracks(3.0)).run().unwrap();
    assert_eq!(summary.events_read, 4);
    assert_eq!(summary.events_selected, 2);
    assert_eq!(read_i64_branch(&output, HEADER, "EventID"), vec![1, 3]);
    assert_eq!(read_i64_branch(&output, TRACKER, "NTracks"), vec![5, 3]);
}

#[test]
fn shortest_stream_bounds_the_input() {
    let harness = TestHarness::new();
    let input = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(1, 0..50))
        .stream(TRACKER, tracker_schema(), tracker_records(0, &[1; 47]))
        .write(&harness.path("short.evc"));
    let output = harness.path("out.evc");

    let summary = skimmer(vec![input], &output, AcceptAll).run().unwrap();
    assert_eq!(summary.events_read, 47);
    assert_eq!(
        summary.stream_entries,
        vec![(key(HEADER), 47), (key(TRACKER), 47)]
    );
}

#[test]
fn identical_runs_are_byte_identical() {
    let mut harness = TestHarness::new();
    let tracks_a = harness.random_tracks(300);
    let tracks_b = harness.random_tracks(200);
    let a = harness.standard_input("a.evc", 1, 0, &tracks_a);
    let b = harness.standard_input("b.evc", 2, 300, &tracks_b);

    let out1 = harness.path("out1.evc");
    let out2 = harness.path("out2.evc");
    skimmer(vec![a.clone(), b.clone()], &out1, min_tracks(2.0)).run().unwrap();
    skimmer(vec![a, b], &out2, min_tracks(2.0)).run().unwrap();

    assert_eq!(snapshot(&out1), snapshot(&out2));
}

#[test]
fn output_streams_come_from_first_usable_input() {
    let harness = TestHarness::new();
    // First input is unusable (no tracker), so the second one defines the layout.
    let unusable = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(1, 0..5))
        .stream(VERTICES, vertices_schema(), vertices_records(0..5))
        .write(&harness.path("unusable.evc"));
    let defining = harness.standard_input("defining.evc", 2, 0, &[1, 2, 3]);
    let with_vertices = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(3, 3..6))
        .stream(TRACKER, tracker_schema(), tracker_records(3, &[1, 1, 1]))
        .stream(VERTICES, vertices_schema(), vertices_records(3..6))
        .write(&harness.path("with_vertices.evc"));
    let output = harness.path("out.evc");

    let summary = skimmer(vec![unusable, defining, with_vertices], &output, AcceptAll)
        .run()
        .unwrap();
    assert_eq!(summary.inputs_used, 2);
    assert_eq!(summary.skipped.len(), 1);
    assert!(summary.skipped[0].reason.contains("ReconDir/Tracker"));

    let container = Container::open(&output).unwrap();
    let keys: Vec<_> = container.keys().cloned().collect();
    assert_eq!(keys, vec![key(HEADER), key(TRACKER)]);
    assert_eq!(container.entries(&key(HEADER)), Some(6));
    assert_eq!(container.entries(&key(TRACKER)), Some(6));
}

#[test]
fn optional_stream_absent_later_gets_no_appends_for_that_input() {
    let harness = TestHarness::new();
    let first = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(1, 0..4))
        .stream(TRACKER, tracker_schema(), tracker_records(0, &[1, 1, 1, 1]))
        .stream(VERTICES, vertices_schema(), vertices_records(0..4))
        .write(&harness.path("first.evc"));
    let second = harness.standard_input("second.evc", 2, 4, &[1, 1, 1]);
    let third = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(3, 7..9))
        .stream(TRACKER, tracker_schema(), tracker_records(7, &[1, 1]))
        .stream(VERTICES, vertices_schema(), vertices_records(7..9))
        .write(&harness.path("third.evc"));
    let output = harness.path("out.evc");

    let summary = skimmer(vec![first, second, third], &output, AcceptAll)
        .run()
        .unwrap();
    assert_eq!(summary.inputs_used, 3);
    assert_eq!(
        summary.stream_entries,
        vec![(key(HEADER), 9), (key(TRACKER), 9), (key(VERTICES), 6)]
    );
    assert_eq!(
        read_i64_branch(&output, VERTICES, "EventID"),
        vec![0, 1, 2, 3, 7, 8]
    );
}

#[test]
fn unreadable_later_input_is_skipped() {
    let harness = TestHarness::new();
    let good = harness.standard_input("good.evc", 1, 0, &[1, 2]);
    let missing = harness.path("missing.evc");
    let output = harness.path("out.evc");

    let summary = skimmer(vec![good, missing.clone()], &output, AcceptAll)
        .run()
        .unwrap();
    assert_eq!(summary.inputs_total, 2);
    assert_eq!(summary.inputs_used, 1);
    assert_eq!(summary.skipped[0].path, missing);
    assert_eq!(summary.events_read, 2);
}

#[test]
fn unreadable_first_input_is_fatal() {
    let harness = TestHarness::new();
    let good = harness.standard_input("good.evc", 1, 0, &[1, 2]);
    let output = harness.path("out.evc");

    let err = skimmer(vec![harness.path("missing.evc"), good], &output, AcceptAll)
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::NoUsableInput { .. }));
    assert!(!output.exists());
}

#[test]
fn reordered_schema_is_rebound() {
    let harness = TestHarness::new();
    let first = harness.standard_input("first.evc", 1, 0, &[4, 0]);
    let reordered = tracker_schema_reordered();
    let second = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(2, 2..5))
        .stream(
            TRACKER,
            reordered.clone(),
            tracker_records_with(&reordered, 2, &[3, 7, 1]),
        )
        .write(&harness.path("second.evc"));
    let output = harness.path("out.evc");

    let summary = skimmer(vec![first, second], &output, min_tracks(3.0)).run().unwrap();
    assert_eq!(summary.inputs_used, 2);
    assert_eq!(read_i64_branch(&output, TRACKER, "EventID"), vec![0, 2, 3]);
    assert_eq!(read_i64_branch(&output, TRACKER, "NTracks"), vec![4, 3, 7]);

    let container = Container::open(&output).unwrap();
    assert_eq!(container.schema(&key(TRACKER)), Some(&tracker_schema()));
}

#[test]
fn mismatched_schema_input_is_skipped() {
    let harness = TestHarness::new();
    let first = harness.standard_input("first.evc", 1, 0, &[1, 1]);
    let retyped = StreamSchema::builder()
        .branch("EventID", BranchKind::I64)
        .branch("NTracks", BranchKind::F64)
        .branch("Momentum", BranchKind::F64)
        .build()
        .unwrap();
    let mut builder = RecordBuilder::new(&retyped);
    let payload = builder
        .set("EventID", 2i64)
        .unwrap()
        .set("NTracks", 1.0f64)
        .unwrap()
        .set("Momentum", 1.0f64)
        .unwrap()
        .finish()
        .unwrap();
    let second = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(2, 2..3))
        .stream(TRACKER, retyped, vec![payload])
        .write(&harness.path("second.evc"));
    let output = harness.path("out.evc");

    let summary = skimmer(vec![first, second], &output, AcceptAll).run().unwrap();
    assert_eq!(summary.inputs_used, 1);
    assert!(summary.skipped[0].reason.contains("Schema mismatch"));
    assert_eq!(read_stream(&output, TRACKER).len(), 2);
}

#[test]
fn uncreatable_output_is_store_creation_error() {
    let harness = TestHarness::new();
    let input = harness.standard_input("in.evc", 1, 0, &[1]);
    let blocker = harness.path("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let err = skimmer(vec![input], &blocker.join("out.evc"), AcceptAll)
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::StoreCreation { .. }));
}

#[test]
fn existing_output_is_replaced() {
    let harness = TestHarness::new();
    let input = harness.standard_input("in.evc", 1, 0, &[1, 2, 3]);
    let output = harness.path("out.evc");
    std::fs::create_dir_all(output.join("StaleDir")).unwrap();
    std::fs::write(output.join("StaleDir/old.evs"), b"stale").unwrap();

    skimmer(vec![input], &output, AcceptAll).run().unwrap();
    assert!(!output.join("StaleDir").exists());
    assert_eq!(read_stream(&output, HEADER).len(), 3);
}

#[test]
#[should_panic(expected = "selection exploded")]
fn panicking_selection_propagates() {
    let harness = TestHarness::new();
    let input = harness.standard_input("in.evc", 1, 0, &[1, 2, 3]);
    let output = harness.path("out.evc");
    let selection = |event: &Event<'_>| -> bool {
        if event.position() == 1 {
            panic!("selection exploded");
        }
        true
    };
    let _ = skimmer(vec![input], &output, selection).run();
}

#[test]
fn second_run_is_rejected() {
    let harness = TestHarness::new();
    let input = harness.standard_input("in.evc", 1, 0, &[1]);
    let output = harness.path("out.evc");

    let mut skimmer = skimmer(vec![input], &output, AcceptAll);
    assert_eq!(skimmer.state(), SkimState::NoOutputYet);
    skimmer.run().unwrap();
    assert_eq!(skimmer.state(), SkimState::Finalized);
    assert!(matches!(skimmer.run(), Err(Error::AlreadyFinalized)));
}

#[test]
fn counting_selection_sees_every_event() {
    let mut harness = TestHarness::new();
    let tracks = harness.random_tracks(500);
    let expected = tracks.iter().filter(|&&n| n >= 4).count() as u64;
    let input = harness.standard_input("in.evc", 1, 0, &tracks);
    let output = harness.path("out.evc");

    let mut skimmer = skimmer(vec![input], &output, Counting::new(min_tracks(4.0)));
    let summary = skimmer.run().unwrap();
    let counting = skimmer.into_selection();
    assert_eq!(counting.calls(), 500);
    assert_eq!(counting.selected(), expected);
    assert_eq!(summary.events_selected, expected);
}

#[test]
fn selection_sees_every_joined_stream() {
    let harness = TestHarness::new();
    let input = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(1, 0..3))
        .stream(TRACKER, tracker_schema(), tracker_records(0, &[1, 2, 3]))
        .stream(VERTICES, vertices_schema(), vertices_records(0..3))
        .write(&harness.path("in.evc"));
    let output = harness.path("out.evc");

    let mut aligned = true;
    let selection = |event: &Event<'_>| -> bool {
        let ids: Vec<i64> = event
            .iter()
            .map(|(_, record)| record.get_i64("EventID").unwrap())
            .collect();
        aligned &= event.len() == 3 && ids.iter().all(|&id| id == event.position() as i64);
        true
    };
    skimmer(vec![input], &output, selection).run().unwrap();
    assert!(aligned);
}

#[test]
fn small_flush_threshold_gives_same_output() {
    let mut harness = TestHarness::new();
    let tracks = harness.random_tracks(400);
    let input = harness.standard_input("in.evc", 1, 0, &tracks);
    let default_out = harness.path("default.evc");
    let small_out = harness.path("small.evc");

    skimmer(vec![input.clone()], &default_out, min_tracks(1.0)).run().unwrap();
    Skimmer::builder(vec![input], &small_out, min_tracks(1.0))
        .catalog(small_catalog())
        .flush_threshold(256)
        .report_progress(false)
        .build()
        .run()
        .unwrap();

    assert_eq!(snapshot(&default_out), snapshot(&small_out));
}

#[test]
fn schema_library_rejects_disagreeing_inputs() {
    let harness = TestHarness::new();
    let first = harness.standard_input("first.evc", 1, 0, &[1, 1]);
    let reordered = tracker_schema_reordered();
    let second = ContainerFixture::new()
        .stream(HEADER, header_schema(), header_records(2, 2..4))
        .stream(
            TRACKER,
            reordered.clone(),
            tracker_records_with(&reordered, 2, &[1, 1]),
        )
        .write(&harness.path("second.evc"));
    let library = LibraryLoader::new(harness.path("cache"))
        .ensure(&first, "_test")
        .unwrap();
    let output = harness.path("out.evc");

    let summary = Skimmer::builder(vec![first, second], &output, AcceptAll)
        .catalog(small_catalog())
        .schema_library(library)
        .report_progress(false)
        .build()
        .run()
        .unwrap();
    assert_eq!(summary.inputs_used, 1);
    assert_eq!(summary.skipped.len(), 1);
}
