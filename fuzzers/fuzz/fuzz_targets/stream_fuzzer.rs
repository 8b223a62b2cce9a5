#![no_main]
use evskim::framing::MAX_FRAME_LEN;
use evskim::{BranchKind, ChecksumDeframer, ChecksumKind, DeframerExt, Record, StreamReader, StreamSchema};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

// Arbitrary stream-file bodies must never panic the reader or the record verifier.
fuzz_target!(|data: &[u8]| {
    let Ok(schema) = StreamSchema::builder()
        .branch("RunID", BranchKind::I32)
        .branch("EventID", BranchKind::I64)
        .branch("Momentum", BranchKind::F64)
        .branch("IsMC", BranchKind::Bool)
        .build()
    else {
        return;
    };
    let deframer = ChecksumDeframer::new(ChecksumKind::None).bounded(MAX_FRAME_LEN);
    let mut reader = StreamReader::new(Cursor::new(data), deframer);
    let _ = reader.process_all(|payload| {
        if let Ok(record) = Record::parse(&schema, payload) {
            let _ = record.values();
        }
        Ok(())
    });
});
