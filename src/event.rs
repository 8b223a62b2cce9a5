//! The joined-record view handed to selections.

use crate::catalog::StreamKey;
use crate::record::Record;

/// The current record of every stream tracked for one input, at one position.
///
/// An `Event` borrows the skimmer's read buffers and is only valid for the
/// duration of one `apply_selection` call.
#[derive(Debug)]
pub struct Event<'a> {
    position: u64,
    records: Vec<(&'a StreamKey, Record<'a>)>,
}

impl<'a> Event<'a> {
    pub fn new(position: u64, records: Vec<(&'a StreamKey, Record<'a>)>) -> Self {
        Self { position, records }
    }

    /// Position of this event within its input.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The record of stream `group/name`, if that stream is present in this input.
    pub fn get(&self, group: &str, name: &str) -> Option<&Record<'a>> {
        self.records
            .iter()
            .find(|(key, _)| key.matches(group, name))
            .map(|(_, record)| record)
    }

    pub fn get_key(&self, key: &StreamKey) -> Option<&Record<'a>> {
        self.records
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, record)| record)
    }

    pub fn contains(&self, key: &StreamKey) -> bool {
        self.get_key(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a StreamKey> + '_ {
        self.records.iter().map(|(key, _)| *key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a StreamKey, &Record<'a>)> {
        self.records.iter().map(|(key, record)| (*key, record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
