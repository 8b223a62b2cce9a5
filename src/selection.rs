//! Event selections.
//!
//! A [`Selection`] decides, one joined event at a time, whether the event is
//! copied to the output. Closures of type `FnMut(&Event<'_>) -> bool` are
//! selections, so most callers never implement the trait by hand.

use crate::catalog::StreamKey;
use crate::error::{Error, Result};
use crate::event::Event;
use std::str::FromStr;

/// Decides whether an event is kept.
///
/// Implementations may keep internal state (counters, histograms) but must
/// give the same answer for identical event content. The skimmer does not
/// catch panics raised here.
pub trait Selection {
    fn apply_selection(&mut self, event: &Event<'_>) -> bool;
}

impl<F> Selection for F
where
    F: FnMut(&Event<'_>) -> bool,
{
    fn apply_selection(&mut self, event: &Event<'_>) -> bool {
        self(event)
    }
}

/// Keeps every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Selection for AcceptAll {
    fn apply_selection(&mut self, _event: &Event<'_>) -> bool {
        true
    }
}

/// Keeps events whose `key` record has a numeric `field` of at least `min`.
///
/// Events where the stream is absent, the field does not exist, or the field
/// is a bool are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldThreshold {
    pub key: StreamKey,
    pub field: String,
    pub min: f64,
}

impl FieldThreshold {
    pub fn new(key: StreamKey, field: impl Into<String>, min: f64) -> Self {
        Self {
            key,
            field: field.into(),
            min,
        }
    }
}

impl Selection for FieldThreshold {
    fn apply_selection(&mut self, event: &Event<'_>) -> bool {
        event
            .get_key(&self.key)
            .and_then(|record| record.get_f64(&self.field))
            .is_some_and(|value| value >= self.min)
    }
}

impl FromStr for FieldThreshold {
    type Err = Error;

    /// Parses `group/name:field:min`, e.g. `ReconDir/Tracker:NTracks:3`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidCatalog {
            message: format!("threshold `{s}` is not of the form group/name:field:min"),
        };
        let mut parts = s.splitn(3, ':');
        let (Some(key), Some(field), Some(min)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        if field.is_empty() {
            return Err(invalid());
        }
        let min: f64 = min.trim().parse().map_err(|_| invalid())?;
        Ok(FieldThreshold::new(key.parse()?, field, min))
    }
}

/// Keeps events accepted by every inner selection.
///
/// Evaluation stops at the first rejection, so later selections do not see
/// events an earlier one refused.
#[derive(Default)]
pub struct AllOf {
    selections: Vec<Box<dyn Selection>>,
}

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selection: impl Selection + 'static) -> Self {
        self.selections.push(Box::new(selection));
        self
    }

    pub fn push(&mut self, selection: impl Selection + 'static) {
        self.selections.push(Box::new(selection));
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

impl Selection for AllOf {
    fn apply_selection(&mut self, event: &Event<'_>) -> bool {
        self.selections.iter_mut().all(|s| s.apply_selection(event))
    }
}

/// Counts calls and accepted events of the wrapped selection.
#[derive(Debug, Clone, Default)]
pub struct Counting<S> {
    inner: S,
    calls: u64,
    selected: u64,
}

impl<S: Selection> Counting<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: 0,
            selected: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn selected(&self) -> u64 {
        self.selected
    }

    /// Fraction of events accepted, or 0 before the first call.
    pub fn efficiency(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.selected as f64 / self.calls as f64
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Selection> Selection for Counting<S> {
    fn apply_selection(&mut self, event: &Event<'_>) -> bool {
        self.calls += 1;
        let keep = self.inner.apply_selection(event);
        if keep {
            self.selected += 1;
        }
        keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, RecordBuilder};
    use crate::schema::{BranchKind, StreamSchema};

    fn tracker_schema() -> StreamSchema {
        StreamSchema::builder()
            .branch("NTracks", BranchKind::I32)
            .build()
            .unwrap()
    }

    fn payload(schema: &StreamSchema, tracks: i32) -> Vec<u8> {
        RecordBuilder::new(schema)
            .set("NTracks", tracks)
            .unwrap()
            .finish()
            .unwrap()
    }

    fn decide<S: Selection>(selection: &mut S, tracks: i32) -> bool {
        let schema = tracker_schema();
        let key = StreamKey::new("ReconDir", "Tracker");
        let bytes = payload(&schema, tracks);
        let event = Event::new(0, vec![(&key, Record::parse(&schema, &bytes).unwrap())]);
        selection.apply_selection(&event)
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut cut: FieldThreshold = "ReconDir/Tracker:NTracks:3".parse().unwrap();
        let decisions: Vec<bool> = [1, 5, 2, 3].iter().map(|&n| decide(&mut cut, n)).collect();
        assert_eq!(decisions, vec![false, true, false, true]);
    }

    #[test]
    fn test_threshold_on_missing_stream_or_field_rejects() {
        let mut other_stream = FieldThreshold::new(StreamKey::new("ReconDir", "Global"), "NTracks", 0.0);
        assert!(!decide(&mut other_stream, 10));
        let mut other_field = FieldThreshold::new(StreamKey::new("ReconDir", "Tracker"), "NVertices", 0.0);
        assert!(!decide(&mut other_field, 10));
    }

    #[test]
    fn test_threshold_parse_errors() {
        assert!("ReconDir/Tracker:NTracks".parse::<FieldThreshold>().is_err());
        assert!("ReconDir/Tracker::3".parse::<FieldThreshold>().is_err());
        assert!("ReconDir/Tracker:NTracks:many".parse::<FieldThreshold>().is_err());
        assert!("Tracker:NTracks:3".parse::<FieldThreshold>().is_err());
    }

    #[test]
    fn test_closure_and_counting() {
        let mut counting = Counting::new(|event: &Event<'_>| {
            event
                .get("ReconDir", "Tracker")
                .and_then(|r| r.get_i64("NTracks"))
                .is_some_and(|n| n % 2 == 0)
        });
        for n in 0..10 {
            decide(&mut counting, n);
        }
        assert_eq!(counting.calls(), 10);
        assert_eq!(counting.selected(), 5);
        assert!((counting.efficiency() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_of_is_a_conjunction() {
        let mut both = AllOf::new()
            .with(FieldThreshold::new(StreamKey::new("ReconDir", "Tracker"), "NTracks", 2.0))
            .with(|event: &Event<'_>| {
                event
                    .get("ReconDir", "Tracker")
                    .and_then(|r| r.get_i64("NTracks"))
                    .is_some_and(|n| n < 4)
            });
        assert!(!decide(&mut both, 1));
        assert!(decide(&mut both, 3));
        assert!(!decide(&mut both, 4));
        assert!(AllOf::new().apply_selection(&Event::new(0, Vec::new())));
    }
}
