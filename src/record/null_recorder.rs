//! A recorder that discards everything. Useful in tests.
use super::{Record, Recorder};

/// Discards all records.
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn write(&mut self, _step: usize, _record: Record) {}

    fn store(&mut self, _record: Record) {}

    fn flush(&mut self, _step: usize) {}
}
