//! Recorder interface.
use super::Record;

/// Writes records to an output destination.
pub trait Recorder {
    /// Writes a record immediately, tagged with the given step.
    fn write(&mut self, step: usize, record: Record);

    /// Stores a record for later aggregation.
    fn store(&mut self, record: Record);

    /// Writes values aggregated from the stored records.
    fn flush(&mut self, step: usize);
}
