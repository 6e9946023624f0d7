use super::Record;

/// Writes records to a sink.
pub trait Recorder: Send {
    /// Writes a record.
    fn write(&mut self, record: Record);
}
