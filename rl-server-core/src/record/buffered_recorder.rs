use super::{Record, Recorder};
use std::sync::{Arc, Mutex};

/// A recorder that keeps records in memory.
///
/// Clones share the same buffer, so a clone can be handed to a trainer and
/// the records read back from another clone.
#[derive(Default, Clone)]
pub struct BufferedRecorder {
    buf: Arc<Mutex<Vec<Record>>>,
}

impl BufferedRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the records written so far.
    pub fn take(&self) -> Vec<Record> {
        match self.buf.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(_) => vec![],
        }
    }

    /// Number of records written so far.
    pub fn len(&self) -> usize {
        self.buf.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// Returns `true` if no record is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        if let Ok(mut buf) = self.buf.lock() {
            buf.push(record);
        }
    }
}
