//! In-process span sink, used by tests and local debugging.

use std::sync::{Mutex, PoisonError};

use crate::trace::span::{FinishedSpan, SpanSink};

/// Keeps every finished span in submission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    spans: Mutex<Vec<FinishedSpan>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all spans submitted so far.
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Spans with the given operation name.
    pub fn named(&self, operation: &str) -> Vec<FinishedSpan> {
        self.spans()
            .into_iter()
            .filter(|s| s.operation == operation)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl SpanSink for MemorySink {
    fn submit(&self, span: FinishedSpan) {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
    }
}
