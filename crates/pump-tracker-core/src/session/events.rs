//! Audit-event accumulator.

use thiserror::Error;
use tracing::{error, info};

use crate::models::EventRecord;
use crate::store::{insert_events, RecordStore, StoreError};

/// A flush that did not reach the audit log. Carries the events so the
/// caller can decide whether to retry or drop them.
#[derive(Error, Debug)]
#[error("Audit log flush failed ({} events): {source}", .events.len())]
pub struct FlushError {
    pub events: Vec<EventRecord>,
    #[source]
    pub source: StoreError,
}

/// Events produced by one user action, flushed as a single batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBuffer {
    events: Vec<EventRecord>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: EventRecord) {
        self.events.push(event);
    }

    /// Append another buffer's events.
    pub fn extend(&mut self, other: EventBuffer) {
        self.events.extend(other.events);
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Write every buffered event in one insert.
    pub fn flush(self, store: &dyn RecordStore) -> Result<usize, FlushError> {
        if self.events.is_empty() {
            return Ok(0);
        }
        match insert_events(store, &self.events) {
            Ok(written) => {
                info!(events = written, "flushed audit events");
                Ok(written)
            }
            Err(source) => {
                error!(events = self.events.len(), error = %source, "audit flush failed");
                Err(FlushError {
                    events: self.events,
                    source,
                })
            }
        }
    }
}
