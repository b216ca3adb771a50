//! Pending error channel.

use crate::error::SneaqlError;
use crate::value::Record;

/// Holds the last command failure until an `on_error` statement handles it.
#[derive(Debug, Default)]
pub struct ErrorChannel {
    pending_error: Option<SneaqlError>,
    last_iterated_record: Option<Record>,
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit a command failure.
    pub fn set_pending(&mut self, error: SneaqlError) {
        tracing::warn!(error = %error, "Command failed; error is pending");
        self.pending_error = Some(error);
    }

    pub fn set_last_iterated_record(&mut self, record: Record) {
        self.last_iterated_record = Some(record);
    }

    pub fn pending_error(&self) -> Option<&SneaqlError> {
        self.pending_error.as_ref()
    }

    pub fn last_iterated_record(&self) -> Option<&Record> {
        self.last_iterated_record.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_error.is_some()
    }

    /// Take the pending error, leaving the channel empty.
    pub fn take(&mut self) -> Option<SneaqlError> {
        self.last_iterated_record = None;
        self.pending_error.take()
    }

    pub fn clear(&mut self) {
        self.pending_error = None;
        self.last_iterated_record = None;
    }
}
