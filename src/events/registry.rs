use std::sync::Arc;

use crate::error::{CfmgError, Result};
use crate::events::Sink;

/// Explicit sink lookup table, constructed once at startup and handed to the
/// dispatcher. Registration order is delivery-task spawn order; names must
/// be unique.
#[derive(Default)]
pub struct SinkRegistry {
    entries: Vec<(String, Arc<dyn Sink>)>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink under `name`, rejecting duplicates.
    pub fn register(&mut self, name: impl Into<String>, sink: Arc<dyn Sink>) -> Result<()> {
        let name = name.into();
        if self.entries.iter().any(|(n, _)| n == &name) {
            return Err(CfmgError::DuplicateSink(name));
        }
        self.entries.push((name, sink));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Sink>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Arc<dyn Sink>)> {
        self.entries
    }
}
