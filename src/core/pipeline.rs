use bytes::BytesMut;

use crate::core::command::Expectation;

/// An ordered batch of captured commands awaiting a single flush.
///
/// Each entry carries the command's encoded bytes plus the expectation
/// captured when it was enqueued; replies are matched back strictly by
/// position, since the protocol carries no request identifiers.
#[derive(Debug, Default)]
pub(crate) struct Pipeline {
    entries: Vec<PipelineEntry>,
}

#[derive(Debug)]
pub(crate) struct PipelineEntry {
    pub(crate) wire: BytesMut,
    pub(crate) expectation: Option<Expectation>,
}

impl Pipeline {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Captures one encoded command in issue order.
    pub(crate) fn push(&mut self, wire: BytesMut, expectation: Option<Expectation>) {
        self.entries.push(PipelineEntry { wire, expectation });
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Concatenates every captured command into one write buffer.
    pub(crate) fn flush_bytes(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(self.entries.iter().map(|e| e.wire.len()).sum());
        for entry in &self.entries {
            out.extend_from_slice(&entry.wire);
        }
        out
    }

    pub(crate) fn into_entries(self) -> Vec<PipelineEntry> {
        self.entries
    }
}
