use bytes::{Bytes, BytesMut};

/// Accumulates a body up to a byte ceiling while counting everything seen.
///
/// A ceiling of zero keeps every byte.
#[derive(Debug)]
pub(crate) struct Capture {
    kept: BytesMut,
    observed: u64,
    ceiling: u64,
}

impl Capture {
    pub(crate) fn new(ceiling: u64) -> Self {
        Self {
            kept: BytesMut::new(),
            observed: 0,
            ceiling,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.observed = self.observed.saturating_add(chunk.len() as u64);
        let room = if self.ceiling == 0 {
            chunk.len()
        } else {
            let left = self.ceiling.saturating_sub(self.kept.len() as u64);
            usize::try_from(left).unwrap_or(usize::MAX).min(chunk.len())
        };
        self.kept.extend_from_slice(&chunk[..room]);
    }

    /// Total bytes pushed, including those past the ceiling.
    pub(crate) fn observed(&self) -> u64 {
        self.observed
    }

    pub(crate) fn exceeded(&self) -> bool {
        self.ceiling > 0 && self.observed > self.ceiling
    }

    pub(crate) fn finish(self) -> Bytes {
        self.kept.freeze()
    }
}
