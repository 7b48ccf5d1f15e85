/// Append-only PCM accumulator for one generation session.
///
/// The buffer itself enforces no bound; the controller decides when enough
/// bytes have arrived.
#[derive(Debug, Default, Clone)]
pub struct AudioBuffer {
    bytes: Vec<u8>,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Append a frame in arrival order.
    pub fn append(&mut self, frame: &[u8]) {
        self.bytes.extend_from_slice(frame);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// First `target_bytes` of the buffer, or all of it when shorter.
    #[cfg(test)]
    fn truncated(&self, target_bytes: usize) -> &[u8] {
        &self.bytes[..self.bytes.len().min(target_bytes)]
    }

    /// Consume the buffer, keeping at most `target_bytes`.
    pub fn into_truncated(mut self, target_bytes: usize) -> Vec<u8> {
        self.bytes.truncate(target_bytes);
        self.bytes
    }
}
