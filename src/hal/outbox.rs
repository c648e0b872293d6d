//! Send coalescing shared by the transport adapters.
//!
//! Sends issued during one board tick accumulate in an [`Outbox`] and go
//! out as a single write when the tick ends. If appending would push the
//! packet past the medium's limit, the queued bytes are handed back for
//! an immediate write first, so submission order is preserved.

/// Coalescing buffer with an optional packet size limit.
#[derive(Debug, Default, Clone)]
pub struct Outbox {
    buf: Vec<u8>,
    max_packet_size: Option<usize>,
    overhead: usize,
}

impl Outbox {
    /// Unbounded outbox.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Outbox that never lets `overhead + payload` exceed `max_packet_size`.
    pub fn bounded(max_packet_size: usize, overhead: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_packet_size: Some(max_packet_size),
            overhead,
        }
    }

    /// Queues `bytes`. Returns a packet that must be written before them
    /// when the combined size would exceed the limit.
    pub fn push(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        let overflow = match self.max_packet_size {
            Some(max) => !self.buf.is_empty() && self.buf.len() + bytes.len() + self.overhead > max,
            None => false,
        };
        let flushed = if overflow { self.take() } else { None };
        self.buf.extend_from_slice(bytes);
        flushed
    }

    /// Removes and returns everything queued.
    pub fn take(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }

    /// Number of queued bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drops queued bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_until_taken() {
        let mut outbox = Outbox::unbounded();
        assert_eq!(outbox.push(&[1, 2]), None);
        assert_eq!(outbox.push(&[3]), None);
        assert_eq!(outbox.take(), Some(vec![1, 2, 3]));
        assert_eq!(outbox.take(), None);
    }

    #[test]
    fn overflow_hands_back_earlier_bytes() {
        let mut outbox = Outbox::bounded(8, 2);
        assert_eq!(outbox.push(&[1, 2, 3]), None);
        assert_eq!(outbox.push(&[4, 5, 6]), Some(vec![1, 2, 3]));
        assert_eq!(outbox.take(), Some(vec![4, 5, 6]));
    }

    #[test]
    fn oversized_single_send_still_queued() {
        let mut outbox = Outbox::bounded(4, 0);
        assert_eq!(outbox.push(&[0; 10]), None);
        assert_eq!(outbox.len(), 10);
    }
}
