//! Samples and the bounded queues that hold them.

use std::collections::VecDeque;

use bytes::Bytes;
use ed247_frame::Timestamp;
use serde::Serialize;

/// Provenance of a received sample, taken from the frame header.
///
/// All fields are zero when the channel carries no header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SampleInfo {
    pub component_identifier: u16,
    pub sequence_number: u16,
    pub transport_timestamp: Timestamp,
}

/// A sample removed from a receive queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoppedSample {
    pub data: Bytes,
    /// Producer timestamp, when the stream carries one.
    pub data_timestamp: Option<Timestamp>,
    /// Receive clock reading at demultiplexing, when a handler is bound.
    pub recv_timestamp: Option<Timestamp>,
    pub info: SampleInfo,
    /// Samples still queued after this one.
    pub remaining: usize,
}

impl PoppedSample {
    /// Whether this was the last queued sample.
    pub fn is_last(&self) -> bool {
        self.remaining == 0
    }
}

/// Result of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// The send queue has no free slot left.
    pub queue_full: bool,
}

#[derive(Debug)]
pub(crate) struct OutgoingSample {
    pub data: Vec<u8>,
    pub data_timestamp: Option<Timestamp>,
}

/// Send-side ring of preallocated sample buffers.
///
/// Pushing copies into the next free slot; a full ring refuses the push.
#[derive(Debug)]
pub(crate) struct SendQueue {
    slots: Vec<OutgoingSample>,
    head: usize,
    len: usize,
}

impl SendQueue {
    pub fn new(capacity: usize, sample_max_size: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| OutgoingSample {
                data: Vec::with_capacity(sample_max_size),
                data_timestamp: None,
            })
            .collect();
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Copy a sample in. Returns `false` when no slot is free.
    pub fn push(&mut self, data: &[u8], data_timestamp: Option<Timestamp>) -> bool {
        if self.is_full() {
            return false;
        }
        let index = (self.head + self.len) % self.slots.len();
        let slot = &mut self.slots[index];
        slot.data.clear();
        slot.data.extend_from_slice(data);
        slot.data_timestamp = data_timestamp;
        self.len += 1;
        true
    }

    pub fn front(&self) -> Option<&OutgoingSample> {
        (self.len > 0).then(|| &self.slots[self.head])
    }

    pub fn pop_front(&mut self) {
        if self.len > 0 {
            self.head = (self.head + 1) % self.slots.len();
            self.len -= 1;
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ReceivedSample {
    pub data: Bytes,
    pub data_timestamp: Option<Timestamp>,
    pub recv_timestamp: Option<Timestamp>,
    pub info: SampleInfo,
}

/// Receive-side bounded queue. When full, the oldest sample makes room.
#[derive(Debug)]
pub(crate) struct ReceiveQueue {
    samples: VecDeque<ReceivedSample>,
    capacity: usize,
}

impl ReceiveQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Enqueue a sample. Returns `true` if the oldest one was overwritten.
    pub fn push(&mut self, sample: ReceivedSample) -> bool {
        let overwritten = self.samples.len() >= self.capacity;
        if overwritten {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        overwritten
    }

    pub fn pop(&mut self) -> Option<ReceivedSample> {
        self.samples.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received(byte: u8) -> ReceivedSample {
        ReceivedSample {
            data: Bytes::from(vec![byte]),
            data_timestamp: None,
            recv_timestamp: None,
            info: SampleInfo::default(),
        }
    }

    #[test]
    fn send_queue_refuses_when_full() {
        let mut queue = SendQueue::new(2, 4);
        assert!(queue.push(b"ab", None));
        assert!(queue.push(b"cd", None));
        assert!(queue.is_full());
        assert!(!queue.push(b"ef", None));
        assert_eq!(queue.front().unwrap().data, b"ab");
    }

    #[test]
    fn send_queue_wraps_and_reuses_slots() {
        let mut queue = SendQueue::new(2, 4);
        for round in 0..5u8 {
            assert!(queue.push(&[round], Some(Timestamp::new(u32::from(round), 0))));
            let front = queue.front().expect("pushed sample should be queued");
            assert_eq!(front.data, vec![round]);
            assert_eq!(front.data_timestamp, Some(Timestamp::new(u32::from(round), 0)));
            queue.pop_front();
        }
        assert_eq!(queue.len(), 0);
        assert!(queue.front().is_none());
        assert_eq!(queue.capacity(), 2);
    }

    #[test]
    fn receive_queue_overwrites_oldest() {
        let mut queue = ReceiveQueue::new(2);
        assert!(!queue.push(received(1)));
        assert!(!queue.push(received(2)));
        assert!(queue.push(received(3)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().data.as_ref(), &[2]);
        assert_eq!(queue.pop().unwrap().data.as_ref(), &[3]);
        assert!(queue.pop().is_none());
    }
}
