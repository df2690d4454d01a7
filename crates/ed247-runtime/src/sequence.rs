use std::collections::HashMap;

/// What the tracker decided about one stream segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Newer than anything seen. `missed` sequence numbers were skipped.
    Accept { missed: u16 },
    /// Same sequence number as the last accepted segment.
    Duplicate,
    /// Older than the last accepted segment.
    Stale,
}

/// Last accepted sequence number per (source component, stream uid).
///
/// Ordering uses 16-bit serial number arithmetic: `seq` is newer than `last`
/// when `seq - last (mod 2^16)` lies in `[1, 2^15)`.
#[derive(Debug)]
pub(crate) struct SequenceTracker {
    max_sources: usize,
    sources: HashMap<u16, HashMap<u16, u16>>,
}

impl SequenceTracker {
    pub fn new(max_sources: usize) -> Self {
        Self {
            max_sources,
            sources: HashMap::new(),
        }
    }

    /// Whether frames from `source` can be tracked. Known sources always
    /// can; new ones only while the table has room.
    pub fn admit(&mut self, source: u16) -> bool {
        if self.sources.contains_key(&source) {
            return true;
        }
        if self.sources.len() >= self.max_sources {
            return false;
        }
        self.sources.insert(source, HashMap::new());
        true
    }

    /// Classify a segment. Accepted segments become the new reference.
    pub fn check(&mut self, source: u16, uid: u16, seq: u16) -> Verdict {
        let streams = self.sources.entry(source).or_default();
        let Some(last) = streams.get_mut(&uid) else {
            streams.insert(uid, seq);
            return Verdict::Accept { missed: 0 };
        };
        let delta = seq.wrapping_sub(*last) as i16;
        if delta > 0 {
            *last = seq;
            Verdict::Accept {
                missed: delta as u16 - 1,
            }
        } else if delta == 0 {
            Verdict::Duplicate
        } else {
            Verdict::Stale
        }
    }

    pub fn sources(&self) -> usize {
        self.sources.len()
    }
}
