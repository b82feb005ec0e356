use std::collections::VecDeque;

use core_types::Outcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Oldest outcomes beyond this length are dropped on append.
    pub max_len: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { max_len: 100 }
    }
}

/// What one `append` did to the stream, kept by callers that need to undo it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Appended {
    /// False when a tie arrived before any primary outcome and was dropped.
    pub stored: bool,
    /// Entries pushed out of the front, oldest first.
    pub evicted: Vec<Outcome>,
}

// ============================================================
// OutcomeStream — ordered hand history, bounded, ties kept inline.
// Invariant: never starts with a Tie, so every tie belongs to the
// primary outcome before it.
// ============================================================
#[derive(Debug, Clone, Default)]
pub struct OutcomeStream {
    entries: VecDeque<Outcome>,
    cfg: StreamConfig,
    /// Cached count of non-tie entries.
    primary_len: usize,
}

impl OutcomeStream {
    pub fn new(cfg: StreamConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            cfg,
            primary_len: 0,
        }
    }

    pub fn cfg(&self) -> &StreamConfig {
        &self.cfg
    }

    pub fn set_cfg(&mut self, cfg: StreamConfig) {
        self.cfg = cfg;
        self.evict_overflow();
    }

    pub fn append(&mut self, outcome: Outcome) -> Appended {
        if !outcome.is_primary() && self.primary_len == 0 {
            return Appended::default();
        }
        self.entries.push_back(outcome);
        if outcome.is_primary() {
            self.primary_len += 1;
        }
        Appended {
            stored: true,
            evicted: self.evict_overflow(),
        }
    }

    pub fn remove_last(&mut self) -> Option<Outcome> {
        let last = self.entries.pop_back()?;
        if last.is_primary() {
            self.primary_len -= 1;
        }
        Some(last)
    }

    /// Puts previously evicted entries back at the front, oldest first.
    pub fn restore_front(&mut self, evicted: &[Outcome]) {
        for &o in evicted.iter().rev() {
            self.entries.push_front(o);
            if o.is_primary() {
                self.primary_len += 1;
            }
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.primary_len = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn primary_len(&self) -> usize {
        self.primary_len
    }

    pub fn get(&self, index: usize) -> Option<Outcome> {
        self.entries.get(index).copied()
    }

    pub fn last(&self) -> Option<Outcome> {
        self.entries.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Outcome> + '_ {
        self.entries.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Outcome> {
        self.entries.iter().copied().collect()
    }

    /// The stream without ties; what every detector pattern-matches against.
    pub fn primary_view(&self) -> Vec<Outcome> {
        self.entries.iter().copied().filter(|o| o.is_primary()).collect()
    }

    /// Tie count attached to each entry of `primary_view`, index for index.
    pub fn tie_attachments(&self) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::with_capacity(self.primary_len);
        for o in self.entries.iter() {
            if o.is_primary() {
                out.push(0);
            } else if let Some(last) = out.last_mut() {
                *last += 1;
            }
        }
        out
    }

    pub fn tie_count(&self) -> usize {
        self.entries.len() - self.primary_len
    }

    fn evict_overflow(&mut self) -> Vec<Outcome> {
        let max_len = self.cfg.max_len.max(1);
        let mut evicted = Vec::new();
        while self.entries.len() > max_len {
            let Some(front) = self.entries.pop_front() else {
                break;
            };
            if front.is_primary() {
                self.primary_len -= 1;
            }
            evicted.push(front);
        }
        // Ties uncovered at the front lost their owner.
        if !evicted.is_empty() {
            while matches!(self.entries.front(), Some(Outcome::Tie)) {
                self.entries.pop_front();
                evicted.push(Outcome::Tie);
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::parse_sequence;

    fn stream_of(seq: &str, max_len: usize) -> OutcomeStream {
        let mut s = OutcomeStream::new(StreamConfig { max_len });
        for o in parse_sequence(seq).unwrap() {
            s.append(o);
        }
        s
    }

    #[test]
    fn ties_attach_to_preceding_primary() {
        let s = stream_of("PPTTBTP", 100);
        assert_eq!(s.primary_view().len(), 4);
        assert_eq!(s.tie_attachments(), vec![0, 2, 1, 0]);
        assert_eq!(s.tie_count(), 3);
    }

    #[test]
    fn primary_plus_ties_equals_length() {
        let s = stream_of("PPPPBBBBTBBPPBPPBBPBTBPBP", 100);
        let ties: usize = s.tie_attachments().iter().sum();
        assert_eq!(s.primary_view().len() + ties, s.len());
        assert_eq!(s.primary_view().len(), 23);
    }

    #[test]
    fn leading_tie_is_dropped() {
        let mut s = OutcomeStream::default();
        let a = s.append(Outcome::Tie);
        assert!(!a.stored);
        assert!(s.is_empty());
        assert!(s.append(Outcome::Banker).stored);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn remove_last_on_empty_is_noop() {
        let mut s = OutcomeStream::default();
        assert_eq!(s.remove_last(), None);
        let mut s = stream_of("PB", 100);
        assert_eq!(s.remove_last(), Some(Outcome::Banker));
        assert_eq!(s.primary_len(), 1);
    }

    #[test]
    fn overflow_drops_oldest_and_orphaned_ties() {
        let mut s = stream_of("PTTB", 4);
        let a = s.append(Outcome::Player);
        assert_eq!(a.evicted, vec![Outcome::Player, Outcome::Tie, Outcome::Tie]);
        assert_eq!(s.to_vec(), vec![Outcome::Banker, Outcome::Player]);
        assert_eq!(s.primary_len(), 2);

        s.remove_last();
        s.restore_front(&a.evicted);
        assert_eq!(s.to_vec(), parse_sequence("PTTB").unwrap());
        assert_eq!(s.primary_len(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = stream_of("PBT", 100);
        s.reset();
        assert!(s.is_empty());
        assert_eq!(s.primary_len(), 0);
        assert!(s.tie_attachments().is_empty());
    }
}
