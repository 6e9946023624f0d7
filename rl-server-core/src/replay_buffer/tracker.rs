//! Bookkeeping of the episodes resident in the ring storage.
use super::CircularHistoryBuffer;
use log::warn;
use std::collections::{vec_deque::Iter, VecDeque};

/// Location of an episode in the ring storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpisodeSpan {
    /// Id of the episode.
    pub id: u64,

    /// Slot of the initial observation.
    pub start: usize,

    /// Number of transitions.
    pub len: usize,
}

impl EpisodeSpan {
    /// Slot of the last observation.
    pub fn end(&self, capacity: usize) -> usize {
        (self.start + self.len) % capacity
    }
}

/// Records where episodes start and end as they complete.
///
/// Closed episodes are kept in insertion order. An episode is forgotten as
/// soon as its first slot is overwritten.
#[derive(Debug, Default)]
pub struct EpisodeTracker {
    next_id: u64,
    open: Option<EpisodeSpan>,
    closed: VecDeque<EpisodeSpan>,
}

impl EpisodeTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an episode starting at slot `start` and returns its id.
    ///
    /// An episode still open is abandoned.
    pub fn open(&mut self, start: usize) -> u64 {
        if let Some(span) = self.open.take() {
            warn!(
                "Episode {} abandoned after {} transitions",
                span.id, span.len
            );
        }
        let id = self.next_id;
        self.next_id += 1;
        self.open = Some(EpisodeSpan { id, start, len: 0 });
        id
    }

    /// Accounts a transition of the open episode.
    pub fn extend(&mut self) {
        if let Some(span) = self.open.as_mut() {
            span.len += 1;
        }
    }

    /// Closes the open episode.
    pub fn close(&mut self) -> Option<EpisodeSpan> {
        let span = self.open.take()?;
        self.closed.push_back(span);
        Some(span)
    }

    /// The open episode, if any.
    pub fn open_span(&self) -> Option<&EpisodeSpan> {
        self.open.as_ref()
    }

    /// Forgets the episodes whose first slot no longer holds their initial observation.
    pub fn evict(&mut self, history: &CircularHistoryBuffer) {
        while let Some(span) = self.closed.front() {
            let intact = history.episode_id(span.start) == span.id
                && history.episode_step(span.start) == 0;
            if intact {
                break;
            }
            self.closed.pop_front();
        }
    }

    /// Number of closed episodes still stored.
    pub fn len(&self) -> usize {
        self.closed.len()
    }

    /// Returns `true` if no closed episode is stored.
    pub fn is_empty(&self) -> bool {
        self.closed.is_empty()
    }

    /// The `k`-th oldest closed episode still stored.
    pub fn get(&self, k: usize) -> Option<&EpisodeSpan> {
        self.closed.get(k)
    }

    /// Iterates over the closed episodes still stored, oldest first.
    pub fn iter(&self) -> Iter<EpisodeSpan> {
        self.closed.iter()
    }
}
