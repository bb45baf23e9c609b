//! Ranking Index
//!
//! A sorted set: each member has exactly one score, and members are kept
//! in score order with ties broken by member name, ascending. A hash map
//! answers `score_of` in O(1); an [`OrderTree`] answers positional queries
//! in O(log n).
//!
//! ## Descending order
//!
//! Descending rank orders by score high-to-low but keeps ties in ascending
//! member order, so it is not simply the ascending order reversed:
//!
//! ```text
//!   ascending   (100,a) (150,b) (150,c) (200,d)
//!   descending  (200,d) (150,b) (150,c) (100,a)
//! ```
//!
//! For a member with score `s`, let `lo` be the number of keys scoring
//! below `s` and `hi` the number scoring at most `s`. Its descending rank
//! is `(n - hi) + (asc - lo)`: everyone with a higher score, plus its
//! position inside its own tie group.

use super::tree::{OrderTree, RankKey};
use crate::error::{StoreError, StoreResult};
use std::collections::HashMap;

/// Rank direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    Ascending,
    /// Highest score first (leaderboard order)
    #[default]
    Descending,
}

/// A member with its score, as returned by range queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub member: String,
    pub score: f64,
}

impl Entry {
    fn from_key(key: &RankKey) -> Self {
        Self {
            member: key.member.clone(),
            score: key.score,
        }
    }
}

#[derive(Debug, Default)]
pub struct RankingIndex {
    scores: HashMap<String, f64>,
    tree: OrderTree,
}

impl RankingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Adds `delta` to the member's score, creating it at `delta` if absent.
    /// Returns the new score.
    pub fn incr_by(&mut self, member: &str, delta: f64) -> StoreResult<f64> {
        if delta.is_nan() {
            return Err(StoreError::NotANumber);
        }
        let previous = self.scores.get(member).copied();
        let score = previous.unwrap_or(0.0) + delta;
        if score.is_nan() {
            return Err(StoreError::NotANumber);
        }
        self.place(member, previous, score);
        Ok(score)
    }

    /// Sets the member's score. Returns `true` if the member is new.
    pub fn add(&mut self, member: &str, score: f64) -> StoreResult<bool> {
        if score.is_nan() {
            return Err(StoreError::NotANumber);
        }
        let previous = self.scores.get(member).copied();
        self.place(member, previous, score);
        Ok(previous.is_none())
    }

    fn place(&mut self, member: &str, previous: Option<f64>, score: f64) {
        if let Some(old) = previous {
            self.tree.remove(&RankKey::new(old, member));
        }
        self.tree.insert(RankKey::new(score, member));
        self.scores.insert(member.to_string(), score);
    }

    /// Removes a member. Returns `true` if it existed.
    pub fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => self.tree.remove(&RankKey::new(score, member)),
            None => false,
        }
    }

    pub fn score_of(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// 0-based rank of a member, `None` if absent.
    pub fn rank_of(&self, member: &str, order: Order) -> Option<usize> {
        let score = self.score_of(member)?;
        let ascending = self.tree.rank(&RankKey::new(score, member));
        match order {
            Order::Ascending => Some(ascending),
            Order::Descending => {
                let below = self.tree.count_below(score);
                let at_most = self.tree.count_at_most(score);
                Some((self.len() - at_most) + (ascending - below))
            }
        }
    }

    /// The entry at a 0-based rank.
    pub fn entry_at(&self, rank: usize, order: Order) -> Option<Entry> {
        let ascending = match order {
            Order::Ascending => rank,
            Order::Descending => self.descending_to_ascending(rank)?,
        };
        self.tree.select(ascending).map(Entry::from_key)
    }

    fn descending_to_ascending(&self, rank: usize) -> Option<usize> {
        let n = self.len();
        if rank >= n {
            return None;
        }
        // The score group holding this rank is the one at the mirrored
        // ascending position.
        let score = self.tree.select(n - 1 - rank)?.score;
        let below = self.tree.count_below(score);
        let at_most = self.tree.count_at_most(score);
        Some(below + (rank - (n - at_most)))
    }

    /// Entries with ranks in `start..=stop`.
    ///
    /// Negative ranks count from the end (`-1` is the last). The window is
    /// clamped to the valid ranks; a window entirely outside them is empty.
    pub fn range_by_rank(&self, start: i64, stop: i64, order: Order) -> Vec<Entry> {
        let len = self.len() as i64;
        let start = (if start < 0 { len + start } else { start }).max(0);
        let stop = (if stop < 0 { len + stop } else { stop }).min(len - 1);

        if len == 0 || start > stop || start >= len {
            return Vec::new();
        }
        let (start, stop) = (start as usize, stop as usize);

        match order {
            Order::Ascending => self
                .tree
                .iter_from(start)
                .take(stop - start + 1)
                .map(Entry::from_key)
                .collect(),
            Order::Descending => (start..=stop)
                .filter_map(|rank| self.entry_at(rank, Order::Descending))
                .collect(),
        }
    }

    /// Entries with `min <= score <= max`, in the requested order.
    pub fn range_by_score(&self, min: f64, max: f64, order: Order) -> Vec<Entry> {
        if min.is_nan() || max.is_nan() {
            return Vec::new();
        }
        let from = self.tree.count_below(min);
        let to = self.tree.count_at_most(max);
        if from >= to {
            return Vec::new();
        }

        let mut entries: Vec<Entry> = self
            .tree
            .iter_from(from)
            .take(to - from)
            .map(Entry::from_key)
            .collect();
        if order == Order::Descending {
            // Stable: members inside a tie group stay ascending.
            entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        }
        entries
    }

    pub fn clear(&mut self) {
        self.scores.clear();
        self.tree.clear();
    }
}
