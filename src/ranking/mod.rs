//! Ranking Module
//!
//! Leaderboard-style sorted sets. They are independent of the document
//! store: a board lives under its own name and has no TTL.
//!
//! - `tree` - order-statistic AVL tree keyed by (score, member)
//! - `index` - [`RankingIndex`], one sorted set
//! - [`Leaderboards`] - named boards, each behind its own lock
//!
//! ```
//! use patchkv::ranking::{Leaderboards, Order};
//!
//! let boards = Leaderboards::new();
//! boards.incr_by("weekly", "p1", 100.0).unwrap();
//! boards.incr_by("weekly", "p1", 50.0).unwrap();
//! boards.incr_by("weekly", "p2", 200.0).unwrap();
//!
//! assert_eq!(boards.score_of("weekly", "p1"), Some(150.0));
//! assert_eq!(boards.rank_of("weekly", "p1", Order::Descending), Some(1));
//! ```

pub mod index;
pub mod tree;

pub use index::{Entry, Order, RankingIndex};

use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A board and whether it has been unlinked from the map.
#[derive(Debug, Default)]
struct BoardState {
    index: RankingIndex,
    retired: bool,
}

type Board = Arc<RwLock<BoardState>>;

/// A set of named ranking indexes.
///
/// The outer map lock is only held to find, create or unlink a board;
/// queries and updates then lock that board alone. A board left empty by
/// an update is unlinked while its lock is still held, so writers that
/// find it retired retry against the map.
#[derive(Debug, Default)]
pub struct Leaderboards {
    boards: RwLock<HashMap<String, Board>>,
}

impl Leaderboards {
    pub fn new() -> Self {
        Self::default()
    }

    fn board(&self, name: &str) -> Option<Board> {
        self.boards.read().get(name).cloned()
    }

    fn board_or_insert(&self, name: &str) -> Board {
        if let Some(board) = self.board(name) {
            return board;
        }
        Arc::clone(self.boards.write().entry(name.to_string()).or_default())
    }

    /// Runs `f` on the live board `name`, creating it if needed and
    /// unlinking it again if `f` leaves it empty.
    fn update<T>(
        &self,
        name: &str,
        create: bool,
        f: impl Fn(&mut RankingIndex) -> T,
    ) -> Option<T> {
        loop {
            let board = if create {
                self.board_or_insert(name)
            } else {
                self.board(name)?
            };
            let mut state = board.write();
            if state.retired {
                continue;
            }
            let result = f(&mut state.index);
            if state.index.is_empty() {
                let mut boards = self.boards.write();
                if boards.get(name).is_some_and(|b| Arc::ptr_eq(b, &board)) {
                    boards.remove(name);
                }
                state.retired = true;
            }
            return Some(result);
        }
    }

    pub fn incr_by(&self, name: &str, member: &str, delta: f64) -> StoreResult<f64> {
        self.update(name, true, |index| index.incr_by(member, delta))
            .unwrap_or(Err(StoreError::NotFound))
    }

    pub fn add(&self, name: &str, member: &str, score: f64) -> StoreResult<bool> {
        self.update(name, true, |index| index.add(member, score))
            .unwrap_or(Err(StoreError::NotFound))
    }

    pub fn remove(&self, name: &str, member: &str) -> bool {
        self.update(name, false, |index| index.remove(member))
            .unwrap_or(false)
    }

    pub fn score_of(&self, name: &str, member: &str) -> Option<f64> {
        self.board(name)?.read().index.score_of(member)
    }

    pub fn rank_of(&self, name: &str, member: &str, order: Order) -> Option<usize> {
        self.board(name)?.read().index.rank_of(member, order)
    }

    pub fn range_by_rank(&self, name: &str, start: i64, stop: i64, order: Order) -> Vec<Entry> {
        self.board(name)
            .map(|board| board.read().index.range_by_rank(start, stop, order))
            .unwrap_or_default()
    }

    pub fn range_by_score(&self, name: &str, min: f64, max: f64, order: Order) -> Vec<Entry> {
        self.board(name)
            .map(|board| board.read().index.range_by_score(min, max, order))
            .unwrap_or_default()
    }

    /// Number of members on a board (0 if it does not exist).
    pub fn len(&self, name: &str) -> usize {
        self.board(name).map_or(0, |board| board.read().index.len())
    }

    /// Number of boards.
    pub fn board_count(&self) -> usize {
        self.boards.read().len()
    }

    pub fn clear(&self) {
        let drained: Vec<Board> = self.boards.write().drain().map(|(_, board)| board).collect();
        for board in drained {
            board.write().retired = true;
        }
    }
}
