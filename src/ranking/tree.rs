//! Order-statistic tree
//!
//! An AVL tree of [`RankKey`]s where every node also stores the size of its
//! subtree. Sizes turn "how many keys sort before this one" and "which key
//! sits at position i" into single root-to-leaf walks, so insert, remove,
//! rank and select are all O(log n).
//!
//! ```text
//!              (50,"c") size 5
//!              /             \
//!     (10,"a") size 2     (70,"e") size 2
//!          \                 /
//!     (10,"b") size 1   (60,"d") size 1
//! ```

use std::cmp::Ordering;

/// Ordering key: score ascending, then member ascending.
///
/// Scores compare with `f64::total_cmp`, so the order is total even for
/// `-0.0` and infinities. NaN never reaches the tree.
#[derive(Debug, Clone)]
pub struct RankKey {
    pub score: f64,
    pub member: String,
}

impl RankKey {
    pub fn new(score: f64, member: impl Into<String>) -> Self {
        Self {
            score,
            member: member.into(),
        }
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.member.cmp(&other.member))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RankKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankKey {}

type Link = Option<Box<Node>>;

#[derive(Debug)]
struct Node {
    key: RankKey,
    height: u32,
    size: usize,
    left: Link,
    right: Link,
}

impl Node {
    fn leaf(key: RankKey) -> Box<Node> {
        Box::new(Node {
            key,
            height: 1,
            size: 1,
            left: None,
            right: None,
        })
    }

    fn refresh(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
        self.size = 1 + size(&self.left) + size(&self.right);
    }

    fn balance(&self) -> i64 {
        height(&self.left) as i64 - height(&self.right) as i64
    }
}

fn height(link: &Link) -> u32 {
    link.as_ref().map_or(0, |node| node.height)
}

fn size(link: &Link) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    match node.left.take() {
        Some(mut pivot) => {
            node.left = pivot.right.take();
            node.refresh();
            pivot.right = Some(node);
            pivot.refresh();
            pivot
        }
        None => node,
    }
}

fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    match node.right.take() {
        Some(mut pivot) => {
            node.right = pivot.left.take();
            node.refresh();
            pivot.left = Some(node);
            pivot.refresh();
            pivot
        }
        None => node,
    }
}

fn rebalance(mut node: Box<Node>) -> Box<Node> {
    node.refresh();
    let balance = node.balance();

    if balance > 1 {
        if let Some(left) = node.left.take() {
            node.left = Some(if left.balance() < 0 {
                rotate_left(left)
            } else {
                left
            });
        }
        return rotate_right(node);
    }
    if balance < -1 {
        if let Some(right) = node.right.take() {
            node.right = Some(if right.balance() > 0 {
                rotate_right(right)
            } else {
                right
            });
        }
        return rotate_left(node);
    }
    node
}

fn insert(link: Link, key: RankKey) -> Box<Node> {
    match link {
        None => Node::leaf(key),
        Some(mut node) => {
            if key < node.key {
                node.left = Some(insert(node.left.take(), key));
            } else {
                node.right = Some(insert(node.right.take(), key));
            }
            rebalance(node)
        }
    }
}

/// Detaches the smallest node of a subtree.
fn take_min(mut node: Box<Node>) -> (Link, Box<Node>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (rest, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn remove(link: Link, key: &RankKey) -> (Link, bool) {
    let Some(mut node) = link else {
        return (None, false);
    };

    match key.cmp(&node.key) {
        Ordering::Less => {
            let (left, removed) = remove(node.left.take(), key);
            node.left = left;
            (Some(rebalance(node)), removed)
        }
        Ordering::Greater => {
            let (right, removed) = remove(node.right.take(), key);
            node.right = right;
            (Some(rebalance(node)), removed)
        }
        Ordering::Equal => match (node.left.take(), node.right.take()) {
            (None, right) => (right, true),
            (left, None) => (left, true),
            (Some(left), Some(right)) => {
                let (rest, mut successor) = take_min(right);
                successor.left = Some(left);
                successor.right = rest;
                (Some(rebalance(successor)), true)
            }
        },
    }
}

/// A sorted multiset of [`RankKey`]s with positional access.
#[derive(Debug, Default)]
pub struct OrderTree {
    root: Link,
}

impl OrderTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn clear(&mut self) {
        self.root = None;
    }

    pub fn insert(&mut self, key: RankKey) {
        self.root = Some(insert(self.root.take(), key));
    }

    /// Removes a key, returning whether it was present.
    pub fn remove(&mut self, key: &RankKey) -> bool {
        let (root, removed) = remove(self.root.take(), key);
        self.root = root;
        removed
    }

    /// Number of keys for which `before` holds. `before` must be true for a
    /// prefix of the sorted order and false afterwards.
    pub fn count_before(&self, before: impl Fn(&RankKey) -> bool) -> usize {
        let mut count = 0;
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            if before(&node.key) {
                count += size(&node.left) + 1;
                current = node.right.as_deref();
            } else {
                current = node.left.as_deref();
            }
        }
        count
    }

    /// 0-based ascending position of `key`, counting keys strictly smaller.
    pub fn rank(&self, key: &RankKey) -> usize {
        self.count_before(|node| node < key)
    }

    /// Keys whose score is strictly below `score`.
    pub fn count_below(&self, score: f64) -> usize {
        self.count_before(|node| node.score.total_cmp(&score) == Ordering::Less)
    }

    /// Keys whose score is at most `score`.
    pub fn count_at_most(&self, score: f64) -> usize {
        self.count_before(|node| node.score.total_cmp(&score) != Ordering::Greater)
    }

    /// The key at ascending position `index`.
    pub fn select(&self, mut index: usize) -> Option<&RankKey> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            let left = size(&node.left);
            match index.cmp(&left) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Equal => return Some(&node.key),
                Ordering::Greater => {
                    index -= left + 1;
                    current = node.right.as_deref();
                }
            }
        }
        None
    }

    /// In-order iterator starting at ascending position `start`.
    pub fn iter_from(&self, start: usize) -> Iter<'_> {
        let mut stack = Vec::new();
        let mut skip = start;
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            let left = size(&node.left);
            if skip < left {
                stack.push(node);
                current = node.left.as_deref();
            } else if skip == left {
                stack.push(node);
                break;
            } else {
                skip -= left + 1;
                current = node.right.as_deref();
            }
        }
        Iter { stack }
    }

    pub fn iter(&self) -> Iter<'_> {
        self.iter_from(0)
    }
}

/// Ascending in-order iterator over an [`OrderTree`].
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a RankKey;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let mut current = node.right.as_deref();
        while let Some(child) = current {
            self.stack.push(child);
            current = child.left.as_deref();
        }
        Some(&node.key)
    }
}
