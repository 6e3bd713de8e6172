//! (a,b)-tree implementation of the ordered key-value map.
//!
//! An (a,b)-tree generalises the B-tree family: every non-root node holds
//! between `a - 1` and `b - 1` entries (`a >= 2`, `b >= 2a - 1`), all
//! conceptual external leaves share the same depth, and every operation
//! runs in O(log_a n).
//!
//! Ownership is strictly parent-owns-children with no upward pointers; the
//! ancestor path a mutation needs for rebalancing is the call stack, and
//! overflow/underflow fix-ups run as the recursion unwinds.
//!
//! # Invariants
//!
//! - Entries within a node are strictly increasing by key.
//! - A node has either no children or exactly `entries + 1` children; the
//!   keys of child `i` lie strictly between `key[i-1]` and `key[i]`.
//! - For a fixed `(a, b)`, equal operation sequences build identical
//!   trees: splits take the left-biased middle, underflow prefers the left
//!   sibling, and a minimal sibling always merges.

use keywire_proto::Value;

use crate::errors::TreeError;

/// A key paired with its stored value; the unit held by tree nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyData {
    /// UTF-8 key; ordering is lexicographic over code units.
    pub key: String,
    /// Stored value.
    pub value: Value,
}

#[derive(Debug, Clone)]
struct Node {
    /// Strictly sorted entries.
    entries: Vec<KeyData>,
    /// Empty for nodes on the last internal layer, `entries + 1` otherwise.
    children: Vec<Node>,
}

impl Node {
    fn singleton(key: String, value: Value) -> Self {
        Self { entries: vec![KeyData { key, value }], children: Vec::new() }
    }
}

/// Result of splitting an overflowing node: the middle entry moves up, the
/// upper half moves into a fresh right sibling.
struct Split {
    pivot: KeyData,
    right: Node,
}

/// Outcome of a recursive insertion step.
enum InsertOutcome {
    /// The key existed; its value was overwritten in place.
    Replaced(Value),
    /// A new entry went in; `Some` carries a split the parent must absorb.
    Inserted(Option<Split>),
}

/// Ordered map from UTF-8 string keys to [`Value`]s.
///
/// `a` (`min`) and `b` (`max`) are fixed at construction. The root is
/// exempt from the lower fill bound: it may hold a single entry, or, as
/// the sole leaf, anything up to `b - 1`.
#[derive(Debug)]
pub struct AbTree {
    root: Option<Node>,
    /// Lower fan-out bound `a`; non-root nodes keep at least `a - 1` entries.
    min: usize,
    /// Upper fan-out bound `b`; every node keeps at most `b - 1` entries.
    max: usize,
    len: usize,
}

impl AbTree {
    /// Create an empty tree with fan-out bounds `a = min`, `b = max`.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidParameters`] unless `min >= 2` and
    /// `max >= 2 * min - 1`.
    pub fn new(min: usize, max: usize) -> Result<Self, TreeError> {
        if min < 2 || max < 2 * min - 1 {
            return Err(TreeError::InvalidParameters { min, max });
        }
        Ok(Self { root: None, min, max, len: 0 })
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fan-out bounds `(a, b)` the tree was built with.
    #[must_use]
    pub fn params(&self) -> (usize, usize) {
        (self.min, self.max)
    }

    /// Node depth of the tree (0 when empty).
    ///
    /// Every leaf sits at this depth; `find` visits at most this many
    /// nodes.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.root.as_ref();
        while let Some(current) = node {
            depth += 1;
            node = current.children.first();
        }
        depth
    }

    /// Per-level entry counts, root level first.
    ///
    /// A structural inspector for tests: `[[1], [1, 2]]` describes a root
    /// with one entry over two leaves holding one and two entries.
    #[must_use]
    pub fn topology(&self) -> Vec<Vec<usize>> {
        let mut levels = Vec::new();
        let mut level: Vec<&Node> = self.root.as_ref().into_iter().collect();
        while !level.is_empty() {
            levels.push(level.iter().map(|node| node.entries.len()).collect());
            level = level.iter().flat_map(|node| node.children.iter()).collect();
        }
        levels
    }

    /// Look up a key.
    ///
    /// Descends from the root; at each node either the key is present, the
    /// node is on the last internal layer (absent), or the search continues
    /// into the single child whose subtree range can contain the key.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&Value> {
        let mut node = self.root.as_ref()?;
        loop {
            match node.entries.binary_search_by(|entry| entry.key.as_str().cmp(key)) {
                Ok(idx) => return Some(&node.entries[idx].value),
                Err(idx) => {
                    if node.children.is_empty() {
                        return None;
                    }
                    node = &node.children[idx];
                },
            }
        }
    }

    /// Insert a key or replace its value, returning the previous value.
    ///
    /// New entries land in a last-internal-layer node; any node pushed to
    /// `b` entries splits around its left-biased middle (`m = (k - 1) / 2`)
    /// and the split bubbles towards the root. A split root is replaced by
    /// a fresh root holding the single pivot.
    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        let mut root = match self.root.take() {
            None => {
                self.root = Some(Node::singleton(key, value));
                self.len = 1;
                return None;
            },
            Some(root) => root,
        };

        let outcome = Self::insert_into(&mut root, key, value, self.max);
        let replaced = match outcome {
            InsertOutcome::Replaced(old) => Some(old),
            InsertOutcome::Inserted(split) => {
                if let Some(split) = split {
                    root = Node { entries: vec![split.pivot], children: vec![root, split.right] };
                }
                self.len += 1;
                None
            },
        };
        self.root = Some(root);
        replaced
    }

    /// Remove a key, returning its value.
    ///
    /// Removing an absent key is a structural no-op. A hit in an inner node
    /// is first reduced to a last-internal-layer deletion by swapping in
    /// the largest entry of the preceding subtree; underflowing nodes then
    /// rotate from or merge with a sibling as the recursion unwinds, and an
    /// emptied root collapses into its sole child (or empties the tree).
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let root = self.root.as_mut()?;
        let removed = Self::remove_from(root, key, self.min)?;
        self.len -= 1;

        if root.entries.is_empty() {
            self.root = match self.root.take() {
                Some(old_root) if old_root.children.len() == 1 => {
                    let mut children = old_root.children;
                    Some(children.remove(0))
                },
                _ => None,
            };
        }
        Some(removed)
    }

    fn insert_into(node: &mut Node, key: String, value: Value, max: usize) -> InsertOutcome {
        match node.entries.binary_search_by(|entry| entry.key.as_str().cmp(key.as_str())) {
            Ok(idx) => {
                let old = std::mem::replace(&mut node.entries[idx].value, value);
                InsertOutcome::Replaced(old)
            },
            Err(idx) if node.children.is_empty() => {
                node.entries.insert(idx, KeyData { key, value });
                InsertOutcome::Inserted(Self::split_if_overflowing(node, max))
            },
            Err(idx) => match Self::insert_into(&mut node.children[idx], key, value, max) {
                InsertOutcome::Replaced(old) => InsertOutcome::Replaced(old),
                InsertOutcome::Inserted(None) => InsertOutcome::Inserted(None),
                InsertOutcome::Inserted(Some(split)) => {
                    // The child that covered `key`'s range is replaced by
                    // the (left, right) pair around the promoted pivot.
                    node.entries.insert(idx, split.pivot);
                    node.children.insert(idx + 1, split.right);
                    InsertOutcome::Inserted(Self::split_if_overflowing(node, max))
                },
            },
        }
    }

    fn split_if_overflowing(node: &mut Node, max: usize) -> Option<Split> {
        if node.entries.len() < max {
            return None;
        }

        // k = b entries; middle index m = (k - 1) / 2, left-biased for an
        // even entry count. With b >= 3 both halves stay non-empty.
        let mid = (node.entries.len() - 1) / 2;
        let mut right_entries = node.entries.split_off(mid);
        let pivot = right_entries.remove(0);
        let right_children =
            if node.children.is_empty() { Vec::new() } else { node.children.split_off(mid + 1) };

        Some(Split { pivot, right: Node { entries: right_entries, children: right_children } })
    }

    fn remove_from(node: &mut Node, key: &str, min: usize) -> Option<Value> {
        match node.entries.binary_search_by(|entry| entry.key.as_str().cmp(key)) {
            Ok(idx) => {
                if node.children.is_empty() {
                    return Some(node.entries.remove(idx).value);
                }
                // Reduce to a last-internal-layer deletion: the largest
                // entry of child `idx`'s subtree replaces the hit, and the
                // physical removal retargets to that leaf.
                let replacement = Self::take_rightmost(&mut node.children[idx], min);
                let old = std::mem::replace(&mut node.entries[idx], replacement);
                Self::rebalance_child(node, idx, min);
                Some(old.value)
            },
            Err(_) if node.children.is_empty() => None,
            Err(idx) => {
                let removed = Self::remove_from(&mut node.children[idx], key, min)?;
                Self::rebalance_child(node, idx, min);
                Some(removed)
            },
        }
    }

    fn take_rightmost(node: &mut Node, min: usize) -> KeyData {
        if node.children.is_empty() {
            #[allow(clippy::expect_used)]
            return node
                .entries
                .pop()
                .expect("invariant: every non-root node holds at least a - 1 >= 1 entries");
        }
        let last = node.children.len() - 1;
        let taken = Self::take_rightmost(&mut node.children[last], min);
        Self::rebalance_child(node, last, min);
        taken
    }

    /// Restore the fill bound of `parent.children[child_idx]` after a
    /// removal below it.
    ///
    /// Prefers the left sibling; the leftmost child falls back to its right
    /// sibling. A minimal sibling (exactly `a - 1` entries) merges through
    /// the separating pivot; a richer sibling donates one entry via
    /// rotation, which leaves the parent's entry count unchanged.
    fn rebalance_child(parent: &mut Node, child_idx: usize, min: usize) {
        if parent.children[child_idx].entries.len() >= min - 1 {
            return;
        }

        let sibling_idx = if child_idx > 0 { child_idx - 1 } else { child_idx + 1 };
        // The pivot separating the two children sits at the smaller index.
        let pivot_idx = child_idx.min(sibling_idx);

        if parent.children[sibling_idx].entries.len() == min - 1 {
            Self::merge_children(parent, pivot_idx);
        } else if sibling_idx < child_idx {
            Self::rotate_from_left(parent, pivot_idx);
        } else {
            Self::rotate_from_right(parent, pivot_idx);
        }
    }

    /// Merge `children[pivot_idx]` and `children[pivot_idx + 1]` through
    /// the pivot entry between them. May leave the parent underfull; the
    /// caller's own unwind handles that.
    fn merge_children(parent: &mut Node, pivot_idx: usize) {
        let pivot = parent.entries.remove(pivot_idx);
        let right = parent.children.remove(pivot_idx + 1);
        let left = &mut parent.children[pivot_idx];
        left.entries.push(pivot);
        left.entries.extend(right.entries);
        left.children.extend(right.children);
    }

    /// Donate the left sibling's largest entry: it replaces the pivot, the
    /// old pivot is prepended to the underfull child, and the sibling's
    /// last subtree moves across with it.
    fn rotate_from_left(parent: &mut Node, pivot_idx: usize) {
        let sibling = &mut parent.children[pivot_idx];
        #[allow(clippy::expect_used)]
        let new_pivot = sibling
            .entries
            .pop()
            .expect("invariant: rotation sibling holds more than a - 1 entries");
        let moved_child = sibling.children.pop();

        let pivot = std::mem::replace(&mut parent.entries[pivot_idx], new_pivot);
        let child = &mut parent.children[pivot_idx + 1];
        child.entries.insert(0, pivot);
        if let Some(subtree) = moved_child {
            child.children.insert(0, subtree);
        }
    }

    /// Mirror of [`Self::rotate_from_left`] for the leftmost child: the
    /// right sibling's smallest entry replaces the pivot, the old pivot is
    /// appended to the underfull child.
    fn rotate_from_right(parent: &mut Node, pivot_idx: usize) {
        let sibling = &mut parent.children[pivot_idx + 1];
        let new_pivot = sibling.entries.remove(0);
        let moved_child =
            if sibling.children.is_empty() { None } else { Some(sibling.children.remove(0)) };

        let pivot = std::mem::replace(&mut parent.entries[pivot_idx], new_pivot);
        let child = &mut parent.children[pivot_idx];
        child.entries.push(pivot);
        if let Some(subtree) = moved_child {
            child.children.push(subtree);
        }
    }

    /// Verify every structural invariant, for test suites.
    ///
    /// Checks fill bounds, child counts, strict key ordering across subtree
    /// ranges, and uniform leaf depth.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvariantViolated`] naming the first violation found.
    pub fn check_invariants(&self) -> Result<(), TreeError> {
        let Some(root) = self.root.as_ref() else {
            return Ok(());
        };
        if root.entries.is_empty() {
            return Err(TreeError::InvariantViolated("root holds no entries".into()));
        }
        let mut leaf_depth = None;
        self.check_node(root, true, None, None, 0, &mut leaf_depth)
    }

    fn check_node(
        &self,
        node: &Node,
        is_root: bool,
        lower: Option<&str>,
        upper: Option<&str>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) -> Result<(), TreeError> {
        let count = node.entries.len();
        if count > self.max - 1 {
            return Err(TreeError::InvariantViolated(format!(
                "node holds {count} entries, above the bound of {}",
                self.max - 1
            )));
        }
        if !is_root && count < self.min - 1 {
            return Err(TreeError::InvariantViolated(format!(
                "non-root node holds {count} entries, below the bound of {}",
                self.min - 1
            )));
        }

        for pair in node.entries.windows(2) {
            if pair[0].key >= pair[1].key {
                return Err(TreeError::InvariantViolated(format!(
                    "entries out of order: {:?} before {:?}",
                    pair[0].key, pair[1].key
                )));
            }
        }
        if let Some(first) = node.entries.first() {
            if lower.is_some_and(|bound| first.key.as_str() <= bound) {
                return Err(TreeError::InvariantViolated(format!(
                    "key {:?} at or below its subtree lower bound",
                    first.key
                )));
            }
        }
        if let Some(last) = node.entries.last() {
            if upper.is_some_and(|bound| last.key.as_str() >= bound) {
                return Err(TreeError::InvariantViolated(format!(
                    "key {:?} at or above its subtree upper bound",
                    last.key
                )));
            }
        }

        if node.children.is_empty() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) if expected == depth => {},
                Some(expected) => {
                    return Err(TreeError::InvariantViolated(format!(
                        "leaf at depth {depth}, expected {expected}"
                    )));
                },
            }
            return Ok(());
        }

        if node.children.len() != count + 1 {
            return Err(TreeError::InvariantViolated(format!(
                "node with {count} entries has {} children",
                node.children.len()
            )));
        }
        for (idx, child) in node.children.iter().enumerate() {
            let child_lower =
                if idx == 0 { lower } else { Some(node.entries[idx - 1].key.as_str()) };
            let child_upper =
                if idx == count { upper } else { Some(node.entries[idx].key.as_str()) };
            self.check_node(child, false, child_lower, child_upper, depth + 1, leaf_depth)?;
        }
        Ok(())
    }
}
