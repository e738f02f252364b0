// =====================================================================
// File: index/node.rs
//
// Description:
//   The tagged union over the two node kinds, plus the handful of
//   capability queries (`is_leaf`, `len`, `is_full`, `is_underfull`)
//   that both kinds answer uniformly. This is the "minimal capability
//   interface" referenced by the tree's design notes, in place of a
//   deep virtual base class.
// =====================================================================

use std::cell::RefCell;
use std::rc::Rc;

use super::branch::BranchNode;
use super::leaf::LeafNode;

/// Minimum number of keys a non-root node must hold for a given capacity.
pub(crate) fn min_keys(capacity: usize) -> usize {
    (capacity - 1) / 2
}

#[derive(Debug)]
pub enum Node<K, V> {
    Leaf(Rc<RefCell<LeafNode<K, V>>>),
    Branch(Box<BranchNode<K, V>>),
}

impl<K: Ord + Clone, V> Node<K, V> {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.borrow().len(),
            Node::Branch(branch) => branch.keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self, capacity: usize) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.borrow().is_full(capacity),
            Node::Branch(branch) => branch.is_full(capacity),
        }
    }

    pub fn is_underfull(&self, capacity: usize) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.borrow().is_underfull(capacity),
            Node::Branch(branch) => branch.is_underfull(capacity),
        }
    }

    pub fn can_donate(&self, capacity: usize) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.borrow().can_donate(capacity),
            Node::Branch(branch) => branch.can_donate(capacity),
        }
    }

    /// Descend to the leaf that contains or would contain `key`.
    pub fn find_leaf_for_key(&self, key: &K) -> Rc<RefCell<LeafNode<K, V>>> {
        match self {
            Node::Leaf(leaf) => Rc::clone(leaf),
            Node::Branch(branch) => {
                let child = branch.get_child(key);
                child.find_leaf_for_key(key)
            }
        }
    }

    /// Count this node and every descendant (testing/debugging only).
    pub fn count_nodes(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Branch(branch) => {
                1 + branch.children.iter().map(Node::count_nodes).sum::<usize>()
            }
        }
    }

    /// Depth of the leftmost leaf from this node, counting this node as 0.
    /// Used only by invariant checks/tests to confirm every leaf sits at the
    /// same depth.
    pub fn leftmost_depth(&self) -> usize {
        match self {
            Node::Leaf(_) => 0,
            Node::Branch(branch) => 1 + branch.children[0].leftmost_depth(),
        }
    }

    /// Recursively validate occupancy bounds, branch shape, and key
    /// ordering for this node and every descendant. `is_root` exempts only
    /// the minimum-occupancy bound (the root may legally be under-full);
    /// the maximum-capacity bound and the `len(children) = len(keys) + 1`
    /// shape invariant apply everywhere. Exposed so tests can assert
    /// directly on the tree's structural invariants instead of just its
    /// dict-like surface.
    pub fn check_invariants(&self, capacity: usize, is_root: bool) -> Result<(), String> {
        match self {
            Node::Leaf(leaf_rc) => {
                let leaf = leaf_rc.borrow();
                if leaf.keys.len() > capacity {
                    return Err(format!(
                        "leaf holds {} keys, exceeds capacity {capacity}",
                        leaf.keys.len()
                    ));
                }
                if !is_root && leaf.is_underfull(capacity) {
                    return Err(format!(
                        "leaf holds {} keys, below minimum occupancy {}",
                        leaf.keys.len(),
                        min_keys(capacity)
                    ));
                }
                if !leaf.keys.windows(2).all(|w| w[0] < w[1]) {
                    return Err("leaf keys are not strictly increasing".to_string());
                }
                Ok(())
            }
            Node::Branch(branch) => {
                if branch.children.len() != branch.keys.len() + 1 {
                    return Err(format!(
                        "branch has {} keys but {} children (expected {})",
                        branch.keys.len(),
                        branch.children.len(),
                        branch.keys.len() + 1
                    ));
                }
                if branch.keys.len() > capacity {
                    return Err(format!(
                        "branch holds {} keys, exceeds capacity {capacity}",
                        branch.keys.len()
                    ));
                }
                if !is_root && branch.is_underfull(capacity) {
                    return Err(format!(
                        "branch holds {} keys, below minimum occupancy {}",
                        branch.keys.len(),
                        min_keys(capacity)
                    ));
                }
                if !branch.keys.windows(2).all(|w| w[0] < w[1]) {
                    return Err("branch separator keys are not strictly increasing".to_string());
                }
                for child in &branch.children {
                    child.check_invariants(capacity, false)?;
                }
                Ok(())
            }
        }
    }
}
