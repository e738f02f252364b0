// =====================================================================
// File: index/tree.rs
//
// Description:
//   `BPlusTreeMap`: the public façade over the B+ tree. Owns the root
//   node and a separate handle to the head of the leaf chain (the two
//   diverge once the tree grows a branch root). Implements insertion
//   with propagating splits, deletion with underflow repair, point
//   lookup, ordered range iteration, sorted bulk-load, and the
//   dict-like convenience operations.
//
// Notes:
//   * Recursive helpers take `&mut Node<K, V>` and mutate in place,
//     the same shape as the donor's `insert_internal`/`delete_internal`
//     associated functions threading `t`/`capacity` through every call
//     rather than storing it redundantly on every node.
//   * The one unavoidable `mem::replace` (swapping in a throwaway
//     placeholder to take `self.root` by value for root growth/
//     collapse) mirrors the donor's own `std::mem::replace(&mut
//     self.root, Box::new(BTreeNode::new(true)))` in `insert()`.
// =====================================================================

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::BPlusTreeError;
use crate::index::branch::BranchNode;
use crate::index::leaf::LeafNode;
use crate::index::node::Node;

/// Minimum capacity a node may be constructed with.
pub const MIN_CAPACITY: usize = 4;
/// Capacity used by a zero-argument construction.
pub const DEFAULT_CAPACITY: usize = 128;

const BULK_LOAD_BATCH_MULTIPLIER: usize = 2;
const MIN_BULK_LOAD_BATCH_SIZE: usize = 50;

/// An in-memory, ordered, single-owner B+ tree map.
///
/// All values live in leaf nodes; leaves are linked left-to-right so range
/// scans need only one O(log n) descent to find the starting position. See
/// the crate-level documentation for the full invariant list.
#[derive(Debug)]
pub struct BPlusTreeMap<K: Ord, V> {
    capacity: usize,
    root: Node<K, V>,
    head: Rc<RefCell<LeafNode<K, V>>>,
    rightmost_leaf_cache: Option<Rc<RefCell<LeafNode<K, V>>>>,
}

impl<K: Ord + Clone, V> BPlusTreeMap<K, V> {
    /// Create an empty tree with the given node capacity (minimum 4).
    pub fn new(capacity: usize) -> Result<Self, BPlusTreeError> {
        if capacity < MIN_CAPACITY {
            return Err(BPlusTreeError::InvalidCapacity { capacity });
        }
        let leaf = Rc::new(RefCell::new(LeafNode::new()));
        Ok(Self {
            capacity,
            root: Node::Leaf(Rc::clone(&leaf)),
            head: leaf,
            rightmost_leaf_cache: None,
        })
    }

    /// Bulk-construct a tree from key-value pairs that are already sorted by
    /// key. Roughly as correct as, and much faster than, inserting one at a
    /// time — but `items` is *assumed* sorted; out-of-order or duplicate
    /// input falls back transparently to ordinary insertion per pair.
    pub fn from_sorted_items<I: IntoIterator<Item = (K, V)>>(
        items: I,
        capacity: usize,
    ) -> Result<Self, BPlusTreeError> {
        let mut tree = Self::new(capacity)?;
        tree.bulk_load_sorted(items);
        Ok(tree)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Insert or overwrite `key` with `value` (last-writer-wins).
    pub fn set(&mut self, key: K, value: V) {
        if let Some((new_node, separator)) =
            Self::insert_recursive(&mut self.root, self.capacity, key, value)
        {
            let mut new_root = BranchNode::new();
            new_root.keys.push(separator);
            let old_root = std::mem::replace(&mut self.root, Node::Branch(Box::new(BranchNode::new())));
            new_root.children.push(old_root);
            new_root.children.push(new_node);
            self.root = Node::Branch(Box::new(new_root));
            log::debug!("root split: tree height increased by one");
        }
    }

    fn insert_recursive(
        node: &mut Node<K, V>,
        capacity: usize,
        key: K,
        value: V,
    ) -> Option<(Node<K, V>, K)> {
        match node {
            Node::Leaf(leaf_rc) => Self::insert_into_leaf(leaf_rc, capacity, key, value),
            Node::Branch(branch) => {
                let child_index = branch.find_child_index(&key);
                // `set`/`insert` has no failure mode in the public contract (§6), so
                // this is a documented `expect`-equivalent rather than a `Result`:
                // `find_child_index` always returns a value in `0..=keys.len()`, and
                // the branch-shape invariant (`children.len() == keys.len() + 1`) is
                // maintained by every split/merge in this module, so the index is
                // provably in range on any legal call sequence.
                assert!(
                    child_index < branch.children.len(),
                    "corrupted branch: child_index {child_index} out of range for {} children",
                    branch.children.len()
                );
                let split_result =
                    Self::insert_recursive(&mut branch.children[child_index], capacity, key, value);
                let (new_child, separator_key) = split_result?;
                branch
                    .insert_child_and_split_if_needed(child_index, separator_key, new_child, capacity)
                    .map(|(new_branch, sep)| {
                        log::trace!("branch split while propagating insert");
                        (Node::Branch(Box::new(new_branch)), sep)
                    })
            }
        }
    }

    fn insert_into_leaf(
        leaf_rc: &Rc<RefCell<LeafNode<K, V>>>,
        capacity: usize,
        key: K,
        value: V,
    ) -> Option<(Node<K, V>, K)> {
        let (pos, exists) = leaf_rc.borrow().find_position(&key);
        if exists {
            leaf_rc.borrow_mut().values[pos] = value;
            return None;
        }
        if !leaf_rc.borrow().is_full(capacity) {
            leaf_rc.borrow_mut().insert(key, value);
            return None;
        }
        log::trace!("leaf full at capacity {capacity}, splitting");
        let (new_leaf, separator) = LeafNode::split_and_insert(leaf_rc, key, value);
        Some((Node::Leaf(new_leaf), separator))
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Look up `key`, cloning its value out if present.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let leaf = self.root.find_leaf_for_key(key);
        let value = leaf.borrow().get(key).cloned();
        value
    }

    /// Look up `key`, falling back to `default` if absent.
    pub fn get_or(&self, key: &K, default: V) -> V
    where
        V: Clone,
    {
        self.get(key).unwrap_or(default)
    }

    pub fn contains(&self, key: &K) -> bool {
        let leaf = self.root.find_leaf_for_key(key);
        let exists = leaf.borrow().find_position(key).1;
        exists
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Remove `key`. Errs with `KeyNotFound` if it was absent.
    pub fn delete(&mut self, key: &K) -> Result<(), BPlusTreeError> {
        match self.remove(key)? {
            Some(_) => Ok(()),
            None => Err(BPlusTreeError::KeyNotFound),
        }
    }

    /// Remove and return the value for `key`. Errs with `KeyNotFound` if absent.
    pub fn pop(&mut self, key: &K) -> Result<V, BPlusTreeError> {
        self.remove(key)?.ok_or(BPlusTreeError::KeyNotFound)
    }

    /// Remove and return the value for `key`, or `default` if absent.
    ///
    /// Panics only if the tree's own structural invariants have been
    /// violated (`CorruptedStructure`) — never on ordinary absence, which is
    /// handled by returning `default`.
    pub fn pop_or(&mut self, key: &K, default: V) -> V {
        match self.remove(key) {
            Ok(value) => value.unwrap_or(default),
            Err(err) => panic!("{err}"),
        }
    }

    /// Remove and return the first (key, value) pair in key order.
    /// Errs with `Empty` if the tree has no entries.
    pub fn popitem(&mut self) -> Result<(K, V), BPlusTreeError> {
        let key = {
            let head = self.head.borrow();
            head.keys.first().cloned()
        };
        let key = key.ok_or(BPlusTreeError::Empty)?;
        let value = self.remove(&key)?.ok_or(BPlusTreeError::Empty)?;
        Ok((key, value))
    }

    fn remove(&mut self, key: &K) -> Result<Option<V>, BPlusTreeError> {
        let result = Self::delete_recursive(&mut self.root, self.capacity, key);
        match &result {
            Ok(Some(_)) => {
                self.collapse_root_if_needed();
                // Any structural delete can move or retire the cached rightmost
                // leaf; invalidate it and let the next bulk append recompute it.
                self.rightmost_leaf_cache = None;
            }
            Err(_) => {
                // The key may already have been removed from its leaf before
                // the rebalancer hit a corruption check further up the
                // recursion; the cache could now reference a detached or
                // stale leaf, so drop it rather than risk a bulk append
                // landing on the wrong node.
                self.rightmost_leaf_cache = None;
            }
            Ok(None) => {}
        }
        result
    }

    fn delete_recursive(
        node: &mut Node<K, V>,
        capacity: usize,
        key: &K,
    ) -> Result<Option<V>, BPlusTreeError> {
        match node {
            Node::Leaf(leaf_rc) => Ok(leaf_rc.borrow_mut().delete(key)),
            Node::Branch(branch) => {
                let child_index = branch.find_child_index(key);
                if child_index >= branch.children.len() {
                    return Err(BPlusTreeError::CorruptedStructure(format!(
                        "child_index {child_index} out of range for {} children",
                        branch.children.len()
                    )));
                }
                let removed = Self::delete_recursive(&mut branch.children[child_index], capacity, key)?;
                if removed.is_some() {
                    let child_underfull = branch.children[child_index].is_empty()
                        || branch.children[child_index].is_underfull(capacity);
                    if child_underfull {
                        Self::handle_underflow(branch, capacity, child_index)?;
                    }
                }
                Ok(removed)
            }
        }
    }

    fn handle_underflow(
        parent: &mut BranchNode<K, V>,
        capacity: usize,
        child_index: usize,
    ) -> Result<(), BPlusTreeError> {
        if child_index >= parent.children.len() {
            return Err(BPlusTreeError::CorruptedStructure(format!(
                "child_index {child_index} out of range for {} children",
                parent.children.len()
            )));
        }
        if !parent.children[child_index].is_underfull(capacity) {
            return Ok(());
        }
        if parent.children[child_index].is_empty() {
            return Self::merge_with_sibling(parent, capacity, child_index);
        }

        let mut redistributed = false;
        if child_index + 1 < parent.children.len()
            && parent.children[child_index + 1].can_donate(capacity)
        {
            Self::redistribute_from_right(parent, child_index)?;
            redistributed = true;
        }
        if !redistributed
            && child_index > 0
            && parent.children[child_index - 1].can_donate(capacity)
        {
            Self::redistribute_from_left(parent, child_index)?;
            redistributed = true;
        }
        if !redistributed {
            Self::merge_with_sibling(parent, capacity, child_index)?;
        }
        Ok(())
    }

    fn redistribute_from_right(
        parent: &mut BranchNode<K, V>,
        child_index: usize,
    ) -> Result<(), BPlusTreeError> {
        let (left_part, right_part) = parent.children.split_at_mut(child_index + 1);
        let child = &mut left_part[child_index];
        let right_sibling = &mut right_part[0];
        let new_separator = match (child, right_sibling) {
            (Node::Leaf(child_leaf), Node::Leaf(right_leaf)) => {
                child_leaf.borrow_mut().borrow_from_right(right_leaf);
                right_leaf.borrow().keys[0].clone()
            }
            (Node::Branch(child_branch), Node::Branch(right_branch)) => {
                let separator = parent.keys[child_index].clone();
                child_branch.borrow_from_right(right_branch, separator)
            }
            _ => {
                return Err(BPlusTreeError::CorruptedStructure(
                    "sibling node kinds must match".to_string(),
                ))
            }
        };
        parent.keys[child_index] = new_separator;
        log::trace!("redistributed from right sibling");
        Ok(())
    }

    fn redistribute_from_left(
        parent: &mut BranchNode<K, V>,
        child_index: usize,
    ) -> Result<(), BPlusTreeError> {
        let (left_part, right_part) = parent.children.split_at_mut(child_index);
        let left_sibling = &mut left_part[child_index - 1];
        let child = &mut right_part[0];
        let new_separator = match (child, left_sibling) {
            (Node::Leaf(child_leaf), Node::Leaf(left_leaf)) => {
                child_leaf.borrow_mut().borrow_from_left(left_leaf);
                child_leaf.borrow().keys[0].clone()
            }
            (Node::Branch(child_branch), Node::Branch(left_branch)) => {
                let separator = parent.keys[child_index - 1].clone();
                child_branch.borrow_from_left(left_branch, separator)
            }
            _ => {
                return Err(BPlusTreeError::CorruptedStructure(
                    "sibling node kinds must match".to_string(),
                ))
            }
        };
        parent.keys[child_index - 1] = new_separator;
        log::trace!("redistributed from left sibling");
        Ok(())
    }

    /// Merge an underfull (or empty) child into a sibling, preferring the
    /// left sibling over the right. Refuses — leaving both nodes underfull —
    /// if the merge would overflow capacity; see the capacity guard note in
    /// the crate-level rebalancer documentation.
    fn merge_with_sibling(
        parent: &mut BranchNode<K, V>,
        capacity: usize,
        child_index: usize,
    ) -> Result<(), BPlusTreeError> {
        if child_index > 0 {
            let can_merge = Self::can_merge(
                &parent.children[child_index - 1],
                &parent.children[child_index],
                capacity,
            )?;
            if can_merge {
                let removed_child = parent.children.remove(child_index);
                let separator = parent.keys.remove(child_index - 1);
                let left = &mut parent.children[child_index - 1];
                Self::merge_into(left, removed_child, separator)?;
                log::debug!("merged node with left sibling");
            }
            return Ok(());
        }
        if child_index + 1 < parent.children.len() {
            let can_merge = Self::can_merge(
                &parent.children[child_index],
                &parent.children[child_index + 1],
                capacity,
            )?;
            if can_merge {
                let removed_right = parent.children.remove(child_index + 1);
                let separator = parent.keys.remove(child_index);
                let child = &mut parent.children[child_index];
                Self::merge_into(child, removed_right, separator)?;
                log::debug!("merged node with right sibling");
            }
        }
        Ok(())
    }

    fn can_merge(
        left: &Node<K, V>,
        right: &Node<K, V>,
        capacity: usize,
    ) -> Result<bool, BPlusTreeError> {
        match (left, right) {
            (Node::Leaf(l), Node::Leaf(r)) => Ok(l.borrow().len() + r.borrow().len() <= capacity),
            (Node::Branch(l), Node::Branch(r)) => Ok(l.keys.len() + r.keys.len() + 1 <= capacity
                && l.children.len() + r.children.len() <= capacity + 1),
            _ => Err(BPlusTreeError::CorruptedStructure(
                "sibling node kinds must match".to_string(),
            )),
        }
    }

    fn merge_into(
        left: &mut Node<K, V>,
        right: Node<K, V>,
        separator: K,
    ) -> Result<(), BPlusTreeError> {
        match (left, right) {
            (Node::Leaf(left_leaf), Node::Leaf(right_rc)) => {
                left_leaf.borrow_mut().merge_with_right(&right_rc);
                Ok(())
            }
            (Node::Branch(left_branch), Node::Branch(right_branch)) => {
                left_branch.merge_with_right(*right_branch, separator);
                Ok(())
            }
            _ => Err(BPlusTreeError::CorruptedStructure(
                "sibling node kinds must match".to_string(),
            )),
        }
    }

    fn collapse_root_if_needed(&mut self) {
        let root = std::mem::replace(&mut self.root, Node::Branch(Box::new(BranchNode::new())));
        self.root = match root {
            Node::Branch(mut branch) if branch.children.len() == 1 => {
                log::debug!("root collapsed: tree height decreased by one");
                branch.children.pop().expect("branch with len 1 has one child")
            }
            other => other,
        };
    }

    // ------------------------------------------------------------------
    // Range iteration
    // ------------------------------------------------------------------

    /// Ordered `(key, value)` pairs with `start` inclusive and `end` exclusive.
    /// Either bound may be omitted.
    pub fn items(&self, start: Option<&K>, end: Option<&K>) -> Items<K, V>
    where
        V: Clone,
    {
        let (current, index) = match start {
            None => (Some(Rc::clone(&self.head)), 0),
            Some(start_key) => {
                let leaf = self.root.find_leaf_for_key(start_key);
                let index = leaf.borrow().keys.partition_point(|k| k < start_key);
                (Some(leaf), index)
            }
        };
        Items {
            current,
            index,
            end: end.cloned(),
        }
    }

    pub fn keys(&self, start: Option<&K>, end: Option<&K>) -> impl Iterator<Item = K> + '_
    where
        V: Clone,
    {
        self.items(start, end).map(|(k, _)| k)
    }

    pub fn values(&self, start: Option<&K>, end: Option<&K>) -> impl Iterator<Item = V> + '_
    where
        V: Clone,
    {
        self.items(start, end).map(|(_, v)| v)
    }

    /// Alias of [`BPlusTreeMap::items`].
    pub fn range(&self, start: Option<&K>, end: Option<&K>) -> Items<K, V>
    where
        V: Clone,
    {
        self.items(start, end)
    }

    // ------------------------------------------------------------------
    // Dict-like extras
    // ------------------------------------------------------------------

    /// Number of key-value pairs in the tree.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut current = Some(Rc::clone(&self.head));
        while let Some(leaf_rc) = current {
            count += leaf_rc.borrow().len();
            let next = leaf_rc.borrow().next.clone();
            current = next;
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Reset the tree to a single empty leaf.
    pub fn clear(&mut self) {
        let leaf = Rc::new(RefCell::new(LeafNode::new()));
        self.root = Node::Leaf(Rc::clone(&leaf));
        self.head = leaf;
        self.rightmost_leaf_cache = None;
    }

    /// Return the value for `key` if present; otherwise insert and return `default`.
    pub fn setdefault(&mut self, key: K, default: V) -> V
    where
        V: Clone,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        self.set(key, default.clone());
        default
    }

    /// Insert every `(key, value)` pair from `other`, overwriting on conflict.
    pub fn update<I: IntoIterator<Item = (K, V)>>(&mut self, other: I) {
        for (key, value) in other {
            self.set(key, value);
        }
    }

    /// Insert every pair from another tree, overwriting on conflict.
    pub fn update_from_map(&mut self, other: &BPlusTreeMap<K, V>)
    where
        V: Clone,
    {
        for (key, value) in other.items(None, None) {
            self.set(key, value);
        }
    }

    /// A structurally independent copy with the same capacity. Values are
    /// cloned (key sharing would be unsound once the copy diverges).
    pub fn copy(&self) -> Self
    where
        V: Clone,
    {
        let mut new_tree = Self::new(self.capacity).expect("capacity was already validated");
        new_tree.bulk_load_sorted(self.items(None, None));
        new_tree
    }

    // ------------------------------------------------------------------
    // Bulk load
    // ------------------------------------------------------------------

    fn bulk_load_sorted<I: IntoIterator<Item = (K, V)>>(&mut self, items: I) {
        let mut items = items.into_iter();
        let batch_size = (self.capacity * BULK_LOAD_BATCH_MULTIPLIER).max(MIN_BULK_LOAD_BATCH_SIZE);
        loop {
            let mut produced = false;
            for _ in 0..batch_size {
                match items.next() {
                    Some((key, value)) => {
                        produced = true;
                        self.insert_sorted_optimized(key, value);
                    }
                    None => break,
                }
            }
            if !produced {
                break;
            }
        }
    }

    fn insert_sorted_optimized(&mut self, key: K, value: V) {
        let use_fast_path = match &self.rightmost_leaf_cache {
            Some(cache) => {
                let leaf = cache.borrow();
                !leaf.is_empty() && leaf.keys.last().is_some_and(|last| &key > last) && !leaf.is_full(self.capacity)
            }
            None => false,
        };
        if use_fast_path {
            let cache = self.rightmost_leaf_cache.as_ref().expect("checked above");
            cache.borrow_mut().keys.push(key);
            cache.borrow_mut().values.push(value);
            return;
        }
        self.set(key, value);
        self.update_rightmost_leaf_cache();
    }

    fn update_rightmost_leaf_cache(&mut self) {
        let mut current = Rc::clone(&self.head);
        loop {
            let next = current.borrow().next.clone();
            match next {
                Some(n) => current = n,
                None => break,
            }
        }
        self.rightmost_leaf_cache = Some(current);
    }

    // ------------------------------------------------------------------
    // Testing-only introspection
    // ------------------------------------------------------------------

    /// Number of leaf nodes in the chain. Exposed for tests that assert on
    /// tree shape rather than on the dict-like surface.
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut current = Some(Rc::clone(&self.head));
        while let Some(leaf_rc) = current {
            count += 1;
            let next = leaf_rc.borrow().next.clone();
            current = next;
        }
        count
    }

    /// Total node count (leaves + branches), for tests/debugging.
    pub fn count_total_nodes(&self) -> usize {
        self.root.count_nodes()
    }

    /// Depth of the tree (0 for a single leaf root), for tests/debugging.
    pub fn depth(&self) -> usize {
        self.root.leftmost_depth()
    }

    /// Validate occupancy bounds, branch shape, and key ordering across the
    /// whole tree (SPEC §8 invariants #4 and #5). Exposed for tests that
    /// want to assert on tree shape directly rather than through the
    /// dict-like surface alone.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.root.check_invariants(self.capacity, true)
    }
}

impl<K: Ord + Clone, V> Default for BPlusTreeMap<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY).expect("DEFAULT_CAPACITY satisfies the minimum capacity")
    }
}

/// Lazy, single-pass iterator over `(key, value)` pairs produced by
/// [`BPlusTreeMap::items`]/[`BPlusTreeMap::range`].
pub struct Items<K, V> {
    current: Option<Rc<RefCell<LeafNode<K, V>>>>,
    index: usize,
    end: Option<K>,
}

impl<K: Ord + Clone, V: Clone> Iterator for Items<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf_rc = self.current.clone()?;
            let leaf = leaf_rc.borrow();
            if self.index < leaf.keys.len() {
                let key = leaf.keys[self.index].clone();
                if let Some(end) = &self.end {
                    if &key >= end {
                        drop(leaf);
                        self.current = None;
                        return None;
                    }
                }
                let value = leaf.values[self.index].clone();
                self.index += 1;
                return Some((key, value));
            }
            let next = leaf.next.clone();
            drop(leaf);
            self.current = next;
            self.index = 0;
        }
    }
}
