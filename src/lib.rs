//! An in-memory, ordered B+ tree map with dict-like ergonomics.
//!
//! The public surface is [`BPlusTreeMap`]: construct one with a node
//! capacity, then use `set`/`get`/`delete` and friends like an ordered
//! dictionary. Keys stay sorted at all times; [`BPlusTreeMap::items`]
//! and [`BPlusTreeMap::range`] walk the underlying leaf chain directly,
//! so a bounded scan costs one descent plus one step per entry visited.
//!
//! ```
//! use bplus_tree_map::BPlusTreeMap;
//!
//! let mut map = BPlusTreeMap::new(8).unwrap();
//! map.set("b", 2);
//! map.set("a", 1);
//! map.set("c", 3);
//!
//! assert_eq!(map.get(&"a"), Some(1));
//! let pairs: Vec<_> = map.items(None, None).collect();
//! assert_eq!(pairs, vec![("a", 1), ("b", 2), ("c", 3)]);
//! ```

pub mod error;
pub mod index;

pub use error::BPlusTreeError;
pub use index::{BPlusTreeMap, BranchNode, Items, LeafNode, Node, DEFAULT_CAPACITY, MIN_CAPACITY};
