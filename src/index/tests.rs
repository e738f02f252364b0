// =====================================================================
// File: index/tests.rs
//
// Description:
//   End-to-end tests for `BPlusTreeMap`: insertion with propagating
//   splits, deletion with underflow repair, range scans, and the
//   dict-like convenience surface.
// =====================================================================

#[cfg(test)]
mod basic_operations {
    use crate::BPlusTreeMap;

    #[test]
    fn insert_and_get_basic() {
        let mut map = BPlusTreeMap::new(4).unwrap();
        map.set("dog", "bark");
        map.set("cat", "meow");
        map.set("fish", "splash");
        assert_eq!(map.get(&"dog"), Some("bark"));
        assert_eq!(map.get(&"cat"), Some("meow"));
        assert_eq!(map.get(&"bird"), None);
    }

    #[test]
    fn insert_overwrites_value_last_writer_wins() {
        let mut map = BPlusTreeMap::new(4).unwrap();
        map.set("dog", "woof");
        map.set("dog", "bark");
        assert_eq!(map.get(&"dog"), Some("bark"));
        assert_eq!(map.size(), 1);
    }

    #[test]
    fn rejects_capacity_below_minimum() {
        let err = BPlusTreeMap::<i32, i32>::new(3).unwrap_err();
        assert_eq!(
            err,
            crate::BPlusTreeError::InvalidCapacity { capacity: 3 }
        );
    }

    #[test]
    fn contains_reflects_membership() {
        let mut map = BPlusTreeMap::new(4).unwrap();
        map.set(1, "one");
        assert!(map.contains(&1));
        assert!(!map.contains(&2));
    }
}

#[cfg(test)]
mod split_and_grow {
    use crate::BPlusTreeMap;

    #[test]
    fn leaf_split_keeps_all_keys_reachable() {
        let mut map = BPlusTreeMap::new(4).unwrap();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5)] {
            map.set(k, v);
        }
        for (k, v) in [("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5)] {
            assert_eq!(map.get(&k), Some(v));
        }
        assert!(map.leaf_count() >= 2);
    }

    #[test]
    fn many_inserts_grow_tree_height_and_stay_balanced() {
        let mut map = BPlusTreeMap::new(4).unwrap();
        for i in 0..200 {
            map.set(i, i * 10);
        }
        assert_eq!(map.size(), 200);
        for i in 0..200 {
            assert_eq!(map.get(&i), Some(i * 10));
        }
        assert!(map.depth() >= 1, "enough inserts must grow a branch level");
    }

    #[test]
    fn leaves_form_a_single_ascending_chain() {
        let mut map = BPlusTreeMap::new(4).unwrap();
        let mut values: Vec<i32> = (0..50).collect();
        values.reverse();
        for v in values {
            map.set(v, v);
        }
        let collected: Vec<_> = map.keys(None, None).collect();
        let mut expected: Vec<i32> = (0..50).collect();
        expected.sort();
        assert_eq!(collected, expected);
    }
}

#[cfg(test)]
mod deletion_and_repair {
    use crate::BPlusTreeMap;

    fn sample() -> BPlusTreeMap<&'static str, &'static str> {
        let mut t = BPlusTreeMap::new(4).unwrap();
        for (k, v) in [
            ("dog", "bark"),
            ("cat", "meow"),
            ("dinosaur", "raaawr"),
            ("bird", "chirp"),
            ("frog", "ribbet"),
            ("elephant", "honkhonk"),
            ("fox", "yip"),
        ] {
            t.set(k, v);
        }
        t
    }

    #[test]
    fn delete_leaf_key() {
        let mut t = sample();
        assert_eq!(t.get(&"frog"), Some("ribbet"));
        t.delete(&"frog").unwrap();
        assert_eq!(t.get(&"frog"), None);
    }

    #[test]
    fn delete_missing_key_errors() {
        let mut t = sample();
        assert_eq!(t.delete(&"unicorn"), Err(crate::BPlusTreeError::KeyNotFound));
        assert_eq!(t.get(&"dog"), Some("bark"));
    }

    #[test]
    fn delete_until_empty() {
        let mut t = sample();
        let keys = ["bird", "cat", "dinosaur", "dog", "elephant", "fox", "frog"];
        for k in keys {
            assert!(t.get(&k).is_some(), "missing before delete: {k}");
            t.delete(&k).unwrap();
            assert_eq!(t.get(&k), None, "still present after delete: {k}");
        }
        assert!(t.is_empty());
        assert_eq!(t.leaf_count(), 1);
        assert_eq!(t.depth(), 0);
    }

    #[test]
    fn deletions_trigger_merges_and_stay_correct() {
        let mut t = BPlusTreeMap::new(4).unwrap();
        for k in 0..100 {
            t.set(k, k * 2);
        }
        for k in (0..100).step_by(2) {
            t.delete(&k).unwrap();
        }
        for k in 0..100 {
            if k % 2 == 0 {
                assert_eq!(t.get(&k), None);
            } else {
                assert_eq!(t.get(&k), Some(k * 2));
            }
        }
    }

    #[test]
    fn root_collapses_when_branch_has_one_child() {
        let mut t = BPlusTreeMap::new(4).unwrap();
        for k in 0..30 {
            t.set(k, k);
        }
        assert!(t.depth() >= 1);
        for k in 2..30 {
            let _ = t.delete(&k);
        }
        assert_eq!(t.size(), 2);
        assert_eq!(t.get(&0), Some(0));
        assert_eq!(t.get(&1), Some(1));
    }
}

#[cfg(test)]
mod range_and_dict_helpers {
    use crate::BPlusTreeMap;

    fn populated() -> BPlusTreeMap<&'static str, i32> {
        let mut t = BPlusTreeMap::new(4).unwrap();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5)] {
            t.set(k, v);
        }
        t
    }

    #[test]
    fn range_is_start_inclusive_end_exclusive() {
        let t = populated();
        let collected: Vec<_> = t.items(Some(&"b"), Some(&"d")).collect();
        assert_eq!(collected, vec![("b", 2), ("c", 3)]);
    }

    #[test]
    fn range_with_open_bounds() {
        let t = populated();
        let from_c: Vec<_> = t.keys(Some(&"c"), None).collect();
        assert_eq!(from_c, vec!["c", "d", "e"]);

        let up_to_c: Vec<_> = t.keys(None, Some(&"c")).collect();
        assert_eq!(up_to_c, vec!["a", "b"]);
    }

    #[test]
    fn pop_removes_and_returns_value() {
        let mut t = populated();
        assert_eq!(t.pop(&"a"), Ok(1));
        assert_eq!(t.get(&"a"), None);
        assert_eq!(t.pop(&"a"), Err(crate::BPlusTreeError::KeyNotFound));
    }

    #[test]
    fn pop_or_falls_back_to_default() {
        let mut t = populated();
        assert_eq!(t.pop_or(&"z", -1), -1);
        assert_eq!(t.pop_or(&"a", -1), 1);
    }

    #[test]
    fn popitem_removes_first_key_in_order() {
        let mut t = populated();
        assert_eq!(t.popitem(), Ok(("a", 1)));
        assert_eq!(t.popitem(), Ok(("b", 2)));
    }

    #[test]
    fn popitem_on_empty_errors() {
        let mut t: BPlusTreeMap<&str, i32> = BPlusTreeMap::new(4).unwrap();
        assert_eq!(t.popitem(), Err(crate::BPlusTreeError::Empty));
    }

    #[test]
    fn setdefault_inserts_only_if_absent() {
        let mut t = populated();
        assert_eq!(t.setdefault("a", 99), 1);
        assert_eq!(t.setdefault("z", 99), 99);
        assert_eq!(t.get(&"z"), Some(99));
    }

    #[test]
    fn update_overwrites_on_conflict() {
        let mut t = populated();
        t.update(vec![("a", 100), ("f", 6)]);
        assert_eq!(t.get(&"a"), Some(100));
        assert_eq!(t.get(&"f"), Some(6));
    }

    #[test]
    fn copy_is_structurally_independent() {
        let t = populated();
        let mut copy = t.copy();
        copy.set("a", 1000);
        assert_eq!(t.get(&"a"), Some(1));
        assert_eq!(copy.get(&"a"), Some(1000));
    }

    #[test]
    fn clear_empties_the_map() {
        let mut t = populated();
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.size(), 0);
        assert_eq!(t.leaf_count(), 1);
    }
}

#[cfg(test)]
mod bulk_load {
    use crate::BPlusTreeMap;

    #[test]
    fn from_sorted_items_matches_incremental_insert() {
        let items: Vec<(i32, i32)> = (0..500).map(|i| (i, i * 3)).collect();
        let bulk = BPlusTreeMap::from_sorted_items(items.clone(), 8).unwrap();
        assert_eq!(bulk.size(), 500);
        for (k, v) in items {
            assert_eq!(bulk.get(&k), Some(v));
        }
        let collected: Vec<_> = bulk.keys(None, None).collect();
        let mut expected: Vec<i32> = (0..500).collect();
        expected.sort();
        assert_eq!(collected, expected);
    }
}
