//! Integer-indexed sparse sequences over a fixed-fanout radix trie.
//!
//! Unlike [`crate::hash_trie`], indices route deterministically (no
//! clashes), so leaves hold a single `Value` rather than a clash list, and
//! growth is driven by the index being addressed rather than a load
//! factor. Per spec §4.6, tuple iteration itself is just a walk of
//! `0..len` calling [`TupleTrie::get`] — the structural trie below is an
//! implementation detail iteration never observes directly.

use crate::config::EngineConfig;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

enum Child {
    Null,
    Header(Rc<RefCell<Header>>),
    Leaf(Value),
}

impl Clone for Child {
    fn clone(&self) -> Self {
        match self {
            Child::Null => Child::Null,
            Child::Header(h) => Child::Header(Rc::clone(h)),
            Child::Leaf(v) => Child::Leaf(v.clone()),
        }
    }
}

struct Header {
    children: Vec<Child>,
    parent: Option<Weak<RefCell<Header>>>,
    child_index: usize,
}

impl Header {
    fn new_root(t: usize) -> Self {
        Header {
            children: (0..t).map(|_| Child::Null).collect(),
            parent: None,
            child_index: 0,
        }
    }

    fn new_child(parent: &Rc<RefCell<Header>>, child_index: usize, t: usize) -> Self {
        Header {
            children: (0..t).map(|_| Child::Null).collect(),
            parent: Some(Rc::downgrade(parent)),
            child_index,
        }
    }
}

pub struct TupleTrie {
    root: Rc<RefCell<Header>>,
    height: u32,
    length: u64,
    config: EngineConfig,
}

impl TupleTrie {
    pub fn new(config: EngineConfig) -> Self {
        let t = config.tuple_fanout as usize;
        TupleTrie {
            root: Rc::new(RefCell::new(Header::new_root(t))),
            height: 0,
            length: 0,
            config,
        }
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn capacity(&self) -> u64 {
        (self.config.tuple_fanout as u64).pow(self.height + 1)
    }

    fn child_index(&self, i: u64, depth: u32) -> usize {
        let shift = self.config.tuple_shift();
        let mask = (1u64 << shift) - 1;
        ((i >> (depth as u64 * shift as u64)) & mask) as usize
    }

    /// `Omega` for missing or out-of-range indices.
    pub fn get(&self, i: u64) -> Value {
        if i >= self.capacity() {
            return Value::Omega;
        }
        let mut node = Rc::clone(&self.root);
        let mut depth = self.height;
        loop {
            let idx = self.child_index(i, depth);
            let child = node.borrow().children[idx].clone();
            match child {
                Child::Null => return Value::Omega,
                Child::Leaf(v) => return v,
                Child::Header(h) => {
                    if depth == 0 {
                        return Value::Omega;
                    }
                    node = h;
                    depth -= 1;
                }
            }
        }
    }

    fn grow_to_fit(&mut self, i: u64) {
        let t = self.config.tuple_fanout as usize;
        while i >= self.capacity() {
            let old_root = Rc::clone(&self.root);
            let new_root = Rc::new(RefCell::new(Header::new_root(t)));
            new_root.borrow_mut().children[0] = Child::Header(Rc::clone(&old_root));
            old_root.borrow_mut().parent = Some(Rc::downgrade(&new_root));
            old_root.borrow_mut().child_index = 0;
            self.root = new_root;
            self.height += 1;
        }
    }

    /// `set(i, v)`: grows height to fit `i`; `v = Omega` deletes the leaf
    /// and prunes empty headers.
    pub fn set(&mut self, i: u64, v: Value) {
        if v.is_omega() {
            self.delete(i);
            return;
        }
        self.grow_to_fit(i);
        let t = self.config.tuple_fanout as usize;
        let mut node = Rc::clone(&self.root);
        let mut depth = self.height;
        while depth > 0 {
            let idx = self.child_index(i, depth);
            let existing = node.borrow().children[idx].clone();
            let next = match existing {
                Child::Header(h) => h,
                Child::Null | Child::Leaf(_) => {
                    let new_header = Rc::new(RefCell::new(Header::new_child(&node, idx, t)));
                    node.borrow_mut().children[idx] = Child::Header(Rc::clone(&new_header));
                    new_header
                }
            };
            node = next;
            depth -= 1;
        }
        let idx = self.child_index(i, 0);
        node.borrow_mut().children[idx] = Child::Leaf(v);
        if i + 1 > self.length {
            self.length = i + 1;
        }
    }

    fn delete(&mut self, i: u64) {
        if i >= self.capacity() {
            return;
        }
        let mut node = Rc::clone(&self.root);
        let mut depth = self.height;
        while depth > 0 {
            let idx = self.child_index(i, depth);
            let child = node.borrow().children[idx].clone();
            match child {
                Child::Header(h) => {
                    node = h;
                    depth -= 1;
                }
                _ => return,
            }
        }
        let idx = self.child_index(i, 0);
        node.borrow_mut().children[idx] = Child::Null;
        self.prune_empty(node);
    }

    fn prune_empty(&self, mut node: Rc<RefCell<Header>>) {
        loop {
            if Rc::ptr_eq(&node, &self.root) {
                return;
            }
            let all_null = node.borrow().children.iter().all(|c| matches!(c, Child::Null));
            if !all_null {
                return;
            }
            let (parent_weak, child_index) = {
                let b = node.borrow();
                (b.parent.clone(), b.child_index)
            };
            let Some(parent) = parent_weak.and_then(|w| w.upgrade()) else {
                return;
            };
            parent.borrow_mut().children[child_index] = Child::Null;
            node = parent;
        }
    }

    pub fn append(&mut self, v: Value) {
        let idx = self.length;
        self.set(idx, v);
    }

    /// XOR over `(index, value-hash)` for every non-`Omega` position.
    pub fn hash32(&self) -> u32 {
        let mut acc = 0u32;
        for i in 0..self.length {
            let v = self.get(i);
            if !v.is_omega() {
                acc ^= (i as u32) ^ (i >> 32) as u32 ^ v.hash32();
            }
        }
        acc
    }
}

impl PartialEq for TupleTrie {
    fn eq(&self, other: &Self) -> bool {
        if self.length != other.length {
            return false;
        }
        (0..self.length).all(|i| crate::value::spec_equal(&self.get(i), &other.get(i)))
    }
}
impl Eq for TupleTrie {}

impl Clone for TupleTrie {
    /// Deep structural clone; no `Rc` sharing with the source.
    fn clone(&self) -> Self {
        let mut out = TupleTrie::new(self.config);
        for i in 0..self.length {
            let v = self.get(i);
            if !v.is_omega() {
                out.set(i, v);
            }
        }
        out.length = self.length;
        out
    }
}

/// Serializes as `(config, length, sparse non-Omega entries)` rather than
/// the internal radix tree shape, for the same reason `HashTrie` does
/// (`Header`'s `Weak` parent pointer isn't serializable, and a tuple
/// rebuilt from its entries is observably identical).
#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Snapshot {
        config: EngineConfig,
        length: u64,
        entries: Vec<(u64, Value)>,
    }

    impl Serialize for TupleTrie {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let entries = (0..self.length)
                .filter_map(|i| {
                    let v = self.get(i);
                    (!v.is_omega()).then_some((i, v))
                })
                .collect();
            Snapshot {
                config: self.config,
                length: self.length,
                entries,
            }
            .serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for TupleTrie {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let snapshot = Snapshot::deserialize(deserializer)?;
            let mut tuple = TupleTrie::new(snapshot.config);
            for (i, v) in snapshot.entries {
                tuple.set(i, v);
            }
            tuple.length = snapshot.length;
            Ok(tuple)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn get_on_empty_tuple_yields_omega() {
        let t = TupleTrie::new(cfg());
        assert!(t.get(0).is_omega());
        assert!(t.get(1000).is_omega());
    }

    #[test]
    fn set_then_get_round_trips_and_grows_height() {
        let mut t = TupleTrie::new(cfg());
        t.set(5000, Value::Short(42));
        assert!(matches!(t.get(5000), Value::Short(42)));
        assert_eq!(t.len(), 5001);
        assert!(t.get(0).is_omega());
    }

    #[test]
    fn append_grows_length_by_one_each_time() {
        let mut t = TupleTrie::new(cfg());
        t.append(Value::Short(1));
        t.append(Value::Short(2));
        assert_eq!(t.len(), 2);
        assert!(matches!(t.get(0), Value::Short(1)));
        assert!(matches!(t.get(1), Value::Short(2)));
    }

    #[test]
    fn setting_omega_deletes_the_cell() {
        let mut t = TupleTrie::new(cfg());
        t.set(3, Value::Short(9));
        t.set(3, Value::Omega);
        assert!(t.get(3).is_omega());
    }
}
