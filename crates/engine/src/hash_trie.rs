//! Generic extendible hash trie shared by [`crate::set::Set`] and
//! [`crate::map::Map`].
//!
//! A trie is a tree of [`Header`] nodes down to a uniform height `H`; at
//! that depth every child slot is either empty or a sorted clash list
//! (`Child::Leaf`). Expansion/contraction move `H` by exactly one level at
//! a time, matching `sets.c`'s `set_expand_header`/`set_contract_header`
//! (see `SPEC_FULL.md` for the citation). Header nodes hold a `Weak`
//! parent pointer and their own child index so cursors can ascend without
//! a separate stack — the non-recursive walk spec §9 calls for, expressed
//! with this crate's established `Rc<RefCell<_>>` idiom instead of raw
//! pointers.

use crate::config::EngineConfig;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub trait TrieCell: Clone {
    /// Hash used for routing and clash-list ordering.
    fn hash(&self) -> u32;

    /// Hash folded into the whole-trie `HS` summary. Defaults to
    /// [`TrieCell::hash`]; `Map`'s cells override this to fold in the
    /// range value too (spec §3: "`HS` folds a composite (domain, range)
    /// hash per cell"), while routing still happens on the domain hash
    /// alone.
    fn summary_hash(&self) -> u32 {
        self.hash()
    }
}

#[derive(Clone)]
pub enum Child<C> {
    Null,
    Header(Rc<RefCell<Header<C>>>),
    Leaf(Vec<C>),
}

pub struct Header<C> {
    pub children: Vec<Child<C>>,
    pub parent: Option<Weak<RefCell<Header<C>>>>,
    pub child_index: usize,
}

impl<C> Header<C> {
    fn new_root(r: usize) -> Self {
        Header {
            children: (0..r).map(|_| Child::Null).collect(),
            parent: None,
            child_index: 0,
        }
    }

    fn new_child(parent: &Rc<RefCell<Header<C>>>, child_index: usize, r: usize) -> Self {
        Header {
            children: (0..r).map(|_| Child::Null).collect(),
            parent: Some(Rc::downgrade(parent)),
            child_index,
        }
    }
}

pub enum InsertOutcome {
    Inserted,
    Replaced,
}

pub struct HashTrie<C> {
    root: Rc<RefCell<Header<C>>>,
    height: u32,
    cardinality: u64,
    hash_summary: u32,
    expansion_trigger: u64,
    contraction_trigger: u64,
    config: EngineConfig,
}

impl<C: TrieCell> HashTrie<C> {
    pub fn new(config: EngineConfig) -> Self {
        let r = config.radix as usize;
        HashTrie {
            root: Rc::new(RefCell::new(Header::new_root(r))),
            height: 0,
            cardinality: 0,
            hash_summary: 0,
            expansion_trigger: Self::expansion_trigger_for(&config, 0),
            contraction_trigger: Self::contraction_trigger_for(&config, 0),
            config,
        }
    }

    pub fn cardinality(&self) -> u64 {
        self.cardinality
    }

    pub fn hash_summary(&self) -> u32 {
        self.hash_summary
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    fn expansion_trigger_for(config: &EngineConfig, height: u32) -> u64 {
        (config.radix as u64).pow(height + 1) * config.clash_factor
    }

    fn contraction_trigger_for(config: &EngineConfig, height: u32) -> u64 {
        (config.radix as u64).pow(height)
    }

    fn child_index(hash: u32, depth: u32, shift: u32) -> usize {
        let mask = (1u32 << shift) - 1;
        ((hash >> (depth * shift)) & mask) as usize
    }

    pub fn lookup(&self, hash: u32, matches: impl Fn(&C) -> bool) -> Option<C> {
        let shift = self.config.shift();
        let mut node = Rc::clone(&self.root);
        let mut depth = 0u32;
        loop {
            let idx = Self::child_index(hash, depth, shift);
            let child = node.borrow().children[idx].clone();
            match child {
                Child::Null => return None,
                Child::Leaf(cells) => {
                    return cells.iter().find(|c| c.hash() == hash && matches(c)).cloned();
                }
                Child::Header(h) => {
                    node = h;
                    depth += 1;
                }
            }
        }
    }

    pub fn contains(&self, hash: u32, matches: impl Fn(&C) -> bool) -> bool {
        self.lookup(hash, matches).is_some()
    }

    /// Inserts a new cell built by `make` unless a cell already satisfies
    /// `matches`, in which case `on_existing` mutates it in place.
    pub fn insert_with(
        &mut self,
        hash: u32,
        matches: impl Fn(&C) -> bool,
        make: impl FnOnce() -> C,
        on_existing: impl FnOnce(&mut C),
    ) -> InsertOutcome {
        let shift = self.config.shift();
        let r = self.config.radix as usize;
        let mut node = Rc::clone(&self.root);
        let mut depth = 0u32;
        while depth < self.height {
            let idx = Self::child_index(hash, depth, shift);
            let existing = node.borrow().children[idx].clone();
            let next_node = match existing {
                Child::Header(h) => h,
                Child::Null => {
                    let new_header = Rc::new(RefCell::new(Header::new_child(&node, idx, r)));
                    node.borrow_mut().children[idx] = Child::Header(Rc::clone(&new_header));
                    new_header
                }
                Child::Leaf(_) => unreachable!("leaf above trie height"),
            };
            node = next_node;
            depth += 1;
        }

        let idx = Self::child_index(hash, depth, shift);
        let mut node_mut = node.borrow_mut();
        match &mut node_mut.children[idx] {
            Child::Header(_) => unreachable!("header at trie height"),
            slot @ Child::Null => {
                let cell = make();
                let summary = cell.summary_hash();
                *slot = Child::Leaf(vec![cell]);
                drop(node_mut);
                self.cardinality += 1;
                self.hash_summary ^= summary;
                self.maybe_expand();
                InsertOutcome::Inserted
            }
            Child::Leaf(cells) => {
                let run_start = cells.partition_point(|c| c.hash() < hash);
                let run_end = run_start + cells[run_start..].iter().take_while(|c| c.hash() == hash).count();
                if let Some(i) = (run_start..run_end).find(|&i| matches(&cells[i])) {
                    let old_summary = cells[i].summary_hash();
                    on_existing(&mut cells[i]);
                    let new_summary = cells[i].summary_hash();
                    drop(node_mut);
                    self.hash_summary ^= old_summary ^ new_summary;
                    InsertOutcome::Replaced
                } else {
                    let cell = make();
                    let summary = cell.summary_hash();
                    cells.insert(run_start, cell);
                    drop(node_mut);
                    self.cardinality += 1;
                    self.hash_summary ^= summary;
                    self.maybe_expand();
                    InsertOutcome::Inserted
                }
            }
        }
    }

    pub fn remove(&mut self, hash: u32, matches: impl Fn(&C) -> bool) -> Option<C> {
        let shift = self.config.shift();
        let mut node = Rc::clone(&self.root);
        let mut depth = 0u32;
        while depth < self.height {
            let idx = Self::child_index(hash, depth, shift);
            let child = node.borrow().children[idx].clone();
            match child {
                Child::Header(h) => {
                    node = h;
                    depth += 1;
                }
                Child::Null => return None,
                Child::Leaf(_) => unreachable!("leaf above trie height"),
            }
        }

        let idx = Self::child_index(hash, depth, shift);
        let removed = {
            let mut node_mut = node.borrow_mut();
            let popped = match &mut node_mut.children[idx] {
                Child::Leaf(cells) => {
                    let pos = cells.iter().position(|c| c.hash() == hash && matches(c));
                    pos.map(|p| (cells.remove(p), cells.is_empty()))
                }
                _ => None,
            };
            popped.map(|(cell, now_empty)| {
                if now_empty {
                    node_mut.children[idx] = Child::Null;
                }
                cell
            })
        };

        let cell = removed?;
        self.cardinality -= 1;
        self.hash_summary ^= cell.summary_hash();
        self.prune_empty(node);
        self.maybe_contract();
        Some(cell)
    }

    fn prune_empty(&mut self, mut node: Rc<RefCell<Header<C>>>) {
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

    fn maybe_expand(&mut self) {
        if self.cardinality > self.expansion_trigger {
            self.expand();
        }
    }

    fn maybe_contract(&mut self) {
        if self.height > 0 && self.cardinality < self.contraction_trigger {
            self.contract();
        }
    }

    fn expand(&mut self) {
        let old_height = self.height;
        let shift = self.config.shift();
        let r = self.config.radix as usize;
        Self::expand_node(Rc::clone(&self.root), 0, old_height, shift, r);
        self.height += 1;
        self.expansion_trigger = Self::expansion_trigger_for(&self.config, self.height);
        self.contraction_trigger = Self::contraction_trigger_for(&self.config, self.height);
        setl_core::stats::STATS.with(|s| s.trie_expanded());
    }

    fn expand_node(node: Rc<RefCell<Header<C>>>, depth: u32, old_height: u32, shift: u32, r: usize) {
        if depth < old_height {
            let children: Vec<Child<C>> = node.borrow().children.clone();
            for child in children {
                if let Child::Header(h) = child {
                    Self::expand_node(h, depth + 1, old_height, shift, r);
                }
            }
            return;
        }
        for idx in 0..r {
            let is_leaf = matches!(node.borrow().children[idx], Child::Leaf(_));
            if !is_leaf {
                continue;
            }
            let cells = match std::mem::replace(&mut node.borrow_mut().children[idx], Child::Null) {
                Child::Leaf(v) => v,
                _ => unreachable!(),
            };
            let new_header = Rc::new(RefCell::new(Header::new_child(&node, idx, r)));
            let mut buckets: Vec<Vec<C>> = (0..r).map(|_| Vec::new()).collect();
            for cell in cells {
                let b = Self::child_index(cell.hash(), depth + 1, shift);
                buckets[b].push(cell);
            }
            {
                let mut nh = new_header.borrow_mut();
                for (b, bucket) in buckets.into_iter().enumerate() {
                    if !bucket.is_empty() {
                        nh.children[b] = Child::Leaf(bucket);
                    }
                }
            }
            node.borrow_mut().children[idx] = Child::Header(new_header);
        }
    }

    fn contract(&mut self) {
        let old_height = self.height;
        let r = self.config.radix as usize;
        Self::contract_node(Rc::clone(&self.root), 0, old_height, r);
        self.height -= 1;
        self.expansion_trigger = Self::expansion_trigger_for(&self.config, self.height);
        self.contraction_trigger = Self::contraction_trigger_for(&self.config, self.height);
        setl_core::stats::STATS.with(|s| s.trie_contracted());
    }

    fn contract_node(node: Rc<RefCell<Header<C>>>, depth: u32, old_height: u32, r: usize) {
        if depth + 1 < old_height {
            let children: Vec<Child<C>> = node.borrow().children.clone();
            for child in children {
                if let Child::Header(h) = child {
                    Self::contract_node(h, depth + 1, old_height, r);
                }
            }
            return;
        }
        for idx in 0..r {
            let is_header = matches!(node.borrow().children[idx], Child::Header(_));
            if !is_header {
                continue;
            }
            let header = match std::mem::replace(&mut node.borrow_mut().children[idx], Child::Null) {
                Child::Header(h) => h,
                _ => unreachable!(),
            };
            let lists: Vec<Vec<C>> = header
                .borrow()
                .children
                .iter()
                .map(|c| match c {
                    Child::Leaf(v) => v.clone(),
                    _ => Vec::new(),
                })
                .collect();
            let merged = Self::merge_sorted(lists);
            node.borrow_mut().children[idx] = if merged.is_empty() {
                Child::Null
            } else {
                Child::Leaf(merged)
            };
        }
    }

    fn merge_sorted(lists: Vec<Vec<C>>) -> Vec<C> {
        let mut merged: Vec<C> = lists.into_iter().flatten().collect();
        merged.sort_by_key(|c| c.hash());
        merged
    }

    pub fn for_each(&self, mut f: impl FnMut(&C)) {
        let mut cursor = self.cursor();
        while let Some(cell) = cursor.next() {
            f(&cell);
        }
    }

    pub fn cursor(&self) -> TrieCursor<C> {
        TrieCursor {
            work_hdr: Rc::clone(&self.root),
            height: 0,
            index: 0,
            leaf_pending: None,
            exhausted: false,
        }
    }

    /// Deep structural clone: a fresh tree, no Rc sharing with `self`.
    /// Cloning each cell via [`TrieCell`]'s `Clone` bound performs the
    /// `mark` spec calls for on every payload, since cells hold `Rc`s to
    /// the actual Values and `Clone` on an `Rc` *is* `mark`.
    pub fn deep_clone(&self) -> HashTrie<C> {
        let r = self.config.radix as usize;
        let new_root = Rc::new(RefCell::new(Header::new_root(r)));
        Self::deep_clone_node(&self.root, &new_root, r);
        HashTrie {
            root: new_root,
            height: self.height,
            cardinality: self.cardinality,
            hash_summary: self.hash_summary,
            expansion_trigger: self.expansion_trigger,
            contraction_trigger: self.contraction_trigger,
            config: self.config,
        }
    }

    /// Rebuild a trie from a flat cell list, e.g. one recovered from a
    /// `serde` snapshot. Assumes `cells` carries no duplicate keys.
    #[cfg(feature = "serde")]
    pub fn from_cells(config: EngineConfig, cells: Vec<C>) -> Self
    where
        C: PartialEq,
    {
        let mut trie = HashTrie::new(config);
        for cell in cells {
            let hash = cell.hash();
            trie.insert_with(hash, |c| c == &cell, || cell.clone(), |_| {});
        }
        trie
    }

    fn deep_clone_node(src: &Rc<RefCell<Header<C>>>, dst: &Rc<RefCell<Header<C>>>, r: usize) {
        for idx in 0..r {
            let child = src.borrow().children[idx].clone();
            match child {
                Child::Null => {}
                Child::Leaf(cells) => {
                    dst.borrow_mut().children[idx] = Child::Leaf(cells);
                }
                Child::Header(h) => {
                    let new_child = Rc::new(RefCell::new(Header::new_child(dst, idx, r)));
                    Self::deep_clone_node(&h, &new_child, r);
                    dst.borrow_mut().children[idx] = Child::Header(new_child);
                }
            }
        }
    }
}

/// Non-recursive resumable walk implementing spec §4.6's trie iteration
/// contract: (a) drain a pending leaf; (b)/(e) descend into the next
/// child; (c) ascend via the parent pointer once a level is exhausted;
/// (d) skip null children.
pub struct TrieCursor<C> {
    work_hdr: Rc<RefCell<Header<C>>>,
    height: u32,
    index: usize,
    leaf_pending: Option<(usize, Vec<C>)>,
    exhausted: bool,
}

impl<C: Clone> TrieCursor<C> {
    pub fn height(&self) -> u32 {
        self.height
    }
}

impl<C: Clone> Iterator for TrieCursor<C> {
    type Item = C;

    fn next(&mut self) -> Option<C> {
        loop {
            if let Some((pos, leaf)) = &mut self.leaf_pending {
                if *pos < leaf.len() {
                    let cell = leaf[*pos].clone();
                    *pos += 1;
                    return Some(cell);
                }
                self.leaf_pending = None;
            }

            if self.exhausted {
                return None;
            }

            let r = self.work_hdr.borrow().children.len();
            if self.index < r {
                let child = self.work_hdr.borrow().children[self.index].clone();
                self.index += 1;
                match child {
                    Child::Null => continue,
                    Child::Leaf(cells) => {
                        self.leaf_pending = Some((0, cells));
                        continue;
                    }
                    Child::Header(h) => {
                        self.work_hdr = h;
                        self.height += 1;
                        self.index = 0;
                        continue;
                    }
                }
            }

            let parent = self.work_hdr.borrow().parent.clone();
            match parent.and_then(|w| w.upgrade()) {
                Some(parent) => {
                    let child_index = self.work_hdr.borrow().child_index;
                    self.work_hdr = parent;
                    self.height -= 1;
                    self.index = child_index + 1;
                }
                None => {
                    self.exhausted = true;
                    return None;
                }
            }
        }
    }
}

/// A trie serializes as a flat cell list plus its config rather than its
/// internal node shape — `Header`'s `Weak` parent pointers can't round-trip
/// through `serde`, and a freshly rebuilt trie from the same cells is
/// observably identical anyway.
#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Snapshot<C> {
        config: EngineConfig,
        cells: Vec<C>,
    }

    impl<C: TrieCell + Serialize + Clone> Serialize for HashTrie<C> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            Snapshot {
                config: self.config,
                cells: self.cursor().collect(),
            }
            .serialize(serializer)
        }
    }

    impl<'de, C: TrieCell + Deserialize<'de> + PartialEq + Clone> Deserialize<'de> for HashTrie<C> {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let snapshot = Snapshot::<C>::deserialize(deserializer)?;
            Ok(HashTrie::from_cells(snapshot.config, snapshot.cells))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct IntCell(u32);
    impl TrieCell for IntCell {
        fn hash(&self) -> u32 {
            self.0
        }
    }

    fn insert(trie: &mut HashTrie<IntCell>, n: u32) {
        trie.insert_with(n, |c| c.0 == n, || IntCell(n), |_| {});
    }

    #[test]
    fn cardinality_and_hash_summary_track_inserts() {
        let mut trie = HashTrie::new(EngineConfig::default());
        for n in [1, 2, 3, 2] {
            insert(&mut trie, n);
        }
        assert_eq!(trie.cardinality(), 3);
        assert_eq!(trie.hash_summary(), 1 ^ 2 ^ 3);
    }

    #[test]
    fn lookup_finds_inserted_and_misses_absent() {
        let mut trie = HashTrie::new(EngineConfig::default());
        insert(&mut trie, 42);
        assert!(trie.contains(42, |c| c.0 == 42));
        assert!(!trie.contains(43, |c| c.0 == 43));
    }

    #[test]
    fn expansion_then_contraction_round_trips_contents() {
        let cfg = EngineConfig::new(4, 1, 4);
        let mut trie = HashTrie::new(cfg);
        let values: Vec<u32> = (0..200).collect();
        for &n in &values {
            insert(&mut trie, n);
        }
        assert!(trie.height() > 0, "expected expansion under heavy load");

        for &n in &values {
            assert!(trie.contains(n, |c| c.0 == n));
        }

        for &n in &values {
            assert_eq!(trie.remove(n, |c| c.0 == n), Some(IntCell(n)));
        }
        assert_eq!(trie.cardinality(), 0);
        assert_eq!(trie.height(), 0);
        assert_eq!(trie.hash_summary(), 0);
    }

    #[test]
    fn cursor_visits_every_element_exactly_once() {
        let cfg = EngineConfig::new(4, 1, 4);
        let mut trie = HashTrie::new(cfg);
        let values: Vec<u32> = (0..100).collect();
        for &n in &values {
            insert(&mut trie, n);
        }
        let mut seen: Vec<u32> = trie.cursor().map(|c| c.0).collect();
        seen.sort_unstable();
        assert_eq!(seen, values);
    }

    #[test]
    fn deep_clone_is_independent_of_source() {
        let mut trie = HashTrie::new(EngineConfig::default());
        insert(&mut trie, 1);
        insert(&mut trie, 2);
        let clone = trie.deep_clone();
        insert(&mut trie, 3);
        assert_eq!(clone.cardinality(), 2);
        assert_eq!(trie.cardinality(), 3);
    }

    #[test]
    fn expansion_fans_a_split_leaf_out_by_the_next_levels_bits() {
        // radix=4, clash_factor=1: expansion triggers once N > 4, splitting
        // the root's single leaf. Every one of 0..5 shares the same depth-0
        // bucket, so a leaf split that re-buckets by the depth-0 bits
        // (instead of depth-1) collapses them all into one child and strands
        // everything but the bucket-0 survivor.
        let cfg = EngineConfig::new(4, 1, 4);
        let mut trie = HashTrie::new(cfg);
        for n in 0..5u32 {
            insert(&mut trie, n);
        }
        assert!(trie.height() > 0, "expected expansion to have occurred");
        for n in 0..5u32 {
            assert!(trie.contains(n, |c| c.0 == n), "element {n} unreachable after expansion");
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct TaggedCell {
        key: u32,
        payload: u32,
    }
    impl TrieCell for TaggedCell {
        fn hash(&self) -> u32 {
            self.key
        }
        fn summary_hash(&self) -> u32 {
            self.key ^ self.payload
        }
    }

    #[test]
    fn mutating_a_cell_in_place_updates_the_hash_summary() {
        let mut trie = HashTrie::new(EngineConfig::default());
        trie.insert_with(1, |c: &TaggedCell| c.key == 1, || TaggedCell { key: 1, payload: 10 }, |_| {});
        assert_eq!(trie.hash_summary(), 1 ^ 10);

        trie.insert_with(
            1,
            |c: &TaggedCell| c.key == 1,
            || unreachable!("cell already exists"),
            |c| c.payload = 20,
        );
        assert_eq!(trie.hash_summary(), 1 ^ 20);
    }
}
