//! Single- and multi-valued finite maps over [`HashTrie`], keyed by
//! domain-value hash. A cell starts single-valued; the second distinct
//! range value for the same domain promotes it to a multi-valued cell
//! holding a nested [`Set`](crate::set) of range values.

use crate::config::EngineConfig;
use crate::hash_trie::{HashTrie, TrieCell};
use crate::set::{self, SharedSet};
use crate::value::{spec_equal, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MapRange {
    Single(Value),
    Multi(SharedSet),
}

#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapCell {
    hash: u32, // domain hash; routing key
    pub domain: Value,
    pub range: MapRange,
}

impl TrieCell for MapCell {
    fn hash(&self) -> u32 {
        self.hash
    }

    fn summary_hash(&self) -> u32 {
        let range_hash = match &self.range {
            MapRange::Single(v) => v.hash32(),
            MapRange::Multi(s) => s.borrow().hash_summary(),
        };
        self.hash ^ range_hash
    }
}

impl PartialEq for MapCell {
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash || !spec_equal(&self.domain, &other.domain) {
            return false;
        }
        match (&self.range, &other.range) {
            (MapRange::Single(a), MapRange::Single(b)) => spec_equal(a, b),
            (MapRange::Multi(a), MapRange::Multi(b)) => {
                Rc::ptr_eq(a, b) || spec_equal(&Value::Set(Rc::clone(a)), &Value::Set(Rc::clone(b)))
            }
            _ => false,
        }
    }
}

pub type MapTrie = HashTrie<MapCell>;
pub type SharedMap = Rc<RefCell<MapTrie>>;

pub fn empty(config: EngineConfig) -> SharedMap {
    Rc::new(RefCell::new(HashTrie::new(config)))
}

pub fn cardinality(map: &SharedMap) -> u64 {
    map.borrow().cardinality()
}

fn find_cell(map: &SharedMap, domain: &Value) -> Option<MapCell> {
    let hash = domain.hash32();
    map.borrow().lookup(hash, |c| spec_equal(&c.domain, domain))
}

/// `insert(d, r)` per spec §4.4: first value for `d` is single-valued; a
/// differing second value promotes to a 2-element multi-valued set; a
/// third+ value inserts into the existing set.
pub fn insert(config: EngineConfig, map: &SharedMap, domain: Value, range: Value) {
    let hash = domain.hash32();
    let mut map_mut = map.borrow_mut();
    map_mut.insert_with(
        hash,
        |c| spec_equal(&c.domain, &domain),
        || MapCell {
            hash,
            domain: domain.clone(),
            range: MapRange::Single(range.clone()),
        },
        |cell| match &cell.range {
            MapRange::Single(existing) => {
                if !spec_equal(existing, &range) {
                    let promoted = set::from_values(config, [existing.clone(), range.clone()]);
                    cell.range = MapRange::Multi(promoted);
                }
            }
            MapRange::Multi(values) => {
                set::insert(values, range.clone());
            }
        },
    );
}

/// `delete_pair(d, r)`: removes `r` from a multi-valued cell (demoting
/// back to single-valued at cardinality 1), or drops the whole cell if it
/// was single-valued and matched.
pub fn delete_pair(map: &SharedMap, domain: &Value, range: &Value) {
    let hash = domain.hash32();
    let demote = {
        let map_ref = map.borrow();
        match map_ref.lookup(hash, |c| spec_equal(&c.domain, domain)) {
            Some(MapCell { range: MapRange::Single(r), .. }) if spec_equal(&r, range) => {
                Some(None)
            }
            Some(MapCell { range: MapRange::Multi(values), .. }) => {
                set::remove(&values, range);
                if set::cardinality(&values) == 1 {
                    Some(Some(set::arb(&values)))
                } else {
                    None
                }
            }
            _ => None,
        }
    };
    match demote {
        Some(None) => {
            map.borrow_mut().remove(hash, |c| spec_equal(&c.domain, domain));
        }
        Some(Some(last)) => {
            map.borrow_mut().insert_with(
                hash,
                |c| spec_equal(&c.domain, domain),
                || unreachable!("cell must already exist to demote"),
                |cell| cell.range = MapRange::Single(last.clone()),
            );
        }
        None => {}
    }
}

pub fn delete_domain(map: &SharedMap, domain: &Value) {
    let hash = domain.hash32();
    map.borrow_mut().remove(hash, |c| spec_equal(&c.domain, domain));
}

/// `image(d)`: the lone range value, a COW-shared handle to the range
/// set, or `Omega` on miss.
pub fn image(map: &SharedMap, domain: &Value) -> Value {
    match find_cell(map, domain) {
        None => Value::Omega,
        Some(MapCell { range: MapRange::Single(v), .. }) => v,
        Some(MapCell { range: MapRange::Multi(values), .. }) => Value::Set(Rc::clone(&values)),
    }
}

pub fn domain(config: EngineConfig, map: &SharedMap) -> SharedSet {
    let cells: Vec<MapCell> = map.borrow().cursor().collect();
    set::from_values(config, cells.into_iter().map(|c| c.domain))
}

pub fn range(config: EngineConfig, map: &SharedMap) -> SharedSet {
    let cells: Vec<MapCell> = map.borrow().cursor().collect();
    let result = set::empty(config);
    for cell in cells {
        match cell.range {
            MapRange::Single(v) => set::insert(&result, v),
            MapRange::Multi(values) => {
                for v in set::elements(&values) {
                    set::insert(&result, v);
                }
            }
        }
    }
    result
}

pub fn cells(map: &SharedMap) -> Vec<MapCell> {
    map.borrow().cursor().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn single_value_insert_then_lookup() {
        let m = empty(cfg());
        insert(cfg(), &m, Value::Short(1), Value::Short(10));
        assert!(matches!(image(&m, &Value::Short(1)), Value::Short(10)));
        assert!(image(&m, &Value::Short(2)).is_omega());
    }

    #[test]
    fn second_distinct_value_promotes_to_multi() {
        let m = empty(cfg());
        insert(cfg(), &m, Value::Short(1), Value::Short(10));
        insert(cfg(), &m, Value::Short(1), Value::Short(20));
        match image(&m, &Value::Short(1)) {
            Value::Set(s) => assert_eq!(set::cardinality(&s), 2),
            _ => panic!("expected promoted multi-value image"),
        }
    }

    #[test]
    fn repeated_insert_of_same_pair_is_noop() {
        let m = empty(cfg());
        insert(cfg(), &m, Value::Short(1), Value::Short(10));
        insert(cfg(), &m, Value::Short(1), Value::Short(10));
        assert_eq!(cardinality(&m), 1);
        assert!(matches!(image(&m, &Value::Short(1)), Value::Short(10)));
    }

    #[test]
    fn delete_pair_demotes_multi_back_to_single() {
        let m = empty(cfg());
        insert(cfg(), &m, Value::Short(1), Value::Short(10));
        insert(cfg(), &m, Value::Short(1), Value::Short(20));
        delete_pair(&m, &Value::Short(1), &Value::Short(20));
        assert!(matches!(image(&m, &Value::Short(1)), Value::Short(10)));
    }

    #[test]
    fn domain_and_range_collect_all_keys_and_values() {
        let m = empty(cfg());
        insert(cfg(), &m, Value::Short(1), Value::Short(10));
        insert(cfg(), &m, Value::Short(2), Value::Short(20));
        let d = domain(cfg(), &m);
        let r = range(cfg(), &m);
        assert_eq!(set::cardinality(&d), 2);
        assert_eq!(set::cardinality(&r), 2);
    }
}
