//! Unordered collections over [`HashTrie`].

use crate::config::EngineConfig;
use crate::hash_trie::{HashTrie, TrieCell};
use crate::value::{spec_equal, Value};
use setl_core::Abend;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetCell {
    hash: u32,
    pub value: Value,
}

impl TrieCell for SetCell {
    fn hash(&self) -> u32 {
        self.hash
    }
}

impl PartialEq for SetCell {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && spec_equal(&self.value, &other.value)
    }
}

pub type SetTrie = HashTrie<SetCell>;
pub type SharedSet = Rc<RefCell<SetTrie>>;

pub fn empty(config: EngineConfig) -> SharedSet {
    Rc::new(RefCell::new(HashTrie::new(config)))
}

pub fn singleton(config: EngineConfig, value: Value) -> SharedSet {
    let set = empty(config);
    insert(&set, value);
    set
}

pub fn from_values(config: EngineConfig, values: impl IntoIterator<Item = Value>) -> SharedSet {
    let set = empty(config);
    for v in values {
        insert(&set, v);
    }
    set
}

pub fn cardinality(set: &SharedSet) -> u64 {
    set.borrow().cardinality()
}

pub fn contains(set: &SharedSet, value: &Value) -> bool {
    let hash = value.hash32();
    set.borrow().contains(hash, |cell| spec_equal(&cell.value, value))
}

pub fn insert(set: &SharedSet, value: Value) {
    let hash = value.hash32();
    set.borrow_mut().insert_with(
        hash,
        |cell| spec_equal(&cell.value, &value),
        || SetCell { hash, value: value.clone() },
        |_| {},
    );
}

pub fn remove(set: &SharedSet, value: &Value) {
    let hash = value.hash32();
    set.borrow_mut().remove(hash, |cell| spec_equal(&cell.value, value));
}

/// Return any element without removing it, `Omega` if empty.
pub fn arb(set: &SharedSet) -> Value {
    set.borrow()
        .cursor()
        .next()
        .map(|c| c.value)
        .unwrap_or(Value::Omega)
}

/// Remove and return any element, mutating `set` in place; `Omega` if
/// empty.
pub fn from_(set: &SharedSet) -> Value {
    let picked = set.borrow().cursor().next();
    match picked {
        Some(cell) => {
            set.borrow_mut().remove(cell.hash, |c| c.hash == cell.hash && spec_equal(&c.value, &cell.value));
            cell.value
        }
        None => Value::Omega,
    }
}

fn deep_copy(set: &SharedSet) -> SharedSet {
    Rc::new(RefCell::new(set.borrow().deep_clone()))
}

/// Union: iterate the smaller set into a copy of the larger (destructive
/// reuse when an input is uniquely owned).
pub fn union(a: &SharedSet, b: &SharedSet) -> SharedSet {
    let (larger, smaller) = if cardinality(a) >= cardinality(b) { (a, b) } else { (b, a) };
    let accumulator = if Rc::strong_count(larger) == 1 {
        Rc::clone(larger)
    } else {
        deep_copy(larger)
    };
    let elements: Vec<SetCell> = smaller.borrow().cursor().collect();
    for cell in elements {
        accumulator.borrow_mut().insert_with(
            cell.hash,
            |c| spec_equal(&c.value, &cell.value),
            || cell.clone(),
            |_| {},
        );
    }
    accumulator
}

/// Difference `a - b`: always accumulates into a copy of `a`.
pub fn difference(a: &SharedSet, b: &SharedSet) -> SharedSet {
    let accumulator = if Rc::strong_count(a) == 1 { Rc::clone(a) } else { deep_copy(a) };
    let elements: Vec<SetCell> = b.borrow().cursor().collect();
    for cell in elements {
        accumulator.borrow_mut().remove(cell.hash, |c| spec_equal(&c.value, &cell.value));
    }
    accumulator
}

/// Intersection: build fresh, probing the shorter-height input.
pub fn intersection(a: &SharedSet, b: &SharedSet) -> SharedSet {
    let (probe, other) = if a.borrow().height() <= b.borrow().height() {
        (a, b)
    } else {
        (b, a)
    };
    let config = probe.borrow().config();
    let result = empty(config);
    let elements: Vec<SetCell> = probe.borrow().cursor().collect();
    for cell in elements {
        if other.borrow().contains(cell.hash, |c| spec_equal(&c.value, &cell.value)) {
            result.borrow_mut().insert_with(
                cell.hash,
                |c| spec_equal(&c.value, &cell.value),
                || cell.clone(),
                |_| {},
            );
        }
    }
    result
}

/// Symmetric difference: iterate source, toggling presence in the
/// (larger) accumulator.
pub fn symmetric_difference(a: &SharedSet, b: &SharedSet) -> SharedSet {
    let (larger, smaller) = if cardinality(a) >= cardinality(b) { (a, b) } else { (b, a) };
    let accumulator = if Rc::strong_count(larger) == 1 {
        Rc::clone(larger)
    } else {
        deep_copy(larger)
    };
    let elements: Vec<SetCell> = smaller.borrow().cursor().collect();
    for cell in elements {
        let present = accumulator.borrow().contains(cell.hash, |c| spec_equal(&c.value, &cell.value));
        if present {
            accumulator.borrow_mut().remove(cell.hash, |c| spec_equal(&c.value, &cell.value));
        } else {
            accumulator.borrow_mut().insert_with(
                cell.hash,
                |c| spec_equal(&c.value, &cell.value),
                || cell.clone(),
                |_| {},
            );
        }
    }
    accumulator
}

pub fn is_subset(left: &SharedSet, right: &SharedSet) -> bool {
    let elements: Vec<SetCell> = left.borrow().cursor().collect();
    elements
        .iter()
        .all(|cell| right.borrow().contains(cell.hash, |c| spec_equal(&c.value, &cell.value)))
}

/// A flat snapshot of a set's elements, used by powerset/n-powerset
/// enumeration and by [`crate::iterator`]'s `Pow`/`NPow` cursors.
pub fn elements(set: &SharedSet) -> Vec<Value> {
    set.borrow().cursor().map(|c| c.value).collect()
}

/// All `2^N` subsets as a freshly built Set of Sets. `N` must be small
/// enough that the caller is prepared to pay for `2^N` allocations; the
/// bitcounter-style enumeration itself lives in [`crate::iterator`] for
/// the lazy, suspendable variant.
pub fn powerset(config: EngineConfig, set: &SharedSet) -> Result<SharedSet, Abend> {
    let elems = elements(set);
    if elems.len() > 20 {
        return Err(Abend::domain_error(format!(
            "powerset of a {}-element set is too large to materialize eagerly",
            elems.len()
        )));
    }
    let result = empty(config);
    for mask in 0u32..(1u32 << elems.len()) {
        let subset = empty(config);
        for (i, v) in elems.iter().enumerate() {
            if mask & (1 << i) != 0 {
                insert(&subset, v.clone());
            }
        }
        insert(&result, Value::Set(subset));
    }
    Ok(result)
}

pub fn npowerset(config: EngineConfig, set: &SharedSet, n: usize) -> Result<SharedSet, Abend> {
    let elems = elements(set);
    if n > elems.len() {
        return Err(Abend::domain_error(format!(
            "n-powerset requested n={} exceeds cardinality {}",
            n,
            elems.len()
        )));
    }
    let result = empty(config);
    let mut combo: Vec<usize> = (0..n).collect();
    loop {
        let subset = empty(config);
        for &i in &combo {
            insert(&subset, elems[i].clone());
        }
        insert(&result, Value::Set(subset));
        if !next_combination(&mut combo, elems.len()) {
            break;
        }
    }
    Ok(result)
}

/// Advance `combo` (strictly increasing indices) to the lexicographically
/// next n-combination of `0..len`. Returns false once exhausted.
pub(crate) fn next_combination(combo: &mut [usize], len: usize) -> bool {
    let n = combo.len();
    if n == 0 {
        return false;
    }
    let mut i = n;
    loop {
        if i == 0 {
            return false;
        }
        i -= 1;
        if combo[i] + (n - i) < len {
            break;
        }
    }
    combo[i] += 1;
    for j in (i + 1)..n {
        combo[j] = combo[j - 1] + 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn union_contains_both_operands() {
        let a = from_values(cfg(), [Value::Short(1), Value::Short(2)]);
        let b = from_values(cfg(), [Value::Short(2), Value::Short(3)]);
        let u = union(&a, &b);
        assert_eq!(cardinality(&u), 3);
        assert!(contains(&u, &Value::Short(1)));
        assert!(contains(&u, &Value::Short(3)));
    }

    #[test]
    fn difference_removes_right_elements() {
        let a = from_values(cfg(), [Value::Short(1), Value::Short(2), Value::Short(3)]);
        let b = from_values(cfg(), [Value::Short(2)]);
        let d = difference(&a, &b);
        assert_eq!(cardinality(&d), 2);
        assert!(!contains(&d, &Value::Short(2)));
    }

    #[test]
    fn intersection_keeps_only_shared_elements() {
        let a = from_values(cfg(), [Value::Short(1), Value::Short(2)]);
        let b = from_values(cfg(), [Value::Short(2), Value::Short(3)]);
        let i = intersection(&a, &b);
        assert_eq!(cardinality(&i), 1);
        assert!(contains(&i, &Value::Short(2)));
    }

    #[test]
    fn symmetric_difference_toggles_membership() {
        let a = from_values(cfg(), [Value::Short(1), Value::Short(2)]);
        let b = from_values(cfg(), [Value::Short(2), Value::Short(3)]);
        let s = symmetric_difference(&a, &b);
        assert_eq!(cardinality(&s), 2);
        assert!(contains(&s, &Value::Short(1)));
        assert!(contains(&s, &Value::Short(3)));
    }

    #[test]
    fn subset_detects_any_miss() {
        let a = from_values(cfg(), [Value::Short(1)]);
        let b = from_values(cfg(), [Value::Short(1), Value::Short(2)]);
        assert!(is_subset(&a, &b));
        assert!(!is_subset(&b, &a));
    }

    #[test]
    fn powerset_has_two_to_the_n_elements() {
        let s = from_values(cfg(), [Value::Short(1), Value::Short(2), Value::Short(3)]);
        let pow = powerset(cfg(), &s).unwrap();
        assert_eq!(cardinality(&pow), 8);
    }

    #[test]
    fn npowerset_has_exactly_the_binomial_coefficient_count() {
        let s = from_values(cfg(), [Value::Short(1), Value::Short(2), Value::Short(3), Value::Short(4)]);
        let pow = npowerset(cfg(), &s, 2).unwrap();
        assert_eq!(cardinality(&pow), 6);
    }

    #[test]
    fn arb_and_from_on_empty_set_yield_omega() {
        let s = empty(cfg());
        assert!(arb(&s).is_omega());
        assert!(from_(&s).is_omega());
    }

    #[test]
    fn from_mutates_set_in_place() {
        let s = from_values(cfg(), [Value::Short(1)]);
        let picked = from_(&s);
        assert!(matches!(picked, Value::Short(1)));
        assert_eq!(cardinality(&s), 0);
    }
}
