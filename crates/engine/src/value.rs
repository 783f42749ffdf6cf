//! The tagged `Value` union and its explicit ref-counting contract.
//!
//! Grounded in the teacher's `Value` enum (`crates/runtime/src/value.rs`),
//! which already uses `Arc`-backed heap cases for O(1) clone of recursive
//! structures. This engine is single-threaded (spec §5), so the heap cases
//! use `Rc<RefCell<_>>` instead of `Arc<Mutex<_>>`. `mark`/`unmark` are
//! thin wrappers: cloning a `Value` already bumps the right `Rc`'s strong
//! count, and dropping one already cascades `Drop` through owned
//! children — the explicit API exists only so a non-Rust dispatcher
//! talking through `engine_api` can manage a specifier's lifetime without
//! holding actual Rust ownership.

use crate::bigint::IntegerBig;
use crate::map::MapCell;
use crate::object::{Object, Procedure};
use crate::set::SetCell;
use crate::string::SetlString;
use crate::tuple::TupleTrie;
use crate::hash_trie::HashTrie;
use crate::iterator::IterState;
use std::cell::RefCell;
use std::rc::Rc;

pub type Shared<T> = Rc<RefCell<T>>;

#[derive(Clone)]
pub enum Value {
    /// The unit/undefined marker.
    Omega,
    Short(i64),
    Long(Rc<IntegerBig>),
    Real(f64),
    String(Shared<SetlString>),
    Set(Shared<HashTrie<SetCell>>),
    Map(Shared<HashTrie<MapCell>>),
    Tuple(Shared<TupleTrie>),
    Procedure(Rc<Procedure>),
    Object(Shared<Object>),
    Iterator(Shared<IterState>),
}

impl Value {
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Omega => "Omega",
            Value::Short(_) => "Short",
            Value::Long(_) => "Long",
            Value::Real(_) => "Real",
            Value::String(_) => "String",
            Value::Set(_) => "Set",
            Value::Map(_) => "Map",
            Value::Tuple(_) => "Tuple",
            Value::Procedure(_) => "Procedure",
            Value::Object(_) => "Object",
            Value::Iterator(_) => "Iterator",
        }
    }

    pub fn is_omega(&self) -> bool {
        matches!(self, Value::Omega)
    }

    /// 32-bit hash contribution used by `HashTrie` routing and by every
    /// whole-collection `HS` fold.
    pub fn hash32(&self) -> u32 {
        match self {
            Value::Omega => 0,
            Value::Short(n) => (*n as u64 ^ ((*n as u64) >> 32)) as u32,
            Value::Long(n) => n.hash32(),
            Value::Real(f) => {
                let bits = f.to_bits();
                (bits ^ (bits >> 32)) as u32
            }
            Value::String(s) => s.borrow().hash32(),
            Value::Set(s) => s.borrow().hash_summary(),
            Value::Map(m) => m.borrow().hash_summary(),
            Value::Tuple(t) => t.borrow().hash32(),
            Value::Procedure(p) => Rc::as_ptr(p) as usize as u32,
            Value::Object(o) => Rc::as_ptr(o) as usize as u32,
            Value::Iterator(i) => Rc::as_ptr(i) as usize as u32,
        }
    }
}

/// Increment the referent's count if `v` is a heap case. Implemented as
/// `Clone` because `Rc::clone` *is* the increment this crate needs.
pub fn mark(v: &Value) -> Value {
    v.clone()
}

/// Decrement the referent's count, reclaiming (and recursively unmarking
/// owned children) at zero. Implemented as `drop` because `Rc`'s own
/// `Drop` impl already cascades through every owned `Rc`/`RefCell` field.
pub fn unmark(v: Value) {
    drop(v);
}

/// `spec_equal(a, b)`: true iff tags agree and contents agree, short-
/// circuiting via whole-collection hash for sets/maps/tuples.
pub fn spec_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Omega, Value::Omega) => true,
        (Value::Short(x), Value::Short(y)) => x == y,
        (Value::Long(x), Value::Long(y)) => x == y,
        (Value::Short(x), Value::Long(y)) | (Value::Long(y), Value::Short(x)) => {
            y.to_i64() == Some(*x)
        }
        (Value::Real(x), Value::Real(y)) => x == y,
        (Value::String(x), Value::String(y)) => Rc::ptr_eq(x, y) || *x.borrow() == *y.borrow(),
        (Value::Set(x), Value::Set(y)) => {
            Rc::ptr_eq(x, y) || {
                let (xb, yb) = (x.borrow(), y.borrow());
                xb.cardinality() == yb.cardinality()
                    && xb.hash_summary() == yb.hash_summary()
                    && trie_subset(&xb, &yb)
            }
        }
        (Value::Map(x), Value::Map(y)) => {
            Rc::ptr_eq(x, y) || {
                let (xb, yb) = (x.borrow(), y.borrow());
                xb.cardinality() == yb.cardinality()
                    && xb.hash_summary() == yb.hash_summary()
                    && trie_subset(&xb, &yb)
            }
        }
        (Value::Tuple(x), Value::Tuple(y)) => Rc::ptr_eq(x, y) || *x.borrow() == *y.borrow(),
        (Value::Procedure(x), Value::Procedure(y)) => Rc::ptr_eq(x, y),
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        (Value::Iterator(x), Value::Iterator(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn trie_subset<C>(a: &HashTrie<C>, b: &HashTrie<C>) -> bool
where
    C: crate::hash_trie::TrieCell + PartialEq,
{
    let mut ok = true;
    a.for_each(|cell| {
        if !b.contains(cell.hash(), |other| other == cell) {
            ok = false;
        }
    });
    ok
}

/// `Value` serializes the data-bearing variants as a tagged wire enum;
/// `Procedure`/`Object`/`Iterator` are process-local runtime handles (a raw
/// function pointer, a class dispatch table, `Weak`-linked cursor state)
/// with nothing meaningful to exchange, so serializing one is an error
/// rather than a silent lossy encoding.
#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    enum Wire {
        Omega,
        Short(i64),
        Long(IntegerBig),
        Real(f64),
        String(SetlString),
        Set(HashTrie<SetCell>),
        Map(HashTrie<MapCell>),
        Tuple(TupleTrie),
    }

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Value::Omega => Wire::Omega.serialize(serializer),
                Value::Short(n) => Wire::Short(*n).serialize(serializer),
                Value::Long(n) => Wire::Long((**n).clone()).serialize(serializer),
                Value::Real(f) => Wire::Real(*f).serialize(serializer),
                Value::String(s) => Wire::String(s.borrow().clone()).serialize(serializer),
                Value::Set(s) => Wire::Set(s.borrow().deep_clone()).serialize(serializer),
                Value::Map(m) => Wire::Map(m.borrow().deep_clone()).serialize(serializer),
                Value::Tuple(t) => Wire::Tuple(t.borrow().clone()).serialize(serializer),
                Value::Procedure(_) | Value::Object(_) | Value::Iterator(_) => {
                    Err(S::Error::custom(format!(
                        "{} values are runtime handles and cannot be serialized",
                        self.tag()
                    )))
                }
            }
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            Ok(match Wire::deserialize(deserializer)? {
                Wire::Omega => Value::Omega,
                Wire::Short(n) => Value::Short(n),
                Wire::Long(n) => Value::Long(Rc::new(n)),
                Wire::Real(f) => Value::Real(f),
                Wire::String(s) => Value::String(Rc::new(RefCell::new(s))),
                Wire::Set(s) => Value::Set(Rc::new(RefCell::new(s))),
                Wire::Map(m) => Value::Map(Rc::new(RefCell::new(m))),
                Wire::Tuple(t) => Value::Tuple(Rc::new(RefCell::new(t))),
            })
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_bumps_and_unmark_restores_strong_count() {
        let s = Rc::new(RefCell::new(SetlString::from_str("hi")));
        let v = Value::String(Rc::clone(&s));
        assert_eq!(Rc::strong_count(&s), 2);
        let marked = mark(&v);
        assert_eq!(Rc::strong_count(&s), 3);
        unmark(marked);
        assert_eq!(Rc::strong_count(&s), 2);
        unmark(v);
        assert_eq!(Rc::strong_count(&s), 1);
    }

    #[test]
    fn short_and_long_compare_equal_when_numerically_equal() {
        let a = Value::Short(7);
        let b = Value::Long(Rc::new(IntegerBig::from_i64(7)));
        assert!(spec_equal(&a, &b));
    }

    #[test]
    fn omega_is_not_equal_to_short_zero() {
        assert!(!spec_equal(&Value::Omega, &Value::Short(0)));
    }
}
