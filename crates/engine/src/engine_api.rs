//! The facade a bytecode dispatcher (or, here, test code standing in for
//! one) drives the engine through.
//!
//! Internally every module returns `Result<T, Abend>` and propagates with
//! `?`. At this one boundary errors are degraded into `setl_core::error`'s
//! thread-local last-abend slot, mirroring the teacher's
//! `set_runtime_error`/`take_runtime_error` FFI pattern: a caller on the
//! other side of `call_procedure`'s transmute has no Rust `Result` to
//! inspect, only a success flag and a place to go look when it's `false`.

use crate::config::EngineConfig;
use crate::iterator::{self, SharedIter};
use crate::map::{self, SharedMap};
use crate::object::Procedure;
use crate::set::{self, SharedSet};
use crate::tuple::TupleTrie;
use crate::value::{self, Value};
use setl_core::error::set_last_abend;
use setl_core::Abend;
use std::cell::RefCell;
use std::rc::Rc;

pub struct EngineApi {
    config: EngineConfig,
}

impl EngineApi {
    pub fn new(config: EngineConfig) -> Self {
        EngineApi { config }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    fn degrade<T>(result: Result<T, Abend>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(abend) => {
                set_last_abend(abend);
                None
            }
        }
    }

    // ---- Value lifecycle ----

    pub fn mark(&self, v: &Value) -> Value {
        value::mark(v)
    }

    pub fn unmark(&self, v: Value) {
        value::unmark(v)
    }

    pub fn hash(&self, v: &Value) -> u32 {
        v.hash32()
    }

    pub fn equal(&self, a: &Value, b: &Value) -> bool {
        value::spec_equal(a, b)
    }

    /// Deep structural copy: fresh heap nodes, no `Rc` sharing with `v`.
    pub fn copy_deep(&self, v: &Value) -> Value {
        match v {
            Value::Set(s) => Value::Set(Rc::new(RefCell::new(s.borrow().deep_clone()))),
            Value::Map(m) => Value::Map(Rc::new(RefCell::new(m.borrow().deep_clone()))),
            Value::Tuple(t) => Value::Tuple(Rc::new(RefCell::new(t.borrow().clone()))),
            Value::String(s) => Value::String(Rc::new(RefCell::new(s.borrow().clone()))),
            other => other.clone(),
        }
    }

    // ---- Set ----

    pub fn set_empty(&self) -> SharedSet {
        set::empty(self.config)
    }

    pub fn set_singleton(&self, v: Value) -> SharedSet {
        set::singleton(self.config, v)
    }

    pub fn set_cardinality(&self, s: &SharedSet) -> u64 {
        set::cardinality(s)
    }

    pub fn set_contains(&self, s: &SharedSet, v: &Value) -> bool {
        set::contains(s, v)
    }

    pub fn set_insert(&self, s: &SharedSet, v: Value) {
        set::insert(s, v)
    }

    pub fn set_remove(&self, s: &SharedSet, v: &Value) {
        set::remove(s, v)
    }

    pub fn set_arb(&self, s: &SharedSet) -> Value {
        set::arb(s)
    }

    pub fn set_from(&self, s: &SharedSet) -> Value {
        set::from_(s)
    }

    pub fn set_union(&self, a: &SharedSet, b: &SharedSet) -> SharedSet {
        set::union(a, b)
    }

    pub fn set_difference(&self, a: &SharedSet, b: &SharedSet) -> SharedSet {
        set::difference(a, b)
    }

    pub fn set_intersection(&self, a: &SharedSet, b: &SharedSet) -> SharedSet {
        set::intersection(a, b)
    }

    pub fn set_symmetric_difference(&self, a: &SharedSet, b: &SharedSet) -> SharedSet {
        set::symmetric_difference(a, b)
    }

    pub fn set_is_subset(&self, a: &SharedSet, b: &SharedSet) -> bool {
        set::is_subset(a, b)
    }

    pub fn set_powerset(&self, s: &SharedSet) -> Option<SharedSet> {
        Self::degrade(set::powerset(self.config, s))
    }

    pub fn set_npowerset(&self, s: &SharedSet, n: usize) -> Option<SharedSet> {
        Self::degrade(set::npowerset(self.config, s, n))
    }

    // ---- Map ----

    pub fn map_empty(&self) -> SharedMap {
        map::empty(self.config)
    }

    pub fn map_cardinality(&self, m: &SharedMap) -> u64 {
        map::cardinality(m)
    }

    pub fn map_insert(&self, m: &SharedMap, domain: Value, range: Value) {
        map::insert(self.config, m, domain, range)
    }

    pub fn map_delete_pair(&self, m: &SharedMap, domain: &Value, range: &Value) {
        map::delete_pair(m, domain, range)
    }

    pub fn map_delete_domain(&self, m: &SharedMap, domain: &Value) {
        map::delete_domain(m, domain)
    }

    pub fn map_image(&self, m: &SharedMap, domain: &Value) -> Value {
        map::image(m, domain)
    }

    pub fn map_domain(&self, m: &SharedMap) -> SharedSet {
        map::domain(self.config, m)
    }

    pub fn map_range(&self, m: &SharedMap) -> SharedSet {
        map::range(self.config, m)
    }

    // ---- Tuple ----

    pub fn tuple_empty(&self) -> Rc<RefCell<TupleTrie>> {
        Rc::new(RefCell::new(TupleTrie::new(self.config)))
    }

    pub fn tuple_get(&self, t: &Rc<RefCell<TupleTrie>>, i: u64) -> Value {
        t.borrow().get(i)
    }

    pub fn tuple_set(&self, t: &Rc<RefCell<TupleTrie>>, i: u64, v: Value) {
        t.borrow_mut().set(i, v)
    }

    pub fn tuple_append(&self, t: &Rc<RefCell<TupleTrie>>, v: Value) {
        t.borrow_mut().append(v)
    }

    pub fn tuple_len(&self, t: &Rc<RefCell<TupleTrie>>) -> u64 {
        t.borrow().len()
    }

    // ---- Iterators ----

    pub fn start_set_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_set(source))
    }

    pub fn set_iterator_next(&self, it: &SharedIter) -> Option<Value> {
        iterator::next_set(it)
    }

    pub fn start_map_pair_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_map_pair(source))
    }

    pub fn map_pair_iterator_next(&self, it: &SharedIter) -> Option<(Value, Value)> {
        iterator::next_map_pair(it)
    }

    pub fn start_map_domain_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_map_domain(source))
    }

    pub fn map_domain_iterator_next(&self, it: &SharedIter) -> Option<Value> {
        iterator::next_map_domain(it)
    }

    pub fn start_map_multi_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_map_multi(source))
    }

    pub fn map_multi_iterator_next(&self, it: &SharedIter) -> Option<(Value, Value)> {
        iterator::next_map_multi(it)
    }

    pub fn start_tuple_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_tuple(source))
    }

    pub fn tuple_iterator_next(&self, it: &SharedIter) -> Option<Value> {
        iterator::next_tuple(it)
    }

    pub fn start_tuple_pair_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_tuple_pair(source))
    }

    pub fn tuple_pair_iterator_next(&self, it: &SharedIter) -> Option<(Value, Value)> {
        iterator::next_tuple_pair(it)
    }

    pub fn start_alt_tuple_pair_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_alt_tuple_pair(source))
    }

    pub fn alt_tuple_pair_iterator_next(&self, it: &SharedIter) -> Option<(Value, Value, Value)> {
        Self::degrade(iterator::next_alt_tuple_pair(it)).flatten()
    }

    pub fn start_string_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_string(source))
    }

    pub fn string_iterator_next(&self, it: &SharedIter) -> Option<Value> {
        iterator::next_string(it)
    }

    pub fn start_string_pair_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_string_pair(source))
    }

    pub fn string_pair_iterator_next(&self, it: &SharedIter) -> Option<(Value, Value)> {
        iterator::next_string_pair(it)
    }

    pub fn start_pow_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_pow(source))
    }

    pub fn pow_iterator_next(&self, it: &SharedIter) -> Option<Value> {
        iterator::next_pow(it, self.config)
    }

    pub fn start_npow_iterator(&self, source: Value, n: usize) -> Option<SharedIter> {
        Self::degrade(iterator::start_npow(source, n))
    }

    pub fn npow_iterator_next(&self, it: &SharedIter) -> Option<Value> {
        iterator::next_npow(it, self.config)
    }

    pub fn start_object_iterator(&self, source: Value, pair: bool) -> Option<SharedIter> {
        Self::degrade(iterator::start_object(self, source, pair))
    }

    pub fn object_iterator_next(&self, it: &SharedIter) -> Option<(Value, Option<Value>)> {
        Self::degrade(iterator::next_object(self, it)).flatten()
    }

    pub fn start_object_multi_iterator(&self, source: Value) -> Option<SharedIter> {
        Self::degrade(iterator::start_object_multi(self, source))
    }

    pub fn object_multi_iterator_next(&self, it: &SharedIter) -> Option<(Value, Value)> {
        Self::degrade(iterator::next_object_multi(self, it)).flatten()
    }

    // ---- Callback consumed from the engine ----

    /// # Safety
    /// See [`crate::object::call_procedure`].
    pub unsafe fn call_procedure(
        &self,
        proc: &Procedure,
        self_value: &Value,
        argc: u32,
        is_c_return: bool,
        is_literal: bool,
        extra_flags: u32,
    ) -> Value {
        unsafe {
            crate::object::call_procedure(self, proc, self_value, argc, is_c_return, is_literal, extra_flags)
        }
    }
}
