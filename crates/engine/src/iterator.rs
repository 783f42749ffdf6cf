//! Suspendable cursors over every container variant (spec §4.6).
//!
//! Trie-shaped iteration (`Set`, `MapDomain`, the two map-pair kinds)
//! delegates straight to [`crate::hash_trie::TrieCursor`], which already
//! implements the non-recursive walk spec describes: `start` just stashes
//! one, `next` just calls it. `MapPair`/`MapMulti` additionally carry an
//! optional nested set cursor for the open multi-valued range walk,
//! mirroring `original_source/src/iters.h`'s `it_mapiter` union (its
//! `it_valset_*` fields nest a whole second set-iterator inside the map
//! iterator rather than re-deriving one each call).

use crate::bigint::IntegerBig;
use crate::hash_trie::TrieCursor;
use crate::map::{MapCell, MapRange};
use crate::object::{DispatchSlot, Object};
use crate::set::{self, SetCell};
use crate::string::{StringChars, StringCursor};
use crate::value::Value;
use setl_core::Abend;
use std::cell::RefCell;
use std::rc::Rc;

pub type SharedIter = Rc<RefCell<IterState>>;

pub struct SetIter {
    source: Value,
    cursor: TrieCursor<SetCell>,
}

pub struct MapPairIter {
    source: Value,
    cursor: TrieCursor<MapCell>,
    /// Open nested walk over a multi-valued cell's range set: the domain
    /// value paired with every element, plus the set cursor itself.
    nested: Option<(Value, TrieCursor<SetCell>)>,
}

pub struct MapDomainIter {
    source: Value,
    cursor: TrieCursor<MapCell>,
}

/// Like [`MapPairIter`] but single-valued cells are skipped entirely —
/// grounds `it_map_multi`/`map_multi_iterator_next`, which yields pairs
/// only out of the multi-valued cells.
pub struct MapMultiIter {
    source: Value,
    cursor: TrieCursor<MapCell>,
    nested: Option<(Value, TrieCursor<SetCell>)>,
}

pub struct TupleIter {
    source: Value,
    index: u64,
}

pub struct StringIter {
    source: Value,
    cursor: StringChars,
}

pub struct StringPairIter {
    source: Value,
    cursor: StringCursor,
}

pub struct PowIter {
    elements: Vec<Value>,
    mask: u64,
    done: bool,
}

pub struct NPowIter {
    elements: Vec<Value>,
    combo: Vec<usize>,
    n: usize,
    done: bool,
}

/// Object iteration threads an opaque `state` Value the dispatcher reads
/// back on each `Iterator_Next` call; this crate never inspects it.
pub struct ObjectIter {
    source: Value,
    state: Value,
    pair: bool,
}

pub struct ObjectMultiIter {
    source: Value,
    state: Value,
    /// The domain value paired with whatever the open nested set cursor
    /// yields next. Kept separate from `state`: `state` is the opaque
    /// continuation `Iterator_Start` returned and is replayed into every
    /// `Iterator_Next` call unchanged, the same as `ObjectIter` does.
    domain: Value,
    nested: Option<Box<IterState>>,
}

pub enum IterState {
    Set(SetIter),
    MapPair(MapPairIter),
    MapDomain(MapDomainIter),
    MapMulti(MapMultiIter),
    Tuple(TupleIter),
    TuplePair(TupleIter),
    AltTuplePair(TupleIter),
    String(StringIter),
    StringPair(StringPairIter),
    Pow(PowIter),
    NPow(NPowIter),
    Object(ObjectIter),
    ObjectMulti(ObjectMultiIter),
}

/// `true`/item when a value was produced, `false`/`Omega` when exhausted —
/// spec §4.6's `next(&out, &it)` contract, expressed as `Option` instead of
/// an out-parameter pair.
pub type StepResult = Option<Value>;

fn pack_index(i: u64) -> Value {
    match i64::try_from(i) {
        Ok(n) => Value::Short(n),
        Err(_) => Value::Long(Rc::new(IntegerBig::from(num_bigint::BigInt::from(i)))),
    }
}

pub fn start_set(source: Value) -> Result<SharedIter, Abend> {
    let Value::Set(trie) = &source else {
        return Err(Abend::type_error("start_set_iterator requires a Set"));
    };
    let cursor = trie.borrow().cursor();
    Ok(Rc::new(RefCell::new(IterState::Set(SetIter { source, cursor }))))
}

pub fn next_set(it: &SharedIter) -> StepResult {
    let mut state = it.borrow_mut();
    let IterState::Set(s) = &mut *state else {
        return None;
    };
    s.cursor.next().map(|c| c.value)
}

pub fn start_map_pair(source: Value) -> Result<SharedIter, Abend> {
    let Value::Map(trie) = &source else {
        return Err(Abend::type_error("start_map_pair_iterator requires a Map"));
    };
    let cursor = trie.borrow().cursor();
    Ok(Rc::new(RefCell::new(IterState::MapPair(MapPairIter {
        source,
        cursor,
        nested: None,
    }))))
}

/// Resolves spec §9's open question: the nested set cursor advances on
/// every call while a multi-valued cell's walk is open; the outer map
/// cursor only advances once that nested walk is exhausted.
pub fn next_map_pair(it: &SharedIter) -> Option<(Value, Value)> {
    let mut state = it.borrow_mut();
    let IterState::MapPair(m) = &mut *state else {
        return None;
    };
    loop {
        if let Some((domain, nested_cursor)) = &mut m.nested {
            match nested_cursor.next() {
                Some(cell) => return Some((domain.clone(), cell.value)),
                None => {
                    m.nested = None;
                    continue;
                }
            }
        }
        let cell = m.cursor.next()?;
        match cell.range {
            MapRange::Single(v) => return Some((cell.domain, v)),
            MapRange::Multi(values) => {
                let nested_cursor = values.borrow().cursor();
                m.nested = Some((cell.domain, nested_cursor));
            }
        }
    }
}

pub fn start_map_domain(source: Value) -> Result<SharedIter, Abend> {
    let Value::Map(trie) = &source else {
        return Err(Abend::type_error("start_map_domain_iterator requires a Map"));
    };
    let cursor = trie.borrow().cursor();
    Ok(Rc::new(RefCell::new(IterState::MapDomain(MapDomainIter {
        source,
        cursor,
    }))))
}

pub fn next_map_domain(it: &SharedIter) -> StepResult {
    let mut state = it.borrow_mut();
    let IterState::MapDomain(m) = &mut *state else {
        return None;
    };
    m.cursor.next().map(|c| c.domain)
}

pub fn start_map_multi(source: Value) -> Result<SharedIter, Abend> {
    let Value::Map(trie) = &source else {
        return Err(Abend::type_error("start_map_multi_iterator requires a Map"));
    };
    let cursor = trie.borrow().cursor();
    Ok(Rc::new(RefCell::new(IterState::MapMulti(MapMultiIter {
        source,
        cursor,
        nested: None,
    }))))
}

pub fn next_map_multi(it: &SharedIter) -> Option<(Value, Value)> {
    let mut state = it.borrow_mut();
    let IterState::MapMulti(m) = &mut *state else {
        return None;
    };
    loop {
        if let Some((domain, nested_cursor)) = &mut m.nested {
            match nested_cursor.next() {
                Some(cell) => return Some((domain.clone(), cell.value)),
                None => {
                    m.nested = None;
                    continue;
                }
            }
        }
        let cell = m.cursor.next()?;
        match cell.range {
            MapRange::Single(_) => continue,
            MapRange::Multi(values) => {
                let nested_cursor = values.borrow().cursor();
                m.nested = Some((cell.domain, nested_cursor));
            }
        }
    }
}

pub fn start_tuple(source: Value) -> Result<SharedIter, Abend> {
    if !matches!(source, Value::Tuple(_)) {
        return Err(Abend::type_error("start_tuple_iterator requires a Tuple"));
    }
    Ok(Rc::new(RefCell::new(IterState::Tuple(TupleIter {
        source,
        index: 0,
    }))))
}

pub fn next_tuple(it: &SharedIter) -> StepResult {
    let mut state = it.borrow_mut();
    let IterState::Tuple(t) = &mut *state else {
        return None;
    };
    let Value::Tuple(trie) = &t.source else {
        return None;
    };
    if t.index >= trie.borrow().len() {
        return None;
    }
    let v = trie.borrow().get(t.index);
    t.index += 1;
    Some(v)
}

pub fn start_tuple_pair(source: Value) -> Result<SharedIter, Abend> {
    if !matches!(source, Value::Tuple(_)) {
        return Err(Abend::type_error("start_tuple_pair_iterator requires a Tuple"));
    }
    Ok(Rc::new(RefCell::new(IterState::TuplePair(TupleIter {
        source,
        index: 0,
    }))))
}

pub fn next_tuple_pair(it: &SharedIter) -> Option<(Value, Value)> {
    let mut state = it.borrow_mut();
    let IterState::TuplePair(t) = &mut *state else {
        return None;
    };
    let Value::Tuple(trie) = &t.source else {
        return None;
    };
    if t.index >= trie.borrow().len() {
        return None;
    }
    let v = trie.borrow().get(t.index);
    let idx = pack_index(t.index);
    t.index += 1;
    Some((idx, v))
}

/// Each element must be a 2-tuple (else `ContractViolation`); missing
/// positions yield `(i, Omega, Omega)`.
pub fn start_alt_tuple_pair(source: Value) -> Result<SharedIter, Abend> {
    if !matches!(source, Value::Tuple(_)) {
        return Err(Abend::type_error("start_alt_tuple_pair_iterator requires a Tuple"));
    }
    Ok(Rc::new(RefCell::new(IterState::AltTuplePair(TupleIter {
        source,
        index: 0,
    }))))
}

pub fn next_alt_tuple_pair(it: &SharedIter) -> Result<Option<(Value, Value, Value)>, Abend> {
    let mut state = it.borrow_mut();
    let IterState::AltTuplePair(t) = &mut *state else {
        return Ok(None);
    };
    let Value::Tuple(trie) = &t.source else {
        return Ok(None);
    };
    if t.index >= trie.borrow().len() {
        return Ok(None);
    }
    let idx = pack_index(t.index);
    let element = trie.borrow().get(t.index);
    t.index += 1;
    match element {
        Value::Omega => Ok(Some((idx, Value::Omega, Value::Omega))),
        Value::Tuple(pair) if pair.borrow().len() == 2 => {
            let first = pair.borrow().get(0);
            let second = pair.borrow().get(1);
            Ok(Some((idx, first, second)))
        }
        _ => Err(Abend::contract_violation("invalid tuple assignment")),
    }
}

pub fn start_string(source: Value) -> Result<SharedIter, Abend> {
    let Value::String(s) = &source else {
        return Err(Abend::type_error("start_string_iterator requires a String"));
    };
    let cursor = s.borrow().chars();
    Ok(Rc::new(RefCell::new(IterState::String(StringIter {
        source,
        cursor,
    }))))
}

pub fn next_string(it: &SharedIter) -> StepResult {
    let mut state = it.borrow_mut();
    let IterState::String(s) = &mut *state else {
        return None;
    };
    s.cursor.next().map(|ch| Value::String(Rc::new(RefCell::new(
        crate::string::SetlString::from_str(&ch.to_string()),
    ))))
}

pub fn start_string_pair(source: Value) -> Result<SharedIter, Abend> {
    let Value::String(s) = &source else {
        return Err(Abend::type_error("start_string_pair_iterator requires a String"));
    };
    let cursor = s.borrow().cursor();
    Ok(Rc::new(RefCell::new(IterState::StringPair(StringPairIter {
        source,
        cursor,
    }))))
}

pub fn next_string_pair(it: &SharedIter) -> Option<(Value, Value)> {
    let mut state = it.borrow_mut();
    let IterState::StringPair(s) = &mut *state else {
        return None;
    };
    let (idx, ch) = s.cursor.next()?;
    let value = Value::String(Rc::new(RefCell::new(crate::string::SetlString::from_str(
        &ch.to_string(),
    ))));
    Some((pack_index(idx), value))
}

pub fn start_pow(source: Value) -> Result<SharedIter, Abend> {
    let Value::Set(trie) = &source else {
        return Err(Abend::type_error("start_pow_iterator requires a Set"));
    };
    let elements: Vec<Value> = trie.borrow().cursor().map(|c| c.value).collect();
    if elements.len() > 20 {
        return Err(Abend::domain_error(format!(
            "powerset of a {}-element set is too large to iterate",
            elements.len()
        )));
    }
    Ok(Rc::new(RefCell::new(IterState::Pow(PowIter {
        elements,
        mask: 0,
        done: false,
    }))))
}

pub fn next_pow(it: &SharedIter, config: crate::config::EngineConfig) -> StepResult {
    let mut state = it.borrow_mut();
    let IterState::Pow(p) = &mut *state else {
        return None;
    };
    if p.done || p.mask >= (1u64 << p.elements.len()) {
        return None;
    }
    let subset = set::empty(config);
    for (i, v) in p.elements.iter().enumerate() {
        if p.mask & (1 << i) != 0 {
            set::insert(&subset, v.clone());
        }
    }
    p.mask += 1;
    if p.mask >= (1u64 << p.elements.len()) {
        p.done = true;
    }
    Some(Value::Set(subset))
}

pub fn start_npow(source: Value, n: usize) -> Result<SharedIter, Abend> {
    let Value::Set(trie) = &source else {
        return Err(Abend::type_error("start_npow_iterator requires a Set"));
    };
    let elements: Vec<Value> = trie.borrow().cursor().map(|c| c.value).collect();
    if n > elements.len() {
        return Err(Abend::domain_error(format!(
            "n-powerset requested n={} exceeds cardinality {}",
            n,
            elements.len()
        )));
    }
    let combo: Vec<usize> = (0..n).collect();
    Ok(Rc::new(RefCell::new(IterState::NPow(NPowIter {
        elements,
        combo,
        n,
        done: false,
    }))))
}

pub fn next_npow(it: &SharedIter, config: crate::config::EngineConfig) -> StepResult {
    let mut state = it.borrow_mut();
    let IterState::NPow(p) = &mut *state else {
        return None;
    };
    if p.done {
        return None;
    }
    let subset = set::empty(config);
    for &i in &p.combo {
        set::insert(&subset, p.elements[i].clone());
    }
    if !set::next_combination(&mut p.combo, p.elements.len()) {
        p.done = true;
    }
    Some(Value::Set(subset))
}

/// Drives the class dispatch table's `Iterator_Start`/`Set_Iterator_Start`
/// (per spec §4.6, pair/multi variants use the `Set_Iterator_*` slots).
pub fn start_object(
    engine: &crate::engine_api::EngineApi,
    source: Value,
    pair: bool,
) -> Result<SharedIter, Abend> {
    let Value::Object(obj) = &source else {
        return Err(Abend::type_error("start_object_iterator requires an Object"));
    };
    let slot = if pair {
        DispatchSlot::SetIteratorStart
    } else {
        DispatchSlot::IteratorStart
    };
    let state = obj.borrow().dispatch(engine, slot, &source)?;
    Ok(Rc::new(RefCell::new(IterState::Object(ObjectIter {
        source,
        state,
        pair,
    }))))
}

fn validate_object_step(v: Value) -> Result<Option<(Value, Option<Value>)>, Abend> {
    match v {
        Value::Omega => Ok(None),
        Value::Tuple(t) => {
            let len = t.borrow().len();
            match len {
                1 => Ok(Some((t.borrow().get(0), None))),
                2 => Ok(Some((t.borrow().get(0), Some(t.borrow().get(1))))),
                _ => Err(Abend::contract_violation(
                    "object iterator method must return Omega or a 1-/2-tuple",
                )),
            }
        }
        _ => Err(Abend::contract_violation(
            "object iterator method must return Omega or a 1-/2-tuple",
        )),
    }
}

pub fn next_object(
    engine: &crate::engine_api::EngineApi,
    it: &SharedIter,
) -> Result<Option<(Value, Option<Value>)>, Abend> {
    let (obj_value, slot, state) = {
        let state = it.borrow();
        let IterState::Object(o) = &*state else {
            return Ok(None);
        };
        let slot = if o.pair {
            DispatchSlot::SetIteratorNext
        } else {
            DispatchSlot::IteratorNext
        };
        (o.source.clone(), slot, o.state.clone())
    };
    let Value::Object(obj) = &obj_value else {
        return Ok(None);
    };
    let result = obj.borrow().dispatch(engine, slot, &state)?;
    let stepped = validate_object_step(result)?;
    Ok(stepped)
}

pub fn start_object_multi(
    engine: &crate::engine_api::EngineApi,
    source: Value,
) -> Result<SharedIter, Abend> {
    let Value::Object(obj) = &source else {
        return Err(Abend::type_error("start_object_multi_iterator requires an Object"));
    };
    let state = obj
        .borrow()
        .dispatch(engine, DispatchSlot::SetIteratorStart, &source)?;
    Ok(Rc::new(RefCell::new(IterState::ObjectMulti(ObjectMultiIter {
        source,
        state,
        domain: Value::Omega,
        nested: None,
    }))))
}

pub fn next_object_multi(
    engine: &crate::engine_api::EngineApi,
    it: &SharedIter,
) -> Result<Option<(Value, Value)>, Abend> {
    loop {
        let nested_next = {
            let mut state = it.borrow_mut();
            let IterState::ObjectMulti(o) = &mut *state else {
                return Ok(None);
            };
            match &mut o.nested {
                Some(nested) => match &mut **nested {
                    IterState::Set(s) => s.cursor.next().map(|c| c.value),
                    _ => None,
                },
                None => None,
            }
        };
        if let Some(v) = nested_next {
            let domain = {
                let state = it.borrow();
                let IterState::ObjectMulti(o) = &*state else {
                    unreachable!()
                };
                o.domain.clone()
            };
            return Ok(Some((domain, v)));
        }

        let (obj_value, state) = {
            let mut s = it.borrow_mut();
            let IterState::ObjectMulti(o) = &mut *s else {
                return Ok(None);
            };
            o.nested = None;
            (o.source.clone(), o.state.clone())
        };
        let Value::Object(obj) = &obj_value else {
            return Ok(None);
        };
        let result = obj
            .borrow()
            .dispatch(engine, DispatchSlot::SetIteratorNext, &state)?;
        match validate_object_step(result)? {
            None => return Ok(None),
            Some((domain, Some(Value::Set(values)))) => {
                let cursor = values.borrow().cursor();
                let mut s = it.borrow_mut();
                let IterState::ObjectMulti(o) = &mut *s else {
                    return Ok(None);
                };
                o.domain = domain;
                o.nested = Some(Box::new(IterState::Set(SetIter {
                    source: Value::Set(values),
                    cursor,
                })));
            }
            Some((domain, single)) => {
                return Ok(Some((domain, single.unwrap_or(Value::Omega))));
            }
        }
    }
}
