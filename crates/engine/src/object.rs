//! Procedures and class-based objects.
//!
//! `call_procedure` is the one callback the engine drives *into* the
//! dispatcher, used to run a user class's iterator methods. Grounded in
//! the teacher's `patch_seq_call` (`crates/runtime/src/quotations.rs`),
//! which transmutes a raw function pointer captured on a `Value::Quotation`
//! / `Value::Closure` to its own calling convention — this crate does the
//! same, transmuting to the convention `engine_api` exposes instead.

use crate::engine_api::EngineApi;
use crate::value::Value;
use setl_core::Abend;
use std::collections::HashMap;
use std::rc::Rc;

/// A first-class procedure: an opaque function pointer plus an optional
/// captured environment. Stateless beyond that — the dispatcher owns the
/// actual code.
pub struct Procedure {
    pub fn_ptr: usize,
    pub env: Option<Rc<[Value]>>,
}

impl Procedure {
    pub fn new(fn_ptr: usize, env: Option<Rc<[Value]>>) -> Self {
        Procedure { fn_ptr, env }
    }
}

/// Raw calling convention a `Procedure`'s `fn_ptr` is transmuted to.
/// Opaque to this crate beyond its signature: the dispatcher owns what
/// the pointer actually refers to.
pub type RawProcedureFn =
    unsafe extern "C" fn(*const EngineApi, *const Value, usize) -> Value;

/// Invoke `proc`. `self_value` is prepended to the argument array ahead
/// of any captured environment; `argc`/`is_c_return`/`is_literal`/
/// `extra_flags` are dispatcher bookkeeping this crate never interprets
/// (spec §6 calls the dispatcher "a collaborator referenced only through
/// the narrow interface it consumes").
///
/// # Safety
/// `proc.fn_ptr` must be a valid `RawProcedureFn` matching this exact
/// signature; this crate never constructs one, only stores and replays
/// what the dispatcher handed it.
pub unsafe fn call_procedure(
    engine: &EngineApi,
    proc: &Procedure,
    self_value: &Value,
    _argc: u32,
    _is_c_return: bool,
    _is_literal: bool,
    _extra_flags: u32,
) -> Value {
    let f: RawProcedureFn = unsafe { std::mem::transmute(proc.fn_ptr) };
    let mut args: Vec<Value> = Vec::with_capacity(1 + proc.env.as_ref().map_or(0, |e| e.len()));
    args.push(self_value.clone());
    if let Some(env) = &proc.env {
        args.extend(env.iter().cloned());
    }
    unsafe { f(engine as *const EngineApi, args.as_ptr(), args.len()) }
}

/// Keys into a class's method dispatch table (spec §9: "object dispatch
/// to user methods is a separate slot table keyed by a small enum").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchSlot {
    IteratorStart,
    IteratorNext,
    SetIteratorStart,
    SetIteratorNext,
}

pub struct ClassTable {
    pub name: String,
    methods: HashMap<DispatchSlot, Procedure>,
}

impl ClassTable {
    pub fn new(name: impl Into<String>) -> Self {
        ClassTable {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    pub fn define(&mut self, slot: DispatchSlot, proc: Procedure) {
        self.methods.insert(slot, proc);
    }

    pub fn lookup(&self, slot: DispatchSlot) -> Option<&Procedure> {
        self.methods.get(&slot)
    }
}

pub struct Object {
    pub class: Rc<ClassTable>,
    pub fields: Vec<Value>,
}

impl Object {
    pub fn new(class: Rc<ClassTable>, fields: Vec<Value>) -> Self {
        Object { class, fields }
    }

    /// Invoke `slot` on this object's class, or `MissingMethod` if the
    /// class never defined it.
    pub fn dispatch(
        &self,
        engine: &EngineApi,
        slot: DispatchSlot,
        self_value: &Value,
    ) -> Result<Value, Abend> {
        let proc = self.class.lookup(slot).ok_or_else(|| {
            Abend::missing_method(format!("class {:?} has no {:?} method", self.class.name, slot))
        })?;
        Ok(unsafe { call_procedure(engine, proc, self_value, 0, false, false, 0) })
    }
}
