//! The persistent session namespace.
//!
//! Two maps, globals and locals, which may be the very same map (the
//! default). The namespace lives for the whole session and is only
//! ever mutated, never replaced; a detached background task keeps a
//! handle and may go on mutating bindings after its statement is over,
//! hence the locking.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::lang::eval::SharedMap;
use crate::lang::Value;

/// Shared globals/locals handles for one session.
#[derive(Debug, Clone)]
pub struct Namespace {
    globals: SharedMap,
    locals: SharedMap,
}

impl Namespace {
    /// Fresh namespace where locals alias globals.
    pub fn new() -> Self {
        let map: SharedMap = Arc::new(Mutex::new(IndexMap::new()));
        Self {
            globals: map.clone(),
            locals: map,
        }
    }

    /// Embed over caller-owned maps; locals may alias globals.
    pub fn embed(globals: SharedMap, locals: SharedMap) -> Self {
        Self { globals, locals }
    }

    pub fn globals(&self) -> SharedMap {
        self.globals.clone()
    }

    pub fn locals(&self) -> SharedMap {
        self.locals.clone()
    }

    /// Read a binding, locals first.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.locals.lock().get(name) {
            return Some(v.clone());
        }
        if !Arc::ptr_eq(&self.globals, &self.locals) {
            if let Some(v) = self.globals.lock().get(name) {
                return Some(v.clone());
            }
        }
        None
    }

    /// Write a binding into locals.
    pub fn set(&self, name: &str, value: Value) {
        self.locals.lock().insert(name.to_string(), value);
    }

    /// Bind the result of statement `index` under the reserved keys:
    /// `_` always holds the last result, `_<index>` the per-statement
    /// one.
    pub fn bind_result(&self, index: u64, value: Value) {
        let mut locals = self.locals.lock();
        locals.insert(format!("_{index}"), value.clone());
        locals.insert("_".to_string(), value);
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}
