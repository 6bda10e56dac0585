use indexmap::IndexMap;
use raybridge::Value;
use std::rc::Rc;

/// Struct and array values lent to JavaScript, keyed by a small integer.
///
/// JS cannot hold an `Rc`, so the table holds it instead. Every JS wrapper
/// object handed out counts as one reference; the garbage collector's
/// finalizer gives it back through [`HandleTable::release`]. Lending the
/// same value again reuses its handle, so the table grows with the number
/// of distinct values reachable from JS, not with the number of lookups.
#[derive(Debug)]
pub struct HandleTable {
    next: u32,
    entries: IndexMap<u32, Entry>,
    by_identity: IndexMap<usize, u32>,
}

#[derive(Debug)]
struct Entry {
    value: Value,
    refs: u32,
}

fn identity(value: &Value) -> Option<usize> {
    match value {
        Value::Packed(p) => Some(Rc::as_ptr(p) as usize),
        Value::Array(a) => Some(Rc::as_ptr(a) as usize),
        _ => None,
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self {
            next: 1,
            entries: IndexMap::new(),
            by_identity: IndexMap::new(),
        }
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lend `value` to JS once more and return its handle.
    pub fn lend(&mut self, value: Value) -> u32 {
        let key = identity(&value);
        if let Some(id) = key.and_then(|key| self.by_identity.get(&key).copied()) {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.refs += 1;
                return id;
            }
        }

        let id = self.next;
        self.next = self.next.wrapping_add(1).max(1);
        self.entries.insert(id, Entry { value, refs: 1 });
        if let Some(key) = key {
            self.by_identity.insert(key, id);
        }
        id
    }

    pub fn get(&self, id: u32) -> Option<&Value> {
        self.entries.get(&id).map(|entry| &entry.value)
    }

    /// Drop one JS reference. The value is released with the last one.
    pub fn release(&mut self, id: u32) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        entry.refs -= 1;
        if entry.refs > 0 {
            return;
        }
        if let Some(entry) = self.entries.shift_remove(&id) {
            if let Some(key) = identity(&entry.value) {
                self.by_identity.shift_remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
