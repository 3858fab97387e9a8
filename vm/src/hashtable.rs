//! Globals table: `InternedString -> (Value, read_only)`. Mirrors
//! `examples/original_source/src/hashtable.c`'s open-addressing/tombstone scheme, translated into
//! a `Slot` enum instead of the C code's null-key-with-sentinel-value trick for a tombstone.

use compiler::chunk::value::Value;
use compiler::interner::ObjString;
use std::rc::Rc;

const MAX_LOAD: f64 = 0.75;
const MIN_CAPACITY: usize = 8;
const GROW_FACTOR: usize = 2;

struct Entry {
    key: Rc<ObjString>,
    value: Value,
    read_only: bool,
}

enum Slot {
    Empty,
    Tombstone,
    Occupied(Entry),
}

/// Outcome of `update`: whether the key existed, and if so, whether it was writable.
pub enum Lookup {
    Miss,
    ReadOnly,
    Success,
}

pub struct Hashtable {
    entries: Vec<Slot>,
    count: usize,
    count_with_tombstones: usize,
}

impl Hashtable {
    pub fn new() -> Self {
        Self {
            entries: vec![],
            count: 0,
            count_with_tombstones: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn find(&self, key: &ObjString) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let capacity = self.entries.len();
        let mut index = key.hash() as usize % capacity;
        let mut first_tombstone = None;
        loop {
            match &self.entries[index] {
                Slot::Empty => return first_tombstone.or(Some(index)),
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
                Slot::Occupied(entry) => {
                    if entry.key.hash() == key.hash() && entry.key.chars() == key.chars() {
                        return Some(index);
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    pub fn get(&self, key: &ObjString) -> Option<&Value> {
        match self.find(key) {
            Some(index) => match &self.entries[index] {
                Slot::Occupied(entry) => Some(&entry.value),
                _ => None,
            },
            None => None,
        }
    }

    fn grow(&mut self, new_capacity: usize) {
        let mut new_entries = vec![];
        new_entries.resize_with(new_capacity, || Slot::Empty);
        let old = std::mem::replace(&mut self.entries, new_entries);

        self.count = 0;
        self.count_with_tombstones = 0;
        for slot in old {
            if let Slot::Occupied(entry) = slot {
                let capacity = self.entries.len();
                let mut index = entry.key.hash() as usize % capacity;
                while !matches!(self.entries[index], Slot::Empty) {
                    index = (index + 1) % capacity;
                }
                self.entries[index] = Slot::Occupied(entry);
                self.count += 1;
                self.count_with_tombstones += 1;
            }
        }
    }

    /// Binds `key` to `value`, returning `true` if the key was freshly declared (a runtime error
    /// if the caller wants redeclaration to fail) and `false` if it already existed.
    pub fn set(&mut self, key: Rc<ObjString>, value: Value, read_only: bool) -> bool {
        if self.count_with_tombstones + 1 > (self.entries.len() as f64 * MAX_LOAD) as usize {
            let new_capacity = if self.entries.len() < MIN_CAPACITY {
                MIN_CAPACITY
            } else {
                self.entries.len() * GROW_FACTOR
            };
            self.grow(new_capacity);
        }

        let index = self.find(&key).unwrap();
        let is_new = !matches!(self.entries[index], Slot::Occupied(_));
        let was_tombstone = matches!(self.entries[index], Slot::Tombstone);
        if is_new && !was_tombstone {
            self.count_with_tombstones += 1;
        }
        if is_new {
            self.count += 1;
        }
        self.entries[index] = Slot::Occupied(Entry {
            key,
            value,
            read_only,
        });
        is_new
    }

    /// Overwrites an existing binding's value. Never inserts.
    pub fn update(&mut self, key: &ObjString, value: Value) -> Lookup {
        match self.find(key) {
            Some(index) => match &mut self.entries[index] {
                Slot::Occupied(entry) => {
                    if entry.read_only {
                        Lookup::ReadOnly
                    } else {
                        entry.value = value;
                        Lookup::Success
                    }
                }
                _ => Lookup::Miss,
            },
            None => Lookup::Miss,
        }
    }

    pub fn delete(&mut self, key: &ObjString) -> bool {
        match self.find(key) {
            Some(index) if matches!(self.entries[index], Slot::Occupied(_)) => {
                self.entries[index] = Slot::Tombstone;
                self.count -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<ObjString>, &Value)> {
        self.entries.iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some((&entry.key, &entry.value)),
            _ => None,
        })
    }
}

impl Default for Hashtable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiler::interner::Interner;

    #[test]
    fn set_then_get_round_trips() {
        let mut interner = Interner::new();
        let mut table = Hashtable::new();
        let key = interner.intern("x");
        table.set(Rc::clone(&key), Value::Number(1.0), false);
        assert!(table.get(&key).is_some());
    }

    #[test]
    fn set_reports_whether_the_key_was_new() {
        let mut interner = Interner::new();
        let mut table = Hashtable::new();
        let key = interner.intern("x");
        assert!(table.set(Rc::clone(&key), Value::Number(1.0), false));
        assert!(!table.set(Rc::clone(&key), Value::Number(2.0), false));
    }

    #[test]
    fn update_on_missing_key_misses() {
        let mut interner = Interner::new();
        let mut table = Hashtable::new();
        let key = interner.intern("x");
        assert!(matches!(table.update(&key, Value::Number(1.0)), Lookup::Miss));
    }

    #[test]
    fn update_on_read_only_key_is_refused() {
        let mut interner = Interner::new();
        let mut table = Hashtable::new();
        let key = interner.intern("x");
        table.set(Rc::clone(&key), Value::Number(1.0), true);
        assert!(matches!(
            table.update(&key, Value::Number(2.0)),
            Lookup::ReadOnly
        ));
    }

    #[test]
    fn delete_then_get_misses_but_reuses_the_tombstone_slot() {
        let mut interner = Interner::new();
        let mut table = Hashtable::new();
        let key = interner.intern("x");
        table.set(Rc::clone(&key), Value::Number(1.0), false);
        assert!(table.delete(&key));
        assert!(table.get(&key).is_none());
        assert!(table.set(Rc::clone(&key), Value::Number(3.0), false));
    }
}
