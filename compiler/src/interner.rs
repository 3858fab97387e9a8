//! String interning: a set of heap strings keyed by hash + content, guaranteeing pointer
//! equality (`Rc::ptr_eq`) for equal content. Mirrors `examples/original_source/src/stringset.c`
//! translated into an `Rc`-owning, tombstone-based open-addressing set.

use std::fmt;
use std::rc::Rc;

const MAX_LOAD: f64 = 0.75;
const MIN_CAPACITY: usize = 8;
const GROW_FACTOR: usize = 2;

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = 2166136261u32;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

pub struct ObjString {
    chars: String,
    hash: u32,
}

impl ObjString {
    pub fn chars(&self) -> &str {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }
}

impl fmt::Debug for ObjString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.chars)
    }
}

#[derive(Clone)]
enum Slot {
    Empty,
    Tombstone,
    Occupied(Rc<ObjString>),
}

pub struct Interner {
    entries: Vec<Slot>,
    count: usize,
    count_with_tombstones: usize,
}

impl Interner {
    pub fn new() -> Self {
        Self {
            entries: vec![],
            count: 0,
            count_with_tombstones: 0,
        }
    }

    /// Interns `chars`, returning the existing handle if an equal string was already interned.
    pub fn intern(&mut self, chars: &str) -> Rc<ObjString> {
        let hash = fnv1a(chars.as_bytes());
        if let Some(existing) = self.find(chars, hash) {
            return existing;
        }
        self.insert(Rc::new(ObjString {
            chars: chars.to_string(),
            hash,
        }))
    }

    /// Probes for an already-interned string without allocating.
    pub fn find(&self, chars: &str, hash: u32) -> Option<Rc<ObjString>> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.entries.len();
        let mut index = hash as usize % capacity;
        loop {
            match &self.entries[index] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied(string) => {
                    if string.hash == hash && string.chars == chars {
                        return Some(Rc::clone(string));
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    fn insert(&mut self, string: Rc<ObjString>) -> Rc<ObjString> {
        if self.count_with_tombstones + 1 > (self.entries.len() as f64 * MAX_LOAD) as usize {
            let new_capacity = if self.entries.len() < MIN_CAPACITY {
                MIN_CAPACITY
            } else {
                self.entries.len() * GROW_FACTOR
            };
            self.grow(new_capacity);
        }

        let capacity = self.entries.len();
        let mut index = string.hash as usize % capacity;
        let mut tombstone = None;
        loop {
            match &self.entries[index] {
                Slot::Empty => break,
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Occupied(_) => {}
            }
            index = (index + 1) % capacity;
        }
        let target = tombstone.unwrap_or(index);
        let was_tombstone = matches!(self.entries[target], Slot::Tombstone);
        self.count += 1;
        if !was_tombstone {
            self.count_with_tombstones += 1;
        }
        self.entries[target] = Slot::Occupied(Rc::clone(&string));
        string
    }

    fn grow(&mut self, new_capacity: usize) {
        let mut new_entries = vec![];
        new_entries.resize_with(new_capacity, || Slot::Empty);
        let old = std::mem::replace(&mut self.entries, new_entries);

        self.count = 0;
        self.count_with_tombstones = 0;
        for slot in old {
            if let Slot::Occupied(string) = slot {
                let mut index = string.hash as usize % self.entries.len();
                while !matches!(self.entries[index], Slot::Empty) {
                    index = (index + 1) % self.entries.len();
                }
                self.entries[index] = Slot::Occupied(string);
                self.count += 1;
                self.count_with_tombstones += 1;
            }
        }
    }

    /// Builds `a`'s content followed by `b`'s, interning the result (or discarding the scratch
    /// buffer and returning the existing handle on a hit).
    pub fn concat(&mut self, a: &ObjString, b: &ObjString) -> Rc<ObjString> {
        let mut buf = String::with_capacity(a.len() + b.len());
        buf.push_str(&a.chars);
        buf.push_str(&b.chars);
        self.intern(&buf)
    }

    /// Repeats `source`'s content `n` times, interning the result.
    pub fn repeat(&mut self, source: &ObjString, n: usize) -> Rc<ObjString> {
        self.intern(&source.chars.repeat(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<ObjString>> {
        self.entries.iter().filter_map(|slot| match slot {
            Slot::Occupied(string) => Some(string),
            _ => None,
        })
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_then_intern_returns_same_pointer() {
        let mut interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_content_gets_distinct_pointers() {
        let mut interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("world");
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn grows_past_the_load_factor_without_losing_entries() {
        let mut interner = Interner::new();
        let handles: Vec<_> = (0..100).map(|i| interner.intern(&i.to_string())).collect();
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(handle.chars(), i.to_string());
        }
    }

    #[test]
    fn concat_reuses_an_existing_interned_result() {
        let mut interner = Interner::new();
        let ab = interner.intern("ab");
        let a = interner.intern("a");
        let b = interner.intern("b");
        let concatenated = interner.concat(&a, &b);
        assert!(Rc::ptr_eq(&ab, &concatenated));
    }
}
