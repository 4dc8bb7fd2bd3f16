use std::ptr::null_mut;

use crate::{string::ObjString, value::Value};

const TABLE_MAX_LOAD: f64 = 0.75;
const MIN_CAPACITY: usize = 8;

/// A slot in a [`Table`].
///
/// An empty key with a `Nil` value has never been used. An empty key with any
/// other value is a tombstone left behind by [`Table::delete`].
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub key: *mut ObjString,
    pub value: Value,
}

impl Entry {
    const EMPTY: Entry = Entry {
        key: null_mut(),
        value: Value::Nil,
    };

    fn is_tombstone(&self) -> bool {
        self.key.is_null() && !self.value.is_nil()
    }
}

/// Open-addressing hash table keyed by interned strings.
///
/// Keys are compared by identity, which is only sound because every key has
/// gone through the heap's interning pool.
#[derive(Debug, Default)]
pub struct Table {
    /// Live entries plus tombstones.
    count: usize,
    entries: Vec<Entry>,
}

impl Table {
    pub fn new() -> Self {
        Table {
            count: 0,
            entries: Vec::new(),
        }
    }

    /// Returns `true` if `key` was not bound before.
    pub fn set(&mut self, key: *mut ObjString, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * TABLE_MAX_LOAD {
            let capacity = grow_capacity(self.capacity());
            self.adjust_capacity(capacity);
        }

        let index = find_entry(&self.entries, key);
        let entry = &mut self.entries[index];

        let is_new_key = entry.key.is_null();
        if is_new_key && entry.value.is_nil() {
            self.count += 1;
        }

        entry.key = key;
        entry.value = value;

        is_new_key
    }

    pub fn get(&self, key: *mut ObjString) -> Option<Value> {
        if self.count == 0 {
            return None;
        }

        let entry = &self.entries[find_entry(&self.entries, key)];
        if entry.key.is_null() {
            None
        } else {
            Some(entry.value)
        }
    }

    pub fn delete(&mut self, key: *mut ObjString) -> bool {
        if self.count == 0 {
            return false;
        }

        let index = find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        if entry.key.is_null() {
            return false;
        }

        entry.key = null_mut();
        entry.value = Value::Boolean(true);

        true
    }

    pub fn add_all(&mut self, from: &Table) {
        for entry in from.entries.iter().filter(|e| !e.key.is_null()) {
            self.set(entry.key, entry.value);
        }
    }

    /// Looks a string up by content rather than identity. Used by interning
    /// before any object exists for `chars`.
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<*mut ObjString> {
        if self.count == 0 {
            return None;
        }

        let capacity = self.capacity();
        let mut index = hash as usize % capacity;

        loop {
            let entry = &self.entries[index];

            if entry.key.is_null() {
                if !entry.is_tombstone() {
                    return None;
                }
            } else {
                let key = unsafe { &*entry.key };
                if key.len() == chars.len()
                    && key.hash() == hash
                    && key.as_str() == chars
                {
                    return Some(entry.key);
                }
            }

            index = (index + 1) % capacity;
        }
    }

    /// Number of occupied slots, tombstones included.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.key.is_null()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        let mut entries = vec![Entry::EMPTY; capacity];

        // tombstones are dropped here, so count only live entries again
        self.count = 0;
        for entry in self.entries.iter().filter(|e| !e.key.is_null()) {
            let index = find_entry(&entries, entry.key);
            entries[index] = *entry;
            self.count += 1;
        }

        log::trace!(
            "table grew from {} to {} slots",
            self.entries.len(),
            capacity
        );

        self.entries = entries;
    }
}

fn grow_capacity(capacity: usize) -> usize {
    if capacity < MIN_CAPACITY {
        MIN_CAPACITY
    } else {
        capacity * 2
    }
}

/// Index of the slot holding `key`, or of the slot it should be inserted
/// into: the first tombstone passed on the way, else the first empty slot.
fn find_entry(entries: &[Entry], key: *mut ObjString) -> usize {
    let capacity = entries.len();
    let hash = unsafe { (*key).hash() };
    let mut index = hash as usize % capacity;
    let mut tombstone = None;

    loop {
        let entry = &entries[index];

        if entry.key.is_null() {
            if entry.is_tombstone() {
                tombstone.get_or_insert(index);
            } else {
                return tombstone.unwrap_or(index);
            }
        } else if entry.key == key {
            return index;
        }

        index = (index + 1) % capacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    fn keys(heap: &mut Heap, n: usize) -> Vec<*mut ObjString> {
        (0..n)
            .map(|i| ObjString::copy(&format!("key{}", i), heap))
            .collect()
    }

    #[test]
    fn set_get_overwrite() {
        let mut heap = Heap::new();
        let key = ObjString::copy("answer", &mut heap);
        let mut table = Table::new();

        assert_eq!(table.get(key), None);
        assert!(table.set(key, Value::Number(41.0)));
        assert!(!table.set(key, Value::Number(42.0)));
        assert_eq!(table.get(key), Some(Value::Number(42.0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn grows_past_load_factor() {
        let mut heap = Heap::new();
        let keys = keys(&mut heap, 7);
        let mut table = Table::new();

        for (i, key) in keys.iter().take(6).enumerate() {
            table.set(*key, Value::Number(i as f64));
        }
        assert_eq!(table.capacity(), 8);

        table.set(keys[6], Value::Number(6.0));
        assert_eq!(table.capacity(), 16);

        for (i, key) in keys.iter().enumerate() {
            assert_eq!(table.get(*key), Some(Value::Number(i as f64)));
        }
    }

    #[test]
    fn delete_leaves_tombstone() {
        let mut heap = Heap::new();
        let keys = keys(&mut heap, 5);
        let mut table = Table::new();

        for key in &keys {
            table.set(*key, Value::Boolean(false));
        }

        assert!(table.delete(keys[2]));
        assert!(!table.delete(keys[2]));
        assert_eq!(table.get(keys[2]), None);
        assert_eq!(table.count(), 5);
        assert_eq!(table.len(), 4);

        for key in keys.iter().filter(|k| **k != keys[2]) {
            assert_eq!(table.get(*key), Some(Value::Boolean(false)));
        }

        // reusing the tombstone doesn't bump the count
        assert!(table.set(keys[2], Value::Nil));
        assert_eq!(table.count(), 5);
    }

    #[test]
    fn rehash_drops_tombstones() {
        let mut heap = Heap::new();
        let keys = keys(&mut heap, 8);
        let mut table = Table::new();

        for key in keys.iter().take(6) {
            table.set(*key, Value::Nil);
        }
        for key in keys.iter().take(3) {
            table.delete(*key);
        }
        assert_eq!(table.count(), 6);

        table.set(keys[6], Value::Nil);

        assert_eq!(table.capacity(), 16);
        assert_eq!(table.count(), 4);
        for key in keys.iter().take(3) {
            assert_eq!(table.get(*key), None);
        }
        for key in &keys[3..7] {
            assert!(table.get(*key).is_some());
        }
        assert_eq!(table.get(keys[7]), None);
    }

    #[test]
    fn find_string_compares_content() {
        let mut heap = Heap::new();
        let key = ObjString::copy("needle", &mut heap);
        let mut table = Table::new();
        table.set(key, Value::Nil);

        let hash = ObjString::hash_str("needle");
        assert_eq!(table.find_string("needle", hash), Some(key));
        assert_eq!(
            table.find_string("haystack", ObjString::hash_str("haystack")),
            None
        );
    }

    #[test]
    fn add_all_copies_live_entries() {
        let mut heap = Heap::new();
        let keys = keys(&mut heap, 3);
        let mut from = Table::new();
        for key in &keys {
            from.set(*key, Value::Boolean(true));
        }
        from.delete(keys[0]);

        let mut to = Table::new();
        to.add_all(&from);

        assert_eq!(to.len(), 2);
        assert_eq!(to.get(keys[0]), None);
        assert_eq!(to.get(keys[1]), Some(Value::Boolean(true)));
    }
}
