use std::ptr::null_mut;

use crate::{
    object::{Obj, Object},
    string::ObjString,
    table::Table,
    value::Value,
};

/// Owns every object allocated during a session.
///
/// Values, constant pools and tables only hold raw pointers into the heap, so
/// they stay valid exactly as long as the heap does. Nothing is reclaimed
/// before the heap is dropped.
pub struct Heap {
    objects: *mut Obj,
    object_count: usize,
    /// Interning pool. Keys are the canonical strings, values are unused.
    strings: Table,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        log::debug!("freeing {} heap objects", self.object_count);

        let mut cursor = self.objects;
        self.objects = null_mut();

        while !cursor.is_null() {
            cursor = unsafe {
                let next = (*cursor).next;
                Obj::free(cursor);
                next
            }
        }
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("object_count", &self.object_count)
            .field("interned", &self.strings.len())
            .finish()
    }
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            objects: null_mut(),
            object_count: 0,
            strings: Table::new(),
        }
    }

    pub fn allocate<T: Object>(
        &mut self,
        make_obj: impl FnOnce(Obj) -> T,
    ) -> *mut T {
        let obj = Obj {
            obj_type: T::TAG,
            next: self.objects,
        };

        let ptr = Box::into_raw(Box::new(make_obj(obj)));

        self.objects = ptr as *mut Obj;
        self.object_count += 1;

        log::trace!(
            "0x{:X} allocate {} for {:?}",
            ptr as usize,
            std::mem::size_of::<T>(),
            T::TAG
        );

        ptr
    }

    pub fn intern(&mut self, string: *mut ObjString) {
        self.strings.set(string, Value::Nil);
    }

    pub fn find_interned(&self, chars: &str, hash: u32) -> Option<*mut ObjString> {
        self.strings.find_string(chars, hash)
    }

    pub fn strings(&self) -> &Table {
        &self.strings
    }

    pub fn object_count(&self) -> usize {
        self.object_count
    }
}
