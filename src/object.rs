use std::fmt::{self, Display, Formatter};

use crate::string::ObjString;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ObjType {
    String,
}

/// Header shared by every heap object.
///
/// Objects are linked through `next` into the owning
/// [`Heap`][crate::heap::Heap]'s allocation list, which frees them all when
/// the heap is dropped.
#[derive(Debug)]
#[repr(C)]
pub struct Obj {
    pub obj_type: ObjType,
    pub next: *mut Obj,
}

impl Obj {
    pub fn obj_type(&self) -> ObjType {
        self.obj_type
    }

    /// # Safety
    ///
    /// `object` must have been produced by
    /// [`Heap::allocate`][crate::heap::Heap::allocate] and not freed yet.
    pub unsafe fn free(object: *mut Obj) {
        let tag = (*object).obj_type;

        log::trace!("0x{:X} free type {:?}", object as usize, tag);

        match tag {
            ObjType::String => {
                let obj_str = object as *mut ObjString;
                drop(Box::from_raw(obj_str))
            }
        }
    }

    pub fn as_a<T: Object>(&self) -> Option<&T> {
        if self.obj_type == T::TAG {
            // SAFETY: the tag matches, and `Object` implementors start with
            // their `Obj` header.
            unsafe { Some(&*(self as *const Obj as *const T)) }
        } else {
            None
        }
    }
}

impl Display for Obj {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.obj_type() {
            ObjType::String => match self.as_a::<ObjString>() {
                Some(inner) => write!(f, "{}", inner.as_str()),
                None => write!(f, "<string>"),
            },
        }
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Obj) -> bool {
        if self.obj_type() != other.obj_type() {
            return false;
        }

        match self.obj_type() {
            ObjType::String => {
                self.as_a::<ObjString>() == other.as_a::<ObjString>()
            }
        }
    }
}

/// A heap object kind.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` with an [`Obj`] as their first field,
/// and `TAG` must be unique to the implementing type.
pub unsafe trait Object {
    const TAG: ObjType;
}
