use crate::{
    heap::Heap,
    object::{Obj, ObjType, Object},
    value::Value,
};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

#[repr(C)]
pub struct ObjString {
    pub obj: Obj,
    pub hash: u32,
    chars: Box<str>,
}

unsafe impl Object for ObjString {
    const TAG: ObjType = ObjType::String;
}

impl PartialEq for ObjString {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.hash == other.hash
            && self.chars == other.chars
    }
}

impl std::fmt::Debug for ObjString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl ObjString {
    /// 32-bit FNV-1a over the UTF-8 bytes.
    pub fn hash_str(s: &str) -> u32 {
        s.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
        })
    }

    pub fn as_str(&self) -> &str {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Interns a copy of `s`. Nothing is allocated if an equal string is
    /// already interned.
    pub fn copy(s: &str, heap: &mut Heap) -> *mut ObjString {
        let hash = ObjString::hash_str(s);
        match heap.find_interned(s, hash) {
            Some(interned) => interned,
            None => ObjString::allocate(s.into(), hash, heap),
        }
    }

    /// Interns `buf`, taking ownership of it. If an equal string is already
    /// interned, `buf` is dropped and the existing object is returned.
    pub fn take(buf: String, heap: &mut Heap) -> *mut ObjString {
        let hash = ObjString::hash_str(&buf);
        match heap.find_interned(&buf, hash) {
            Some(interned) => interned,
            None => ObjString::allocate(buf.into_boxed_str(), hash, heap),
        }
    }

    pub fn concatenate(&self, other: &ObjString, heap: &mut Heap) -> Value {
        let mut buf = String::with_capacity(self.len() + other.len());
        buf.push_str(self.as_str());
        buf.push_str(other.as_str());
        ObjString::take(buf, heap).into()
    }

    fn allocate(chars: Box<str>, hash: u32, heap: &mut Heap) -> *mut ObjString {
        let string = heap.allocate(|obj| ObjString { obj, hash, chars });
        heap.intern(string);
        string
    }

    /// Allocates without interning. Only for exercising content equality.
    #[cfg(test)]
    pub(crate) fn allocate_uninterned(s: &str, heap: &mut Heap) -> *mut ObjString {
        let hash = ObjString::hash_str(s);
        heap.allocate(|obj| ObjString {
            obj,
            hash,
            chars: s.into(),
        })
    }
}
