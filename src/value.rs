use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Div, Mul, Sub},
};

use crate::{
    heap::Heap,
    object::{Obj, ObjType, Object},
    string::ObjString,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeError {
    Numbers,
    AddMismatch,
}

#[derive(Clone, Copy)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    /// Non-owning; the [`Heap`] that allocated it owns the object.
    Obj(*mut Obj),
}

impl Default for Value {
    fn default() -> Value {
        Value::Nil
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Obj(_) if self.as_a::<ObjString>().is_some() => {
                write!(f, "\"{}\"", self)
            }
            _ => write!(f, "{}", self),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Boolean(true) => write!(f, "True"),
            Value::Boolean(false) => write!(f, "False"),
            Value::Number(n) => write_number(*n, f),
            Value::Obj(_) => match self.as_obj() {
                Some(obj) => write!(f, "{}", obj),
                None => write!(f, "<null>"),
            },
        }
    }
}

/// Shortest digits that round-trip, switching to `1e+21` style exponents
/// when the decimal exponent is below -4 or at least 16.
fn write_number(n: f64, f: &mut Formatter) -> fmt::Result {
    if n.is_nan() {
        return write!(f, "nan");
    }
    if n == 0.0 || n.is_infinite() {
        return write!(f, "{}", n);
    }

    let scientific = format!("{:e}", n);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => return write!(f, "{}", n),
    };

    if (-4..16).contains(&exponent) {
        write!(f, "{}", n)
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        write!(f, "{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

/// Strings compare by content, so equality holds even for two distinct
/// objects with the same bytes.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Boolean(l0), Boolean(r0)) => l0 == r0,
            (Number(l0), Number(r0)) => l0 == r0,
            (Obj(_), Obj(_)) => match (self.as_obj(), other.as_obj()) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            },
            _ => false,
        }
    }
}

impl Value {
    pub fn add(self, other: Value, heap: &mut Heap) -> Result<Self, TypeError> {
        use Value::*;
        match (self, other) {
            (Number(l), Number(r)) => Ok(Number(l + r)),
            (Obj(_), Obj(_)) => {
                match (self.as_a::<ObjString>(), other.as_a::<ObjString>()) {
                    (Some(l), Some(r)) => Ok(l.concatenate(r, heap)),
                    _ => Err(TypeError::AddMismatch),
                }
            }
            _ => Err(TypeError::AddMismatch),
        }
    }

    pub fn greater_than(self, other: Value) -> Result<Self, TypeError> {
        use Value::{Boolean, Number};

        if let (Number(l), Number(r)) = (self, other) {
            Ok(Boolean(l > r))
        } else {
            Err(TypeError::Numbers)
        }
    }

    pub fn less_than(self, other: Value) -> Result<Self, TypeError> {
        use Value::{Boolean, Number};

        if let (Number(l), Number(r)) = (self, other) {
            Ok(Boolean(l < r))
        } else {
            Err(TypeError::Numbers)
        }
    }
}

impl Sub for Value {
    type Output = Result<Self, TypeError>;
    fn sub(self, rhs: Self) -> Self::Output {
        use Value::*;
        match (self, rhs) {
            (Number(l), Number(r)) => Ok(Number(l - r)),
            _ => Err(TypeError::Numbers),
        }
    }
}

impl Mul for Value {
    type Output = Result<Self, TypeError>;
    fn mul(self, rhs: Self) -> Self::Output {
        use Value::*;
        match (self, rhs) {
            (Number(l), Number(r)) => Ok(Number(l * r)),
            _ => Err(TypeError::Numbers),
        }
    }
}

impl Div for Value {
    type Output = Result<Self, TypeError>;
    fn div(self, rhs: Self) -> Self::Output {
        use Value::*;
        match (self, rhs) {
            (Number(l), Number(r)) => Ok(Number(l / r)),
            _ => Err(TypeError::Numbers),
        }
    }
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl Value {
    /// `nil` and `false` are falsey, everything else (`0` and `""` included)
    /// is truthy.
    pub fn is_falsey(&self) -> bool {
        self.is_nil() || matches!(self, Value::Boolean(false))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(f)
    }
}

impl<T: Object> From<*mut T> for Value {
    fn from(ptr: *mut T) -> Self {
        Value::Obj(ptr as *mut Obj)
    }
}

impl Value {
    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Value::Obj(o) => unsafe { o.as_ref() },
            _ => None,
        }
    }

    pub fn as_a<T: Object>(&self) -> Option<&T> {
        self.as_obj().and_then(Obj::as_a::<T>)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.as_obj().map(Obj::obj_type), Some(ObjType::String))
    }

    /// The interned string this value points at, usable as a [`Table`] key.
    ///
    /// [`Table`]: crate::table::Table
    pub fn as_string_ptr(&self) -> Option<*mut ObjString> {
        match self {
            Value::Obj(o) if self.is_string() => Some(*o as *mut ObjString),
            _ => None,
        }
    }
}
