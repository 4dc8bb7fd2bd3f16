//! glang: a small dynamically typed scripting language.
//!
//! Source is compiled in a single pass to bytecode ([`compile`]) and run on a
//! stack machine ([`VM`]). Strings are interned in a per-session [`Heap`], so
//! a chunk is only meaningful alongside the heap it was compiled against;
//! [`VM::interpret`] takes care of that pairing.
//!
//! ```
//! let mut vm = glang::VM::with_output(Vec::<u8>::new());
//! vm.interpret("def greeting = \"hi\"; print greeting + \"!\";").unwrap();
//! assert_eq!(vm.into_output(), b"hi!\n");
//! ```

pub mod chunk;
pub mod compiler;
pub mod error;
pub mod heap;
pub mod logger;
pub mod object;
pub mod parser;
pub mod scanner;
pub mod string;
pub mod table;
pub mod value;
pub mod vm;

pub use crate::{
    chunk::{Chunk, Opcode},
    compiler::compile,
    error::{CompileError, Diagnostic, InterpretError, Location, RuntimeError},
    heap::Heap,
    scanner::{Kind, Scanner, Token},
    string::ObjString,
    table::Table,
    value::Value,
    vm::VM,
};
