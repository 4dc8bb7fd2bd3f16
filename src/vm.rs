use std::{
    io::{self, Stdout, Write},
    ops::{Div, Mul, Sub},
};

use crate::{
    chunk::{Chunk, Opcode},
    compiler::compile,
    error::{CompileError, InterpretError, RuntimeError},
    heap::Heap,
    string::ObjString,
    table::Table,
    value::{TypeError, Value},
};

/// Pops two operands, applies a fallible binary operation and pushes the
/// result, turning a [`TypeError`] into a runtime error.
macro_rules! binop {
    ($vm:expr, $op:expr) => {{
        let r = $vm.pop()?;
        let l = $vm.pop()?;

        match $op(l, r) {
            Ok(v) => $vm.push(v)?,
            Err(e) => return Err($vm.type_error(e)),
        }
    }};
}

const STACK_MAX: usize = u8::MAX as usize + 1;

/// Executes compiled chunks.
///
/// The VM owns the [`Heap`] every chunk it runs was compiled against, and its
/// globals outlive a single [`VM::interpret`] call, so a REPL can keep one VM
/// for a whole session. Program output (`print`) goes to `W`.
///
/// Chunks carry raw pointers into the heap they were compiled against, so
/// only chunks this VM compiled itself can be run on it:
///
/// ```compile_fail
/// let mut elsewhere = glang::Heap::new();
/// let chunk = glang::compile("def g = 1;", &mut elsewhere).unwrap();
/// glang::VM::new().run_chunk(chunk);
/// ```
pub struct VM<W: Write = Stdout> {
    chunk: Chunk,
    ip: usize,
    stack: [Value; STACK_MAX],
    stack_top: usize,
    globals: Table,
    heap: Heap,
    out: W,
}

impl VM<Stdout> {
    pub fn new() -> Self {
        VM::with_output(io::stdout())
    }
}

impl Default for VM<Stdout> {
    fn default() -> Self {
        VM::new()
    }
}

impl<W: Write> std::fmt::Debug for VM<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VM")
            .field("ip", &self.ip)
            .field("stack", &&self.stack[..self.stack_top])
            .field("globals", &self.globals.len())
            .field("heap", &self.heap)
            .finish()
    }
}

impl<W: Write> VM<W> {
    pub fn with_output(out: W) -> Self {
        VM {
            chunk: Chunk::new(),
            ip: 0,
            stack: [Value::Nil; STACK_MAX],
            stack_top: 0,
            globals: Table::new(),
            heap: Heap::new(),
            out,
        }
    }

    /// Compiles and runs `source`. Nothing runs if compilation fails.
    pub fn interpret(&mut self, source: &str) -> Result<(), InterpretError> {
        let chunk = self.compile(source)?;
        self.run_chunk(chunk)
    }

    /// Compiles `source` against this VM's heap without running it.
    pub fn compile(&mut self, source: &str) -> Result<Chunk, CompileError> {
        compile(source, &mut self.heap)
    }

    /// Runs `chunk` from its first byte on an empty stack. Any strings in
    /// its constant pool must have been allocated in [`VM::heap_mut`].
    pub(crate) fn run_chunk(&mut self, chunk: Chunk) -> Result<(), InterpretError> {
        self.chunk = chunk;
        self.ip = 0;
        self.reset_stack();

        self.run().map_err(InterpretError::from)
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn globals(&self) -> &Table {
        &self.globals
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn reset_stack(&mut self) {
        self.stack_top = 0;
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack_top == STACK_MAX {
            return Err(self.runtime_error("Stack overflow."));
        }

        self.stack[self.stack_top] = value;
        self.stack_top += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        let value = self.peek(0)?;
        self.stack_top -= 1;
        Ok(value)
    }

    fn peek(&self, distance: usize) -> Result<Value, RuntimeError> {
        match self.stack_top.checked_sub(distance + 1) {
            Some(index) => Ok(self.stack[index]),
            None => Err(self.runtime_error("Stack underflow.")),
        }
    }

    /// Stack index of a local's slot, which must already be live.
    fn local_slot(&mut self) -> Result<usize, RuntimeError> {
        let slot = self.read_byte()? as usize;
        if slot < self.stack_top {
            Ok(slot)
        } else {
            Err(self.runtime_error(format!("No local in slot {}.", slot)))
        }
    }

    fn read_byte(&mut self) -> Result<u8, RuntimeError> {
        match self.chunk.byte_at(self.ip) {
            Some(byte) => {
                self.ip += 1;
                Ok(byte)
            }
            None => Err(self.runtime_error("Unexpected end of bytecode.")),
        }
    }

    fn read_u16(&mut self) -> Result<u16, RuntimeError> {
        let high = self.read_byte()?;
        let low = self.read_byte()?;
        Ok(u16::from_be_bytes([high, low]))
    }

    fn read_constant(&mut self) -> Result<Value, RuntimeError> {
        let index = self.read_byte()?;
        match self.chunk.constants().get(index as usize) {
            Some(constant) => Ok(*constant),
            None => Err(self.runtime_error(format!("No constant at index {}.", index))),
        }
    }

    fn read_string(&mut self) -> Result<*mut ObjString, RuntimeError> {
        match self.read_constant()?.as_string_ptr() {
            Some(name) => Ok(name),
            None => Err(self.runtime_error("Variable name must be a string.")),
        }
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            if self.ip >= self.chunk.len() {
                return Err(self.runtime_error("Unexpected end of bytecode."));
            }

            #[cfg(feature = "debug_trace_execution")]
            self.trace();

            let instruction = match self.chunk.opcode_at(self.ip) {
                Ok(op) => op,
                Err(byte) => {
                    self.ip += 1;
                    return Err(self.runtime_error(format!("Unknown opcode {}.", byte)));
                }
            };
            self.ip += 1;

            match instruction {
                Opcode::Return => return Ok(()),

                Opcode::Constant => {
                    let constant = self.read_constant()?;
                    self.push(constant)?;
                }

                Opcode::Negate => match self.pop()? {
                    Value::Number(n) => self.push(Value::Number(-n))?,
                    _ => return Err(self.runtime_error("Operand must be a number.")),
                },

                Opcode::Add => {
                    let r = self.pop()?;
                    let l = self.pop()?;

                    match l.add(r, &mut self.heap) {
                        Ok(v) => self.push(v)?,
                        Err(e) => return Err(self.type_error(e)),
                    }
                }
                Opcode::Subtract => binop!(self, Sub::sub),
                Opcode::Multiply => binop!(self, Mul::mul),
                Opcode::Divide => binop!(self, Div::div),

                Opcode::Nil => self.push(Value::Nil)?,
                Opcode::True => self.push(Value::Boolean(true))?,
                Opcode::False => self.push(Value::Boolean(false))?,

                Opcode::Not => {
                    let value = self.pop()?;
                    self.push(value.is_falsey().into())?;
                }

                Opcode::Equal => {
                    let r = self.pop()?;
                    let l = self.pop()?;
                    self.push((l == r).into())?;
                }
                Opcode::Greater => binop!(self, Value::greater_than),
                Opcode::Less => binop!(self, Value::less_than),

                Opcode::Print => {
                    let value = self.pop()?;
                    if let Err(e) = writeln!(self.out, "{}", value) {
                        return Err(self.runtime_error(format!("Could not print: {}", e)));
                    }
                }

                Opcode::Pop => {
                    self.pop()?;
                }

                Opcode::DefineGlobal => {
                    let name = self.read_string()?;
                    let value = self.pop()?;
                    self.globals.set(name, value);
                }

                Opcode::GetGlobal => {
                    let name = self.read_string()?;
                    match self.globals.get(name) {
                        Some(value) => self.push(value)?,
                        None => return Err(self.undefined_variable(name)),
                    }
                }

                Opcode::SetGlobal => {
                    let name = self.read_string()?;
                    let value = self.peek(0)?;

                    // Assignment never creates a global; undo the insert.
                    if self.globals.set(name, value) {
                        self.globals.delete(name);
                        return Err(self.undefined_variable(name));
                    }
                }

                Opcode::GetLocal => {
                    let slot = self.local_slot()?;
                    self.push(self.stack[slot])?;
                }

                Opcode::SetLocal => {
                    let slot = self.local_slot()?;
                    self.stack[slot] = self.peek(0)?;
                }

                Opcode::Jmp => {
                    let offset = self.read_u16()? as usize;
                    self.ip += offset;
                }

                Opcode::JmpIfFalse => {
                    let offset = self.read_u16()? as usize;
                    if self.peek(0)?.is_falsey() {
                        self.ip += offset;
                    }
                }

                Opcode::Loop => {
                    let offset = self.read_u16()? as usize;
                    self.ip = match self.ip.checked_sub(offset) {
                        Some(ip) => ip,
                        None => return Err(self.runtime_error("Loop offset out of range.")),
                    };
                }
            }
        }
    }

    #[cfg(feature = "debug_trace_execution")]
    fn trace(&self) {
        let mut line = String::new();
        self.chunk.disassemble_instruction(self.ip, &mut line);
        log::trace!(
            "stack: {:?}\n{}",
            &self.stack[..self.stack_top],
            line.trim_end()
        );
    }

    fn type_error(&self, error: TypeError) -> RuntimeError {
        match error {
            TypeError::Numbers => self.runtime_error("Operands must be numbers."),
            TypeError::AddMismatch => {
                self.runtime_error("Operands must be two numbers or two strings.")
            }
        }
    }

    fn undefined_variable(&self, name: *mut ObjString) -> RuntimeError {
        let name = unsafe { &*name }.as_str();
        self.runtime_error(format!("Undefined variable '{}'.", name))
    }

    /// Attributes `message` to the line of the instruction being executed.
    /// The stack is left as it was.
    fn runtime_error(&self, message: impl Into<String>) -> RuntimeError {
        let line = self
            .ip
            .checked_sub(1)
            .and_then(|offset| self.chunk.lines().get(offset))
            .copied()
            .unwrap_or(0);

        let error = RuntimeError {
            message: message.into(),
            line,
        };
        log::debug!("runtime error: {}", error.message);
        error
    }
}
