use std::convert::{TryFrom, TryInto};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Return,
    Constant,
    Negate,
    Add,
    Subtract,
    Multiply,
    Divide,
    Nil,
    True,
    False,
    Not,
    Equal,
    Greater,
    Less,
    Print,
    Pop,
    DefineGlobal,
    GetGlobal,
    SetGlobal,
    GetLocal,
    SetLocal,
    Jmp,
    JmpIfFalse,
    Loop,
}

impl Opcode {
    pub fn to_str(self) -> &'static str {
        match self {
            Opcode::Return => "Return",
            Opcode::Constant => "Constant",
            Opcode::Negate => "Negate",
            Opcode::Add => "Add",
            Opcode::Subtract => "Subtract",
            Opcode::Multiply => "Multiply",
            Opcode::Divide => "Divide",
            Opcode::Nil => "Nil",
            Opcode::True => "True",
            Opcode::False => "False",
            Opcode::Not => "Not",
            Opcode::Equal => "Equal",
            Opcode::Greater => "Greater",
            Opcode::Less => "Less",
            Opcode::Print => "Print",
            Opcode::Pop => "Pop",
            Opcode::DefineGlobal => "DefineGlobal",
            Opcode::GetGlobal => "GetGlobal",
            Opcode::SetGlobal => "SetGlobal",
            Opcode::GetLocal => "GetLocal",
            Opcode::SetLocal => "SetLocal",
            Opcode::Jmp => "Jmp",
            Opcode::JmpIfFalse => "JmpIfFalse",
            Opcode::Loop => "Loop",
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as _
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::Return),
            1 => Ok(Opcode::Constant),
            2 => Ok(Opcode::Negate),
            3 => Ok(Opcode::Add),
            4 => Ok(Opcode::Subtract),
            5 => Ok(Opcode::Multiply),
            6 => Ok(Opcode::Divide),
            7 => Ok(Opcode::Nil),
            8 => Ok(Opcode::True),
            9 => Ok(Opcode::False),
            10 => Ok(Opcode::Not),
            11 => Ok(Opcode::Equal),
            12 => Ok(Opcode::Greater),
            13 => Ok(Opcode::Less),
            14 => Ok(Opcode::Print),
            15 => Ok(Opcode::Pop),
            16 => Ok(Opcode::DefineGlobal),
            17 => Ok(Opcode::GetGlobal),
            18 => Ok(Opcode::SetGlobal),
            19 => Ok(Opcode::GetLocal),
            20 => Ok(Opcode::SetLocal),
            21 => Ok(Opcode::Jmp),
            22 => Ok(Opcode::JmpIfFalse),
            23 => Ok(Opcode::Loop),
            n => Err(n),
        }
    }
}

/// Compiled bytecode with its line table and constant pool.
///
/// `code` and `lines` always have the same length: `lines[i]` is the source
/// line that produced `code[i]`. Constant operands are single bytes, so at
/// most 256 constants are addressable; keeping under that limit is up to the
/// compiler.
#[derive(Debug, Default)]
pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<usize>,
    constants: Vec<Value>,
}

impl Chunk {
    pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

    pub fn new() -> Chunk {
        Chunk {
            code: Vec::new(),
            lines: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn write_byte(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_opcode(&mut self, op: Opcode, line: usize) {
        self.write_byte(op.into(), line);
    }

    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Appends `value` to the pool and emits `Constant index`.
    ///
    /// The index is truncated to a byte; callers check
    /// [`Chunk::MAX_CONSTANTS`] first.
    pub fn write_constant_instr(&mut self, value: Value, line: usize) -> usize {
        let index = self.add_constant(value);
        self.write_opcode(Opcode::Constant, line);
        self.write_byte(index as u8, line);
        index
    }

    /// Backfills a two-byte jump placeholder reserved earlier. This is the only
    /// write that touches already-emitted code.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        let [high, low] = value.to_be_bytes();
        self.code[offset] = high;
        self.code[offset + 1] = low;
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn lines(&self) -> &[usize] {
        &self.lines
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Operand reads return `None` past the end of the code or the pool, so
    /// a truncated chunk can be reported instead of indexed out of bounds.
    pub fn byte_at(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    pub fn opcode_at(&self, offset: usize) -> Result<Opcode, u8> {
        self.code[offset].try_into()
    }

    /// Resolves the one-byte pool index stored at `offset`.
    pub fn constant_at(&self, offset: usize) -> Option<Value> {
        let index = self.byte_at(offset)?;
        self.constants.get(index as usize).copied()
    }

    pub fn line_at(&self, offset: usize) -> usize {
        self.lines[offset]
    }

    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let high = self.byte_at(offset)?;
        let low = self.byte_at(offset + 1)?;
        Some(u16::from_be_bytes([high, low]))
    }
}

// Debug helpers. Read-only: they go through the same accessors the VM uses.
impl Chunk {
    pub fn disassemble(&self, name: &str) -> String {
        let mut out = format!("== {} ==\n", name);

        let mut offset = 0;
        while offset < self.len() {
            offset = self.disassemble_instruction(offset, &mut out);
        }

        out
    }

    /// Appends one line describing the instruction at `offset` and returns
    /// the offset of the next instruction.
    pub fn disassemble_instruction(&self, offset: usize, out: &mut String) -> usize {
        out.push_str(&format!("{:04} ", offset));

        if offset > 0 && self.line_at(offset) == self.line_at(offset - 1) {
            out.push_str("   | ");
        } else {
            out.push_str(&format!("{:>4} ", self.line_at(offset)));
        }

        match self.opcode_at(offset) {
            Ok(
                op
                @
                (Opcode::Constant
                | Opcode::DefineGlobal
                | Opcode::GetGlobal
                | Opcode::SetGlobal),
            ) => self.constant_instruction(op, offset, out),
            Ok(op @ (Opcode::GetLocal | Opcode::SetLocal)) => {
                self.byte_instruction(op, offset, out)
            }
            Ok(op @ (Opcode::Jmp | Opcode::JmpIfFalse)) => {
                self.jump_instruction(op, 1, offset, out)
            }
            Ok(op @ Opcode::Loop) => self.jump_instruction(op, -1, offset, out),
            Ok(op) => {
                out.push_str(&format!("{}\n", op.to_str()));
                offset + 1
            }
            Err(n) => {
                out.push_str(&format!("Unknown opcode {}\n", n));
                offset + 1
            }
        }
    }

    fn byte_instruction(&self, op: Opcode, offset: usize, out: &mut String) -> usize {
        match self.byte_at(offset + 1) {
            Some(slot) => out.push_str(&format!("{:<16} {:4}\n", op.to_str(), slot)),
            None => return self.truncated(op, out),
        }
        offset + 2
    }

    fn constant_instruction(&self, op: Opcode, offset: usize, out: &mut String) -> usize {
        match (self.byte_at(offset + 1), self.constant_at(offset + 1)) {
            (Some(index), Some(constant)) => out.push_str(&format!(
                "{:<16} {:4} '{}'\n",
                op.to_str(),
                index,
                constant
            )),
            (Some(index), None) => {
                out.push_str(&format!("{:<16} {:4} <no constant>\n", op.to_str(), index))
            }
            (None, _) => return self.truncated(op, out),
        }
        offset + 2
    }

    fn jump_instruction(
        &self,
        op: Opcode,
        sign: isize,
        offset: usize,
        out: &mut String,
    ) -> usize {
        let jump = match self.read_u16(offset + 1) {
            Some(jump) => jump as isize,
            None => return self.truncated(op, out),
        };
        let target = offset as isize + 3 + sign * jump;

        out.push_str(&format!("{:<16} {:4} -> {}\n", op.to_str(), offset, target));
        offset + 3
    }

    fn truncated(&self, op: Opcode, out: &mut String) -> usize {
        out.push_str(&format!("{:<16} <truncated>\n", op.to_str()));
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_byte_round_trip() {
        for byte in 0..=Opcode::Loop as u8 {
            let op = Opcode::try_from(byte).unwrap();
            assert_eq!(u8::from(op), byte);
        }
        assert_eq!(Opcode::try_from(Opcode::Loop as u8 + 1), Err(24));
    }

    #[test]
    fn lines_track_code() {
        let mut chunk = Chunk::new();
        chunk.write_constant_instr(Value::Number(1.5), 1);
        chunk.write_opcode(Opcode::Negate, 2);
        chunk.write_opcode(Opcode::Return, 2);

        assert_eq!(chunk.code().len(), chunk.lines().len());
        assert_eq!(chunk.code(), &[1, 0, 2, 0]);
        assert_eq!(chunk.constant_at(1), Some(Value::Number(1.5)));
        assert_eq!(chunk.constant_at(3), None);
        assert_eq!(chunk.line_at(2), 2);
        assert_eq!(chunk.opcode_at(2), Ok(Opcode::Negate));
    }

    #[test]
    fn jump_operands_are_big_endian() {
        let mut chunk = Chunk::new();
        chunk.write_opcode(Opcode::Jmp, 1);
        chunk.write_byte(0xFF, 1);
        chunk.write_byte(0xFF, 1);
        chunk.patch_u16(1, 0x0102);

        assert_eq!(chunk.code(), &[21, 0x01, 0x02]);
        assert_eq!(chunk.read_u16(1), Some(258));
        assert_eq!(chunk.read_u16(2), None);
    }

    #[test]
    fn disassembly() {
        let mut chunk = Chunk::new();
        chunk.write_constant_instr(Value::Number(2.0), 1);
        chunk.write_opcode(Opcode::JmpIfFalse, 1);
        chunk.write_byte(0, 1);
        chunk.write_byte(1, 1);
        chunk.write_opcode(Opcode::Pop, 2);
        chunk.write_opcode(Opcode::Loop, 2);
        chunk.write_byte(0, 2);
        chunk.write_byte(9, 2);
        chunk.write_byte(200, 3);

        let text = chunk.disassemble("test");
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "== test ==");
        assert_eq!(lines[1], "0000    1 Constant            0 '2'");
        assert_eq!(lines[2], "0002    | JmpIfFalse          2 -> 6");
        assert_eq!(lines[3], "0005    2 Pop");
        assert_eq!(lines[4], "0006    | Loop                6 -> 0");
        assert_eq!(lines[5], "0009    3 Unknown opcode 200");
    }

    #[test]
    fn disassembly_of_truncated_operands() {
        let mut chunk = Chunk::new();
        chunk.write_opcode(Opcode::GetLocal, 1);

        assert_eq!(
            chunk.disassemble("short").lines().nth(1),
            Some("0000    1 GetLocal         <truncated>")
        );

        let mut chunk = Chunk::new();
        chunk.write_opcode(Opcode::Constant, 1);
        chunk.write_byte(7, 1);

        assert_eq!(
            chunk.disassemble("missing").lines().nth(1),
            Some("0000    1 Constant            7 <no constant>")
        );
    }
}
