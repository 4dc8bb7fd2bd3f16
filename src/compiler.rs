use crate::{
    chunk::{Chunk, Opcode},
    error::CompileError,
    heap::Heap,
    parser::{ParseFn, Parser, Precedence, Rule},
    scanner::{Kind, Scanner, Token},
    string::ObjString,
    value::Value,
};

/// Compiles `source` into a chunk ending in `Return`.
///
/// String literals and global names are interned into `heap`, so the
/// returned chunk is only valid while that heap is alive.
pub fn compile(source: &str, heap: &mut Heap) -> Result<Chunk, CompileError> {
    let mut parser = Parser::new(Scanner::new(source));
    parser.advance(); // prime the pump

    let mut context = Context::new(parser, heap);
    context.compile_top_level();
    context.finish()
}

struct Context<'src, 'heap> {
    parser: Parser<'src>,
    heap: &'heap mut Heap,
    chunk: Chunk,
    compiler: Compiler<'src>,
}

impl<'src, 'heap> Context<'src, 'heap> {
    fn new(parser: Parser<'src>, heap: &'heap mut Heap) -> Self {
        Context {
            parser,
            heap,
            chunk: Chunk::new(),
            compiler: Compiler::new(),
        }
    }

    fn compile_top_level(&mut self) {
        while !self.parser.matches(Kind::Eof) {
            self.declaration();
        }

        self.emit_byte(Opcode::Return);
    }

    fn finish(self) -> Result<Chunk, CompileError> {
        if self.parser.had_error() {
            let diagnostics = self.parser.into_diagnostics();
            log::debug!("compile failed with {} error(s)", diagnostics.len());
            return Err(CompileError { diagnostics });
        }

        log::debug!(
            "compiled {} bytes, {} constants",
            self.chunk.len(),
            self.chunk.constants().len()
        );

        #[cfg(feature = "debug_print_code")]
        log::debug!("\n{}", self.chunk.disassemble("code"));

        Ok(self.chunk)
    }

    fn begin_scope(&mut self) {
        self.compiler.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.compiler.scope_depth -= 1;

        while let Some(local) = self.compiler.locals.last() {
            if local.depth <= self.compiler.scope_depth {
                break;
            }
            self.emit_byte(Opcode::Pop);
            self.compiler.locals.pop();
        }
    }

    fn emit_byte(&mut self, byte: impl Into<u8>) {
        let line = self.parser.previous.line;
        self.chunk.write_byte(byte.into(), line);
    }

    fn emit_bytes(&mut self, byte1: impl Into<u8>, byte2: impl Into<u8>) {
        self.emit_byte(byte1);
        self.emit_byte(byte2);
    }

    fn emit_constant(&mut self, value: Value) {
        if self.constants_full() {
            return;
        }
        let line = self.parser.previous.line;
        self.chunk.write_constant_instr(value, line);
    }

    /// Emits `instruction` with a placeholder operand and returns the
    /// operand's offset for [`Context::patch_jump`].
    fn emit_jump(&mut self, instruction: Opcode) -> usize {
        self.emit_byte(instruction);
        self.emit_byte(0xFF);
        self.emit_byte(0xFF);
        self.chunk.len() - 2
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_byte(Opcode::Loop);

        let offset = self.chunk.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.parser.error("Loop body too large.");
        }

        let [high, low] = (offset as u16).to_be_bytes();
        self.emit_bytes(high, low);
    }

    fn patch_jump(&mut self, offset: usize) {
        // -2 for the operand itself
        let jump = self.chunk.len() - offset - 2;

        if jump > u16::MAX as usize {
            self.parser.error("Too much code to jump over.");
        }

        self.chunk.patch_u16(offset, jump as u16);
    }

    fn constants_full(&mut self) -> bool {
        let full = self.chunk.constants().len() >= Chunk::MAX_CONSTANTS;
        if full {
            self.parser.error("Too many constants in one chunk.");
        }
        full
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        if self.constants_full() {
            return 0;
        }
        self.chunk.add_constant(value) as u8
    }

    fn identifier_constant(&mut self, name: Token) -> u8 {
        let name = ObjString::copy(name.lexeme, self.heap);
        self.make_constant(name.into())
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.parser.advance();

        let prefix = match Rule::get(self.parser.previous.kind).prefix() {
            Some(prefix) => prefix,
            None => {
                self.parser.error("Expect expression.");
                return;
            }
        };

        let can_assign = precedence <= Precedence::Assignment;
        self.apply(prefix, can_assign);

        while precedence <= Rule::get(self.parser.current.kind).precedence() {
            self.parser.advance();
            if let Some(infix) = Rule::get(self.parser.previous.kind).infix() {
                self.apply(infix, can_assign);
            }
        }

        if can_assign && self.parser.matches(Kind::Equal) {
            self.parser.error("Invalid assignment target.");
        }
    }

    fn apply(&mut self, parse_fn: ParseFn, can_assign: bool) {
        match parse_fn {
            ParseFn::Grouping => self.grouping(),
            ParseFn::Unary => self.unary(),
            ParseFn::Binary => self.binary(),
            ParseFn::Number => self.number(),
            ParseFn::String => self.string(),
            ParseFn::Literal => self.literal(),
            ParseFn::Variable => self.variable(can_assign),
            ParseFn::And => self.and(),
            ParseFn::Or => self.or(),
        }
    }
}

// declarations and statements
impl<'src, 'heap> Context<'src, 'heap> {
    fn declaration(&mut self) {
        if self.parser.matches(Kind::Def) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.parser.panic_mode {
            self.parser.synchronize();
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");

        if self.parser.matches(Kind::Equal) {
            self.expression();
        } else {
            self.emit_byte(Opcode::Nil);
        }

        self.parser
            .consume(Kind::Semicolon, "Expect ';' after variable declaration.");

        self.define_variable(global);
    }

    /// Returns the global's name constant, or 0 for locals, which live in
    /// stack slots instead.
    fn parse_variable(&mut self, message: &str) -> u8 {
        self.parser.consume(Kind::Identifier, message);

        self.declare_variable();
        if self.compiler.scope_depth > 0 {
            return 0;
        }

        self.identifier_constant(self.parser.previous)
    }

    fn define_variable(&mut self, global: u8) {
        if self.compiler.scope_depth > 0 {
            self.compiler.mark_initialized();
            return;
        }

        self.emit_bytes(Opcode::DefineGlobal, global);
    }

    fn declare_variable(&mut self) {
        if self.compiler.scope_depth == 0 {
            return;
        }

        let name = self.parser.previous;

        let duplicate = self
            .compiler
            .locals
            .iter()
            .rev()
            .take_while(|local| {
                local.depth == Local::UNINITIALIZED
                    || local.depth >= self.compiler.scope_depth
            })
            .any(|local| local.name.lexeme == name.lexeme);

        if duplicate {
            self.parser
                .error("Already a variable with this name in this scope.");
        }

        self.add_local(name);
    }

    fn add_local(&mut self, name: Token<'src>) {
        if self.compiler.locals.len() == Compiler::MAX_LOCALS {
            self.parser.error("Too many local variables in function.");
            return;
        }

        self.compiler.locals.push(Local {
            name,
            depth: Local::UNINITIALIZED,
        });
    }

    fn resolve_local(&mut self, name: Token) -> Option<u8> {
        let (slot, local) = self
            .compiler
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| local.name.lexeme == name.lexeme)?;

        if local.depth == Local::UNINITIALIZED {
            self.parser
                .error("Can't read local variable in its own initializer.");
        }

        Some(slot as u8)
    }

    fn statement(&mut self) {
        if self.parser.matches(Kind::Print) {
            self.print_statement();
        } else if self.parser.matches(Kind::If) {
            self.if_statement();
        } else if self.parser.matches(Kind::While) {
            self.while_statement();
        } else if self.parser.matches(Kind::For) {
            self.for_statement();
        } else if self.parser.matches(Kind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.parser.check(Kind::RightBrace) && !self.parser.check(Kind::Eof) {
            self.declaration();
        }

        self.parser.consume(Kind::RightBrace, "Expect '}' after block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.parser.consume(Kind::Semicolon, "Expect ';' after value.");
        self.emit_byte(Opcode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.parser
            .consume(Kind::Semicolon, "Expect ';' after expression.");
        self.emit_byte(Opcode::Pop);
    }

    fn if_statement(&mut self) {
        self.parser.consume(Kind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.parser
            .consume(Kind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(Opcode::JmpIfFalse);
        self.emit_byte(Opcode::Pop);
        self.statement();

        let else_jump = self.emit_jump(Opcode::Jmp);

        self.patch_jump(then_jump);
        self.emit_byte(Opcode::Pop);

        if self.parser.matches(Kind::Else) {
            self.statement();
        }

        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.chunk.len();

        self.parser
            .consume(Kind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.parser
            .consume(Kind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(Opcode::JmpIfFalse);
        self.emit_byte(Opcode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_byte(Opcode::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.parser.consume(Kind::LeftParen, "Expect '(' after 'for'.");

        if self.parser.matches(Kind::Semicolon) {
            // no initializer
        } else if self.parser.matches(Kind::Def) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.chunk.len();

        let mut exit_jump = None;
        if !self.parser.matches(Kind::Semicolon) {
            self.expression();
            self.parser
                .consume(Kind::Semicolon, "Expect ';' after loop condition.");

            exit_jump = Some(self.emit_jump(Opcode::JmpIfFalse));
            self.emit_byte(Opcode::Pop);
        }

        if !self.parser.matches(Kind::RightParen) {
            // The increment runs after the body, so jump over it now and loop
            // back to it from the end of the body.
            let body_jump = self.emit_jump(Opcode::Jmp);
            let increment_start = self.chunk.len();

            self.expression();
            self.emit_byte(Opcode::Pop);
            self.parser
                .consume(Kind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_byte(Opcode::Pop);
        }

        self.end_scope();
    }
}

// expressions
impl<'src, 'heap> Context<'src, 'heap> {
    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn grouping(&mut self) {
        self.expression();
        self.parser
            .consume(Kind::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self) {
        match self.parser.previous.lexeme.parse::<f64>() {
            Ok(number) => self.emit_constant(Value::from(number)),
            Err(_) => self.parser.error("Invalid number literal."),
        }
    }

    fn string(&mut self) {
        let lexeme = self.parser.previous.lexeme;
        let body = &lexeme[1..lexeme.len() - 1];

        let string = ObjString::copy(body, self.heap);
        self.emit_constant(Value::from(string));
    }

    fn literal(&mut self) {
        match self.parser.previous.kind {
            Kind::False => self.emit_byte(Opcode::False),
            Kind::Nil => self.emit_byte(Opcode::Nil),
            Kind::True => self.emit_byte(Opcode::True),
            _ => unreachable!("literal rule on a non-literal token"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        self.named_variable(self.parser.previous, can_assign);
    }

    fn named_variable(&mut self, name: Token, can_assign: bool) {
        let (get, set, arg) = match self.resolve_local(name) {
            Some(slot) => (Opcode::GetLocal, Opcode::SetLocal, slot),
            None => {
                let arg = self.identifier_constant(name);
                (Opcode::GetGlobal, Opcode::SetGlobal, arg)
            }
        };

        if can_assign && self.parser.matches(Kind::Equal) {
            self.expression();
            self.emit_bytes(set, arg);
        } else {
            self.emit_bytes(get, arg);
        }
    }

    fn unary(&mut self) {
        let operator = self.parser.previous.kind;

        self.parse_precedence(Precedence::Unary);

        match operator {
            Kind::Bang => self.emit_byte(Opcode::Not),
            Kind::Minus => self.emit_byte(Opcode::Negate),
            _ => unreachable!("unary rule on {:?}", operator),
        }
    }

    fn binary(&mut self) {
        let operator = self.parser.previous.kind;
        let rule = Rule::get(operator);

        self.parse_precedence(rule.precedence().next());

        use Kind as K;
        use Opcode::*;
        match operator {
            K::BangEqual => self.emit_bytes(Equal, Not),
            K::EqualEqual => self.emit_byte(Equal),
            K::Greater => self.emit_byte(Greater),
            K::GreaterEqual => self.emit_bytes(Less, Not),
            K::Less => self.emit_byte(Less),
            K::LessEqual => self.emit_bytes(Greater, Not),
            K::Plus => self.emit_byte(Add),
            K::Minus => self.emit_byte(Subtract),
            K::Star => self.emit_byte(Multiply),
            K::Slash => self.emit_byte(Divide),
            _ => unreachable!("binary rule on {:?}", operator),
        }
    }

    fn and(&mut self) {
        let end_jump = self.emit_jump(Opcode::JmpIfFalse);

        self.emit_byte(Opcode::Pop);
        self.parse_precedence(Precedence::And);

        self.patch_jump(end_jump);
    }

    fn or(&mut self) {
        let else_jump = self.emit_jump(Opcode::JmpIfFalse);
        let end_jump = self.emit_jump(Opcode::Jmp);

        self.patch_jump(else_jump);
        self.emit_byte(Opcode::Pop);

        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }
}

struct Compiler<'src> {
    locals: Vec<Local<'src>>,
    scope_depth: isize,
}

impl<'src> Compiler<'src> {
    const MAX_LOCALS: usize = u8::MAX as usize + 1;

    fn new() -> Self {
        Compiler {
            locals: Vec::with_capacity(Compiler::MAX_LOCALS),
            scope_depth: 0,
        }
    }

    fn mark_initialized(&mut self) {
        let depth = self.scope_depth;
        if let Some(local) = self.locals.last_mut() {
            local.depth = depth;
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Local<'src> {
    name: Token<'src>,
    depth: isize,
}

impl Local<'_> {
    /// Declared but its initializer hasn't finished yet.
    const UNINITIALIZED: isize = -1;
}
