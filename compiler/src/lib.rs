pub mod chunk;
pub mod error;
pub mod interner;

use chunk::value::{Function, Value};
use chunk::Chunk;
use chunk::Instruction::{self, *};
use error::CompileError;
use interner::{Interner, ObjString};
use lexer::token::{Token, TokenType};
use lexer::Scanner;
use std::rc::Rc;

/// Precedence levels, low to high. `parse_precedence(p)` keeps consuming infix operators as long
/// as their rule's precedence is `>= p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Self {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

type ParseFn = fn(&mut Parser<'_>, bool);

struct ParseRule {
    prefix: Option<ParseFn>,
    infix: Option<ParseFn>,
    precedence: Precedence,
}

fn get_rule(typ: TokenType) -> ParseRule {
    use TokenType::*;
    match typ {
        OParen => ParseRule {
            prefix: Some(grouping),
            infix: Some(call),
            precedence: Precedence::Call,
        },
        OBracket => ParseRule {
            prefix: Some(array),
            infix: Some(subscript),
            precedence: Precedence::Call,
        },
        Minus => ParseRule {
            prefix: Some(unary),
            infix: Some(binary),
            precedence: Precedence::Term,
        },
        Plus => ParseRule {
            prefix: Some(unary),
            infix: Some(binary),
            precedence: Precedence::Term,
        },
        Star | Slash | Percent => ParseRule {
            prefix: None,
            infix: Some(binary),
            precedence: Precedence::Factor,
        },
        Bang => ParseRule {
            prefix: Some(unary),
            infix: None,
            precedence: Precedence::None,
        },
        BangEqual | DEqual => ParseRule {
            prefix: None,
            infix: Some(binary),
            precedence: Precedence::Equality,
        },
        Greater | GreaterEqual | Less | LessEqual => ParseRule {
            prefix: None,
            infix: Some(binary),
            precedence: Precedence::Comparison,
        },
        And => ParseRule {
            prefix: None,
            infix: Some(and_),
            precedence: Precedence::And,
        },
        Or => ParseRule {
            prefix: None,
            infix: Some(or_),
            precedence: Precedence::Or,
        },
        String => ParseRule {
            prefix: Some(string),
            infix: None,
            precedence: Precedence::None,
        },
        Identifier => ParseRule {
            prefix: Some(variable),
            infix: None,
            precedence: Precedence::None,
        },
        Number => ParseRule {
            prefix: Some(number),
            infix: None,
            precedence: Precedence::None,
        },
        True | False | Null => ParseRule {
            prefix: Some(literal),
            infix: None,
            precedence: Precedence::None,
        },
        _ => ParseRule {
            prefix: None,
            infix: None,
            precedence: Precedence::None,
        },
    }
}

/// One resolved-at-compile-time variable slot. `depth == -1` marks a local whose initializer
/// hasn't finished compiling yet, so reading it from within its own initializer is an error.
struct Local {
    name: Rc<str>,
    depth: i32,
    read_only: bool,
}

#[derive(PartialEq, Clone, Copy)]
enum CompilerType {
    Script,
    Function,
}

/// Per-function compile-time state: its own chunk, its own local-variable array, its own scope
/// depth. Nested `def`s push one of these and pop it when the body ends; there is no upvalue
/// capture, so resolution never reaches past the top of this stack.
struct FuncScope {
    typ: CompilerType,
    name: Option<Rc<ObjString>>,
    arity: u8,
    chunk: Chunk,
    locals: Vec<Local>,
    scope_depth: i32,
}

impl FuncScope {
    fn new(typ: CompilerType, name: Option<Rc<ObjString>>) -> Self {
        let scope_depth = if typ == CompilerType::Function { 1 } else { 0 };
        Self {
            typ,
            name,
            arity: 0,
            chunk: Chunk::new(),
            // Slot 0 is reserved for the callee value itself; its name can never be typed by a
            // user so it can't collide with, or be resolved as, a real local.
            locals: vec![Local {
                name: Rc::from(""),
                depth: 0,
                read_only: true,
            }],
            scope_depth,
        }
    }
}

struct Parser<'a> {
    scanner: Scanner,
    previous: Rc<Token>,
    current: Rc<Token>,
    interner: &'a mut Interner,
    frames: Vec<FuncScope>,
    errors: Vec<CompileError>,
    panic_mode: bool,
}

impl<'a> Parser<'a> {
    fn new(source: Rc<str>, interner: &'a mut Interner) -> Self {
        let placeholder = Rc::new(Token::new(TokenType::Eof, Rc::clone(&source), 0, 0, 1));
        Self {
            scanner: Scanner::new(source),
            previous: Rc::clone(&placeholder),
            current: placeholder,
            interner,
            frames: vec![FuncScope::new(CompilerType::Script, None)],
            errors: vec![],
            panic_mode: false,
        }
    }

    fn current_chunk(&self) -> &Chunk {
        &self.frames.last().unwrap().chunk
    }

    fn is_local_scope(&self) -> bool {
        let frame = self.frames.last().unwrap();
        frame.typ == CompilerType::Function || frame.scope_depth > 0
    }

    fn advance(&mut self) {
        self.previous = Rc::clone(&self.current);
        loop {
            let token = self.scanner.next_token();
            self.current = Rc::new(token);
            if self.current.typ() != TokenType::Unknown {
                break;
            }
            let tok = Rc::clone(&self.current);
            self.error_at(CompileError::UnknownCharacter(tok));
        }
    }

    fn check(&self, typ: TokenType) -> bool {
        self.current.typ() == typ
    }

    fn match_token(&mut self, typ: TokenType) -> bool {
        if self.check(typ) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, typ: TokenType, expected: &'static str) {
        if self.check(typ) {
            self.advance();
            return;
        }
        let tok = Rc::clone(&self.current);
        self.error_at(CompileError::UnexpectedToken(tok, expected));
    }

    fn error_at(&mut self, err: CompileError) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.push(err);
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.typ() != TokenType::Eof {
            if self.previous.typ() == TokenType::Semicolon {
                return;
            }
            use TokenType::*;
            match self.current.typ() {
                Class | Const | Def | If | Let | Return | While => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn emit_u8(&mut self, instr: Instruction, operand: usize, line: u32) {
        // Every caller bounds `operand` to 255 before reaching here (locals are capped at
        // compile time; argument/element counts are clamped with their own diagnostic).
        let _ = self.current_chunk().write_instr_u8(instr, operand, line);
    }

    fn emit_global(&mut self, ops: (Instruction, Instruction), value: Value) {
        let line = self.previous.line();
        if self.current_chunk().write_instr_const(ops, value, line).is_err() {
            let tok = Rc::clone(&self.previous);
            self.error_at(CompileError::TooManyConstants(tok));
        }
    }

    fn declare_local(&mut self, name: &str, read_only: bool) {
        let idx = self.frames.len() - 1;
        let depth = self.frames[idx].scope_depth;
        for local in self.frames[idx].locals.iter().rev() {
            if local.depth != -1 && local.depth < depth {
                break;
            }
            if local.name.as_ref() == name {
                let tok = Rc::clone(&self.previous);
                self.error_at(CompileError::AlreadyDeclared(tok, Rc::from(name)));
                return;
            }
        }
        if self.frames[idx].locals.len() >= 256 {
            let tok = Rc::clone(&self.previous);
            self.error_at(CompileError::TooManyLocals(tok));
            return;
        }
        self.frames[idx].locals.push(Local {
            name: Rc::from(name),
            depth: -1,
            read_only,
        });
    }

    fn mark_initialized(&mut self) {
        let idx = self.frames.len() - 1;
        let depth = self.frames[idx].scope_depth;
        if let Some(local) = self.frames[idx].locals.last_mut() {
            local.depth = depth;
        }
    }

    fn resolve_local(&mut self, name: &str) -> Option<(u8, bool)> {
        let idx = self.frames.len() - 1;
        for (slot, local) in self.frames[idx].locals.iter().enumerate().rev() {
            if local.name.as_ref() == name {
                if local.depth == -1 {
                    let tok = Rc::clone(&self.previous);
                    self.error_at(CompileError::ReadBeforeInitialized(tok, Rc::from(name)));
                }
                return Some((slot as u8, local.read_only));
            }
        }
        None
    }

    fn start_scope(&mut self) {
        self.frames.last_mut().unwrap().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        let line = self.previous.line();
        let idx = self.frames.len() - 1;
        self.frames[idx].scope_depth -= 1;
        let depth = self.frames[idx].scope_depth;
        while self.frames[idx]
            .locals
            .last()
            .is_some_and(|l| l.depth > depth)
        {
            self.frames[idx].locals.pop();
            self.frames[idx].chunk.write_instr(POP, line);
        }
    }

    fn named_variable(&mut self, name_token: Rc<Token>, can_assign: bool) {
        let name = name_token.lexeme().to_string();
        let local = self.resolve_local(&name);
        let is_assign = can_assign && self.check(TokenType::Equal);
        if is_assign {
            self.advance();
            self.expression();
        }
        let line = name_token.line();
        match local {
            Some((slot, read_only)) => {
                if is_assign {
                    if read_only {
                        self.error_at(CompileError::ConstLocal(name_token, Rc::from(name.as_str())));
                    }
                    self.emit_u8(SET_LOCAL, slot as usize, line);
                } else {
                    self.emit_u8(GET_LOCAL, slot as usize, line);
                }
            }
            None => {
                let interned = self.interner.intern(&name);
                let value = Value::from(interned);
                if is_assign {
                    self.emit_global((SET_GLOBAL8, SET_GLOBAL16), value);
                } else {
                    self.emit_global((GET_GLOBAL8, GET_GLOBAL16), value);
                }
            }
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let can_assign = precedence <= Precedence::Assignment;
        match get_rule(self.previous.typ()).prefix {
            Some(rule) => rule(self, can_assign),
            None => {
                let tok = Rc::clone(&self.previous);
                self.error_at(CompileError::UnexpectedToken(tok, "expression"));
                return;
            }
        }

        while precedence <= get_rule(self.current.typ()).precedence {
            self.advance();
            let rule = get_rule(self.previous.typ()).infix.unwrap();
            rule(self, can_assign);
        }

        if can_assign && self.match_token(TokenType::Equal) {
            let tok = Rc::clone(&self.previous);
            self.error_at(CompileError::InvalidAssignmentTarget(tok));
        }
    }

    fn declaration(&mut self) {
        if self.match_token(TokenType::Let) {
            self.var_declaration(false);
        } else if self.match_token(TokenType::Const) {
            self.var_declaration(true);
        } else if self.match_token(TokenType::Def) {
            self.function_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn var_declaration(&mut self, read_only: bool) {
        self.consume(TokenType::Identifier, "variable name");
        let name = self.previous.lexeme().to_string();
        let is_local = self.is_local_scope();
        if is_local {
            self.declare_local(&name, read_only);
        }
        if self.match_token(TokenType::Equal) {
            self.expression();
        } else {
            let line = self.previous.line();
            self.current_chunk().write_instr(NULL, line);
        }
        self.consume(TokenType::Semicolon, "';' after variable declaration");
        if is_local {
            self.mark_initialized();
        } else {
            let interned = self.interner.intern(&name);
            let ops = if read_only {
                (DECL_GLOBAL_CONST8, DECL_GLOBAL_CONST16)
            } else {
                (DECL_GLOBAL8, DECL_GLOBAL16)
            };
            self.emit_global(ops, Value::from(interned));
        }
    }

    fn function_declaration(&mut self) {
        self.consume(TokenType::Identifier, "function name");
        let name = self.previous.lexeme().to_string();
        let interned_name = self.interner.intern(&name);

        let is_local = self.is_local_scope();
        if is_local {
            self.declare_local(&name, true);
            self.mark_initialized();
        }

        self.frames
            .push(FuncScope::new(CompilerType::Function, Some(Rc::clone(&interned_name))));

        self.consume(TokenType::OParen, "'(' after function name");
        if !self.check(TokenType::CParen) {
            loop {
                let idx = self.frames.len() - 1;
                if self.frames[idx].arity == 255 {
                    let tok = Rc::clone(&self.current);
                    self.error_at(CompileError::TooManyParameters(tok));
                }
                self.consume(TokenType::Identifier, "parameter name");
                let param = self.previous.lexeme().to_string();
                self.declare_local(&param, false);
                self.mark_initialized();
                self.frames[idx].arity = self.frames[idx].arity.saturating_add(1);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::CParen, "')' after parameters");
        self.consume(TokenType::OBrace, "'{' before function body");
        self.block();

        let function = self.end_function();
        let line = self.previous.line();
        let value = Value::from(function);
        if self
            .current_chunk()
            .write_instr_const((CONSTANT8, CONSTANT16), value, line)
            .is_err()
        {
            let tok = Rc::clone(&self.previous);
            self.error_at(CompileError::TooManyConstants(tok));
        }

        if !is_local {
            self.emit_global(
                (DECL_GLOBAL_CONST8, DECL_GLOBAL_CONST16),
                Value::from(interned_name),
            );
        }
    }

    /// Emits the implicit `NULL; RETURN` every function body ends with (harmless if an explicit
    /// `return` already ran) and pops the just-finished function's compile-time scope.
    fn end_function(&mut self) -> Function {
        let line = self.previous.line();
        self.current_chunk().write_instr(NULL, line);
        self.current_chunk().write_instr(RETURN, line);
        let scope = self.frames.pop().unwrap();
        Function {
            name: scope.name,
            arity: scope.arity,
            chunk: scope.chunk,
        }
    }

    fn statement(&mut self) {
        if self.match_token(TokenType::OBrace) {
            self.start_scope();
            self.block();
            self.end_scope();
        } else if self.match_token(TokenType::If) {
            self.if_statement();
        } else if self.match_token(TokenType::While) {
            self.while_statement();
        } else if self.match_token(TokenType::Return) {
            self.return_statement();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenType::CBrace) && !self.check(TokenType::Eof) {
            self.declaration();
        }
        self.consume(TokenType::CBrace, "'}' after block");
    }

    fn if_statement(&mut self) {
        self.consume(TokenType::OParen, "'(' after 'if'");
        self.expression();
        self.consume(TokenType::CParen, "')' after condition");
        let line = self.previous.line();

        let then_jump = self.current_chunk().emit_jump(JUMP_IF_FALSE, line);
        self.current_chunk().write_instr(POP, line);
        self.statement();

        let else_jump = self.current_chunk().emit_jump(JUMP, line);
        self.patch_jump(then_jump);
        self.current_chunk().write_instr(POP, line);

        if self.match_token(TokenType::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk().len();
        self.consume(TokenType::OParen, "'(' after 'while'");
        self.expression();
        self.consume(TokenType::CParen, "')' after condition");
        let line = self.previous.line();

        let exit_jump = self.current_chunk().emit_jump(JUMP_IF_FALSE, line);
        self.current_chunk().write_instr(POP, line);
        self.statement();
        if self.current_chunk().emit_loop(loop_start, line).is_err() {
            let tok = Rc::clone(&self.previous);
            self.error_at(CompileError::JumpTooFar(tok));
        }
        self.patch_jump(exit_jump);
        self.current_chunk().write_instr(POP, line);
    }

    fn return_statement(&mut self) {
        if self.frames.last().unwrap().typ != CompilerType::Function {
            let tok = Rc::clone(&self.previous);
            self.error_at(CompileError::ReturnOutsideFunction(tok));
        }
        let line = self.previous.line();
        if self.match_token(TokenType::Semicolon) {
            self.current_chunk().write_instr(NULL, line);
        } else {
            self.expression();
            self.consume(TokenType::Semicolon, "';' after return value");
        }
        self.current_chunk().write_instr(RETURN, line);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "';' after expression");
        let line = self.previous.line();
        self.current_chunk().write_instr(POP, line);
    }

    fn patch_jump(&mut self, at: usize) {
        if self.current_chunk().patch_jump(at).is_err() {
            let tok = Rc::clone(&self.previous);
            self.error_at(CompileError::JumpTooFar(tok));
        }
    }
}

fn grouping(p: &mut Parser<'_>, _can_assign: bool) {
    p.expression();
    p.consume(TokenType::CParen, "')' after expression");
}

fn unary(p: &mut Parser<'_>, _can_assign: bool) {
    let op = p.previous.typ();
    let line = p.previous.line();
    p.parse_precedence(Precedence::Unary);
    let instr = match op {
        TokenType::Bang => NOT,
        TokenType::Minus => NEGATIVE,
        TokenType::Plus => POSITIVE,
        _ => unreachable!(),
    };
    p.current_chunk().write_instr(instr, line);
}

fn binary(p: &mut Parser<'_>, _can_assign: bool) {
    let op = p.previous.typ();
    let line = p.previous.line();
    let rule = get_rule(op);
    p.parse_precedence(rule.precedence.next());
    let instr = match op {
        TokenType::Plus => ADD,
        TokenType::Minus => SUBTRACT,
        TokenType::Star => MULTIPLY,
        TokenType::Slash => DIVIDE,
        TokenType::Percent => MODULO,
        TokenType::DEqual => EQUAL,
        TokenType::BangEqual => NOT_EQUAL,
        TokenType::Greater => GREATER,
        TokenType::GreaterEqual => GREATER_EQUAL,
        TokenType::Less => LESS,
        TokenType::LessEqual => LESS_EQUAL,
        _ => unreachable!(),
    };
    p.current_chunk().write_instr(instr, line);
}

fn and_(p: &mut Parser<'_>, _can_assign: bool) {
    let line = p.previous.line();
    let end_jump = p.current_chunk().emit_jump(JUMP_IF_FALSE, line);
    p.current_chunk().write_instr(POP, line);
    p.parse_precedence(Precedence::And);
    p.patch_jump(end_jump);
}

fn or_(p: &mut Parser<'_>, _can_assign: bool) {
    let line = p.previous.line();
    let end_jump = p.current_chunk().emit_jump(JUMP_IF_TRUE, line);
    p.current_chunk().write_instr(POP, line);
    p.parse_precedence(Precedence::Or);
    p.patch_jump(end_jump);
}

fn number(p: &mut Parser<'_>, _can_assign: bool) {
    let line = p.previous.line();
    match p.previous.lexeme().parse::<f64>() {
        Ok(n) if n == 0.0 => p.current_chunk().write_instr(ZERO, line),
        Ok(n) if n == 1.0 => p.current_chunk().write_instr(ONE, line),
        Ok(n) => {
            if p
                .current_chunk()
                .write_instr_const((CONSTANT8, CONSTANT16), Value::Number(n), line)
                .is_err()
            {
                let tok = Rc::clone(&p.previous);
                p.error_at(CompileError::TooManyConstants(tok));
            }
        }
        Err(_) => {
            let tok = Rc::clone(&p.previous);
            p.error_at(CompileError::InvalidNumber(tok));
        }
    }
}

fn string(p: &mut Parser<'_>, _can_assign: bool) {
    let line = p.previous.line();
    let lexeme = p.previous.lexeme();
    let contents = &lexeme[1..lexeme.len() - 1];
    let interned = p.interner.intern(contents);
    if p
        .current_chunk()
        .write_instr_const((CONSTANT8, CONSTANT16), Value::from(interned), line)
        .is_err()
    {
        let tok = Rc::clone(&p.previous);
        p.error_at(CompileError::TooManyConstants(tok));
    }
}

fn literal(p: &mut Parser<'_>, _can_assign: bool) {
    let line = p.previous.line();
    let instr = match p.previous.typ() {
        TokenType::True => TRUE,
        TokenType::False => FALSE,
        TokenType::Null => NULL,
        _ => unreachable!(),
    };
    p.current_chunk().write_instr(instr, line);
}

fn variable(p: &mut Parser<'_>, can_assign: bool) {
    let name_token = Rc::clone(&p.previous);
    p.named_variable(name_token, can_assign);
}

fn argument_list(p: &mut Parser<'_>) -> u8 {
    let mut argc: u32 = 0;
    if !p.check(TokenType::CParen) {
        loop {
            p.expression();
            if argc == 255 {
                let tok = Rc::clone(&p.previous);
                p.error_at(CompileError::TooManyArguments(tok));
            }
            argc += 1;
            if !p.match_token(TokenType::Comma) {
                break;
            }
        }
    }
    p.consume(TokenType::CParen, "')' after arguments");
    argc.min(255) as u8
}

fn call(p: &mut Parser<'_>, _can_assign: bool) {
    let line = p.previous.line();
    let argc = argument_list(p);
    p.emit_u8(CALL, argc as usize, line);
}

fn array(p: &mut Parser<'_>, _can_assign: bool) {
    let line = p.previous.line();
    let mut count: u32 = 0;
    if !p.check(TokenType::CBracket) {
        loop {
            p.expression();
            if count == 255 {
                let tok = Rc::clone(&p.previous);
                p.error_at(CompileError::TooManyElements(tok));
            }
            count += 1;
            if !p.match_token(TokenType::Comma) {
                break;
            }
        }
    }
    p.consume(TokenType::CBracket, "']' after array elements");
    p.emit_u8(ARRAY, count.min(255) as usize, line);
}

fn subscript(p: &mut Parser<'_>, can_assign: bool) {
    let line = p.previous.line();
    p.expression();
    p.consume(TokenType::CBracket, "']' after index");
    if can_assign && p.match_token(TokenType::Equal) {
        p.expression();
        p.current_chunk().write_instr(SUBSCRIPT_SET, line);
    } else {
        p.current_chunk().write_instr(SUBSCRIPT_GET, line);
    }
}

/// Compiles `source` into a nameless top-level `Function`, interning identifiers and string
/// literals into `interner` along the way. On any compile error, parsing continues (panic-mode
/// recovery via `synchronize`) so the caller gets every error found in one pass rather than only
/// the first.
pub fn compile(source: &str, interner: &mut Interner) -> Result<Function, Vec<CompileError>> {
    let source: Rc<str> = Rc::from(source);
    let mut parser = Parser::new(source, interner);
    parser.advance();
    while !parser.match_token(TokenType::Eof) {
        parser.declaration();
    }
    let line = parser.previous.line();
    parser.current_chunk().write_instr(NULL, line);
    parser.current_chunk().write_instr(RETURN, line);

    if !parser.errors.is_empty() {
        return Err(parser.errors);
    }
    let scope = parser.frames.pop().unwrap();
    Ok(Function {
        name: scope.name,
        arity: scope.arity,
        chunk: scope.chunk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(source: &str) -> Function {
        let mut interner = Interner::new();
        compile(source, &mut interner).unwrap_or_else(|errs| {
            panic!(
                "expected {source:?} to compile, got {} errors: {:?}",
                errs.len(),
                errs.iter().map(|e| e.to_string()).collect::<Vec<_>>()
            )
        })
    }

    #[test]
    fn empty_source_compiles_to_null_return() {
        let function = compile_ok("");
        assert_eq!(function.chunk.len(), 2);
    }

    #[test]
    fn redeclaring_a_local_in_the_same_scope_is_an_error() {
        let mut interner = Interner::new();
        let result = compile("{ let x = 1; let x = 2; }", &mut interner);
        assert!(result.is_err());
    }

    #[test]
    fn shadowing_across_nested_scopes_is_allowed() {
        compile_ok("{ let x = 1; { let x = 2; } }");
    }

    #[test]
    fn reading_a_local_in_its_own_initializer_is_an_error() {
        let mut interner = Interner::new();
        let result = compile("{ let x = x; }", &mut interner);
        assert!(result.is_err());
    }

    #[test]
    fn assigning_to_a_non_lvalue_is_an_error() {
        let mut interner = Interner::new();
        let result = compile("1 + 2 = 3;", &mut interner);
        assert!(result.is_err());
    }

    #[test]
    fn return_outside_a_function_is_an_error() {
        let mut interner = Interner::new();
        let result = compile("return 1;", &mut interner);
        assert!(result.is_err());
    }

    #[test]
    fn function_declaration_compiles_and_is_callable_syntax() {
        compile_ok("def add(a, b) { return a + b; } print(add(1, 2));");
    }

    #[test]
    fn array_literal_and_subscript_compile() {
        compile_ok("let a = [1, 2, 3]; a[0] = 99;");
    }

    #[test]
    fn panic_mode_recovers_at_the_next_statement() {
        let mut interner = Interner::new();
        let result = compile("let = ; let y = 1;", &mut interner);
        assert!(result.is_err());
    }
}
