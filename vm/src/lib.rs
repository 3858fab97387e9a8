//! The stack-based interpreter: call-frame discipline, operator dispatch, global/local variable
//! access, and native-function calls over the bytecode the `compiler` crate emits. Mirrors
//! `examples/original_source/src/vm.c`'s `vm_run` dispatch loop and error-as-value convention,
//! generalized with the `CallFrame` stack that snapshot never grew (it only ever called native
//! functions; this one also calls user-defined `Function`s per SPEC_FULL.md §4.4).

pub mod hashtable;
pub mod natives;

use compiler::chunk::value::{Function, Object, Value};
use compiler::chunk::Chunk;
use compiler::chunk::Instruction::{self, *};
use compiler::error::{Backtrace, CompileError, RuntimeError, RuntimeErrorKind};
use compiler::interner::{Interner, ObjString};
use hashtable::{Hashtable, Lookup};
use lexer::token::{Token, TokenType};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

/// 64 call frames, matching §5's hard cap on recursion depth.
const FRAMES_MAX: usize = 64;

/// One invocation's view into the shared value stack: which function is running, where its
/// instruction pointer sits, and where its slot 0 (the reserved callee slot) begins.
struct CallFrame {
    function: Rc<Function>,
    ip: usize,
    slots_base: usize,
}

/// Either a compile-time or a run-time failure from `Vm::interpret`.
pub enum InterpretError {
    Compile(Vec<CompileError>),
    Runtime(RuntimeError),
}

/// Resolves a possibly-negative, modulo-length index. `None` means out of range even after
/// wrapping.
fn resolve_index(idx: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let normalized = if idx < 0 { idx + len } else { idx };
    (0..len).contains(&normalized).then_some(normalized as usize)
}

/// The VM is a process-wide singleton in spirit (per §9's design note, a rewrite threads it
/// explicitly instead) — one instance owns the value stack, the frame stack, the globals table,
/// and the string interner for the lifetime of a `qatam` process or REPL session.
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Hashtable,
    interner: Interner,
    source: Rc<str>,
    /// Tags the most recently pushed `Value::Error` with which `RuntimeError` variant it should
    /// become once caught at the loop boundary. The value itself only carries a message, per the
    /// data model, so this rides alongside it out of band.
    last_error_kind: RuntimeErrorKind,
    /// The value most recently discarded by a `POP` instruction, mirroring
    /// `examples/original_source/src/vm.c`'s `vm_last_value()` (which just rereads the stack slot
    /// a `vm_pop()` left behind). Every statement — including the implicit final one — ends by
    /// popping its result, so this is always the last statement's value once `run` halts.
    last_value: Value,
}

impl Vm {
    pub fn new() -> Self {
        let mut interner = Interner::new();
        let mut globals = Hashtable::new();
        for &(name, native) in natives::NATIVES.iter() {
            let key = interner.intern(name);
            globals.set(key, Value::CFunc(native), true);
        }
        Self {
            stack: vec![],
            frames: vec![],
            globals,
            interner,
            source: Rc::from(""),
            last_error_kind: RuntimeErrorKind::User,
            last_value: Value::Null,
        }
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn globals(&self) -> &Hashtable {
        &self.globals
    }

    /// Compiles and runs `source`. Globals, the interner, and natives persist across calls on
    /// the same `Vm` (so a REPL session accumulates global bindings); only the stack and frames
    /// reset, matching `vm_interpret`'s per-call state reset.
    pub fn interpret(&mut self, source: &str) -> Result<Value, InterpretError> {
        self.source = Rc::from(source);
        let function =
            compiler::compile(source, &mut self.interner).map_err(InterpretError::Compile)?;

        self.stack.clear();
        self.frames.clear();
        self.last_value = Value::Null;

        let function = Rc::new(function);
        self.stack
            .push(Value::Object(Object::Function(Rc::clone(&function))));
        self.frames.push(CallFrame {
            function,
            ip: 0,
            slots_base: 0,
        });

        self.run().map_err(InterpretError::Runtime)
    }

    fn chunk(&self) -> &Chunk {
        &self.frames.last().unwrap().function.chunk
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().unwrap();
        let byte = frame.function.chunk.byte(frame.ip);
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        (hi as u16) << 8 | lo as u16
    }

    fn peek(&self, back: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - back]
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow")
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn fail(&mut self, kind: RuntimeErrorKind, message: impl Into<String>) {
        self.last_error_kind = kind;
        self.stack.push(Value::Error(Rc::from(message.into())));
    }

    /// Execution loop: read one byte, dispatch, then check whether the step left an error on
    /// top of the stack (§4.4). Halting happens naturally once the check passes and the frame
    /// stack has emptied out from under a top-level `RETURN`; the value reported back is whatever
    /// `last_value` holds at that point, not the `RETURN`'s own result (which is always the
    /// implicit trailing `NULL`).
    fn run(&mut self) -> Result<Value, RuntimeError> {
        loop {
            let byte = self.read_byte();
            let instr: Instruction = byte.into();
            self.execute(instr);

            if matches!(self.stack.last(), Some(Value::Error(_))) {
                return Err(self.catch_error());
            }
            if self.frames.is_empty() {
                return Ok(self.last_value.clone());
            }
        }
    }

    /// Walks every still-active frame bottom (the script) to top (the innermost call),
    /// synthesizing a placeholder `Token` per frame purely to carry a line number and the shared
    /// source text into `Backtrace`'s renderer — the real tokens were discarded at the end of
    /// compilation.
    fn catch_error(&mut self) -> RuntimeError {
        let message = match self.stack.pop() {
            Some(Value::Error(msg)) => msg,
            _ => Rc::from("unknown error"),
        };
        let mut backtrace = Backtrace::default();
        for frame in &self.frames {
            let line = frame.function.chunk.line_for(frame.ip.saturating_sub(1));
            let token = Rc::new(Token::new(TokenType::Eof, Rc::clone(&self.source), 0, 0, line));
            let name = frame.function.name.as_ref().map(|n| Rc::from(n.chars()));
            backtrace.push(name, token);
        }
        self.stack.clear();
        self.frames.clear();
        RuntimeError::new(self.last_error_kind, message, backtrace)
    }

    fn global_name(&self, idx: usize) -> Rc<ObjString> {
        match self.chunk().constant(idx) {
            Value::Object(Object::String(s)) => s,
            _ => unreachable!("global-name constant must be a string"),
        }
    }

    fn decl_global(&mut self, idx: usize, read_only: bool) {
        let name = self.global_name(idx);
        let value = self.pop();
        let chars = name.chars().to_string();
        if !self.globals.set(name, value, read_only) {
            self.fail(
                RuntimeErrorKind::AlreadyDefined,
                format!("Identifier '{chars}' has already been declared"),
            );
        }
    }

    fn get_global(&mut self, idx: usize) {
        let name = self.global_name(idx);
        match self.globals.get(&name) {
            Some(value) => {
                let value = value.clone();
                self.push(value);
            }
            None => self.fail(
                RuntimeErrorKind::Name,
                format!("Identifier '{}' is not defined", name.chars()),
            ),
        }
    }

    fn set_global(&mut self, idx: usize) {
        let name = self.global_name(idx);
        let value = self.peek(0).clone();
        match self.globals.update(&name, value) {
            Lookup::Success => {}
            Lookup::Miss => self.fail(
                RuntimeErrorKind::Name,
                format!("Cannot assign to undefined variable '{}'", name.chars()),
            ),
            Lookup::ReadOnly => self.fail(
                RuntimeErrorKind::Const,
                format!("Cannot assign to constant variable '{}'", name.chars()),
            ),
        }
    }

    fn order(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
            (Value::Object(Object::String(x)), Value::Object(Object::String(y))) => {
                Some(x.chars().cmp(y.chars()))
            }
            _ => None,
        }
    }

    fn compare(&mut self, a: Value, b: Value, allow_equal: bool) {
        match self.order(&a, &b) {
            Some(ordering) => {
                let result = if allow_equal {
                    ordering != Ordering::Less
                } else {
                    ordering == Ordering::Greater
                };
                self.push(Value::Bool(result));
            }
            None => self.fail(
                RuntimeErrorKind::Type,
                format!(
                    "Cannot compare values of type {} and {}",
                    a.type_name(),
                    b.type_name()
                ),
            ),
        }
    }

    fn add(&mut self) {
        let b = self.pop();
        let a = self.pop();
        match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => self.push(Value::Number(x + y)),
            (Value::Object(Object::String(x)), Value::Object(Object::String(y))) => {
                let result = self.interner.concat(x, y);
                self.push(Value::from(result));
            }
            _ => self.fail(
                RuntimeErrorKind::Type,
                format!(
                    "Cannot add values of type {} and {}",
                    a.type_name(),
                    b.type_name()
                ),
            ),
        }
    }

    fn numeric_binop(&mut self, verb: &str, op: impl Fn(f64, f64) -> f64) {
        let b = self.pop();
        let a = self.pop();
        match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => self.push(Value::Number(op(*x, *y))),
            _ => self.fail(
                RuntimeErrorKind::Type,
                format!(
                    "Cannot {verb} values of type {} and {}",
                    a.type_name(),
                    b.type_name()
                ),
            ),
        }
    }

    fn multiply(&mut self) {
        let b = self.pop();
        let a = self.pop();
        match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => self.push(Value::Number(x * y)),
            (Value::Object(Object::String(s)), Value::Number(n))
            | (Value::Number(n), Value::Object(Object::String(s))) => {
                if *n < 0.0 || n.fract() != 0.0 {
                    self.fail(
                        RuntimeErrorKind::Type,
                        "String repeat count must be a non-negative integer",
                    );
                    return;
                }
                let result = self.interner.repeat(s, *n as usize);
                self.push(Value::from(result));
            }
            _ => self.fail(
                RuntimeErrorKind::Type,
                format!(
                    "Cannot multiply values of type {} and {}",
                    a.type_name(),
                    b.type_name()
                ),
            ),
        }
    }

    fn divide(&mut self) {
        let b = self.pop();
        let a = self.pop();
        match (&a, &b) {
            (Value::Number(_), Value::Number(y)) if *y == 0.0 => {
                self.fail(RuntimeErrorKind::DivideByZero, "Cannot divide by 0")
            }
            (Value::Number(x), Value::Number(y)) => self.push(Value::Number(x / y)),
            _ => self.fail(
                RuntimeErrorKind::Type,
                format!(
                    "Cannot divide values of type {} and {}",
                    a.type_name(),
                    b.type_name()
                ),
            ),
        }
    }

    /// Both operands truncate toward zero to `i64` before the integer modulus, per SPEC_FULL.md
    /// §9's resolution of the open question on integer-modulus width.
    fn modulo(&mut self) {
        let b = self.pop();
        let a = self.pop();
        match (&a, &b) {
            (Value::Number(_), Value::Number(y)) if *y as i64 == 0 => {
                self.fail(RuntimeErrorKind::DivideByZero, "Cannot divide by 0")
            }
            (Value::Number(x), Value::Number(y)) => {
                self.push(Value::Number((*x as i64 % *y as i64) as f64))
            }
            _ => self.fail(
                RuntimeErrorKind::Type,
                format!(
                    "Cannot compute modulo of type {} and {}",
                    a.type_name(),
                    b.type_name()
                ),
            ),
        }
    }

    fn subscript_get(&mut self) {
        let index = self.pop();
        let collection = self.pop();
        let idx = match &index {
            Value::Number(n) => *n as i64,
            other => {
                self.fail(
                    RuntimeErrorKind::Type,
                    format!("Index must be a number, got type {}", other.type_name()),
                );
                return;
            }
        };
        match &collection {
            Value::Object(Object::String(s)) => {
                let chars: Vec<char> = s.chars().chars().collect();
                match resolve_index(idx, chars.len()) {
                    Some(i) => {
                        let ch = self.interner.intern(&chars[i].to_string());
                        self.push(Value::from(ch));
                    }
                    None => self.fail(
                        RuntimeErrorKind::OutOfRange,
                        format!("Index {idx} out of range for string of length {}", chars.len()),
                    ),
                }
            }
            Value::Object(Object::Array(items)) => {
                let len = items.borrow().len();
                match resolve_index(idx, len) {
                    Some(i) => {
                        let value = items.borrow()[i].clone();
                        self.push(value);
                    }
                    None => self.fail(
                        RuntimeErrorKind::OutOfRange,
                        format!("Index {idx} out of range for array of length {len}"),
                    ),
                }
            }
            other => self.fail(
                RuntimeErrorKind::Type,
                format!("Cannot subscript type {}", other.type_name()),
            ),
        }
    }

    fn subscript_set(&mut self) {
        let value = self.pop();
        let index = self.pop();
        let collection = self.pop();
        let idx = match &index {
            Value::Number(n) => *n as i64,
            other => {
                self.fail(
                    RuntimeErrorKind::Type,
                    format!("Index must be a number, got type {}", other.type_name()),
                );
                return;
            }
        };
        match &collection {
            Value::Object(Object::String(_)) => {
                self.fail(RuntimeErrorKind::Type, "Strings are immutable")
            }
            Value::Object(Object::Array(items)) => {
                let len = items.borrow().len();
                match resolve_index(idx, len) {
                    Some(i) => {
                        items.borrow_mut()[i] = value.clone();
                        self.push(value);
                    }
                    None => self.fail(
                        RuntimeErrorKind::OutOfRange,
                        format!("Index {idx} out of range for array of length {len}"),
                    ),
                }
            }
            other => self.fail(
                RuntimeErrorKind::Type,
                format!("Cannot subscript type {}", other.type_name()),
            ),
        }
    }

    /// `CALL argc`: the callee sits at `stack_top[-(argc+1)]`. A `CFunc` runs to completion
    /// immediately; a user `Function` pushes a new `CallFrame` and lets the main loop continue
    /// stepping through its bytecode.
    fn call(&mut self, argc: usize) {
        let callee_index = self.stack.len() - argc - 1;
        let callee = self.stack[callee_index].clone();
        match callee {
            Value::CFunc(native) => {
                let args: Vec<Value> = self.stack[callee_index + 1..].to_vec();
                let result = native(&args, &mut self.interner);
                self.stack.truncate(callee_index);
                self.push(result);
            }
            Value::Object(Object::Function(function)) => {
                if argc != function.arity as usize {
                    let name = function.name.as_ref().map(|n| n.chars()).unwrap_or("<script>");
                    self.fail(
                        RuntimeErrorKind::InvalidArgc,
                        format!(
                            "{name}() expects {} argument{}, got {argc}",
                            function.arity,
                            if function.arity == 1 { "" } else { "s" }
                        ),
                    );
                    return;
                }
                if self.frames.len() >= FRAMES_MAX {
                    self.fail(RuntimeErrorKind::StackOverflow, "Stack overflow");
                    return;
                }
                self.frames.push(CallFrame {
                    function,
                    ip: 0,
                    slots_base: callee_index,
                });
            }
            other => self.fail(
                RuntimeErrorKind::NotCallable,
                format!("Type '{}' is not callable", other.type_name()),
            ),
        }
    }

    fn execute(&mut self, instr: Instruction) {
        match instr {
            RETURN => {
                let result = self.pop();
                let frame = self.frames.pop().unwrap();
                self.stack.truncate(frame.slots_base);
                self.push(result);
            }
            POP => {
                self.last_value = self.pop();
            }
            JUMP => {
                let offset = self.read_u16() as usize;
                self.frames.last_mut().unwrap().ip += offset;
            }
            JUMP_IF_TRUE => {
                let offset = self.read_u16() as usize;
                if self.peek(0).truthy() {
                    self.frames.last_mut().unwrap().ip += offset;
                }
            }
            JUMP_IF_FALSE => {
                let offset = self.read_u16() as usize;
                if !self.peek(0).truthy() {
                    self.frames.last_mut().unwrap().ip += offset;
                }
            }
            JUMP_BACK => {
                let offset = self.read_u16() as usize;
                self.frames.last_mut().unwrap().ip -= offset;
            }
            CONSTANT8 => {
                let idx = self.read_byte() as usize;
                let value = self.chunk().constant(idx);
                self.push(value);
            }
            CONSTANT16 => {
                let idx = self.read_u16() as usize;
                let value = self.chunk().constant(idx);
                self.push(value);
            }
            ZERO => self.push(Value::Number(0.0)),
            ONE => self.push(Value::Number(1.0)),
            TRUE => self.push(Value::Bool(true)),
            FALSE => self.push(Value::Bool(false)),
            NULL => self.push(Value::Null),
            DECL_GLOBAL8 => {
                let idx = self.read_byte() as usize;
                self.decl_global(idx, false);
            }
            DECL_GLOBAL_CONST8 => {
                let idx = self.read_byte() as usize;
                self.decl_global(idx, true);
            }
            DECL_GLOBAL16 => {
                let idx = self.read_u16() as usize;
                self.decl_global(idx, false);
            }
            DECL_GLOBAL_CONST16 => {
                let idx = self.read_u16() as usize;
                self.decl_global(idx, true);
            }
            GET_GLOBAL8 => {
                let idx = self.read_byte() as usize;
                self.get_global(idx);
            }
            GET_GLOBAL16 => {
                let idx = self.read_u16() as usize;
                self.get_global(idx);
            }
            SET_GLOBAL8 => {
                let idx = self.read_byte() as usize;
                self.set_global(idx);
            }
            SET_GLOBAL16 => {
                let idx = self.read_u16() as usize;
                self.set_global(idx);
            }
            GET_LOCAL => {
                let slot = self.read_byte() as usize;
                let base = self.frames.last().unwrap().slots_base;
                let value = self.stack[base + slot].clone();
                self.push(value);
            }
            SET_LOCAL => {
                let slot = self.read_byte() as usize;
                let base = self.frames.last().unwrap().slots_base;
                let value = self.peek(0).clone();
                self.stack[base + slot] = value;
            }
            NOT => {
                let value = self.pop();
                self.push(Value::Bool(!value.truthy()));
            }
            POSITIVE => match self.pop() {
                Value::Number(n) => self.push(Value::Number(n)),
                other => self.fail(
                    RuntimeErrorKind::Type,
                    format!("Cannot apply unary '+' to type {}", other.type_name()),
                ),
            },
            NEGATIVE => match self.pop() {
                Value::Number(n) => self.push(Value::Number(-n)),
                other => self.fail(
                    RuntimeErrorKind::Type,
                    format!("Cannot apply unary '-' to type {}", other.type_name()),
                ),
            },
            ADD => self.add(),
            SUBTRACT => self.numeric_binop("subtract", |x, y| x - y),
            MULTIPLY => self.multiply(),
            DIVIDE => self.divide(),
            MODULO => self.modulo(),
            EQUAL => {
                let b = self.pop();
                let a = self.pop();
                self.push(Value::Bool(a.equals(&b)));
            }
            NOT_EQUAL => {
                let b = self.pop();
                let a = self.pop();
                self.push(Value::Bool(!a.equals(&b)));
            }
            GREATER => {
                let b = self.pop();
                let a = self.pop();
                self.compare(a, b, false);
            }
            GREATER_EQUAL => {
                let b = self.pop();
                let a = self.pop();
                self.compare(a, b, true);
            }
            // Implemented by swapping the operands of GREATER/GREATER_EQUAL.
            LESS => {
                let b = self.pop();
                let a = self.pop();
                self.compare(b, a, false);
            }
            LESS_EQUAL => {
                let b = self.pop();
                let a = self.pop();
                self.compare(b, a, true);
            }
            SUBSCRIPT_GET => self.subscript_get(),
            SUBSCRIPT_SET => self.subscript_set(),
            ARRAY => {
                let count = self.read_byte() as usize;
                let start = self.stack.len() - count;
                let items: Vec<Value> = self.stack.drain(start..).collect();
                self.push(Value::Object(Object::Array(Rc::new(RefCell::new(items)))));
            }
            CALL => {
                let argc = self.read_byte() as usize;
                self.call(argc);
            }
            UNKNOWN => unreachable!("chunk contains an unrecognized opcode byte"),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ok(source: &str) -> Value {
        let mut vm = Vm::new();
        match vm.interpret(source) {
            Ok(value) => value,
            Err(InterpretError::Compile(errs)) => panic!("compile error: {errs:?}"),
            Err(InterpretError::Runtime(err)) => panic!("runtime error: {err}"),
        }
    }

    fn run_err(source: &str) -> RuntimeError {
        let mut vm = Vm::new();
        match vm.interpret(source) {
            Ok(value) => panic!("expected a runtime error, got {value}"),
            Err(InterpretError::Compile(errs)) => panic!("compile error: {errs:?}"),
            Err(InterpretError::Runtime(err)) => err,
        }
    }

    fn assert_number(value: Value, expected: f64) {
        match value {
            Value::Number(n) => assert_eq!(n, expected),
            other => panic!("expected a number, got {other}"),
        }
    }

    #[test]
    fn arithmetic_precedence() {
        assert_number(run_ok("1 + 2 * 3;"), 7.0);
    }

    #[test]
    fn string_repeat_via_multiply() {
        let value = run_ok("let x = \"ab\"; x * 3;");
        assert_eq!(value.to_string(), "ababab");
    }

    #[test]
    fn assigning_to_a_constant_global_is_a_runtime_error() {
        let err = run_err("const pi = 3; pi = 4;");
        assert!(err.msg().contains("constant variable 'pi'"));
    }

    #[test]
    fn recursive_function_calls() {
        let value = run_ok(
            "def f(n) { if (n < 2) { return n; } return f(n-1) + f(n-2); } f(10);",
        );
        assert_number(value, 55.0);
    }

    #[test]
    fn negative_index_assignment_on_arrays() {
        let value = run_ok("let a = [10, 20, 30]; a[-1] = 99; a;");
        assert_eq!(value.to_string(), "[10, 20, 99]");
    }

    #[test]
    fn while_loop_counts_up() {
        let value = run_ok(
            "let i = 0; let last = -1; while (i < 3) { last = i; i = i + 1; } last;",
        );
        assert_number(value, 2.0);
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let err = run_err("1 / 0;");
        assert_eq!(err.msg(), "Cannot divide by 0");
    }

    #[test]
    fn calling_a_non_callable_value_is_a_runtime_error() {
        let err = run_err("let x = 1; x();");
        assert!(err.msg().contains("is not callable"));
    }

    #[test]
    fn wrong_arity_call_is_a_runtime_error() {
        let err = run_err("def f(a, b) { return a + b; } f(1);");
        assert!(err.msg().contains("expects 2 arguments"));
    }

    #[test]
    fn out_of_range_index_is_a_runtime_error() {
        let err = run_err("let a = [1, 2]; a[5];");
        assert!(err.msg().contains("out of range"));
    }

    #[test]
    fn backtrace_walks_every_active_frame() {
        let err = run_err("def f() { return 1 / 0; } f();");
        assert_eq!(err.backtrace().to_string().lines().count(), 2);
    }
}
