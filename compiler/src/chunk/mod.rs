pub mod value;

use std::cell::RefCell;
use value::Value;

fn split(bytes: u16) -> (u8, u8) {
    ((bytes >> 8) as u8, bytes as u8)
}

fn combine(hi: u8, lo: u8) -> u16 {
    (hi as u16) << 8 | (lo as u16)
}

macro_rules! byte_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident {
        $($(#[$vmeta:meta])* $vname:ident,)*
    }) => {
        $(#[$meta])*
        $vis enum $name {
            $($(#[$vmeta])* $vname,)*
        }

        impl std::convert::From<u8> for $name {
            fn from(v: u8) -> Self {
                match v {
                    $(x if x == $name::$vname as u8 => $name::$vname,)*
                    _ => $name::UNKNOWN,
                }
            }
        }
    }
}

byte_enum! {
    #[allow(non_camel_case_types)]
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum Instruction {
        /// Pop result; discard call frame; if frame stack empty, halt; else push result on caller's stack.
        RETURN,
        /// Discard top.
        POP,
        /// `JUMP <offset: u16>`: ip += offset.
        JUMP,
        /// `JUMP_IF_TRUE <offset: u16>`: ip += offset when peek(0) is truthy. Condition stays on stack.
        JUMP_IF_TRUE,
        /// `JUMP_IF_FALSE <offset: u16>`: ip += offset when peek(0) is falsy. Condition stays on stack.
        JUMP_IF_FALSE,
        /// `JUMP_BACK <offset: u16>`: ip -= offset.
        JUMP_BACK,
        /// `CONSTANT8 <idx: u8>`: push constants[idx].
        CONSTANT8,
        /// `CONSTANT16 <idx: u16>`: push constants[idx].
        CONSTANT16,
        ZERO,
        ONE,
        TRUE,
        FALSE,
        NULL,
        /// `DECL_GLOBAL8 <idx: u8>`: pop TOS; bind globals[name=constants[idx]] = TOS, read-write.
        DECL_GLOBAL8,
        /// `DECL_GLOBAL_CONST8 <idx: u8>`: same as `DECL_GLOBAL8` but read-only.
        DECL_GLOBAL_CONST8,
        /// `DECL_GLOBAL16 <idx: u16>`.
        DECL_GLOBAL16,
        /// `DECL_GLOBAL_CONST16 <idx: u16>`.
        DECL_GLOBAL_CONST16,
        /// `GET_GLOBAL8 <idx: u8>`: push globals[constants[idx]].
        GET_GLOBAL8,
        /// `GET_GLOBAL16 <idx: u16>`.
        GET_GLOBAL16,
        /// `SET_GLOBAL8 <idx: u8>`: globals[constants[idx]] = peek(0).
        SET_GLOBAL8,
        /// `SET_GLOBAL16 <idx: u16>`.
        SET_GLOBAL16,
        /// `GET_LOCAL <slot: u8>`: push the value at the given frame-relative slot.
        GET_LOCAL,
        /// `SET_LOCAL <slot: u8>`: overwrite the frame-relative slot with peek(0).
        SET_LOCAL,
        NOT,
        POSITIVE,
        NEGATIVE,
        /// Binary; operand order is second-popped OP first-popped.
        ADD,
        SUBTRACT,
        MULTIPLY,
        DIVIDE,
        MODULO,
        EQUAL,
        NOT_EQUAL,
        GREATER,
        GREATER_EQUAL,
        /// Implemented by swapping the operands of `GREATER`.
        LESS,
        /// Implemented by swapping the operands of `GREATER_EQUAL`.
        LESS_EQUAL,
        /// Pop index, pop collection, push element.
        SUBSCRIPT_GET,
        /// Pop value, pop index, pop collection, mutate, push value.
        SUBSCRIPT_SET,
        /// `ARRAY <count: u8>`: pop `count` values, push a new array built from them in source order.
        ARRAY,
        /// `CALL <argc: u8>`: callee sits at `stack_top[-(argc+1)]`.
        CALL,
        UNKNOWN,
    }
}

use Instruction::*;

/// Bytecode buffer, constant pool, and run-length-encoded line table for a single compiled
/// function. Built through `&self` methods (the active `Compiler` holds a shared reference
/// while descending the parse tree), so the mutable state lives behind `RefCell`s.
pub struct Chunk {
    bytes: RefCell<Vec<u8>>,
    constants: RefCell<Vec<Value>>,
    /// `(run_length, line)` pairs. See `examples/original_source/src/chunk.c`'s `chunk_write`.
    lines: RefCell<Vec<(u32, u32)>>,
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            bytes: RefCell::new(vec![]),
            constants: RefCell::new(vec![]),
            lines: RefCell::new(vec![]),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte(&self, offset: usize) -> u8 {
        self.bytes.borrow()[offset]
    }

    pub fn constant(&self, idx: usize) -> Value {
        self.constants.borrow()[idx].clone()
    }

    /// Walks the RLE line table accumulating run lengths until `offset` falls inside one.
    pub fn line_for(&self, offset: usize) -> u32 {
        let mut current = 0usize;
        for (run_length, line) in self.lines.borrow().iter() {
            current += *run_length as usize;
            if current > offset {
                return *line;
            }
        }
        0
    }

    fn write_byte(&self, byte: u8, line: u32) {
        self.bytes.borrow_mut().push(byte);
        let mut lines = self.lines.borrow_mut();
        match lines.last_mut() {
            Some((run_length, last_line)) if *last_line == line => *run_length += 1,
            _ => lines.push((1, line)),
        }
    }

    fn write_u16(&self, value: u16, line: u32) {
        let (hi, lo) = split(value);
        self.write_byte(hi, line);
        self.write_byte(lo, line);
    }

    fn patch_u16(&self, at: usize, value: u16) {
        let (hi, lo) = split(value);
        let mut bytes = self.bytes.borrow_mut();
        bytes[at] = hi;
        bytes[at + 1] = lo;
    }

    /// Linear-scan dedup: numbers and strings with equal content reuse the existing slot.
    fn add_constant(&self, value: Value) -> usize {
        match &value {
            Value::Number(n) => {
                for (idx, existing) in self.constants.borrow().iter().enumerate() {
                    if let Value::Number(m) = existing {
                        if m == n {
                            return idx;
                        }
                    }
                }
            }
            Value::Object(value::Object::String(s)) => {
                for (idx, existing) in self.constants.borrow().iter().enumerate() {
                    if let Value::Object(value::Object::String(existing)) = existing {
                        if existing.chars() == s.chars() {
                            return idx;
                        }
                    }
                }
            }
            _ => {}
        }
        let idx = self.constants.borrow().len();
        self.constants.borrow_mut().push(value);
        idx
    }

    pub fn write_instr(&self, instr: Instruction, line: u32) {
        self.write_byte(instr as u8, line);
    }

    /// `instr` must be `GET_LOCAL`, `SET_LOCAL`, `ARRAY`, or `CALL`. Fails when `operand` > 255.
    pub fn write_instr_u8(&self, instr: Instruction, operand: usize, line: u32) -> Result<(), ()> {
        if operand > u8::MAX as usize {
            return Err(());
        }
        self.write_instr(instr, line);
        self.write_byte(operand as u8, line);
        Ok(())
    }

    /// Picks the 8- or 16-bit opcode variant depending on the constant's pool index. Fails once
    /// the chunk holds more than 65536 constants.
    pub fn write_instr_const(
        &self,
        (instr8, instr16): (Instruction, Instruction),
        value: Value,
        line: u32,
    ) -> Result<(), ()> {
        match self.add_constant(value) {
            idx if idx <= u8::MAX as usize => {
                self.write_instr(instr8, line);
                self.write_byte(idx as u8, line);
                Ok(())
            }
            idx if idx <= u16::MAX as usize => {
                self.write_instr(instr16, line);
                self.write_u16(idx as u16, line);
                Ok(())
            }
            _ => Err(()),
        }
    }

    /// Emits `instr` with a placeholder `u16` operand, returning the offset to patch later with
    /// `patch_jump`. `instr` must be `JUMP`, `JUMP_IF_TRUE`, or `JUMP_IF_FALSE`.
    pub fn emit_jump(&self, instr: Instruction, line: u32) -> usize {
        self.write_instr(instr, line);
        self.write_byte(0xff, line);
        self.write_byte(0xff, line);
        self.len() - 2
    }

    /// Back-patches the placeholder written by `emit_jump` with the distance from just past the
    /// operand to the current end of the chunk. Fails when that distance exceeds 65535.
    pub fn patch_jump(&self, at: usize) -> Result<(), ()> {
        let offset = self.len() - at - 2;
        if offset > u16::MAX as usize {
            return Err(());
        }
        self.patch_u16(at, offset as u16);
        Ok(())
    }

    /// Emits `JUMP_BACK` targeting `loop_start`. Fails when the backward distance exceeds 65535.
    pub fn emit_loop(&self, loop_start: usize, line: u32) -> Result<(), ()> {
        self.write_instr(JUMP_BACK, line);
        let offset = self.len() + 2 - loop_start;
        if offset > u16::MAX as usize {
            return Err(());
        }
        self.write_u16(offset as u16, line);
        Ok(())
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ip = 0;
        let mut cur_line = 0;

        macro_rules! byte_oper {
            () => {
                self.bytes.borrow()[ip + 1] as usize
            };
        }
        macro_rules! u16_oper {
            () => {
                combine(self.bytes.borrow()[ip + 1], self.bytes.borrow()[ip + 2]) as usize
            };
        }

        while ip < self.len() {
            let instr: Instruction = self.bytes.borrow()[ip].into();
            let line = self.line_for(ip);
            if line != cur_line {
                write!(f, "{line:^5} | ")?;
                cur_line = line;
            } else {
                write!(f, "{} | ", " ".repeat(5))?;
            }
            write!(f, "{ip:<05} {:16}", format!("{instr:?}"))?;
            match instr {
                RETURN | POP | NOT | POSITIVE | NEGATIVE | ADD | SUBTRACT | MULTIPLY | DIVIDE
                | MODULO | EQUAL | NOT_EQUAL | GREATER | GREATER_EQUAL | LESS | LESS_EQUAL
                | SUBSCRIPT_GET | SUBSCRIPT_SET | ZERO | ONE | TRUE | FALSE | NULL => {
                    writeln!(f)?;
                    ip += 1;
                }
                GET_LOCAL | SET_LOCAL | ARRAY | CALL => {
                    let operand = byte_oper!();
                    writeln!(f, " {operand}")?;
                    ip += 2;
                }
                CONSTANT8 | GET_GLOBAL8 | SET_GLOBAL8 | DECL_GLOBAL8 | DECL_GLOBAL_CONST8 => {
                    let idx = byte_oper!();
                    writeln!(f, " {idx} ({})", self.constant(idx))?;
                    ip += 2;
                }
                CONSTANT16 | GET_GLOBAL16 | SET_GLOBAL16 | DECL_GLOBAL16 | DECL_GLOBAL_CONST16 => {
                    let idx = u16_oper!();
                    writeln!(f, " {idx} ({})", self.constant(idx))?;
                    ip += 3;
                }
                JUMP | JUMP_IF_TRUE | JUMP_IF_FALSE | JUMP_BACK => {
                    let offset = u16_oper!();
                    writeln!(f, " {offset}")?;
                    ip += 3;
                }
                UNKNOWN => unreachable!(),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_dedup_returns_the_same_index() {
        let chunk = Chunk::new();
        let a = chunk.add_constant(Value::Number(1.0));
        let b = chunk.add_constant(Value::Number(1.0));
        assert_eq!(a, b);
    }

    #[test]
    fn line_table_run_length_encodes_repeats() {
        let chunk = Chunk::new();
        chunk.write_instr(POP, 1);
        chunk.write_instr(POP, 1);
        chunk.write_instr(POP, 2);
        assert_eq!(chunk.line_for(0), 1);
        assert_eq!(chunk.line_for(1), 1);
        assert_eq!(chunk.line_for(2), 2);
    }

    #[test]
    fn jump_patch_leaves_no_placeholder_bytes() {
        let chunk = Chunk::new();
        let at = chunk.emit_jump(JUMP, 1);
        chunk.write_instr(POP, 1);
        chunk.patch_jump(at).unwrap();
        assert_eq!(chunk.byte(at), 0);
        assert_eq!(chunk.byte(at + 1), 1);
    }
}
