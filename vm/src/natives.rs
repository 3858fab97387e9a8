//! Built-in functions registered into the globals table at `Vm::new`. Signatures and error
//! wording follow `examples/original_source/src/cfunc.c` exactly; the calling convention itself
//! (`&[Value]` in, `Value` out, errors in-band) is `compiler::chunk::value::Native`.

use compiler::chunk::value::{Native, Object, Value};
use compiler::interner::Interner;
use std::io::{self, Write};
use std::time::Instant;

fn error(msg: impl Into<String>) -> Value {
    Value::Error(std::rc::Rc::from(msg.into()))
}

pub fn assert(args: &[Value], _interner: &mut Interner) -> Value {
    if args.len() != 1 {
        return error(format!("assert() expects 1 argument, got {}", args.len()));
    }
    if args[0].truthy() {
        Value::Null
    } else {
        error("Assertion failed")
    }
}

pub fn clock(args: &[Value], _interner: &mut Interner) -> Value {
    if !args.is_empty() {
        return error(format!("clock() expects 0 arguments, got {}", args.len()));
    }
    Value::Number(PROCESS_START.elapsed().as_secs_f64())
}

thread_local! {
    static PROCESS_START: Instant = Instant::now();
}

pub fn input(args: &[Value], interner: &mut Interner) -> Value {
    if args.len() > 1 {
        return error(format!(
            "input() expects 1 argument at most, got {}",
            args.len()
        ));
    }
    if let Some(prompt) = args.first() {
        print!("{prompt}");
        let _ = io::stdout().flush();
    }
    let mut buffer = String::new();
    if io::stdin().read_line(&mut buffer).is_err() {
        return error("Failed to read from stdin");
    }
    while buffer.ends_with('\n') || buffer.ends_with('\r') {
        buffer.pop();
    }
    Value::from(interner.intern(&buffer))
}

pub fn int(args: &[Value], _interner: &mut Interner) -> Value {
    if args.is_empty() || args.len() > 2 {
        return error(format!("int() expects 1 or 2 arguments, got {}", args.len()));
    }
    let base = match args.get(1) {
        Some(Value::Number(n)) => *n as u32,
        Some(_) => return error("int() expects a number for the base"),
        None => 10,
    };
    if !(2..=36).contains(&base) {
        return error("int() base must be between 2 and 36");
    }
    match &args[0] {
        Value::Number(n) => Value::Number(n.trunc()),
        Value::Object(Object::String(s)) => match i64::from_str_radix(s.chars().trim(), base) {
            Ok(n) => Value::Number(n as f64),
            Err(_) => error(format!("Cannot parse '{}' as an integer", s.chars())),
        },
        other => error(format!("Cannot convert type {} to int", other.type_name())),
    }
}

pub fn len(args: &[Value], _interner: &mut Interner) -> Value {
    if args.len() != 1 {
        return error(format!("len() expects 1 argument, got {}", args.len()));
    }
    match &args[0] {
        Value::Object(Object::String(s)) => Value::Number(s.chars().chars().count() as f64), // ObjString::chars() -> &str, then str::chars()
        Value::Object(Object::Array(items)) => Value::Number(items.borrow().len() as f64),
        other => error(format!("Cannot get length for type {}", other.type_name())),
    }
}

pub fn print(args: &[Value], _interner: &mut Interner) -> Value {
    let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    println!("{}", rendered.join(" "));
    Value::Null
}

pub fn push(args: &[Value], _interner: &mut Interner) -> Value {
    if args.len() != 2 {
        return error(format!("push() expects 2 arguments, got {}", args.len()));
    }
    match &args[0] {
        Value::Object(Object::Array(items)) => {
            items.borrow_mut().push(args[1].clone());
            args[0].clone()
        }
        other => error(format!("push() expects an array, got type {}", other.type_name())),
    }
}

pub fn pop(args: &[Value], _interner: &mut Interner) -> Value {
    if args.len() != 1 {
        return error(format!("pop() expects 1 argument, got {}", args.len()));
    }
    match &args[0] {
        Value::Object(Object::Array(items)) => match items.borrow_mut().pop() {
            Some(item) => item,
            None => error("pop() from an empty array"),
        },
        other => error(format!("pop() expects an array, got type {}", other.type_name())),
    }
}

pub fn str(args: &[Value], interner: &mut Interner) -> Value {
    if args.len() != 1 {
        return error(format!("str() expects 1 argument, got {}", args.len()));
    }
    Value::from(interner.intern(&args[0].to_string()))
}

pub fn type_(args: &[Value], interner: &mut Interner) -> Value {
    if args.len() != 1 {
        return error(format!("type() expects 1 argument, got {}", args.len()));
    }
    Value::from(interner.intern(args[0].type_name()))
}

pub const NATIVES: &[(&str, Native)] = &[
    ("assert", assert),
    ("clock", clock),
    ("input", input),
    ("int", int),
    ("len", len),
    ("print", print),
    ("push", push),
    ("pop", pop),
    ("str", str),
    ("type", type_),
];
