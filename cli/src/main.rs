mod args;

use args::{get_action, Action, EvalMode};
use compiler::chunk::value::Value;
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::{fs, path::PathBuf, process::exit};
use vm::{InterpretError, Vm};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    match get_action() {
        Ok(Action::Version) => println!("aspic {VERSION}"),
        Ok(Action::Eval(EvalMode::Repl)) => run_repl(),
        Ok(Action::Eval(EvalMode::File(path))) => exit(run_file(path)),
        Ok(Action::Eval(EvalMode::Command(source))) => exit(run_source(&mut Vm::new(), &source)),
        Err(err) => {
            eprintln!("{err}");
            eprintln!("Usage: aspic [path] | aspic -c <source> | aspic -v");
            exit(exitcode::USAGE);
        }
    }
}

fn run_file(path: PathBuf) -> i32 {
    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("aspic: Cannot open {} ({err})", path.display());
            return 1;
        }
    };
    run_source(&mut Vm::new(), &source)
}

/// Interprets `source` to completion, printing the canonical representation of the resulting
/// value when it's non-null, matching `examples/original_source/src/repl.c`'s `vm_last_value()`
/// handling. Returns a process exit code: `0` on success, `1` on any compile or runtime error,
/// matching `examples/original_source/src/main.c`'s `result == VM_OK ? 0 : 1`.
fn run_source(vm: &mut Vm, source: &str) -> i32 {
    match vm.interpret(source) {
        Ok(Value::Null) => exitcode::OK,
        Ok(value) => {
            println!("{}", value.repr());
            exitcode::OK
        }
        Err(InterpretError::Compile(errors)) => {
            for error in errors {
                eprintln!("{error}");
            }
            1
        }
        Err(InterpretError::Runtime(error)) => {
            eprintln!("{error}");
            1
        }
    }
}

fn run_repl() {
    println!("Aspic {VERSION}");
    println!("  * exit: exit current session");
    println!("  * strings: print list of interned strings");
    println!("  * globals: print list of global identifiers");

    let mut vm = Vm::new();
    let mut rl = Editor::<()>::new();
    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                if !line.is_empty() {
                    rl.add_history_entry(&line);
                }
                match line.as_str() {
                    "exit" => break,
                    "strings" => print_strings(&vm),
                    "globals" => print_globals(&vm),
                    _ => {
                        run_source(&mut vm, &line);
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("aspic: {err}");
                break;
            }
        }
    }
}

fn print_strings(vm: &Vm) {
    for string in vm.interner().iter() {
        println!("{:?}", string.chars());
    }
}

fn print_globals(vm: &Vm) {
    for (name, value) in vm.globals().iter() {
        println!("{} = {}", name.chars(), value.repr());
    }
}
