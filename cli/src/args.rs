use std::{env, fmt, path::PathBuf};

/// One raw `--flag`/`-f`-shaped argument, before it's matched against a known setting.
#[derive(Debug, Clone)]
enum Setting {
    Version,
    Command(String),
    Unknown(String),
}

const VERSION: &str = "-v";
const COMMAND: &str = "-c";

#[derive(Debug, Clone)]
enum Token {
    Setting(Setting),
    Path(PathBuf),
}

fn lex(iter: &mut env::Args) -> Vec<Token> {
    iter.next();
    let mut tokens = vec![];
    let mut args = iter.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            VERSION => tokens.push(Token::Setting(Setting::Version)),
            COMMAND => {
                let source = args.next().unwrap_or_default();
                tokens.push(Token::Setting(Setting::Command(source)));
            }
            x if x.starts_with('-') => tokens.push(Token::Setting(Setting::Unknown(arg))),
            path => tokens.push(Token::Path(PathBuf::from(path))),
        }
    }
    tokens
}

#[derive(Debug, Clone)]
pub enum EvalMode {
    File(PathBuf),
    Command(String),
    Repl,
}

#[derive(Debug, Clone)]
pub enum Action {
    Eval(EvalMode),
    Version,
}

#[derive(Debug, Clone)]
pub enum ArgsError {
    UnknownOption(String),
    MissingCommand,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOption(flag) => write!(f, "Unknown option {flag}"),
            Self::MissingCommand => write!(f, "Missing argument for -c"),
        }
    }
}

/// Parses `argv` into one `Action`, following `examples/original_source/src/main.c`'s dispatch:
/// no arguments opens the REPL, a bare path interprets that file, `-c <source>` interprets the
/// argument directly, `-v` prints the version and exits before anything else is considered.
pub fn get_action() -> Result<Action, ArgsError> {
    let tokens = lex(&mut env::args());
    let mut path = None;
    for token in tokens {
        match token {
            Token::Setting(Setting::Version) => return Ok(Action::Version),
            Token::Setting(Setting::Command(source)) => {
                if source.is_empty() {
                    return Err(ArgsError::MissingCommand);
                }
                return Ok(Action::Eval(EvalMode::Command(source)));
            }
            Token::Setting(Setting::Unknown(flag)) => return Err(ArgsError::UnknownOption(flag)),
            Token::Path(p) => path = Some(p),
        }
    }
    match path {
        Some(path) => Ok(Action::Eval(EvalMode::File(path))),
        None => Ok(Action::Eval(EvalMode::Repl)),
    }
}
