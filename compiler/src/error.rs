use colored::Colorize;
use lexer::token::{Token, TokenInside};
use std::{fmt, rc::Rc};

/// Errors detected while compiling source into a `Chunk`, each carrying the token the parser was
/// looking at. Collected rather than bailing at the first one, so `synchronize()` can keep
/// parsing far enough to surface a batch of them in one run.
#[derive(Debug, Clone)]
pub enum CompileError {
    UnexpectedToken(Rc<Token>, &'static str),
    InvalidAssignmentTarget(Rc<Token>),
    AlreadyDeclared(Rc<Token>, Rc<str>),
    ReadBeforeInitialized(Rc<Token>, Rc<str>),
    TooManyLocals(Rc<Token>),
    TooManyConstants(Rc<Token>),
    TooManyArguments(Rc<Token>),
    TooManyParameters(Rc<Token>),
    TooManyElements(Rc<Token>),
    JumpTooFar(Rc<Token>),
    UnterminatedString(Rc<Token>),
    InvalidNumber(Rc<Token>),
    UnknownCharacter(Rc<Token>),
    ReturnOutsideFunction(Rc<Token>),
    ConstLocal(Rc<Token>, Rc<str>),
}

impl TokenInside for CompileError {
    fn token(&self) -> Rc<Token> {
        match self {
            CompileError::UnexpectedToken(t, _)
            | CompileError::InvalidAssignmentTarget(t)
            | CompileError::AlreadyDeclared(t, _)
            | CompileError::ReadBeforeInitialized(t, _)
            | CompileError::TooManyLocals(t)
            | CompileError::TooManyConstants(t)
            | CompileError::TooManyArguments(t)
            | CompileError::TooManyParameters(t)
            | CompileError::TooManyElements(t)
            | CompileError::JumpTooFar(t)
            | CompileError::UnterminatedString(t)
            | CompileError::InvalidNumber(t)
            | CompileError::UnknownCharacter(t)
            | CompileError::ReturnOutsideFunction(t) => Rc::clone(t),
            CompileError::ConstLocal(t, _) => Rc::clone(t),
        }
    }
}

impl CompileError {
    fn msg(&self) -> String {
        match self {
            CompileError::UnexpectedToken(_, expected) => format!("Expect {expected}"),
            CompileError::InvalidAssignmentTarget(_) => {
                "Invalid left-hand side in assignment".to_string()
            }
            CompileError::AlreadyDeclared(_, name) => {
                format!("Identifier '{name}' has already been declared")
            }
            CompileError::ReadBeforeInitialized(_, name) => {
                format!("Cannot read local variable '{name}' in its own initializer")
            }
            CompileError::TooManyLocals(_) => "Too many local variables in one scope".to_string(),
            CompileError::TooManyConstants(_) => "Too many constants in one chunk".to_string(),
            CompileError::TooManyArguments(_) => "Cannot have more than 255 arguments".to_string(),
            CompileError::TooManyParameters(_) => {
                "Cannot have more than 255 parameters".to_string()
            }
            CompileError::TooManyElements(_) => {
                "Cannot have more than 255 elements in an array literal".to_string()
            }
            CompileError::JumpTooFar(_) => "Too much code to jump over".to_string(),
            CompileError::UnterminatedString(_) => "Unterminated string".to_string(),
            CompileError::InvalidNumber(_) => "Invalid number literal".to_string(),
            CompileError::UnknownCharacter(_) => "Unexpected character".to_string(),
            CompileError::ReturnOutsideFunction(_) => {
                "Cannot return from top-level code".to_string()
            }
            CompileError::ConstLocal(_, name) => {
                format!("Cannot assign to constant variable '{name}'")
            }
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = self.token();
        writeln!(f, "{}", format!("SyntaxError at line {}:", token.line()).red())?;
        writeln!(f, "    {}", token.source_line())?;
        write!(f, "{} {}", self.msg(), token)
    }
}

/// What kind of runtime failure produced a `Value::Error`. The VM's opcode handlers push the
/// in-band error value (just a message, per the data model); this tag rides alongside it only
/// long enough for the loop boundary to build the right `RuntimeError` without re-parsing the
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    Type,
    Name,
    AlreadyDefined,
    Const,
    InvalidArgc,
    OutOfRange,
    NotCallable,
    DivideByZero,
    User,
    StackOverflow,
}

/// A runtime failure caught at the VM's instruction-loop boundary, carrying the call-stack trail
/// accumulated by walking the active frames bottom to top.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    kind: RuntimeErrorKind,
    message: Rc<str>,
    backtrace: Backtrace,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<Rc<str>>, backtrace: Backtrace) -> Self {
        Self {
            kind,
            message: message.into(),
            backtrace,
        }
    }

    pub fn kind(&self) -> RuntimeErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        &self.message
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((_, top)) = self.backtrace.inner.first() {
            writeln!(f, "{}", format!("RuntimeError at line {}:", top.line()).red())?;
            writeln!(f, "    {}", top.source_line())?;
        }
        write!(f, "{}", self.message)?;
        if !self.backtrace.inner.is_empty() {
            write!(f, "\n{}", self.backtrace)?;
        }
        Ok(())
    }
}

/// The chain of call frames a runtime error unwound through, oldest (innermost) first.
#[derive(Debug, Clone, Default)]
pub struct Backtrace {
    inner: Vec<(Option<Rc<str>>, Rc<Token>)>,
}

impl Backtrace {
    pub fn push(&mut self, name: Option<Rc<str>>, token: Rc<Token>) {
        self.inner.push((name, token));
    }
}

impl fmt::Display for Backtrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, token)) in self.inner.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let name = name.as_deref().unwrap_or("<script>");
            write!(f, "{}", format!("  ↳ at {name}(), line {}:", token.line()).dimmed())?;
        }
        Ok(())
    }
}
