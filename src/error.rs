//! Error types and diagnostics for the Jack compiler.
//!
//! Compilation is fail-fast: the first error aborts the current unit and is
//! surfaced as a single [`CompileError`]. There is no local recovery.

use crate::token::Span;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while compiling one Jack source unit.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Lexical error at {span}: {message}")]
    Lexical { span: Span, message: String },

    #[error("Syntax error at {span}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    /// Variable used but not declared in any visible scope.
    #[error("Undefined variable '{name}' at {span}")]
    UndefinedVariable { name: String, span: Span },

    /// Variable declared twice in the same scope.
    #[error("Duplicate definition of '{name}' at {span}")]
    DuplicateDefinition { name: String, span: Span },

    /// A `void` subroutine returning a value.
    #[error("Subroutine declared 'void' returns a value at {span}")]
    ReturnValueInVoid { span: Span },

    /// A state the grammar should make unreachable.
    #[error("Internal compiler error: {message}")]
    Internal { message: String },

    /// File I/O error from the driver.
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    /// Create a lexical error.
    pub fn lexical(span: Span, message: impl Into<String>) -> Self {
        CompileError::Lexical {
            span,
            message: message.into(),
        }
    }

    /// Create a syntax error.
    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            span,
            message: message.into(),
            expected: Vec::new(),
        }
    }

    /// Create a syntax error with expected tokens.
    pub fn syntax_expected(span: Span, message: impl Into<String>, expected: Vec<String>) -> Self {
        CompileError::Syntax {
            span,
            message: message.into(),
            expected,
        }
    }

    /// Create an undefined variable error.
    pub fn undefined_variable(name: impl Into<String>, span: Span) -> Self {
        CompileError::UndefinedVariable {
            name: name.into(),
            span,
        }
    }

    /// Create a duplicate definition error.
    pub fn duplicate_definition(name: impl Into<String>, span: Span) -> Self {
        CompileError::DuplicateDefinition {
            name: name.into(),
            span,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal {
            message: message.into(),
        }
    }

    /// Create an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompileError::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the span of this error, if any.
    pub fn span(&self) -> Option<&Span> {
        match self {
            CompileError::Lexical { span, .. } => Some(span),
            CompileError::Syntax { span, .. } => Some(span),
            CompileError::UndefinedVariable { span, .. } => Some(span),
            CompileError::DuplicateDefinition { span, .. } => Some(span),
            CompileError::ReturnValueInVoid { span } => Some(span),
            CompileError::Internal { .. } => None,
            CompileError::Io { .. } => None,
        }
    }
}

/// Diagnostic formatter for rich error output.
///
/// Prints the message, a `file:line:column` locator, and the offending
/// source line with a caret when source text is attached.
pub struct Diagnostic<'a> {
    error: &'a CompileError,
    source: Option<&'a str>,
    filename: Option<&'a str>,
}

impl<'a> Diagnostic<'a> {
    pub fn new(error: &'a CompileError) -> Self {
        Self {
            error,
            source: None,
            filename: None,
        }
    }

    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_filename(mut self, filename: &'a str) -> Self {
        self.filename = Some(filename);
        self
    }
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filename = self.filename.unwrap_or("<input>");

        match self.error.span() {
            Some(span) => {
                writeln!(f, "error: {}", self.error)?;
                writeln!(f, "  --> {}:{}:{}", filename, span.line, span.column)?;

                if let Some(source) = self.source
                    && let Some(line) = source.lines().nth(span.line - 1)
                {
                    writeln!(f, "   |")?;
                    writeln!(f, "{:3} | {}", span.line, line)?;
                    writeln!(f, "   | {:>width$}^", "", width = span.column - 1)?;
                }
            }
            None => {
                writeln!(f, "error: {}", self.error)?;
            }
        }

        if let CompileError::Syntax { expected, .. } = self.error
            && !expected.is_empty()
        {
            writeln!(f, "   = expected: {}", expected.join(", "))?;
        }

        Ok(())
    }
}
