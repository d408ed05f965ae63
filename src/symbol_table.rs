//! Two-level symbol table for the Jack compiler.
//!
//! The symbol table maintains two insertion-ordered scopes:
//! - **Class scope**: `static` and `field` variables, lives for the class
//! - **Subroutine scope**: `arg` and `local` variables, reset per subroutine
//!
//! Lookup is subroutine-first, so subroutine variables shadow class-level
//! ones. Slot indices are dense per kind, starting at 0, and never reused
//! within a scope's lifetime.

use crate::error::CompileError;
use crate::token::Span;
use indexmap::IndexMap;
use std::fmt;

/// The storage class of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Class-level static variable
    Static,
    /// Class-level field variable
    Field,
    /// Subroutine parameter
    Arg,
    /// Subroutine local variable
    Local,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Static => "static",
            Kind::Field => "field",
            Kind::Arg => "arg",
            Kind::Local => "local",
        }
    }

    /// Check if this is a class-level kind.
    #[inline]
    pub fn is_class_level(self) -> bool {
        matches!(self, Kind::Static | Kind::Field)
    }
}

/// A declared type: a primitive or a class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Char,
    Boolean,
    ClassName(String),
}

impl Type {
    pub fn as_str(&self) -> &str {
        match self {
            Type::Int => "int",
            Type::Char => "char",
            Type::Boolean => "boolean",
            Type::ClassName(name) => name,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row in the symbol table. Immutable after insertion.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub kind: Kind,
    /// Slot index within the kind's segment.
    pub index: u16,
}

/// Two-level symbol table for one compilation unit.
#[derive(Debug, Default)]
pub struct SymbolTable {
    class_scope: IndexMap<String, Symbol>,
    subroutine_scope: IndexMap<String, Symbol>,
    static_count: u16,
    field_count: u16,
    arg_count: u16,
    local_count: u16,
}

impl SymbolTable {
    /// Create an empty table for a new class.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the subroutine scope and reset its counters.
    ///
    /// Class-level symbols remain accessible.
    pub fn start_subroutine(&mut self) {
        self.subroutine_scope.clear();
        self.arg_count = 0;
        self.local_count = 0;
    }

    /// Define a new symbol, assigning it the next free slot for its kind.
    ///
    /// Returns an error if the name is already defined in the same scope.
    pub fn define(
        &mut self,
        name: &str,
        ty: Type,
        kind: Kind,
        span: Span,
    ) -> Result<(), CompileError> {
        let scope = if kind.is_class_level() {
            &self.class_scope
        } else {
            &self.subroutine_scope
        };

        if scope.contains_key(name) {
            return Err(CompileError::duplicate_definition(name, span));
        }

        let counter = match kind {
            Kind::Static => &mut self.static_count,
            Kind::Field => &mut self.field_count,
            Kind::Arg => &mut self.arg_count,
            Kind::Local => &mut self.local_count,
        };
        let index = *counter;
        *counter += 1;

        let symbol = Symbol {
            name: name.to_string(),
            ty,
            kind,
            index,
        };

        if kind.is_class_level() {
            self.class_scope.insert(name.to_string(), symbol);
        } else {
            self.subroutine_scope.insert(name.to_string(), symbol);
        }

        Ok(())
    }

    /// Look up a symbol by name, subroutine scope first.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.subroutine_scope
            .get(name)
            .or_else(|| self.class_scope.get(name))
    }

    /// Kind of a declared name; undefined names are an error.
    pub fn kind_of(&self, name: &str, span: &Span) -> Result<Kind, CompileError> {
        self.row(name, span).map(|s| s.kind)
    }

    /// Declared type of a name; undefined names are an error.
    pub fn type_of(&self, name: &str, span: &Span) -> Result<&Type, CompileError> {
        self.row(name, span).map(|s| &s.ty)
    }

    /// Slot index of a name; undefined names are an error.
    pub fn index_of(&self, name: &str, span: &Span) -> Result<u16, CompileError> {
        self.row(name, span).map(|s| s.index)
    }

    fn row(&self, name: &str, span: &Span) -> Result<&Symbol, CompileError> {
        self.lookup(name)
            .ok_or_else(|| CompileError::undefined_variable(name, span.clone()))
    }

    /// Number of symbols defined with the given kind.
    pub fn var_count(&self, kind: Kind) -> u16 {
        match kind {
            Kind::Static => self.static_count,
            Kind::Field => self.field_count,
            Kind::Arg => self.arg_count,
            Kind::Local => self.local_count,
        }
    }

    /// Number of fields; the allocation size for constructors.
    #[inline]
    pub fn field_count(&self) -> u16 {
        self.field_count
    }
}
