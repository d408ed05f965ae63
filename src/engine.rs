//! Single-pass recursive-descent compilation engine.
//!
//! The engine consumes the token stream production by production, threading
//! declarations through the symbol table and emitting VM instructions as it
//! goes. There is no AST and no backtracking: every fork in the grammar is
//! decided by the current token plus at most one token of lookahead (the
//! identifier fork in `term`). The first error aborts the unit.
//!
//! When diagnostic XML is requested, the same pass also feeds a
//! [`ParseTreeWriter`]: each consumed token becomes a leaf, each production
//! an element.

use crate::error::CompileError;
use crate::symbol_table::{Kind, SymbolTable, Type};
use crate::token::{BinaryOp, Keyword, KeywordConstant, Span, SpannedToken, Token, UnaryOp};
use crate::tokenizer::TokenStream;
use crate::vm_writer::{Segment, VmWriter};
use crate::xml::ParseTreeWriter;

/// Maximum expression nesting depth before the engine bails out.
/// Prevents stack overflow on pathological input (e.g., `(((((...)))))`).
/// 25 is generous for real Jack programs (typical nesting: 3-5 levels).
const MAX_EXPR_DEPTH: usize = 25;

/// Kind of subroutine being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

/// Declared return type of a subroutine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Value(Type),
}

/// Per-subroutine compilation state, created at subroutine entry and
/// discarded at exit. Label counters are subroutine-local so that label
/// names are unique within each `Class.subroutine` pair.
#[derive(Debug)]
struct SubroutineContext {
    /// `ClassName.subroutineName`, as emitted in the `function` command.
    qualified_name: String,
    return_type: ReturnType,
    if_index: u16,
    while_index: u16,
}

impl SubroutineContext {
    fn new(qualified_name: String, return_type: ReturnType) -> Self {
        Self {
            qualified_name,
            return_type,
            if_index: 0,
            while_index: 0,
        }
    }

    fn next_if_label(&mut self) -> String {
        let n = self.if_index;
        self.if_index += 1;
        format!("{}If{}", self.qualified_name, n)
    }

    fn next_while_label(&mut self) -> String {
        let n = self.while_index;
        self.while_index += 1;
        format!("{}While{}", self.qualified_name, n)
    }
}

/// Artifacts of one compiled class.
#[derive(Debug)]
pub struct EngineOutput {
    /// The emitted VM program.
    pub vm_code: String,
    /// Parse-tree XML, present when requested at construction.
    pub parse_xml: Option<String>,
}

/// Recursive-descent compiler for one Jack class.
pub struct CompilationEngine {
    stream: TokenStream,
    symbols: SymbolTable,
    vm: VmWriter,
    tree: Option<ParseTreeWriter>,
    class_name: String,
    depth: usize,
}

impl CompilationEngine {
    /// Create an engine over a token stream.
    ///
    /// With `emit_tree` set, the engine also produces the parse-tree XML.
    pub fn new(stream: TokenStream, emit_tree: bool) -> Self {
        Self {
            stream,
            symbols: SymbolTable::new(),
            vm: VmWriter::new(),
            tree: emit_tree.then(ParseTreeWriter::new),
            class_name: String::new(),
            depth: 0,
        }
    }

    /// Compile the whole unit: one class, then end of input.
    pub fn compile(mut self) -> Result<EngineOutput, CompileError> {
        self.compile_class()?;

        if let Some(extra) = self.stream.peek() {
            return Err(CompileError::syntax(
                extra.span.clone(),
                format!("expected end of input, got {}", extra.token),
            ));
        }

        Ok(EngineOutput {
            vm_code: self.vm.into_output(),
            parse_xml: self.tree.map(ParseTreeWriter::finish),
        })
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    /// Consume the next token, mirroring it into the parse tree.
    fn take(&mut self) -> Result<SpannedToken, CompileError> {
        let token = self.stream.advance()?;
        if let Some(tree) = &mut self.tree {
            tree.leaf(&token.token);
        }
        Ok(token)
    }

    fn open(&mut self, tag: &str) {
        if let Some(tree) = &mut self.tree {
            tree.open(tag);
        }
    }

    fn close(&mut self, tag: &str) {
        if let Some(tree) = &mut self.tree {
            tree.close(tag);
        }
    }

    fn peek_token(&self) -> Option<&Token> {
        self.stream.peek().map(|t| &t.token)
    }

    fn peek_keyword(&self) -> Option<Keyword> {
        match self.peek_token() {
            Some(Token::Keyword(k)) => Some(*k),
            _ => None,
        }
    }

    fn peek_symbol(&self) -> Option<char> {
        match self.peek_token() {
            Some(Token::Symbol(c)) => Some(*c),
            _ => None,
        }
    }

    /// Symbol one token past the cursor, if any.
    fn lookahead_symbol(&self) -> Option<char> {
        match self.stream.lookahead().map(|t| &t.token) {
            Some(Token::Symbol(c)) => Some(*c),
            _ => None,
        }
    }

    fn current_span(&self) -> Span {
        self.stream
            .peek()
            .map(|t| t.span.clone())
            .unwrap_or_else(|| self.stream.eof_span())
    }

    fn describe_current(&self) -> String {
        match self.peek_token() {
            Some(token) => token.to_string(),
            None => format!("end of input (token {})", self.stream.index()),
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Span, CompileError> {
        if self.peek_keyword() == Some(keyword) {
            Ok(self.take()?.span)
        } else {
            Err(CompileError::syntax_expected(
                self.current_span(),
                format!(
                    "expected keyword '{}', got {}",
                    keyword.as_str(),
                    self.describe_current()
                ),
                vec![keyword.as_str().to_string()],
            ))
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<Span, CompileError> {
        if self.peek_symbol() == Some(symbol) {
            Ok(self.take()?.span)
        } else {
            Err(CompileError::syntax_expected(
                self.current_span(),
                format!("expected '{}', got {}", symbol, self.describe_current()),
                vec![symbol.to_string()],
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), CompileError> {
        if matches!(self.peek_token(), Some(Token::Identifier(_))) {
            let token = self.take()?;
            match token.token {
                Token::Identifier(name) => Ok((name, token.span)),
                _ => Err(CompileError::internal("token changed category mid-stream")),
            }
        } else {
            Err(CompileError::syntax_expected(
                self.current_span(),
                format!("expected identifier, got {}", self.describe_current()),
                vec!["identifier".to_string()],
            ))
        }
    }

    /// type: 'int' | 'char' | 'boolean' | className
    fn expect_type(&mut self) -> Result<Type, CompileError> {
        match self.peek_token() {
            Some(Token::Keyword(Keyword::Int)) => {
                self.take()?;
                Ok(Type::Int)
            }
            Some(Token::Keyword(Keyword::Char)) => {
                self.take()?;
                Ok(Type::Char)
            }
            Some(Token::Keyword(Keyword::Boolean)) => {
                self.take()?;
                Ok(Type::Boolean)
            }
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.take()?;
                Ok(Type::ClassName(name))
            }
            _ => Err(CompileError::syntax(
                self.current_span(),
                format!(
                    "expected type (int, char, boolean, or class name), got {}",
                    self.describe_current()
                ),
            )),
        }
    }

    // ========================================================================
    // Program structure
    // ========================================================================

    /// class: 'class' className '{' classVarDec* subroutineDec* '}'
    fn compile_class(&mut self) -> Result<(), CompileError> {
        self.open("class");

        self.expect_keyword(Keyword::Class)?;
        let (name, _) = self.expect_identifier()?;
        self.class_name = name;
        self.expect_symbol('{')?;

        while matches!(self.peek_keyword(), Some(Keyword::Static | Keyword::Field)) {
            self.compile_class_var_dec()?;
        }

        while matches!(
            self.peek_keyword(),
            Some(Keyword::Constructor | Keyword::Function | Keyword::Method)
        ) {
            self.compile_subroutine()?;
        }

        self.expect_symbol('}')?;
        self.close("class");
        Ok(())
    }

    /// classVarDec: ('static' | 'field') type varName (',' varName)* ';'
    fn compile_class_var_dec(&mut self) -> Result<(), CompileError> {
        self.open("classVarDec");

        let kind = match self.peek_keyword() {
            Some(Keyword::Static) => Kind::Static,
            Some(Keyword::Field) => Kind::Field,
            _ => {
                return Err(CompileError::internal(
                    "class variable declaration without 'static' or 'field'",
                ));
            }
        };
        self.take()?;

        let ty = self.expect_type()?;

        loop {
            let (name, span) = self.expect_identifier()?;
            self.symbols.define(&name, ty.clone(), kind, span)?;
            if self.peek_symbol() == Some(',') {
                self.expect_symbol(',')?;
            } else {
                break;
            }
        }

        self.expect_symbol(';')?;
        self.close("classVarDec");
        Ok(())
    }

    /// subroutineDec: ('constructor'|'function'|'method') ('void'|type)
    /// subroutineName '(' parameterList ')' subroutineBody
    fn compile_subroutine(&mut self) -> Result<(), CompileError> {
        self.open("subroutineDec");

        let kind = match self.peek_keyword() {
            Some(Keyword::Constructor) => SubroutineKind::Constructor,
            Some(Keyword::Function) => SubroutineKind::Function,
            Some(Keyword::Method) => SubroutineKind::Method,
            _ => {
                return Err(CompileError::internal(
                    "subroutine declaration without 'constructor', 'function', or 'method'",
                ));
            }
        };
        self.take()?;

        self.symbols.start_subroutine();

        let return_type = if self.peek_keyword() == Some(Keyword::Void) {
            self.take()?;
            ReturnType::Void
        } else {
            ReturnType::Value(self.expect_type()?)
        };

        let (name, name_span) = self.expect_identifier()?;

        // The hidden receiver takes arg slot 0 before any explicit parameter.
        if kind == SubroutineKind::Method {
            self.symbols.define(
                "this",
                Type::ClassName(self.class_name.clone()),
                Kind::Arg,
                name_span,
            )?;
        }

        let mut ctx = SubroutineContext::new(
            format!("{}.{}", self.class_name, name),
            return_type,
        );

        self.expect_symbol('(')?;
        self.compile_parameter_list()?;
        self.expect_symbol(')')?;

        self.open("subroutineBody");
        self.expect_symbol('{')?;

        while self.peek_keyword() == Some(Keyword::Var) {
            self.compile_var_dec()?;
        }

        // All declarations precede statements, so the local count is final.
        let num_locals = self.symbols.var_count(Kind::Local);
        self.vm.write_function(&ctx.qualified_name, num_locals);

        match kind {
            SubroutineKind::Constructor => {
                // Anchor `this` at a fresh object sized by the field count.
                self.vm
                    .write_push(Segment::Constant, self.symbols.field_count());
                self.vm.write_call("Memory.alloc", 1);
                self.vm.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Method => {
                // Anchor `this` at the hidden receiver.
                self.vm.write_push(Segment::Argument, 0);
                self.vm.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Function => {}
        }

        self.compile_statements(&mut ctx)?;

        self.expect_symbol('}')?;
        self.close("subroutineBody");
        self.close("subroutineDec");
        Ok(())
    }

    /// parameterList: ((type varName) (',' type varName)*)?
    fn compile_parameter_list(&mut self) -> Result<(), CompileError> {
        self.open("parameterList");

        if self.peek_symbol() != Some(')') {
            loop {
                let ty = self.expect_type()?;
                let (name, span) = self.expect_identifier()?;
                self.symbols.define(&name, ty, Kind::Arg, span)?;
                if self.peek_symbol() == Some(',') {
                    self.expect_symbol(',')?;
                } else {
                    break;
                }
            }
        }

        self.close("parameterList");
        Ok(())
    }

    /// varDec: 'var' type varName (',' varName)* ';'
    fn compile_var_dec(&mut self) -> Result<(), CompileError> {
        self.open("varDec");

        self.expect_keyword(Keyword::Var)?;
        let ty = self.expect_type()?;

        loop {
            let (name, span) = self.expect_identifier()?;
            self.symbols.define(&name, ty.clone(), Kind::Local, span)?;
            if self.peek_symbol() == Some(',') {
                self.expect_symbol(',')?;
            } else {
                break;
            }
        }

        self.expect_symbol(';')?;
        self.close("varDec");
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// statements: statement*
    fn compile_statements(&mut self, ctx: &mut SubroutineContext) -> Result<(), CompileError> {
        self.open("statements");

        while let Some(keyword) = self.peek_keyword() {
            if !keyword.starts_statement() {
                break;
            }
            match keyword {
                Keyword::Let => self.compile_let(ctx)?,
                Keyword::If => self.compile_if(ctx)?,
                Keyword::While => self.compile_while(ctx)?,
                Keyword::Do => self.compile_do(ctx)?,
                Keyword::Return => self.compile_return(ctx)?,
                _ => return Err(CompileError::internal("non-statement keyword dispatched")),
            }
        }

        self.close("statements");
        Ok(())
    }

    /// letStatement: 'let' varName ('[' expression ']')? '=' expression ';'
    fn compile_let(&mut self, ctx: &mut SubroutineContext) -> Result<(), CompileError> {
        self.open("letStatement");

        self.expect_keyword(Keyword::Let)?;
        let (name, span) = self.expect_identifier()?;
        let target = self
            .symbols
            .lookup(&name)
            .cloned()
            .ok_or_else(|| CompileError::undefined_variable(&name, span))?;
        let segment = Segment::for_kind(target.kind);

        if self.peek_symbol() == Some('[') {
            // a[i] = e: the element address is computed first and parked in
            // temp 1, since e may itself go through `that`.
            self.expect_symbol('[')?;
            self.compile_expression(ctx)?;
            self.expect_symbol(']')?;
            self.vm.write_push(segment, target.index);
            self.vm.write_arithmetic("add");
            self.vm.write_pop(Segment::Temp, 1);

            self.expect_symbol('=')?;
            self.compile_expression(ctx)?;
            self.expect_symbol(';')?;

            self.vm.write_push(Segment::Temp, 1);
            self.vm.write_pop(Segment::Pointer, 1);
            self.vm.write_pop(Segment::That, 0);
        } else {
            self.expect_symbol('=')?;
            self.compile_expression(ctx)?;
            self.expect_symbol(';')?;
            self.vm.write_pop(segment, target.index);
        }

        self.close("letStatement");
        Ok(())
    }

    /// ifStatement: 'if' '(' expression ')' '{' statements '}'
    /// ('else' '{' statements '}')?
    fn compile_if(&mut self, ctx: &mut SubroutineContext) -> Result<(), CompileError> {
        self.open("ifStatement");

        self.expect_keyword(Keyword::If)?;
        self.expect_symbol('(')?;
        self.compile_expression(ctx)?;
        self.expect_symbol(')')?;

        let else_label = ctx.next_if_label();
        let end_label = ctx.next_if_label();

        self.vm.write_arithmetic("not");
        self.vm.write_if_goto(&else_label);

        self.expect_symbol('{')?;
        self.compile_statements(ctx)?;
        self.expect_symbol('}')?;

        self.vm.write_goto(&end_label);
        self.vm.write_label(&else_label);

        if self.peek_keyword() == Some(Keyword::Else) {
            self.expect_keyword(Keyword::Else)?;
            self.expect_symbol('{')?;
            self.compile_statements(ctx)?;
            self.expect_symbol('}')?;
        }

        self.vm.write_label(&end_label);
        self.close("ifStatement");
        Ok(())
    }

    /// whileStatement: 'while' '(' expression ')' '{' statements '}'
    fn compile_while(&mut self, ctx: &mut SubroutineContext) -> Result<(), CompileError> {
        self.open("whileStatement");

        self.expect_keyword(Keyword::While)?;

        let head_label = ctx.next_while_label();
        let exit_label = ctx.next_while_label();

        self.vm.write_label(&head_label);

        self.expect_symbol('(')?;
        self.compile_expression(ctx)?;
        self.expect_symbol(')')?;

        self.vm.write_arithmetic("not");
        self.vm.write_if_goto(&exit_label);

        self.expect_symbol('{')?;
        self.compile_statements(ctx)?;
        self.expect_symbol('}')?;

        self.vm.write_goto(&head_label);
        self.vm.write_label(&exit_label);

        self.close("whileStatement");
        Ok(())
    }

    /// doStatement: 'do' subroutineCall ';'
    fn compile_do(&mut self, ctx: &mut SubroutineContext) -> Result<(), CompileError> {
        self.open("doStatement");

        self.expect_keyword(Keyword::Do)?;
        self.compile_subroutine_call(ctx)?;
        self.expect_symbol(';')?;

        // The return value is unused.
        self.vm.write_pop(Segment::Temp, 0);

        self.close("doStatement");
        Ok(())
    }

    /// returnStatement: 'return' expression? ';'
    fn compile_return(&mut self, ctx: &mut SubroutineContext) -> Result<(), CompileError> {
        self.open("returnStatement");

        self.expect_keyword(Keyword::Return)?;

        if self.peek_symbol() != Some(';') {
            if ctx.return_type == ReturnType::Void {
                return Err(CompileError::ReturnValueInVoid {
                    span: self.current_span(),
                });
            }
            self.compile_expression(ctx)?;
            self.expect_symbol(';')?;
            self.vm.write_return();
        } else {
            self.expect_symbol(';')?;
            if ctx.return_type == ReturnType::Void {
                self.vm.write_void_return();
            } else {
                self.vm.write_return();
            }
        }

        self.close("returnStatement");
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// expression: term (op term)*
    fn compile_expression(&mut self, ctx: &mut SubroutineContext) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            self.depth -= 1;
            return Err(CompileError::syntax(
                self.current_span(),
                "expression nesting too deep",
            ));
        }
        let result = self.compile_expression_inner(ctx);
        self.depth -= 1;
        result
    }

    fn compile_expression_inner(
        &mut self,
        ctx: &mut SubroutineContext,
    ) -> Result<(), CompileError> {
        self.open("expression");

        self.compile_term(ctx)?;

        // No precedence: operators apply strictly left-to-right. Each term
        // is compiled before its operator, which then consumes the two
        // values already on the stack.
        while let Some(c) = self.peek_symbol() {
            let Some(op) = BinaryOp::from_char(c) else {
                break;
            };
            self.take()?;
            self.compile_term(ctx)?;
            self.vm.write_binary_op(op);
        }

        self.close("expression");
        Ok(())
    }

    /// term: integerConstant | stringConstant | keywordConstant | varName |
    /// varName'['expression']' | subroutineCall | '('expression')' |
    /// unaryOp term
    fn compile_term(&mut self, ctx: &mut SubroutineContext) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            self.depth -= 1;
            return Err(CompileError::syntax(
                self.current_span(),
                "expression nesting too deep",
            ));
        }
        let result = self.compile_term_inner(ctx);
        self.depth -= 1;
        result
    }

    fn compile_term_inner(&mut self, ctx: &mut SubroutineContext) -> Result<(), CompileError> {
        self.open("term");

        match self.peek_token().cloned() {
            Some(Token::IntegerConstant(n)) => {
                self.take()?;
                self.vm.write_push(Segment::Constant, n);
            }

            Some(Token::StringConstant(s)) => {
                self.take()?;
                self.vm.write_string_constant(&s);
            }

            Some(Token::Keyword(k)) => match KeywordConstant::from_keyword(k) {
                Some(kc) => {
                    self.take()?;
                    self.vm.write_keyword_constant(kc);
                }
                None => {
                    return Err(CompileError::syntax(
                        self.current_span(),
                        format!("unexpected keyword '{}' in expression", k.as_str()),
                    ));
                }
            },

            Some(Token::Symbol('(')) => {
                self.expect_symbol('(')?;
                self.compile_expression(ctx)?;
                self.expect_symbol(')')?;
            }

            Some(Token::Symbol(c)) if matches!(c, '-' | '~') => {
                self.take()?;
                // The operand compiles first; the operator folds the value
                // already on the stack.
                self.compile_term(ctx)?;
                match c {
                    '-' => self.vm.write_unary_op(UnaryOp::Neg),
                    _ => self.vm.write_unary_op(UnaryOp::Not),
                }
            }

            Some(Token::Identifier(name)) => match self.lookahead_symbol() {
                // One token of lookahead settles the identifier fork.
                Some('(') | Some('.') => {
                    self.compile_subroutine_call(ctx)?;
                }
                Some('[') => {
                    let ident = self.take()?;
                    let sym = self
                        .symbols
                        .lookup(&name)
                        .cloned()
                        .ok_or_else(|| CompileError::undefined_variable(&name, ident.span))?;
                    self.expect_symbol('[')?;
                    self.compile_expression(ctx)?;
                    self.expect_symbol(']')?;
                    self.vm.write_push(Segment::for_kind(sym.kind), sym.index);
                    self.vm.write_arithmetic("add");
                    self.vm.write_pop(Segment::Pointer, 1);
                    self.vm.write_push(Segment::That, 0);
                }
                _ => {
                    let ident = self.take()?;
                    let sym = self
                        .symbols
                        .lookup(&name)
                        .cloned()
                        .ok_or_else(|| CompileError::undefined_variable(&name, ident.span))?;
                    self.vm.write_push(Segment::for_kind(sym.kind), sym.index);
                }
            },

            Some(other) => {
                return Err(CompileError::syntax(
                    self.current_span(),
                    format!("expected term, got {}", other),
                ));
            }

            None => {
                return Err(CompileError::syntax(
                    self.stream.eof_span(),
                    "expected term, got end of input",
                ));
            }
        }

        self.close("term");
        Ok(())
    }

    /// subroutineCall: subroutineName '(' expressionList ')' |
    /// (className | varName) '.' subroutineName '(' expressionList ')'
    ///
    /// The receiver/static decision is a symbol-table lookup on the first
    /// name: a known variable means a method call on that object, an
    /// unknown name is taken as a class name.
    fn compile_subroutine_call(&mut self, ctx: &mut SubroutineContext) -> Result<(), CompileError> {
        let (first, _) = self.expect_identifier()?;

        let (target, receiver_args) = if self.peek_symbol() == Some('.') {
            self.expect_symbol('.')?;
            let (sub_name, _) = self.expect_identifier()?;
            match self.symbols.lookup(&first).cloned() {
                Some(receiver) => {
                    // Method on a variable: the object is argument 0.
                    self.vm
                        .write_push(Segment::for_kind(receiver.kind), receiver.index);
                    (format!("{}.{}", receiver.ty.as_str(), sub_name), 1)
                }
                None => (format!("{}.{}", first, sub_name), 0),
            }
        } else {
            // Bare call: a method on the current object.
            self.vm.write_push(Segment::Pointer, 0);
            (format!("{}.{}", self.class_name, first), 1)
        };

        self.expect_symbol('(')?;
        let explicit_args = self.compile_expression_list(ctx)?;
        self.expect_symbol(')')?;

        self.vm.write_call(&target, receiver_args + explicit_args);
        Ok(())
    }

    /// expressionList: (expression (',' expression)*)?
    ///
    /// Returns the number of expressions compiled.
    fn compile_expression_list(
        &mut self,
        ctx: &mut SubroutineContext,
    ) -> Result<u16, CompileError> {
        self.open("expressionList");

        let mut count: u16 = 0;
        if self.peek_symbol() != Some(')') {
            self.compile_expression(ctx)?;
            count += 1;
            while self.peek_symbol() == Some(',') {
                self.expect_symbol(',')?;
                self.compile_expression(ctx)?;
                count += 1;
            }
        }

        self.close("expressionList");
        Ok(count)
    }
}
