//! VM instruction emitter for the Jack compiler.
//!
//! An append-only textual sink: one instruction per line, Unix newlines, no
//! trailing whitespace. The emitter owns the translation from the
//! compiler's internal vocabulary (symbol kinds, operators, keyword
//! constants) to VM segment names and opcodes; no negative literals are
//! ever emitted (negation goes through `neg`).

use crate::symbol_table::Kind;
use crate::token::{BinaryOp, KeywordConstant, UnaryOp};

/// A VM memory segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Argument => "argument",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        }
    }

    /// Segment backing a symbol kind: `field` variables live in `this`,
    /// `arg` in `argument`, the rest map by name.
    pub fn for_kind(kind: Kind) -> Segment {
        match kind {
            Kind::Static => Segment::Static,
            Kind::Field => Segment::This,
            Kind::Arg => Segment::Argument,
            Kind::Local => Segment::Local,
        }
    }
}

/// VM command writer accumulating the output program.
#[derive(Debug, Default)]
pub struct VmWriter {
    output: String,
}

impl VmWriter {
    /// Create a new VM writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one instruction line.
    fn emit(&mut self, instruction: &str) {
        self.output.push_str(instruction);
        self.output.push('\n');
    }

    /// Write a push command.
    pub fn write_push(&mut self, segment: Segment, index: u16) {
        self.emit(&format!("push {} {}", segment.as_str(), index));
    }

    /// Write a pop command.
    pub fn write_pop(&mut self, segment: Segment, index: u16) {
        self.emit(&format!("pop {} {}", segment.as_str(), index));
    }

    /// Write an arithmetic/logical opcode on a line by itself.
    pub fn write_arithmetic(&mut self, opcode: &str) {
        self.emit(opcode);
    }

    /// Write the instruction(s) applying a binary operator to the two
    /// values already on the stack. Multiplication and division have no
    /// opcode and compile to OS calls.
    pub fn write_binary_op(&mut self, op: BinaryOp) {
        match op {
            BinaryOp::Add => self.write_arithmetic("add"),
            BinaryOp::Sub => self.write_arithmetic("sub"),
            BinaryOp::And => self.write_arithmetic("and"),
            BinaryOp::Or => self.write_arithmetic("or"),
            BinaryOp::Lt => self.write_arithmetic("lt"),
            BinaryOp::Gt => self.write_arithmetic("gt"),
            BinaryOp::Eq => self.write_arithmetic("eq"),
            BinaryOp::Mul => self.write_call("Math.multiply", 2),
            BinaryOp::Div => self.write_call("Math.divide", 2),
        }
    }

    /// Write the instruction applying a unary operator to the top of stack.
    pub fn write_unary_op(&mut self, op: UnaryOp) {
        match op {
            UnaryOp::Neg => self.write_arithmetic("neg"),
            UnaryOp::Not => self.write_arithmetic("not"),
        }
    }

    /// Write the sequence pushing a keyword constant.
    ///
    /// `true` is the all-ones bit pattern, built as `1` negated.
    pub fn write_keyword_constant(&mut self, kc: KeywordConstant) {
        match kc {
            KeywordConstant::True => {
                self.write_push(Segment::Constant, 1);
                self.write_arithmetic("neg");
            }
            KeywordConstant::False | KeywordConstant::Null => {
                self.write_push(Segment::Constant, 0);
            }
            KeywordConstant::This => {
                self.write_push(Segment::Pointer, 0);
            }
        }
    }

    /// Write the sequence constructing a string constant: allocate with
    /// `String.new`, then append each character code.
    pub fn write_string_constant(&mut self, s: &str) {
        let len = s.chars().count() as u16;
        self.write_push(Segment::Constant, len);
        self.write_call("String.new", 1);
        for ch in s.chars() {
            self.write_push(Segment::Constant, ch as u16);
            self.write_call("String.appendChar", 2);
        }
    }

    /// Write a label command.
    pub fn write_label(&mut self, label: &str) {
        self.emit(&format!("label {}", label));
    }

    /// Write a goto command.
    pub fn write_goto(&mut self, label: &str) {
        self.emit(&format!("goto {}", label));
    }

    /// Write an if-goto command.
    pub fn write_if_goto(&mut self, label: &str) {
        self.emit(&format!("if-goto {}", label));
    }

    /// Write a function declaration.
    pub fn write_function(&mut self, name: &str, num_locals: u16) {
        self.emit(&format!("function {} {}", name, num_locals));
    }

    /// Write a function call.
    pub fn write_call(&mut self, name: &str, num_args: u16) {
        self.emit(&format!("call {} {}", name, num_args));
    }

    /// Write a return command.
    pub fn write_return(&mut self) {
        self.emit("return");
    }

    /// Write the epilogue of a `void` subroutine: a dummy zero plus return.
    pub fn write_void_return(&mut self) {
        self.write_push(Segment::Constant, 0);
        self.write_return();
    }

    /// Consume the writer and return the generated VM code.
    pub fn into_output(self) -> String {
        self.output
    }

    /// Get a reference to the generated VM code.
    pub fn as_str(&self) -> &str {
        &self.output
    }

    /// Check if the output is empty.
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }
}
