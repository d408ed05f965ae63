//! Diagnostic XML output: the token listing and the parse tree.
//!
//! The parse-tree writer is event-driven: the compilation engine opens and
//! closes nonterminal elements and appends token leaves while it parses, so
//! the tree is produced in the same single pass as the VM code. Escaping of
//! `<`, `>`, `&` happens here and nowhere else; the rest of the compiler
//! carries raw lexemes.

use crate::token::{SpannedToken, Token};

/// Render one token as a leaf element: `<tag> value </tag>`.
fn leaf_element(token: &Token) -> String {
    format!("<{0}> {1} </{0}>", token.category(), token.xml_value())
}

/// Generate the token listing (`*T.xml` format).
pub fn tokens_to_xml(tokens: &[SpannedToken]) -> String {
    let mut lines = Vec::with_capacity(tokens.len() + 2);
    lines.push("<tokens>".to_string());
    lines.extend(tokens.iter().map(|t| leaf_element(&t.token)));
    lines.push("</tokens>".to_string());
    lines.push(String::new()); // trailing newline
    lines.join("\n")
}

/// Incremental writer for the parse-tree XML (`*.xml` format).
///
/// Element names mirror the grammar nonterminals; leaves are the tokens in
/// consumption order. Output is deterministic for a given token stream.
#[derive(Debug, Default)]
pub struct ParseTreeWriter {
    output: String,
    indent: usize,
}

impl ParseTreeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_line(&mut self, line: &str) {
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    /// Open a nonterminal element.
    pub fn open(&mut self, tag: &str) {
        self.write_line(&format!("<{}>", tag));
        self.indent += 1;
    }

    /// Close the innermost nonterminal element.
    pub fn close(&mut self, tag: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.write_line(&format!("</{}>", tag));
    }

    /// Append a token leaf.
    pub fn leaf(&mut self, token: &Token) {
        self.write_line(&leaf_element(token));
    }

    /// Consume the writer and return the XML text.
    pub fn finish(self) -> String {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::JackTokenizer;

    #[test]
    fn test_tokens_to_xml() {
        let tokens = JackTokenizer::new("class Main { }").tokenize().unwrap();
        let xml = tokens_to_xml(&tokens);
        assert!(xml.starts_with("<tokens>\n"));
        assert!(xml.ends_with("</tokens>\n"));
        assert!(xml.contains("<keyword> class </keyword>"));
        assert!(xml.contains("<identifier> Main </identifier>"));
        assert!(xml.contains("<symbol> { </symbol>"));
    }

    #[test]
    fn test_tokens_to_xml_escapes_comparison_symbols() {
        let tokens = JackTokenizer::new("a < b > c & d").tokenize().unwrap();
        let xml = tokens_to_xml(&tokens);
        assert!(xml.contains("<symbol> &lt; </symbol>"));
        assert!(xml.contains("<symbol> &gt; </symbol>"));
        assert!(xml.contains("<symbol> &amp; </symbol>"));
    }

    #[test]
    fn test_string_constant_leaf_strips_quotes() {
        let tokens = JackTokenizer::new("\"hello\"").tokenize().unwrap();
        let xml = tokens_to_xml(&tokens);
        assert!(xml.contains("<stringConstant> hello </stringConstant>"));
        assert!(!xml.contains('"'));
    }

    #[test]
    fn test_parse_tree_writer_nesting() {
        let mut writer = ParseTreeWriter::new();
        writer.open("class");
        writer.leaf(&Token::Keyword(crate::token::Keyword::Class));
        writer.open("classVarDec");
        writer.leaf(&Token::Identifier("x".to_string()));
        writer.close("classVarDec");
        writer.close("class");

        let expected = "\
<class>
  <keyword> class </keyword>
  <classVarDec>
    <identifier> x </identifier>
  </classVarDec>
</class>
";
        assert_eq!(writer.finish(), expected);
    }
}
