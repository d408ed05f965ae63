//! Property-based tests for the Jack compiler.
//!
//! Uses proptest to generate random valid Jack programs and verify
//! compiler invariants hold across all inputs.

use jackc::symbol_table::{Kind, SymbolTable, Type};
use jackc::token::{Keyword, Span, Token};
use jackc::tokenizer::JackTokenizer;
use jackc::{CompileOptions, compile_source};
use proptest::prelude::*;

// =============================================================================
// Arbitrary Value Generators
// =============================================================================

/// Names of the OS classes every Jack program can call into.
const OS_CLASSES: &[&str] = &[
    "Array", "Keyboard", "Math", "Memory", "Output", "Screen", "String", "Sys",
];

/// Generate a Jack identifier, screened against the reserved-word table.
fn arb_identifier() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,8}".prop_filter("reserved word", |s| Keyword::parse_keyword(s).is_none())
}

/// Generate a class name that does not collide with an OS class.
fn arb_class_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{0,6}[0-9]{0,2}"
        .prop_filter("collides with an OS class", |s| !OS_CLASSES.contains(&s.as_str()))
}

/// Generate a Jack integer constant as source text.
fn arb_integer() -> impl Strategy<Value = String> {
    (0..=32767u16).prop_map(|n| n.to_string())
}

/// Generate a variable type.
fn arb_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("int".to_string()),
        Just("char".to_string()),
        Just("boolean".to_string()),
    ]
}

/// Generate a variable declaration.
fn arb_var_dec() -> impl Strategy<Value = (String, String)> {
    (arb_type(), arb_identifier())
}

/// Generate a string constant body (no quotes, no newlines).
fn arb_string_body() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.!?]{0,20}"
}

/// Generate a minimal class: declared locals, each assigned once.
fn arb_minimal_class() -> impl Strategy<Value = String> {
    (arb_class_name(), prop::collection::vec(arb_var_dec(), 1..4)).prop_map(|(class_name, vars)| {
        // duplicate names would be a semantic error, so keep one of each
        let mut vars = vars;
        vars.sort_by(|a, b| a.1.cmp(&b.1));
        vars.dedup_by(|a, b| a.1 == b.1);

        let var_decs: String = vars
            .iter()
            .map(|(typ, name)| format!("        var {} {};", typ, name))
            .collect::<Vec<_>>()
            .join("\n");

        let statements: String = vars
            .iter()
            .map(|(_, name)| format!("        let {} = 0;", name))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"class {} {{
    function void main() {{
{}
{}
        return;
    }}
}}"#,
            class_name, var_decs, statements
        )
    })
}

/// Generate a class exercising if/while control flow.
fn arb_control_flow_class() -> impl Strategy<Value = String> {
    (
        arb_class_name(),
        arb_integer(),
        arb_integer(),
        1usize..4,
    )
        .prop_map(|(class_name, val1, val2, loops)| {
            let mut body = String::new();
            for _ in 0..loops {
                body.push_str(
                    "        while (x > 0) {\n            let x = x - 1;\n        }\n",
                );
                body.push_str(
                    "        if (x < y) {\n            let x = y;\n        } else {\n            let y = x;\n        }\n",
                );
            }
            format!(
                r#"class {} {{
    function void test() {{
        var int x;
        var int y;
        let x = {};
        let y = {};
{}        return;
    }}
}}"#,
                class_name, val1, val2, body
            )
        })
}

/// Generate a class with string and keyword constants.
fn arb_constant_class() -> impl Strategy<Value = String> {
    (arb_class_name(), arb_string_body(), arb_integer()).prop_map(|(class_name, text, n)| {
        format!(
            r#"class {} {{
    function String words() {{
        return "{}";
    }}
    function boolean flag() {{
        return true;
    }}
    function int num() {{
        return {};
    }}
}}"#,
            class_name, text, n
        )
    })
}

/// Generate a class whose method calls other methods on `this` and on a
/// field.
fn arb_method_call_class() -> impl Strategy<Value = String> {
    (arb_class_name(), arb_identifier(), 0usize..3).prop_map(|(class_name, field, explicit_args)| {
        let args: Vec<String> = (0..explicit_args).map(|i| i.to_string()).collect();
        let args = args.join(", ");
        format!(
            r#"class {} {{
    field Helper {};
    method void run() {{
        do step({});
        do {}.poke({});
        return;
    }}
    method void step({}) {{
        return;
    }}
}}"#,
            class_name,
            field,
            args,
            field,
            args,
            (0..explicit_args)
                .map(|i| format!("int p{}", i))
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}

// =============================================================================
// VM output inspection helpers
// =============================================================================

fn is_valid_vm_line(line: &str) -> bool {
    line.starts_with("push ")
        || line.starts_with("pop ")
        || line.starts_with("label ")
        || line.starts_with("goto ")
        || line.starts_with("if-goto ")
        || line.starts_with("function ")
        || line.starts_with("call ")
        || line == "return"
        || line == "add"
        || line == "sub"
        || line == "neg"
        || line == "eq"
        || line == "gt"
        || line == "lt"
        || line == "and"
        || line == "or"
        || line == "not"
}

fn labels_of(vm: &str) -> Vec<&str> {
    vm.lines()
        .filter_map(|l| l.strip_prefix("label "))
        .collect()
}

fn jump_targets_of(vm: &str) -> Vec<&str> {
    vm.lines()
        .filter_map(|l| {
            l.strip_prefix("goto ")
                .or_else(|| l.strip_prefix("if-goto "))
        })
        .collect()
}

// =============================================================================
// Property Tests - Lexer
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Re-lexing the concatenated lexemes reproduces the token stream:
    /// tokenization is whitespace-insensitive and loses nothing.
    #[test]
    fn test_lexer_round_trip(source in arb_minimal_class()) {
        let tokens = JackTokenizer::new(&source).tokenize().unwrap();
        prop_assert!(!tokens.is_empty());

        let rebuilt: String = tokens
            .iter()
            .map(|t| match &t.token {
                Token::StringConstant(s) => format!("\"{}\"", s),
                other => other.lexeme(),
            })
            .collect::<Vec<_>>()
            .join(" ");

        let relexed = JackTokenizer::new(&rebuilt).tokenize().unwrap();
        let original: Vec<_> = tokens.into_iter().map(|t| t.token).collect();
        let relexed: Vec<_> = relexed.into_iter().map(|t| t.token).collect();
        prop_assert_eq!(original, relexed);
    }

    /// Every integer the lexer accepts is in the Jack range.
    #[test]
    fn test_lexer_integer_range(n in 0u32..70000) {
        let source = n.to_string();
        let result = JackTokenizer::new(&source).tokenize();
        if n <= 32767 {
            prop_assert_eq!(
                result.unwrap()[0].token.clone(),
                Token::IntegerConstant(n as u16)
            );
        } else {
            prop_assert!(result.is_err());
        }
    }

    /// String constants survive lexing byte for byte.
    #[test]
    fn test_lexer_preserves_string_bodies(body in arb_string_body()) {
        let source = format!("\"{}\"", body);
        let tokens = JackTokenizer::new(&source).tokenize().unwrap();
        prop_assert_eq!(tokens[0].token.clone(), Token::StringConstant(body));
    }
}

// =============================================================================
// Property Tests - Symbol Table
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Slot indices are contiguous per kind, starting at 0, and
    /// `field_count` matches the number of fields defined.
    #[test]
    fn test_slot_indices_contiguous(
        n_static in 0usize..6,
        n_field in 0usize..6,
        n_arg in 0usize..6,
        n_local in 0usize..6,
    ) {
        let mut table = SymbolTable::new();
        let span = Span::new(0, 0, 1, 1);

        for i in 0..n_static {
            table.define(&format!("s{}", i), Type::Int, Kind::Static, span.clone()).unwrap();
        }
        for i in 0..n_field {
            table.define(&format!("f{}", i), Type::Int, Kind::Field, span.clone()).unwrap();
        }
        table.start_subroutine();
        for i in 0..n_arg {
            table.define(&format!("a{}", i), Type::Int, Kind::Arg, span.clone()).unwrap();
        }
        for i in 0..n_local {
            table.define(&format!("l{}", i), Type::Int, Kind::Local, span.clone()).unwrap();
        }

        prop_assert_eq!(table.field_count(), n_field as u16);
        prop_assert_eq!(table.var_count(Kind::Static), n_static as u16);
        prop_assert_eq!(table.var_count(Kind::Arg), n_arg as u16);
        prop_assert_eq!(table.var_count(Kind::Local), n_local as u16);

        for (prefix, kind, count) in [
            ("s", Kind::Static, n_static),
            ("f", Kind::Field, n_field),
            ("a", Kind::Arg, n_arg),
            ("l", Kind::Local, n_local),
        ] {
            for i in 0..count {
                let sym = table.lookup(&format!("{}{}", prefix, i)).unwrap();
                prop_assert_eq!(sym.kind, kind);
                prop_assert_eq!(sym.index, i as u16);
            }
        }
    }

    /// A fresh subroutine scope never sees the previous one.
    #[test]
    fn test_subroutine_scope_isolation(name in arb_identifier()) {
        let mut table = SymbolTable::new();
        table.start_subroutine();
        table.define(&name, Type::Int, Kind::Local, Span::new(0, 0, 1, 1)).unwrap();
        prop_assert!(table.lookup(&name).is_some());

        table.start_subroutine();
        prop_assert!(table.lookup(&name).is_none());
        prop_assert_eq!(table.var_count(Kind::Local), 0);
    }
}

// =============================================================================
// Property Tests - Emitted Code
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The compiler never panics on generated input.
    #[test]
    fn test_no_panic_on_valid_input(source in arb_minimal_class()) {
        let _ = compile_source(&source, CompileOptions::default());
    }

    /// Every emitted line is a well-formed VM instruction.
    #[test]
    fn test_vm_output_shape(source in arb_minimal_class()) {
        if let Ok(compilation) = compile_source(&source, CompileOptions::default()) {
            for line in compilation.vm_code.lines() {
                prop_assert!(is_valid_vm_line(line), "invalid VM command: {}", line);
                prop_assert_eq!(line, line.trim(), "stray whitespace: {:?}", line);
            }
        }
    }

    /// The `function` command's local count matches the slots the body uses:
    /// every `pop local i` stays below the declared count.
    #[test]
    fn test_function_local_count(source in arb_minimal_class()) {
        let compilation = compile_source(&source, CompileOptions::default()).unwrap();
        let vm = &compilation.vm_code;

        let declared: u16 = vm
            .lines()
            .find_map(|l| l.strip_prefix("function "))
            .and_then(|rest| rest.split(' ').nth(1))
            .and_then(|n| n.parse().ok())
            .unwrap();

        for line in vm.lines() {
            if let Some(rest) = line.strip_prefix("pop local ").or_else(|| line.strip_prefix("push local ")) {
                let slot: u16 = rest.parse().unwrap();
                prop_assert!(
                    slot < declared,
                    "local {} out of range for declared count {}",
                    slot,
                    declared
                );
            }
        }
    }

    /// Labels are unique within the unit, every jump lands on an emitted
    /// label, and each if/while contributes exactly two labels.
    #[test]
    fn test_label_structure(source in arb_control_flow_class()) {
        let compilation = compile_source(&source, CompileOptions::default()).unwrap();
        let vm = &compilation.vm_code;

        let labels = labels_of(vm);
        let mut unique = labels.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(labels.len(), unique.len(), "duplicate labels in:\n{}", vm);

        for target in jump_targets_of(vm) {
            prop_assert!(
                labels.contains(&target),
                "jump to missing label {} in:\n{}",
                target,
                vm
            );
        }

        let ifs = source.matches("if (").count();
        let whiles = source.matches("while (").count();
        prop_assert_eq!(labels.len(), 2 * (ifs + whiles));
    }

    /// Keyword and string constants compile to their fixed sequences and
    /// never to negative literals.
    #[test]
    fn test_constant_sequences(source in arb_constant_class()) {
        let compilation = compile_source(&source, CompileOptions::default()).unwrap();
        let vm = &compilation.vm_code;

        prop_assert!(vm.contains("push constant 1\nneg"), "true lowering missing");
        prop_assert!(vm.contains("call String.new 1"));

        for line in vm.lines() {
            for word in line.split(' ') {
                if let Ok(n) = word.parse::<i32>() {
                    prop_assert!(n >= 0, "negative literal {} in: {}", n, line);
                }
            }
        }
    }

    /// Method call sites always count the receiver: argCount >= 1 for
    /// method targets, and the hidden receiver push precedes the call.
    #[test]
    fn test_method_calls_count_receiver(source in arb_method_call_class()) {
        let compilation = compile_source(&source, CompileOptions::default()).unwrap();
        let vm = &compilation.vm_code;

        for line in vm.lines() {
            if let Some(rest) = line.strip_prefix("call ") {
                let mut parts = rest.split(' ');
                let target = parts.next().unwrap();
                let count: u16 = parts.next().unwrap().parse().unwrap();
                if target.ends_with(".step") || target.ends_with(".poke") {
                    prop_assert!(count >= 1, "method call without receiver: {}", line);
                }
            }
        }
    }

    /// Each emitted function body ends in a return.
    #[test]
    fn test_functions_return(source in arb_control_flow_class()) {
        let compilation = compile_source(&source, CompileOptions::default()).unwrap();
        let vm = &compilation.vm_code;
        let functions = vm.matches("function ").count();
        let returns = vm.lines().filter(|l| *l == "return").count();
        prop_assert!(
            returns >= functions,
            "{} functions but {} returns",
            functions,
            returns
        );
    }
}
