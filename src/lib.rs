//! jackc - Single-pass Jack to Hack VM compiler.
//!
//! Compiles Jack source code to VM code for the nand2tetris virtual
//! machine. The compiler is a single pass: the recursive-descent engine
//! consumes tokens, threads identifier scope through a two-level symbol
//! table, and emits VM instructions as it parses. The same pass can
//! optionally produce the diagnostic token/parse-tree XML of the syntax
//! analyzer.
//!
//! Compilation is fail-fast: the first error aborts the unit, and no
//! partial output file is written for a failed unit.
//!
//! # Usage
//!
//! ```no_run
//! use jackc::{compile_directory, compile_file, compile_source, CompileOptions};
//! use std::path::Path;
//!
//! // Compile source text directly
//! let result = compile_source("class Main { }", CompileOptions::default());
//!
//! // Compile a single file
//! let outcome = compile_file(Path::new("Main.jack"));
//!
//! // Compile a directory (parallel processing)
//! let outcomes = compile_directory(Path::new("Square/"));
//! ```

pub mod engine;
pub mod error;
pub mod symbol_table;
pub mod token;
pub mod tokenizer;
pub mod vm_writer;
pub mod xml;

use rayon::prelude::*;
use std::fs;
use std::path::Path;

// Re-export key types
pub use engine::CompilationEngine;
pub use error::{CompileError, Diagnostic};
pub use symbol_table::{Kind, Symbol, SymbolTable, Type};
pub use tokenizer::{JackTokenizer, TokenStream};
pub use vm_writer::{Segment, VmWriter};

/// Compilation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Also produce the diagnostic token and parse-tree XML.
    pub emit_xml: bool,
}

/// Artifacts of one successfully compiled Jack class.
#[derive(Debug)]
pub struct Compilation {
    /// The emitted VM program (may be empty for a class with no subroutines).
    pub vm_code: String,
    /// Token listing XML, present when requested.
    pub token_xml: Option<String>,
    /// Parse-tree XML, present when requested.
    pub parse_xml: Option<String>,
}

/// Result of compiling one Jack source file.
#[derive(Debug)]
pub struct UnitOutcome {
    /// The file stem the `.vm` output is named after.
    pub filename: String,
    /// The source text, retained for diagnostic formatting.
    pub source: String,
    /// The compiled artifacts, or the error that aborted the unit.
    pub result: Result<Compilation, CompileError>,
}

impl UnitOutcome {
    /// Check if the compilation was successful.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Compile Jack source code directly.
pub fn compile_source(
    source: &str,
    options: CompileOptions,
) -> Result<Compilation, CompileError> {
    let tokens = JackTokenizer::new(source).tokenize()?;

    let token_xml = options.emit_xml.then(|| xml::tokens_to_xml(&tokens));

    let output =
        CompilationEngine::new(TokenStream::new(tokens), options.emit_xml).compile()?;

    Ok(Compilation {
        vm_code: output.vm_code,
        token_xml,
        parse_xml: output.parse_xml,
    })
}

/// Compile a single Jack file.
pub fn compile_file(path: &Path) -> UnitOutcome {
    compile_file_with_options(path, CompileOptions::default())
}

/// Compile a single Jack file with custom options.
pub fn compile_file_with_options(path: &Path, options: CompileOptions) -> UnitOutcome {
    let filename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            return UnitOutcome {
                filename,
                source: String::new(),
                result: Err(CompileError::io(path, e)),
            };
        }
    };

    let result = compile_source(&source, options);
    UnitOutcome {
        filename,
        source,
        result,
    }
}

/// Compile all Jack files in a directory.
pub fn compile_directory(dir: &Path) -> Vec<UnitOutcome> {
    compile_directory_with_options(dir, CompileOptions::default())
}

/// Compile all Jack files in a directory with custom options.
///
/// Files are compiled in parallel; each unit is independent.
pub fn compile_directory_with_options(dir: &Path, options: CompileOptions) -> Vec<UnitOutcome> {
    let jack_files: Vec<_> = match fs::read_dir(dir) {
        Ok(entries) => {
            let mut files: Vec<_> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "jack"))
                .collect();
            files.sort();
            files
        }
        Err(e) => {
            return vec![UnitOutcome {
                filename: dir.to_string_lossy().to_string(),
                source: String::new(),
                result: Err(CompileError::io(dir, e)),
            }];
        }
    };

    if jack_files.is_empty() {
        return Vec::new();
    }

    jack_files
        .par_iter()
        .map(|path| compile_file_with_options(path, options))
        .collect()
}

/// Write a successful unit's artifacts next to `output_dir`.
///
/// Produces `<stem>.vm`, plus `<stem>T.xml` and `<stem>.xml` when the XML
/// artifacts are present. Does nothing for a failed unit.
pub fn write_result(outcome: &UnitOutcome, output_dir: &Path) -> Result<(), CompileError> {
    let Ok(compilation) = &outcome.result else {
        return Ok(());
    };

    let vm_path = output_dir.join(format!("{}.vm", outcome.filename));
    fs::write(&vm_path, &compilation.vm_code).map_err(|e| CompileError::io(&vm_path, e))?;

    if let Some(token_xml) = &compilation.token_xml {
        let path = output_dir.join(format!("{}T.xml", outcome.filename));
        fs::write(&path, token_xml).map_err(|e| CompileError::io(&path, e))?;
    }

    if let Some(parse_xml) = &compilation.parse_xml {
        let path = output_dir.join(format!("{}.xml", outcome.filename));
        fs::write(&path, parse_xml).map_err(|e| CompileError::io(&path, e))?;
    }

    Ok(())
}
