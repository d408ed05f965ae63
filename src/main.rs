//! jackc CLI - Compiles Jack files to VM code.
//!
//! Usage:
//!     jackc <file.jack | directory>
//!     jackc --xml <file.jack | directory>

use clap::Parser as ClapParser;
use jackc::{
    CompileOptions, Diagnostic, compile_directory_with_options, compile_file_with_options,
    write_result,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(ClapParser, Debug)]
#[command(name = "jackc")]
#[command(version)]
#[command(about = "Single-pass Jack to VM code compiler")]
struct Args {
    /// Input file (.jack) or directory containing .jack files
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory (defaults to input directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the diagnostic token and parse-tree XML
    #[arg(long)]
    xml: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let options = CompileOptions { emit_xml: args.xml };

    let (outcomes, output_dir) = if args.input.is_file() {
        let outcome = compile_file_with_options(&args.input, options);
        let output_dir = args.output.unwrap_or_else(|| {
            args.input
                .parent()
                .unwrap_or(&PathBuf::from("."))
                .to_path_buf()
        });
        (vec![outcome], output_dir)
    } else if args.input.is_dir() {
        let outcomes = compile_directory_with_options(&args.input, options);
        let output_dir = args.output.unwrap_or_else(|| args.input.clone());
        (outcomes, output_dir)
    } else {
        eprintln!("Error: Input not found: {}", args.input.display());
        return ExitCode::from(2);
    };

    if outcomes.is_empty() {
        eprintln!("Error: No .jack files found in {}", args.input.display());
        return ExitCode::from(2);
    }

    let mut has_errors = false;

    for outcome in &outcomes {
        match &outcome.result {
            Ok(_) => match write_result(outcome, &output_dir) {
                Ok(()) => {
                    println!(
                        "Compiled {}.jack -> {}.vm",
                        outcome.filename, outcome.filename
                    );
                }
                Err(e) => {
                    eprintln!("Error writing {}.vm: {}", outcome.filename, e);
                    has_errors = true;
                }
            },
            Err(err) => {
                has_errors = true;
                let filename = format!("{}.jack", outcome.filename);
                eprint!(
                    "{}",
                    Diagnostic::new(err)
                        .with_source(&outcome.source)
                        .with_filename(&filename)
                );
            }
        }
    }

    if has_errors {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
