use clap::Parser;
use std::path::PathBuf;

use lython::ast::pretty::pretty_module;
use lython::compiler;
use lython::errors::{print_error, print_lython_error};

#[derive(Parser, Debug)]
#[command(name = "lython")]
#[command(about = "A Python-dialect compiler and virtual machine", long_about = None)]
struct Args {
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Pretty-print the parsed module instead of executing it
    #[arg(long)]
    dump_ast: bool,

    /// Print the lowered instruction vector instead of executing it
    #[arg(long)]
    dump_program: bool,

    /// Entry point to execute (defaults to the module-level code)
    #[arg(long)]
    entry: Option<String>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let compiled = match compiler::compile_file(&args.input) {
        Ok(compiled) => compiled,
        Err(error) => {
            print_error(&args.input, &error);
            std::process::exit(1);
        }
    };

    if compiled.has_errors() {
        let colored = std::io::IsTerminal::is_terminal(&std::io::stderr());
        for diagnostic in compiler::collect_diagnostics(&compiled) {
            print_lython_error(&diagnostic, colored);
        }
        std::process::exit(1);
    }

    if args.dump_ast {
        print!("{}", pretty_module(&compiled.module.ast, &compiled.body));
        return;
    }

    let image = compiled.image.as_ref().expect("clean modules lower fully");

    if args.dump_program {
        print!("{}", image.program.dump(&image.ast));
        return;
    }

    let result = match &args.entry {
        Some(entry) => compiler::execute_entry(image, entry).map(Some),
        None => compiler::execute_main(image),
    };

    match result {
        Ok(Some(value)) => println!("{}", value),
        Ok(None) => {
            // no module-level code: show the program instead
            print!("{}", image.program.dump(&image.ast));
        }
        Err(error) => {
            print_error(&args.input, &error);
            std::process::exit(1);
        }
    }
}
