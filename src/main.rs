//! Schist CLI - loads source files and runs the first class with a main method

use std::env;
use std::fmt::Debug;
use std::fs;
use std::process;

use schist::{Lexer, Machine, Parser, Program};

fn main() {
    process::exit(run(env::args().skip(1).collect()));
}

fn run(args: Vec<String>) -> i32 {
    let mut files = Vec::new();
    let mut verbose = false;

    for arg in &args {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                return 0;
            }
            "-v" | "--verbose" => verbose = true,
            _ => files.push(arg.clone()),
        }
    }

    if files.is_empty() {
        error("no files given");
        print_usage();
        return 1;
    }

    // Parse every file into one shared program, keeping class order.
    let mut program = Program::new();
    let mut classes = Vec::new();
    for path in &files {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                error(&format!("cannot read {}: {}", path, e));
                return 1;
            }
        };
        let tokens = match Lexer::new(&source).tokenize() {
            Ok(tokens) => tokens,
            Err(e) => return report(&format!("{}: {}", path, e), &e, verbose),
        };
        match Parser::new(tokens).parse_into(&mut program) {
            Ok(mut parsed) => classes.append(&mut parsed),
            Err(e) => return report(&format!("{}: {}", path, e), &e, verbose),
        }
    }

    // The first class, in argument order, whose main resolves.
    let main_class = classes
        .iter()
        .find(|name| program.lookup_method(name, "main").is_some());
    let main_class = match main_class {
        Some(name) => name,
        None => {
            error("no class with a main method");
            return 1;
        }
    };

    let mut machine = Machine::new(&program);
    let result = machine.run(main_class);
    match result {
        Ok(_) => 0,
        Err(e) => report(&e.to_string(), &e, verbose),
    }
}

fn report(message: &str, detail: &dyn Debug, verbose: bool) -> i32 {
    error(message);
    if verbose {
        eprintln!("{:#?}", detail);
    }
    1
}

fn error(msg: &str) {
    eprintln!("{}", msg);
}

fn print_usage() {
    error("usage: schist [options] <file>...");
    error("options:");
    error("  -h, --help     print this message");
    error("  -v, --verbose  print verbose error detail");
    error("files are .schist sources");
}
