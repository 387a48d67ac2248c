//! Test support helpers
//!
//! Shared by the integration suites: run a source string through the real
//! lexer, parser and machine, with the print channel captured in memory.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::Program;
use crate::lexer::Lexer;
use crate::machine::{Machine, MachineError, Outcome};
use crate::parser::Parser;

/// A cloneable in-memory sink for the machine's print channel.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything printed so far, one entry per line.
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.borrow())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parse a single source string, returning the program and the class
/// names in declaration order.
pub fn parse_source(source: &str) -> Result<(Program, Vec<String>), String> {
    let tokens = Lexer::new(source)
        .tokenize()
        .map_err(|e| format!("lex error: {}", e))?;
    Parser::new(tokens)
        .parse_program()
        .map_err(|e| format!("parse error: {}", e))
}

/// Parse and run a source string through its first class with a `main`
/// method, capturing everything printed.
///
/// Panics on lex/parse failure or when no class has `main`; machine
/// errors are handed back so tests can assert on them.
pub fn run_source(source: &str) -> (Result<Outcome, MachineError>, Vec<String>) {
    let (program, classes) = match parse_source(source) {
        Ok(parsed) => parsed,
        Err(e) => panic!("{}", e),
    };
    let main_class = classes
        .iter()
        .find(|name| program.lookup_method(name, "main").is_some())
        .unwrap_or_else(|| panic!("no class with a main method"));

    let out = OutputBuffer::new();
    let mut machine = Machine::with_output(&program, Box::new(out.clone()));
    let outcome = machine.run(main_class);
    (outcome, out.lines())
}
