//! Schist - a small-step CESK interpreter for a register-based object language
//!
//! Programs are classes with fields and methods whose bodies are chains of
//! statements in the style of a register-transfer IL: explicit labels,
//! `goto`/`if` jumps, handler push/pop, and invocation through
//! continuations. Each reduction produces a whole machine state --
//! (control statement, frame pointer, store, continuation stack) -- so the
//! transition relation can be observed, replayed, or abstracted.

pub mod addr;
pub mod ast;
pub mod lexer;
pub mod machine;
pub mod parser;
pub mod store;
pub mod test_support;
pub mod value;

pub use ast::Program;
pub use lexer::Lexer;
pub use machine::{Machine, MachineError, Outcome, State};
pub use parser::Parser;
pub use store::Store;
pub use value::Value;
