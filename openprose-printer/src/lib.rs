//! Canonical pretty-printer for the OpenProse DSL.
//!
//! `print_program` is the crate's single entry point: an AST in, normalized
//! source text and the program's stripped comments out. See the `printer`
//! module for the layout rules.

pub mod printer;

pub use printer::{print_program, PrintResult, PrinterOptions};
